//! Devanagari to IAST transliteration
//!
//! The lexicon is keyed by IAST headwords, so Devanagari input has to be
//! romanized before candidate generation. Transliteration never fails from
//! the caller's point of view: [`Transliterator::transliterate`] falls back
//! to the input unchanged.

/// A deterministic, side-effect-free script conversion
pub trait Transliterator: Send + Sync {
    /// Convert `text`, or `None` if the conversion cannot be performed
    fn try_transliterate(&self, text: &str) -> Option<String>;

    /// Convert `text`, returning it unchanged on failure
    fn transliterate(&self, text: &str) -> String {
        self.try_transliterate(text)
            .unwrap_or_else(|| text.to_string())
    }
}

/// Devanagari → IAST (International Alphabet of Sanskrit Transliteration)
#[derive(Debug, Clone, Copy, Default)]
pub struct DevanagariToIast;

const VIRAMA: char = '\u{094D}';
const NUKTA: char = '\u{093C}';

fn consonant(c: char) -> Option<&'static str> {
    Some(match c {
        'क' => "k",
        'ख' => "kh",
        'ग' => "g",
        'घ' => "gh",
        'ङ' => "ṅ",
        'च' => "c",
        'छ' => "ch",
        'ज' => "j",
        'झ' => "jh",
        'ञ' => "ñ",
        'ट' => "ṭ",
        'ठ' => "ṭh",
        'ड' => "ḍ",
        'ढ' => "ḍh",
        'ण' => "ṇ",
        'त' => "t",
        'थ' => "th",
        'द' => "d",
        'ध' => "dh",
        'न' => "n",
        'प' => "p",
        'फ' => "ph",
        'ब' => "b",
        'भ' => "bh",
        'म' => "m",
        'य' => "y",
        'र' => "r",
        'ल' => "l",
        'ळ' => "ḷ",
        'व' => "v",
        'श' => "ś",
        'ष' => "ṣ",
        'स' => "s",
        'ह' => "h",
        _ => return None,
    })
}

fn vowel_sign(c: char) -> Option<&'static str> {
    Some(match c {
        'ा' => "ā",
        'ि' => "i",
        'ी' => "ī",
        'ु' => "u",
        'ू' => "ū",
        'ृ' => "ṛ",
        'ॄ' => "ṝ",
        'ॢ' => "ḷ",
        'ॣ' => "ḹ",
        'े' => "e",
        'ै' => "ai",
        'ो' => "o",
        'ौ' => "au",
        _ => return None,
    })
}

fn standalone(c: char) -> Option<&'static str> {
    Some(match c {
        'अ' => "a",
        'आ' => "ā",
        'इ' => "i",
        'ई' => "ī",
        'उ' => "u",
        'ऊ' => "ū",
        'ऋ' => "ṛ",
        'ॠ' => "ṝ",
        'ऌ' => "ḷ",
        'ॡ' => "ḹ",
        'ए' => "e",
        'ऐ' => "ai",
        'ओ' => "o",
        'औ' => "au",
        'ं' => "ṃ",
        'ः' => "ḥ",
        'ँ' => "m̐",
        'ऽ' => "'",
        'ॐ' => "oṃ",
        '।' => "|",
        '॥' => "||",
        '०' => "0",
        '१' => "1",
        '२' => "2",
        '३' => "3",
        '४' => "4",
        '५' => "5",
        '६' => "6",
        '७' => "7",
        '८' => "8",
        '९' => "9",
        _ => return None,
    })
}

impl Transliterator for DevanagariToIast {
    fn try_transliterate(&self, text: &str) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        // A consonant was written and still carries its inherent "a"
        let mut pending_a = false;

        for c in text.chars() {
            if c == NUKTA {
                continue;
            }
            if let Some(sign) = vowel_sign(c) {
                pending_a = false;
                out.push_str(sign);
                continue;
            }
            if c == VIRAMA {
                pending_a = false;
                continue;
            }
            if pending_a {
                out.push('a');
                pending_a = false;
            }
            if let Some(cons) = consonant(c) {
                out.push_str(cons);
                pending_a = true;
            } else if let Some(other) = standalone(c) {
                out.push_str(other);
            } else {
                out.push(c);
            }
        }
        if pending_a {
            out.push('a');
        }

        Some(out)
    }
}
