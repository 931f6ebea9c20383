//! Heuristic lemma candidates for inflected IAST tokens
//!
//! A single pass over a declarative table of suffix rewrites. For every rule
//! whose suffix ends the token, two guesses are produced: the suffix replaced
//! by the rule's replacement, and the suffix stripped entirely. The token
//! itself is always a candidate. Ranking is left to the lexicon resolver.

use std::collections::BTreeSet;

/// Inflection family a rewrite rule approximates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflectionClass {
    /// Case endings of a-stem nominals (rāmasya, rāmeṇa, ...)
    AStem,
    /// Word-final visarga alternations
    Visarga,
    /// Accusative / anusvara endings
    Accusative,
    /// Plural and dual endings
    Plural,
    /// Feminine and consonant-stem patterns
    Feminine,
    /// Finite verb and absolutive endings
    Verbal,
}

/// One suffix rewrite: `suffix` at the end of a token becomes `replacement`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixRule {
    pub suffix: &'static str,
    pub replacement: &'static str,
    pub class: InflectionClass,
}

const fn rule(suffix: &'static str, replacement: &'static str, class: InflectionClass) -> SuffixRule {
    SuffixRule {
        suffix,
        replacement,
        class,
    }
}

/// Default rewrite table, applied in order
pub const SUFFIX_RULES: &[SuffixRule] = &[
    rule("asya", "a", InflectionClass::AStem),
    rule("ānām", "a", InflectionClass::AStem),
    rule("ena", "a", InflectionClass::AStem),
    rule("āt", "a", InflectionClass::AStem),
    rule("āya", "a", InflectionClass::AStem),
    rule("aiḥ", "a", InflectionClass::AStem),
    rule("ebhyaḥ", "a", InflectionClass::AStem),
    rule("eṣu", "a", InflectionClass::AStem),
    rule("au", "a", InflectionClass::AStem),
    rule("ḥ", "", InflectionClass::Visarga),
    rule("ḥ", "s", InflectionClass::Visarga),
    rule("ḥ", "r", InflectionClass::Visarga),
    rule("o", "a", InflectionClass::Visarga),
    rule("am", "a", InflectionClass::Accusative),
    rule("m", "a", InflectionClass::Accusative),
    rule("āḥ", "a", InflectionClass::Plural),
    rule("āni", "a", InflectionClass::Plural),
    rule("yāḥ", "ī", InflectionClass::Feminine),
    rule("yā", "ī", InflectionClass::Feminine),
    rule("īnām", "in", InflectionClass::Feminine),
    rule("iḥ", "i", InflectionClass::Feminine),
    rule("ti", "", InflectionClass::Verbal),
    rule("nti", "", InflectionClass::Verbal),
    rule("si", "", InflectionClass::Verbal),
    rule("mi", "", InflectionClass::Verbal),
    rule("tu", "", InflectionClass::Verbal),
    rule("ntu", "", InflectionClass::Verbal),
    rule("tvā", "", InflectionClass::Verbal),
];

/// Generates lemma guesses from a rule table
#[derive(Debug, Clone, Copy)]
pub struct LemmaCandidateGenerator {
    rules: &'static [SuffixRule],
}

impl Default for LemmaCandidateGenerator {
    fn default() -> Self {
        Self::new(SUFFIX_RULES)
    }
}

impl LemmaCandidateGenerator {
    pub fn new(rules: &'static [SuffixRule]) -> Self {
        Self { rules }
    }

    /// All candidates for `word`, deduplicated. Always contains `word`.
    /// Rewrites that would leave an empty string are dropped.
    pub fn candidates(&self, word: &str) -> BTreeSet<String> {
        let mut candidates = BTreeSet::new();
        candidates.insert(word.to_string());

        for rule in self.rules {
            if let Some(stem) = word.strip_suffix(rule.suffix) {
                if stem.is_empty() {
                    continue;
                }
                candidates.insert(format!("{}{}", stem, rule.replacement));
                candidates.insert(stem.to_string());
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(word: &str) -> BTreeSet<String> {
        LemmaCandidateGenerator::default().candidates(word)
    }

    #[test]
    fn test_always_contains_word() {
        for word in ["dharma", "x", "", "gacchati", "rāmeṣu"] {
            assert!(candidates(word).contains(word), "missing {:?}", word);
        }
    }

    #[test]
    fn test_genitive_a_stem() {
        let c = candidates("dharmasya");
        assert!(c.contains("dharma"));
        assert!(c.contains("dharm"));
    }

    #[test]
    fn test_visarga_alternatives() {
        let c = candidates("manaḥ");
        assert!(c.contains("mana"));
        assert!(c.contains("manas"));
        assert!(c.contains("manar"));
    }

    #[test]
    fn test_feminine_rewrite() {
        let c = candidates("nadyāḥ");
        assert!(c.contains("nadī"));
    }

    #[test]
    fn test_verbal_strip() {
        let c = candidates("gacchanti");
        assert!(c.contains("gaccha"));
        assert!(c.contains("gacchan"));
    }

    #[test]
    fn test_no_rule_matches() {
        assert_eq!(candidates("rāja").len(), 1);
    }

    #[test]
    fn test_whole_word_suffix_does_not_yield_empty() {
        let c = candidates("ti");
        assert!(!c.contains(""));
        assert!(c.contains("ti"));
    }

    #[test]
    fn test_custom_table() {
        const RULES: &[SuffixRule] = &[rule("ing", "", InflectionClass::Verbal)];
        let generator = LemmaCandidateGenerator::new(RULES);
        let c = generator.candidates("walking");
        assert_eq!(c.len(), 2);
        assert!(c.contains("walk"));
    }
}
