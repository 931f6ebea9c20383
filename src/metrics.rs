//! chrF++ scoring
//!
//! Character n-grams of order 1..=6 (whitespace removed) plus word n-grams of
//! order 1..=2, each scored with an F-beta (beta = 2) and averaged over the
//! orders both sides actually have. Corpus scores pool the n-gram statistics
//! of every sentence before scoring, so they are not a mean of sentence scores.

use std::collections::HashMap;

pub const CHAR_ORDER: usize = 6;
pub const WORD_ORDER: usize = 2;
pub const BETA: f64 = 2.0;

const ORDERS: usize = CHAR_ORDER + WORD_ORDER;

/// Matched / hypothesis / reference n-gram totals for one order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OrderStats {
    hyp: usize,
    reference: usize,
    matched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChrfStats {
    orders: [OrderStats; ORDERS],
}

impl ChrfStats {
    pub fn new(hypothesis: &str, reference: &str) -> Self {
        let mut stats = Self::default();

        let hyp_chars: Vec<char> = hypothesis.chars().filter(|c| !c.is_whitespace()).collect();
        let ref_chars: Vec<char> = reference.chars().filter(|c| !c.is_whitespace()).collect();
        for n in 1..=CHAR_ORDER {
            stats.orders[n - 1] = order_stats(&hyp_chars, &ref_chars, n);
        }

        let hyp_words = words(hypothesis);
        let ref_words = words(reference);
        for n in 1..=WORD_ORDER {
            stats.orders[CHAR_ORDER + n - 1] = order_stats(&hyp_words, &ref_words, n);
        }

        stats
    }

    pub fn add(&mut self, other: &ChrfStats) {
        for (mine, theirs) in self.orders.iter_mut().zip(other.orders.iter()) {
            mine.hyp += theirs.hyp;
            mine.reference += theirs.reference;
            mine.matched += theirs.matched;
        }
    }

    /// Score in 0..=100
    pub fn score(&self) -> f64 {
        let factor = BETA * BETA;
        let mut total = 0.0;
        let mut effective = 0usize;

        for order in self.orders.iter().filter(|o| o.hyp > 0 && o.reference > 0) {
            effective += 1;
            let precision = order.matched as f64 / order.hyp as f64;
            let recall = order.matched as f64 / order.reference as f64;
            let denom = factor * precision + recall;
            if denom > 0.0 {
                total += (1.0 + factor) * precision * recall / denom;
            }
        }

        if effective == 0 {
            return 0.0;
        }
        100.0 * total / effective as f64
    }
}

/// Words with leading and trailing punctuation split off as their own tokens
fn words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split_whitespace() {
        let core = word.trim_matches(|c: char| c.is_ascii_punctuation());
        let start = word.find(core).unwrap_or(0);
        let (lead, rest) = word.split_at(start);
        let (core, trail) = rest.split_at(core.len());

        out.extend(lead.chars().map(String::from));
        if !core.is_empty() {
            out.push(core.to_string());
        }
        out.extend(trail.chars().map(String::from));
    }
    out
}

fn order_stats<T: Eq + std::hash::Hash + Clone>(hyp: &[T], reference: &[T], n: usize) -> OrderStats {
    let hyp_counts = ngram_counts(hyp, n);
    let ref_counts = ngram_counts(reference, n);
    let matched = hyp_counts
        .iter()
        .map(|(gram, count)| (*count).min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    OrderStats {
        hyp: hyp_counts.values().sum(),
        reference: ref_counts.values().sum(),
        matched,
    }
}

fn ngram_counts<T: Eq + std::hash::Hash + Clone>(items: &[T], n: usize) -> HashMap<Vec<T>, usize> {
    let mut counts = HashMap::new();
    if n == 0 || items.len() < n {
        return counts;
    }
    for window in items.windows(n) {
        *counts.entry(window.to_vec()).or_insert(0) += 1;
    }
    counts
}

pub fn sentence_chrf(hypothesis: &str, reference: &str) -> f64 {
    ChrfStats::new(hypothesis, reference).score()
}

/// Pooled chrF++ over aligned (hypothesis, reference) pairs
pub fn corpus_chrf<H: AsRef<str>, R: AsRef<str>>(pairs: &[(H, R)]) -> f64 {
    let mut total = ChrfStats::default();
    for (hyp, reference) in pairs {
        total.add(&ChrfStats::new(hyp.as_ref(), reference.as_ref()));
    }
    total.score()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_perfect() {
        let score = sentence_chrf("The king protects the law.", "The king protects the law.");
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_is_zero() {
        assert_eq!(sentence_chrf("xyz", "abc"), 0.0);
        assert_eq!(sentence_chrf("", "abc"), 0.0);
    }

    #[test]
    fn test_partial_overlap_is_between() {
        let close = sentence_chrf("The king protects the law", "The king guards the law");
        let far = sentence_chrf("A bird sings", "The king guards the law");
        assert!(close > far);
        assert!(close > 0.0 && close < 100.0);
    }

    #[test]
    fn test_recall_weighted_more_than_precision() {
        let reference = "the king rules the land";
        let short = sentence_chrf("the king", reference);
        let long = sentence_chrf("the king rules the land and more words here", reference);
        assert!(long > short);
    }

    #[test]
    fn test_punctuation_split_from_words() {
        assert_eq!(words("law. (dharma)"), vec!["law", ".", "(", "dharma", ")"]);
    }

    #[test]
    fn test_corpus_pools_statistics() {
        let pairs = [("the king", "the king"), ("a", "a bird sings in the tree")];
        let corpus = corpus_chrf(&pairs);
        let mean = (sentence_chrf(pairs[0].0, pairs[0].1) + sentence_chrf(pairs[1].0, pairs[1].1)) / 2.0;
        assert!(corpus > 0.0 && corpus < 100.0);
        assert!((corpus - mean).abs() > 1e-6);
        assert_eq!(corpus_chrf::<&str, &str>(&[]), 0.0);
    }
}
