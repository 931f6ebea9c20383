//! Reproducible corpus partitioning for evaluation
//!
//! A plan fixes which items may be tested and which may serve as retrieval
//! examples. With a split, the ordered corpus is cut at `N / 2`: the first
//! half is the test universe, the second half the search universe, and the
//! search half's id bounds become the retrieval allowed range. Comparing
//! configurations on the same split (and seed) is what makes ablations fair.

use crate::retrieval::format_pair;
use crate::store::CorpusItem;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Inclusive id bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub min: i64,
    pub max: i64,
}

impl IdRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.min <= id && id <= self.max
    }
}

/// How the corpus is divided between testing and retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoolStrategy {
    /// Every item is both testable and searchable (leave-one-out retrieval)
    #[default]
    Global,
    /// Test the first half, search the second
    SequentialHalves,
}

/// Which test items to draw from the test universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    All,
    FirstN(usize),
    Random { n: usize, seed: u64 },
}

impl Selection {
    /// Label used in reports: the seed for random draws, "FirstN" or "All"
    pub fn label(&self) -> String {
        match self {
            Selection::All => "All".to_string(),
            Selection::FirstN(_) => "FirstN".to_string(),
            Selection::Random { seed, .. } => seed.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Ids eligible for testing, in corpus order
    pub test_pool: Vec<i64>,
    /// Ids eligible as retrieval examples, in corpus order
    pub search_pool: Vec<i64>,
    /// Retrieval may only return ids inside this range
    pub allowed_range: IdRange,
    /// Whether the corpus was actually cut in halves
    pub split: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionPlanner {
    pub strategy: PoolStrategy,
    /// Force the half split even when retrieval is not used
    pub restrict_pool_to_half: bool,
}

impl PartitionPlanner {
    /// Create a planner
    ///
    /// # Arguments
    ///
    /// * `strategy` - Global leave-one-out or sequential halves
    /// * `restrict_pool_to_half` - Cut the corpus in halves even under
    ///   [`PoolStrategy::Global`], so runs without retrieval test the same
    ///   items as runs with it
    pub fn new(strategy: PoolStrategy, restrict_pool_to_half: bool) -> Self {
        Self {
            strategy,
            restrict_pool_to_half,
        }
    }

    fn should_split(&self) -> bool {
        self.restrict_pool_to_half || self.strategy == PoolStrategy::SequentialHalves
    }

    /// Plan over items already ordered by id
    ///
    /// With a split, the first `len / 2` items form the test pool and the rest
    /// the search pool, and `allowed_range` spans the search pool's ids.
    /// Without one, both pools hold every item and the range is unbounded.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let plan = PartitionPlanner::new(PoolStrategy::SequentialHalves, false).plan(&items);
    /// assert!(plan.test_pool.iter().all(|id| !plan.search_pool.contains(id)));
    /// ```
    pub fn plan(&self, items: &[CorpusItem]) -> PartitionPlan {
        let ids: Vec<i64> = items.iter().map(|item| item.item_id).collect();

        if !self.should_split() {
            return PartitionPlan {
                test_pool: ids.clone(),
                search_pool: ids,
                allowed_range: IdRange::unbounded(),
                split: false,
            };
        }

        let mid = ids.len() / 2;
        let (test, search) = ids.split_at(mid);
        let allowed_range = match (search.first(), search.last()) {
            (Some(&min), Some(&max)) => IdRange::new(min, max),
            _ => IdRange::unbounded(),
        };
        debug!(
            "Split {} items: test {} / search {} (allowed ids {:?})",
            ids.len(),
            test.len(),
            search.len(),
            allowed_range
        );

        PartitionPlan {
            test_pool: test.to_vec(),
            search_pool: search.to_vec(),
            allowed_range,
            split: true,
        }
    }
}

/// Deterministic sample of `n` elements; same seed, same universe, same result
pub fn seeded_sample<T: Clone>(universe: &[T], n: usize, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, universe.len(), n)
        .into_iter()
        .map(|i| universe[i].clone())
        .collect()
}

impl PartitionPlan {
    /// Apply a selection to the test pool. A pool no larger than the
    /// requested count is used whole.
    pub fn select_tests(&self, selection: Selection) -> Vec<i64> {
        match selection {
            Selection::All => self.test_pool.clone(),
            Selection::FirstN(n) | Selection::Random { n, .. } if self.test_pool.len() <= n => {
                warn!(
                    "Test universe ({}) not larger than requested sample ({}); using all",
                    self.test_pool.len(),
                    n
                );
                self.test_pool.clone()
            }
            Selection::FirstN(n) => self.test_pool[..n].to_vec(),
            Selection::Random { n, seed } => seeded_sample(&self.test_pool, n, seed),
        }
    }

    /// One fixed set of example pairs for a whole run, drawn from the search
    /// pool minus the selected test items. `None` if too few candidates.
    pub fn static_few_shot(
        &self,
        items: &[CorpusItem],
        tests: &[i64],
        n: usize,
        seed: u64,
    ) -> Option<String> {
        let tested: HashSet<i64> = tests.iter().copied().collect();
        let searchable: HashSet<i64> = self.search_pool.iter().copied().collect();
        let candidates: Vec<&CorpusItem> = items
            .iter()
            .filter(|item| searchable.contains(&item.item_id) && !tested.contains(&item.item_id))
            .collect();

        if n == 0 || candidates.len() < n {
            warn!(
                "Not enough static examples: {} candidates for {} requested",
                candidates.len(),
                n
            );
            return None;
        }

        let chosen = seeded_sample(&candidates, n, seed);
        Some(
            chosen
                .iter()
                .map(|item| format_pair(&item.source_text, &item.target_text))
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: i64) -> Vec<CorpusItem> {
        (1..=n)
            .map(|id| CorpusItem {
                dataset_name: "mkb".to_string(),
                item_id: id,
                source_text: format!("source {}", id),
                target_text: format!("target {}", id),
            })
            .collect()
    }

    #[test]
    fn test_restrict_to_half_on_ten_items() {
        let planner = PartitionPlanner::new(PoolStrategy::Global, true);
        let plan = planner.plan(&items(10));

        assert_eq!(plan.test_pool, vec![1, 2, 3, 4, 5]);
        assert_eq!(plan.search_pool, vec![6, 7, 8, 9, 10]);
        assert_eq!(plan.allowed_range, IdRange::new(6, 10));
        assert!(plan.split);
    }

    #[test]
    fn test_split_pools_disjoint_and_covering() {
        for n in [0, 1, 2, 7, 11] {
            let corpus = items(n);
            let plan = PartitionPlanner::new(PoolStrategy::SequentialHalves, false).plan(&corpus);

            let test: HashSet<i64> = plan.test_pool.iter().copied().collect();
            let search: HashSet<i64> = plan.search_pool.iter().copied().collect();
            assert!(test.is_disjoint(&search));
            let union: HashSet<i64> = test.union(&search).copied().collect();
            let all: HashSet<i64> = corpus.iter().map(|i| i.item_id).collect();
            assert_eq!(union, all);
        }
    }

    #[test]
    fn test_global_pool_uses_everything() {
        let plan = PartitionPlanner::default().plan(&items(4));
        assert_eq!(plan.test_pool, vec![1, 2, 3, 4]);
        assert_eq!(plan.search_pool, vec![1, 2, 3, 4]);
        assert_eq!(plan.allowed_range, IdRange::unbounded());
        assert!(!plan.split);
    }

    #[test]
    fn test_first_n_selection() {
        let plan = PartitionPlanner::default().plan(&items(10));
        assert_eq!(plan.select_tests(Selection::FirstN(3)), vec![1, 2, 3]);
        assert_eq!(plan.select_tests(Selection::FirstN(50)).len(), 10);
        assert_eq!(plan.select_tests(Selection::All).len(), 10);
    }

    #[test]
    fn test_random_selection_reproducible() {
        let plan = PartitionPlanner::default().plan(&items(100));
        let first = plan.select_tests(Selection::Random { n: 10, seed: 42 });
        let second = plan.select_tests(Selection::Random { n: 10, seed: 42 });
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
        let distinct: HashSet<i64> = first.iter().copied().collect();
        assert_eq!(distinct.len(), 10);
        assert!(first.iter().all(|id| plan.test_pool.contains(id)));

        let other = plan.select_tests(Selection::Random { n: 10, seed: 43 });
        assert_ne!(first, other);
    }

    #[test]
    fn test_static_few_shot_excludes_tests() {
        let corpus = items(10);
        let plan = PartitionPlanner::default().plan(&corpus);
        let tests = plan.select_tests(Selection::FirstN(8));

        let block = plan.static_few_shot(&corpus, &tests, 2, 7).unwrap();
        assert!(block.contains("Source: source 9"));
        assert!(block.contains("Source: source 10"));
        assert_eq!(plan.static_few_shot(&corpus, &tests, 2, 7).unwrap(), block);

        assert!(plan.static_few_shot(&corpus, &tests, 3, 7).is_none());
    }

    #[test]
    fn test_static_few_shot_only_from_search_half() {
        let corpus = items(10);
        let plan = PartitionPlanner::new(PoolStrategy::SequentialHalves, false).plan(&corpus);
        let tests = plan.select_tests(Selection::FirstN(2));
        let block = plan.static_few_shot(&corpus, &tests, 5, 1).unwrap();
        for id in 1..=5 {
            assert!(!block.contains(&format!("Source: source {}\n", id)));
        }
    }

    #[test]
    fn test_selection_labels() {
        assert_eq!(Selection::Random { n: 3, seed: 42 }.label(), "42");
        assert_eq!(Selection::FirstN(3).label(), "FirstN");
    }
}
