//! Memoized set partitions of derivative positions.
//!
//! `generate_list(p, k)` lists every way of splitting the positions
//! `0..p` of a degree-`p` multipointer into `k` nonempty blocks. Series
//! composition pairs each block with one component of the inner series.

use crate::error::{JetError, Result};
use crate::multipointer::Multipointer;
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

/// One partition: `k` blocks of positions, each block sorted.
pub type Partition = Vec<Multipointer>;

/// Shared, immutable list of partitions for one `(p, k)`.
pub type PartitionList = Arc<Vec<Partition>>;

/// Partition lists for every `1 <= k <= p <= known_level`, grown on demand.
#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    /// `levels[p - 1][k - 1]`.
    levels: Vec<Vec<PartitionList>>,
}

impl PartitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_level(&self) -> usize {
        self.levels.len()
    }

    pub fn cached(&self, p: usize, k: usize) -> Option<Result<PartitionList>> {
        if let Err(err) = check_arguments(p, k) {
            return Some(Err(err));
        }
        self.levels
            .get(p - 1)
            .map(|level| Ok(Arc::clone(&level[k - 1])))
    }

    pub fn generate_list(&mut self, p: usize, k: usize) -> Result<PartitionList> {
        check_arguments(p, k)?;
        self.extend_to(p);
        Ok(Arc::clone(&self.levels[p - 1][k - 1]))
    }

    fn extend_to(&mut self, p: usize) {
        if self.levels.len() >= p {
            return;
        }
        log::debug!(
            "extending partition lists from level {} to {}",
            self.levels.len(),
            p
        );
        if self.levels.is_empty() {
            let single = vec![Multipointer::first(1)];
            self.levels.push(vec![Arc::new(vec![single])]);
        }
        while self.levels.len() < p {
            let next = self.next_level();
            self.levels.push(next);
        }
    }

    /// Builds level `m + 1` from level `m`: the new position `m` either opens
    /// its own block or joins one block of an existing partition.
    fn next_level(&self) -> Vec<PartitionList> {
        let m = self.levels.len();
        let p = m + 1;
        let previous = &self.levels[m - 1];
        let mut level = Vec::with_capacity(p);

        let whole = Multipointer::from_unsorted((0..p).collect());
        level.push(Arc::new(vec![vec![whole]]));

        for k in 2..=m {
            let mut list = Vec::new();
            for partition in previous[k - 2].iter() {
                let mut extended = partition.clone();
                extended.push(Multipointer::from_unsorted(vec![m]));
                list.push(extended);
            }
            for partition in previous[k - 1].iter() {
                for block in 0..partition.len() {
                    let mut merged = partition.clone();
                    merged[block] = merged[block].with_index(m);
                    list.push(merged);
                }
            }
            level.push(Arc::new(list));
        }

        let singletons = (0..p).map(|i| Multipointer::from_unsorted(vec![i])).collect();
        level.push(Arc::new(vec![singletons]));
        level
    }
}

fn check_arguments(p: usize, k: usize) -> Result<()> {
    if k == 0 || k > p {
        return Err(JetError::InvalidArgument(format!(
            "partition list requires 1 <= k <= p, got p = {p}, k = {k}"
        )));
    }
    Ok(())
}

static SHARED: Lazy<RwLock<PartitionTable>> = Lazy::new(|| RwLock::new(PartitionTable::new()));

/// Partitions of `0..p` into `k` blocks from the process-wide table.
pub fn generate_list(p: usize, k: usize) -> Result<PartitionList> {
    {
        let table = SHARED.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = table.cached(p, k) {
            return list;
        }
    }
    SHARED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .generate_list(p, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn stirling2(n: usize, k: usize) -> usize {
        match (n, k) {
            (0, 0) => 1,
            (_, 0) | (0, _) => 0,
            _ => k * stirling2(n - 1, k) + stirling2(n - 1, k - 1),
        }
    }

    #[test]
    fn partition_counts_are_stirling_numbers() {
        let mut table = PartitionTable::new();
        for p in 1..=6 {
            for k in 1..=p {
                let list = table.generate_list(p, k).expect("valid arguments");
                assert_eq!(list.len(), stirling2(p, k), "p = {p}, k = {k}");
            }
        }
    }

    #[test]
    fn every_partition_covers_each_position_once() {
        let list = generate_list(5, 3).expect("valid arguments");
        let mut distinct = HashSet::new();
        for partition in list.iter() {
            assert_eq!(partition.len(), 3);
            let mut positions: Vec<usize> = partition
                .iter()
                .flat_map(|block| block.iter().copied())
                .collect();
            assert!(partition.iter().all(|block| !block.is_empty()));
            positions.sort_unstable();
            assert_eq!(positions, vec![0, 1, 2, 3, 4]);
            let mut canonical = partition.clone();
            canonical.sort();
            assert!(distinct.insert(canonical));
        }
    }

    #[test]
    fn level_three_two_blocks() {
        let list = generate_list(3, 2).expect("valid arguments");
        let rendered: Vec<String> = list
            .iter()
            .map(|partition| {
                partition
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        assert_eq!(rendered, vec!["{0,1} {2}", "{0,2} {1}", "{0} {1,2}"]);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(matches!(generate_list(2, 3), Err(JetError::InvalidArgument(_))));
        assert!(matches!(generate_list(2, 0), Err(JetError::InvalidArgument(_))));
        assert!(matches!(generate_list(0, 0), Err(JetError::InvalidArgument(_))));
    }

    #[test]
    fn repeated_lookups_share_the_same_list() {
        let mut table = PartitionTable::new();
        let first = table.generate_list(4, 2).expect("valid arguments");
        table.generate_list(6, 1).expect("valid arguments");
        let second = table.generate_list(4, 2).expect("valid arguments");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.known_level(), 6);
    }
}
