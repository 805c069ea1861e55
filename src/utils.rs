//! # Library-Internal Utilities

use std::collections::BTreeMap;

use cpu_time::ProcessTime;

use crate::types::Var;

/// Flips a var-to-size map into `(size, var)` pairs ordered by size
/// descending. Entries with equal sizes keep the iteration order of the input
/// map, so the result is deterministic.
pub(crate) fn flip_map(var_sizes: &BTreeMap<Var, usize>) -> Vec<(usize, Var)> {
    let mut flipped: Vec<(usize, Var)> = var_sizes.iter().map(|(v, s)| (*s, *v)).collect();
    // stable sort keeps input order within a size group
    flipped.sort_by(|(s1, _), (s2, _)| s2.cmp(s1));
    flipped
}

/// Seconds of process CPU time elapsed since `start`
pub(crate) fn duration_secs(start: ProcessTime) -> f64 {
    start.elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::var;

    #[test]
    fn flip_map_orders_by_size_desc() {
        let mut sizes = BTreeMap::new();
        sizes.insert(var![0], 2);
        sizes.insert(var![1], 5);
        sizes.insert(var![2], 2);
        sizes.insert(var![3], 7);
        let flipped = super::flip_map(&sizes);
        assert_eq!(
            flipped,
            vec![(7, var![3]), (5, var![1]), (2, var![0]), (2, var![2])]
        );
    }

    #[test]
    fn duration_is_non_negative() {
        let start = cpu_time::ProcessTime::now();
        assert!(super::duration_secs(start) >= 0.);
    }
}
