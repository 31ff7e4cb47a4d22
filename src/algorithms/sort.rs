// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Batcher's odd-even mergesort, generalized to arbitrary lengths.
//!
//! The network is built recursively: sort the left `ceil(n/2)` elements, sort the right
//! `floor(n/2)` elements, then odd-even merge the whole range. For lengths that are not
//! powers of two, the merge threads a *right-heavy* flag through its recursion, recording
//! whether the right sorted run is the longer one. The flag decides where the final pass
//! of adjacent compare-exchanges starts, so that one pair always straddles the boundary
//! between the two runs.

use subtle::{Choice, ConditionallySelectable, ConstantTimeGreater};

/// Calls `swap(a, b)` for every compare-exchange of the sorting network on `n` elements,
/// in order. Always `a < b`; the sequence depends only on `n`.
pub fn generate_swaps<F: FnMut(usize, usize)>(n: usize, mut swap: F) {
    sort_indices(n, 0, 1, &mut swap);
}

/// Sorts `items` in ascending order of `ct_gt`.
pub fn oblivious_sort<T: ConditionallySelectable + ConstantTimeGreater>(items: &mut [T]) {
    oblivious_sort_by(items, |a, b| a.ct_gt(b));
}

/// Sorts `items` so that no element is `out_of_order` with an element after it.
///
/// `out_of_order(a, b)` must return whether `a` belongs after `b`, and must define a
/// total preorder. It is called once for every pair in the schedule of
/// [`generate_swaps`], whatever the data, and its result only ever feeds a
/// conditional swap.
pub fn oblivious_sort_by<T, F>(items: &mut [T], mut out_of_order: F)
where
    T: ConditionallySelectable,
    F: FnMut(&T, &T) -> Choice,
{
    generate_swaps(items.len(), |a, b| {
        let (left, right) = items.split_at_mut(b);
        let should_swap = out_of_order(&left[a], &right[0]);
        T::conditional_swap(&mut left[a], &mut right[0], should_swap);
    });
}

fn sort_indices<F: FnMut(usize, usize)>(n: usize, start: usize, skip: usize, swap: &mut F) {
    match n {
        0 | 1 => {}
        2 => swap(start, start + skip),
        _ => {
            // Sorting a run on its own never needs the right-heavy correction.
            let left_length = (n + 1) / 2;
            let right_length = n / 2;
            sort_indices(left_length, start, skip, swap);
            sort_indices(right_length, start + left_length * skip, skip, swap);
            merge_indices(n, start, skip, false, swap);
        }
    }
}

fn merge_indices<F: FnMut(usize, usize)>(
    n: usize,
    start: usize,
    skip: usize,
    right_heavy: bool,
    swap: &mut F,
) {
    match n {
        0 | 1 => {}
        2 => swap(start, start + skip),
        _ => {
            // The even subsequence is right-heavy iff it has odd length and this range is.
            let even_length = (n + 1) / 2;
            let even_right_heavy = even_length % 2 == 1 && right_heavy;
            merge_indices(even_length, start, skip * 2, even_right_heavy, swap);

            // The odd subsequence is right-heavy iff it has odd length and either this
            // range is right-heavy or has even length.
            let odd_length = n / 2;
            let odd_right_heavy = odd_length % 2 == 1 && (right_heavy || n % 2 == 0);
            merge_indices(odd_length, start + skip, skip * 2, odd_right_heavy, swap);

            // The left run is n/2 long, plus one if n is odd and the right run is not the
            // longer one. Start at 0 if that length is odd, else at 1, so that one pair
            // crosses the boundary.
            let left_run_length = n / 2 + usize::from(n % 2 == 1 && !right_heavy);
            let first = 1 - left_run_length % 2;
            for i in (first..n - 1).step_by(2) {
                swap(start + i * skip, start + (i + 1) * skip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use subtle::ConstantTimeLess;

    fn assert_sorted<T: PartialOrd + std::fmt::Debug>(items: &[T]) {
        for pair in items.windows(2) {
            assert!(pair[0] <= pair[1], "{:?}", pair);
        }
    }

    #[test]
    fn sorts_every_small_length() {
        let mut rng = StdRng::seed_from_u64(0);
        for n in 0..300 {
            let mut items: Vec<u64> = (0..n).map(|_| rng.gen_range(0..50)).collect();
            let mut expected = items.clone();
            expected.sort();

            oblivious_sort(&mut items);
            assert_eq!(items, expected, "n = {n}");
        }
    }

    #[test]
    fn sorts_non_power_of_two_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut items: Vec<u32> = (0..1000).map(|_| rng.gen()).collect();
        oblivious_sort(&mut items);
        assert_sorted(&items);
    }

    #[test]
    fn sorts_already_sorted_and_reversed_input() {
        let mut ascending: Vec<u16> = (0..129).collect();
        oblivious_sort(&mut ascending);
        assert_eq!(ascending, (0..129).collect::<Vec<u16>>());

        let mut descending: Vec<u16> = (0..129).rev().collect();
        oblivious_sort(&mut descending);
        assert_eq!(descending, (0..129).collect::<Vec<u16>>());
    }

    #[test]
    fn sort_by_custom_order() {
        let mut items: Vec<u64> = vec![5, 1, 4, 1, 5, 9, 2, 6, 5, 3];
        oblivious_sort_by(&mut items, |a, b| a.ct_lt(b));
        assert_eq!(items, vec![9, 6, 5, 5, 5, 4, 3, 2, 1, 1]);
    }

    #[test]
    fn schedule_depends_only_on_length() {
        let mut first = Vec::new();
        generate_swaps(37, |a, b| first.push((a, b)));

        // Different inputs make the same number of comparisons.
        for seed in 0..2 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut items: Vec<u64> = (0..37).map(|_| rng.gen()).collect();
            let mut calls = 0;
            oblivious_sort_by(&mut items, |a, b| {
                calls += 1;
                a.ct_gt(b)
            });
            assert_eq!(calls, first.len());
            assert_sorted(&items);
        }

        let mut second = Vec::new();
        generate_swaps(37, |a, b| second.push((a, b)));
        assert_eq!(first, second);
        assert!(first.iter().all(|(a, b)| a < b && *b < 37));
    }

    #[test]
    fn trivial_lengths() {
        let mut count = 0;
        generate_swaps(0, |_, _| count += 1);
        generate_swaps(1, |_, _| count += 1);
        assert_eq!(count, 0);

        let mut pairs = Vec::new();
        generate_swaps(2, |a, b| pairs.push((a, b)));
        assert_eq!(pairs, vec![(0, 1)]);
    }
}
