// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Oblivious compaction.
//!
//! The network moves marked elements to the front in their original order. A range whose
//! length is not a power of two is split into a left part of `n - n1` elements and a
//! right part of `n1` elements, `n1` being the largest power of two at most `n`. The left
//! part is compacted recursively, the right part is compacted *with an offset* so that
//! its marked elements land where the left part's marked elements end (modulo `n1`), and
//! one pass of conditional swaps across the split merges the two.
//!
//! Compaction with an offset `z` on a power-of-two range places the `i`-th marked element
//! at `(z + i) mod n`. It halves the range, offsets each half so that together they form
//! the target layout up to a swap of each slot with its partner in the other half, then
//! performs those swaps.
//!
//! Unmarked elements end up in an unspecified order. [`oblivious_compact`] builds a fully
//! stable partition from two runs of the network.

use crate::algorithms::rotate_left;
use crate::primitives::cond_swap;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};

/// Calls `swap(a, b, should_swap)` for every conditional exchange of the compaction
/// network on `n` elements. After applying the swaps, the elements for which
/// `is_marked` held come first, in their original relative order.
///
/// `is_marked` is called exactly once per index, in order, before any swap. The index
/// pairs depend only on `n`, with `a < b`.
pub fn compact_generate_swaps<M, F>(n: usize, mut is_marked: M, mut swap: F)
where
    M: FnMut(usize) -> Choice,
    F: FnMut(usize, usize, Choice),
{
    // prefix[i] is the number of marked elements among the first i.
    let mut prefix = Vec::with_capacity(n + 1);
    let mut count = 0u64;
    prefix.push(count);
    for i in 0..n {
        count += u64::from(is_marked(i).unwrap_u8());
        prefix.push(count);
    }

    compact(0, n, &prefix, &mut swap);
}

/// Stably partitions `items` so that the elements for which `is_marked` holds come
/// first, and returns how many there are. Both groups keep their relative order.
pub fn oblivious_compact<T, F>(items: &mut [T], mut is_marked: F) -> usize
where
    T: ConditionallySelectable,
    F: FnMut(&T) -> Choice,
{
    let n = items.len();
    let marks: Vec<Choice> = items.iter().map(&mut is_marked).collect();
    let marked_count: usize = marks.iter().map(|mark| usize::from(mark.unwrap_u8())).sum();

    let mut marked_first = items.to_vec();
    compact_in_place(&mut marked_first, |i| marks[i]);

    // The unmarked elements form a stable prefix here; rotating them to the back puts
    // them in their final slots.
    let mut unmarked_first = items.to_vec();
    compact_in_place(&mut unmarked_first, |i| !marks[i]);
    rotate_left(&mut unmarked_first, n - marked_count);

    let boundary = marked_count as u64;
    for (i, item) in items.iter_mut().enumerate() {
        let in_marked_group = (i as u64).ct_lt(&boundary);
        *item = T::conditional_select(&unmarked_first[i], &marked_first[i], in_marked_group);
    }

    marked_count
}

fn compact_in_place<T, M>(items: &mut [T], is_marked: M)
where
    T: ConditionallySelectable,
    M: FnMut(usize) -> Choice,
{
    compact_generate_swaps(items.len(), is_marked, |a, b, should_swap| {
        let (left, right) = items.split_at_mut(b);
        cond_swap(&mut left[a], &mut right[0], should_swap);
    });
}

fn compact<F: FnMut(usize, usize, Choice)>(start: usize, n: usize, prefix: &[u64], swap: &mut F) {
    if n <= 1 {
        return;
    }

    let right_length = 1usize << (usize::BITS - 1 - n.leading_zeros());
    let left_length = n - right_length;
    if left_length == 0 {
        compact_offset(start, n, prefix, 0, swap);
        return;
    }

    let left_marked = prefix[start + left_length] - prefix[start];
    let right_mask = right_length as u64 - 1;
    let right_offset = (right_length as u64 - left_length as u64 + left_marked) & right_mask;

    compact(start, left_length, prefix, swap);
    compact_offset(start + left_length, right_length, prefix, right_offset, swap);

    for i in 0..left_length {
        let past_marked = !(i as u64).ct_lt(&left_marked);
        swap(start + i, start + i + right_length, past_marked);
    }
}

fn compact_offset<F: FnMut(usize, usize, Choice)>(
    start: usize,
    n: usize,
    prefix: &[u64],
    offset: u64,
    swap: &mut F,
) {
    debug_assert!(n.is_power_of_two());
    match n {
        1 => {}
        2 => {
            let left_marked = Choice::from((prefix[start + 1] - prefix[start]) as u8);
            let right_marked = Choice::from((prefix[start + 2] - prefix[start + 1]) as u8);
            let should_swap = (!left_marked & right_marked) ^ offset.ct_eq(&1);
            swap(start, start + 1, should_swap);
        }
        _ => {
            let half = n / 2;
            let half_length = half as u64;
            let mask = half_length - 1;
            let left_marked = prefix[start + half] - prefix[start];
            let left_offset = offset & mask;
            let right_offset = (offset + left_marked) & mask;

            compact_offset(start, half, prefix, left_offset, swap);
            compact_offset(start + half, half, prefix, right_offset, swap);

            let wraps = !(left_offset + left_marked).ct_lt(&half_length)
                ^ !offset.ct_lt(&half_length);
            for i in 0..half {
                let past_offset = !(i as u64).ct_lt(&right_offset);
                swap(start + i, start + i + half, wraps ^ past_offset);
            }
        }
    }
}
