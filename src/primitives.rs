// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Branch-free conditional operations.
//!
//! Every function here touches the same memory, in the same order, whatever the value
//! of its `Choice` arguments; only the values written differ. Word-level operations
//! are built on [`subtle`]. The byte-range variants apply them byte by byte.
//!
//! Slice arguments that are paired (source and destination, the two sides of a swap)
//! must have equal lengths. A mismatch is a programming error and panics before any
//! data is touched.

use subtle::{
    Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater, ConstantTimeLess,
};

/// If `cond`, sets `*dest = *src`.
pub fn cond_set<T: ConditionallySelectable>(dest: &mut T, src: &T, cond: Choice) {
    dest.conditional_assign(src, cond);
}

/// If `cond`, swaps `*a` and `*b`.
pub fn cond_swap<T: ConditionallySelectable>(a: &mut T, b: &mut T, cond: Choice) {
    T::conditional_swap(a, b, cond);
}

/// A bidirectional conditional copy between a caller-side value and a storage slot.
///
/// If `cond` and `is_write`, copies `*read` into `*write`.
/// If `cond` and not `is_write`, copies `*write` into `*read`.
/// Otherwise neither changes. Both directions are always computed and masked.
pub fn cond_access<T: ConditionallySelectable>(
    read: &mut T,
    write: &mut T,
    is_write: Choice,
    cond: Choice,
) {
    let read_value = *read;
    let write_value = *write;
    write.conditional_assign(&read_value, cond & is_write);
    read.conditional_assign(&write_value, cond & !is_write);
}

/// If `cond`, copies `src` into `dest`.
pub fn mem_set(dest: &mut [u8], src: &[u8], cond: Choice) {
    assert_eq!(dest.len(), src.len());
    for (d, s) in dest.iter_mut().zip(src) {
        d.conditional_assign(s, cond);
    }
}

/// If `cond`, sets every byte of `dest` to `value`.
pub fn mem_fill(dest: &mut [u8], value: u8, cond: Choice) {
    for d in dest.iter_mut() {
        d.conditional_assign(&value, cond);
    }
}

/// If `cond`, swaps the contents of `a` and `b`.
pub fn mem_swap(a: &mut [u8], b: &mut [u8], cond: Choice) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b.iter_mut()) {
        u8::conditional_swap(x, y, cond);
    }
}

/// The byte-range form of [`cond_access`].
pub fn mem_access(read: &mut [u8], write: &mut [u8], is_write: Choice, cond: Choice) {
    assert_eq!(read.len(), write.len());
    for (r, w) in read.iter_mut().zip(write.iter_mut()) {
        cond_access(r, w, is_write, cond);
    }
}

/// If `cond`, accesses `array[index]` with `elem`: a write from `elem` into the slot if
/// `is_write`, otherwise a read from the slot into `elem`.
///
/// Every slot is visited, so `index` is not revealed. An out-of-range `index` is a no-op.
pub fn oblivious_select<T: ConditionallySelectable>(
    elem: &mut T,
    array: &mut [T],
    index: usize,
    is_write: Choice,
    cond: Choice,
) {
    for (i, slot) in array.iter_mut().enumerate() {
        cond_access(elem, slot, is_write, i.ct_eq(&index) & cond);
    }
}

/// [`oblivious_select`] over a byte array divided into `elem.len()`-byte slots.
pub fn oblivious_select_bytes(
    elem: &mut [u8],
    array: &mut [u8],
    index: usize,
    is_write: Choice,
    cond: Choice,
) {
    assert!(!elem.is_empty());
    assert_eq!(array.len() % elem.len(), 0);

    for (i, slot) in array.chunks_exact_mut(elem.len()).enumerate() {
        mem_access(elem, slot, is_write, i.ct_eq(&index) & cond);
    }
}

/// If `cond`, accesses `slice_length` bytes of `array` starting at `array_start` with
/// the same number of bytes of `data` starting at `data_start`: a write from `data`
/// into `array` if `is_write`, otherwise a read from `array` into `data`.
///
/// Both start offsets and the length are kept oblivious: every byte of `data` is
/// matched against every byte of `array`. Bytes of the range that fall outside either
/// buffer are skipped.
pub fn oblivious_slice(
    data: &mut [u8],
    array: &mut [u8],
    data_start: usize,
    array_start: usize,
    slice_length: usize,
    is_write: Choice,
    cond: Choice,
) {
    let start = data_start as u64;
    let end = data_start.wrapping_add(slice_length) as u64;

    for (i, byte) in data.iter_mut().enumerate() {
        let position = i as u64;
        let in_range = !position.ct_lt(&start) & position.ct_lt(&end);
        let array_index = i.wrapping_sub(data_start).wrapping_add(array_start);
        oblivious_select(byte, array, array_index, is_write, in_range & cond);
    }
}

/// Returns the smaller of `a` and `b` without branching on their values.
///
/// `subtle` orders unsigned words only. Signed words use [`ct_min_i32`] or [`ct_min_i64`].
pub fn ct_min<T: ConditionallySelectable + ConstantTimeLess>(a: T, b: T) -> T {
    let mut result = a;
    result.conditional_assign(&b, b.ct_lt(&a));
    result
}

/// Returns the larger of `a` and `b` without branching on their values.
///
/// `subtle` orders unsigned words only. Signed words use [`ct_max_i32`] or [`ct_max_i64`].
pub fn ct_max<T: ConditionallySelectable + ConstantTimeGreater>(a: T, b: T) -> T {
    let mut result = a;
    result.conditional_assign(&b, b.ct_gt(&a));
    result
}

// Flipping the sign bit maps signed order onto unsigned order, so the unsigned
// constant-time comparisons decide between signed words.
macro_rules! signed_min_max {
    ($min:ident, $max:ident, $signed:ty, $unsigned:ty) => {
        #[doc = concat!(
            "Returns the smaller of two `", stringify!($signed), "`s without branching on their values."
        )]
        pub fn $min(a: $signed, b: $signed) -> $signed {
            let sign_bit: $unsigned = 1 << (<$unsigned>::BITS - 1);
            let b_is_less = (b as $unsigned ^ sign_bit).ct_lt(&(a as $unsigned ^ sign_bit));
            let mut result = a;
            result.conditional_assign(&b, b_is_less);
            result
        }

        #[doc = concat!(
            "Returns the larger of two `", stringify!($signed), "`s without branching on their values."
        )]
        pub fn $max(a: $signed, b: $signed) -> $signed {
            let sign_bit: $unsigned = 1 << (<$unsigned>::BITS - 1);
            let b_is_greater = (b as $unsigned ^ sign_bit).ct_gt(&(a as $unsigned ^ sign_bit));
            let mut result = a;
            result.conditional_assign(&b, b_is_greater);
            result
        }
    };
}

signed_min_max!(ct_min_i32, ct_max_i32, i32, u32);
signed_min_max!(ct_min_i64, ct_max_i64, i64, u64);
