// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Oblivious rotation.

use crate::primitives::cond_swap;
use subtle::{Choice, ConditionallySelectable};

/// Rotates `items` left by `k` positions, where `k` is in `0..=items.len()`.
///
/// For every power of two `s < items.len()`, the rotation by `s` is performed as three
/// conditional reversals that take effect iff bit `s` of `k` is set, so the access
/// pattern depends only on `items.len()`.
pub fn rotate_left<T: ConditionallySelectable>(items: &mut [T], k: usize) {
    let n = items.len();
    debug_assert!(k <= n);

    let mut bit = 0;
    while bit < usize::BITS && (1usize << bit) < n {
        let shift = 1usize << bit;
        let enable = Choice::from(((k >> bit) & 1) as u8);
        reverse(&mut items[..shift], enable);
        reverse(&mut items[shift..], enable);
        reverse(items, enable);
        bit += 1;
    }
}

fn reverse<T: ConditionallySelectable>(items: &mut [T], enable: Choice) {
    let n = items.len();
    let (left, right) = items.split_at_mut(n / 2);
    for (a, b) in left.iter_mut().zip(right.iter_mut().rev()) {
        cond_swap(a, b, enable);
    }
}
