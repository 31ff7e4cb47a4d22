// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Data-independent sorting and compaction.
//!
//! Both algorithms are expressed as a schedule of index pairs that depends only on the
//! number of elements. The data decides only whether each pair is swapped, and that
//! decision is applied with a conditional swap.

mod compact;
mod rotate;
mod sort;

pub use compact::{compact_generate_swaps, oblivious_compact};
pub use rotate::rotate_left;
pub use sort::{generate_swaps, oblivious_sort, oblivious_sort_by};
