// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An implementation of Path ORAM with an obliviously sorted stash.

use crate::{BucketSize, OramError, StashSize};

/// The 1-based index of a node of the Path ORAM tree.
pub type TreeIndex = u64;
/// The depth of a node of the Path ORAM tree; the root has depth 0.
pub type TreeHeight = u32;

/// The parameter "Z" from the Path ORAM literature that sets the number of blocks per bucket; typical values are 3 or 4.
/// Here we adopt the more conservative setting of 4.
pub const DEFAULT_BLOCKS_PER_BUCKET: BucketSize = 4;

/// The amount of stash space, beyond what one access needs as scratch, reserved for blocks
/// that could not be evicted. With `Z = 4`, the Path ORAM paper's experiments put the
/// probability of exceeding 40 such blocks below 2^-50.
pub const DEFAULT_STASH_OVERFLOW_SIZE: StashSize = 40;

const MAXIMUM_TREE_DEPTH: TreeHeight = 63;

/// The smallest stash that can hold one path, one insertion slot and one path's worth of
/// padding, for a tree of `depth` levels of `blocks_per_bucket`-block buckets.
///
/// Returns `InvalidConfigurationError` if that size does not fit in a `StashSize`.
pub fn minimum_stash_size(
    depth: TreeHeight,
    blocks_per_bucket: BucketSize,
) -> Result<StashSize, OramError> {
    usize::try_from(depth)?
        .checked_mul(blocks_per_bucket)
        .and_then(|path_size| path_size.checked_mul(2))
        .and_then(|padded_size| padded_size.checked_add(1))
        .ok_or(OramError::InvalidConfigurationError)
}

/// [`minimum_stash_size`] plus room for `overflow_size` blocks that stay in the stash
/// between accesses.
pub fn recommended_stash_size(
    depth: TreeHeight,
    blocks_per_bucket: BucketSize,
    overflow_size: StashSize,
) -> Result<StashSize, OramError> {
    minimum_stash_size(depth, blocks_per_bucket)?
        .checked_add(overflow_size)
        .ok_or(OramError::InvalidConfigurationError)
}

mod block;
mod generic_path_oram;
mod stash;
mod tree_index;

pub use block::BlockHeader;
pub use generic_path_oram::{AccessOutcome, PathOram};
