// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Contains an implementation of Path ORAM that is generic over its physical memory.

use super::{
    minimum_stash_size, recommended_stash_size, stash::ObliviousStash,
    tree_index::CompleteBinaryTreeIndex, TreeHeight, TreeIndex, DEFAULT_BLOCKS_PER_BUCKET,
    DEFAULT_STASH_OVERFLOW_SIZE, MAXIMUM_TREE_DEPTH,
};
use crate::{
    database::{Database, SimpleDatabase},
    BlockId, BlockSize, BucketSize, LeafId, OramError, StashSize,
};
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable};

/// The result of a successful access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessOutcome {
    /// Whether the block was found, or was created by this write. Always `false` for a dummy
    /// access.
    pub found: bool,
    /// The leaf the block is now mapped to, to be passed to the next access of the block.
    /// A dummy access returns the leaf it was given.
    pub new_leaf: LeafId,
}

/// A Path ORAM storing blocks of a fixed, runtime-chosen size under caller-chosen ids.
///
/// The ORAM does not keep a position map: the caller tracks each block's leaf, passing in
/// the `new_leaf` returned by the block's previous access.
#[derive(Debug)]
pub struct PathOram<D: Database = SimpleDatabase> {
    physical_memory: D,
    stash: ObliviousStash,
    block_size: BlockSize,
    blocks_per_bucket: BucketSize,
    // The depth of the leaves; the tree has `height + 1` levels.
    height: TreeHeight,
}

impl<D: Database> PathOram<D> {
    /// Returns a new `PathOram` able to hold `num_blocks` blocks of `block_size` bytes,
    /// with the default bucket and stash sizes.
    pub fn new(block_size: BlockSize, num_blocks: u64) -> Result<Self, OramError> {
        let depth = tree_depth(num_blocks, DEFAULT_BLOCKS_PER_BUCKET)?;
        let stash_size =
            recommended_stash_size(depth, DEFAULT_BLOCKS_PER_BUCKET, DEFAULT_STASH_OVERFLOW_SIZE)?;
        Self::new_with_parameters(block_size, DEFAULT_BLOCKS_PER_BUCKET, num_blocks, stash_size)
    }

    /// Returns a new `PathOram` with buckets of `blocks_per_bucket` blocks and a stash of
    /// `stash_size` blocks, with a tree just large enough for `num_blocks` blocks.
    ///
    /// The stash must hold at least [`minimum_stash_size`] blocks.
    pub fn new_with_parameters(
        block_size: BlockSize,
        blocks_per_bucket: BucketSize,
        num_blocks: u64,
        stash_size: StashSize,
    ) -> Result<Self, OramError> {
        log::info!(
            "PathOram::new(block_size = {}, blocks_per_bucket = {}, num_blocks = {}, stash_size = {})",
            block_size,
            blocks_per_bucket,
            num_blocks,
            stash_size
        );

        if block_size == 0 || blocks_per_bucket == 0 {
            return Err(OramError::InvalidConfigurationError);
        }

        let depth = tree_depth(num_blocks, blocks_per_bucket)?;
        if stash_size < minimum_stash_size(depth, blocks_per_bucket)? {
            return Err(OramError::InvalidConfigurationError);
        }

        let bucket_count = usize::try_from((1u64 << depth) - 1)?;
        log::info!(
            "PathOram::new -- depth = {}, buckets = {}, leaves = {}",
            depth,
            bucket_count,
            1u64 << (depth - 1)
        );

        let physical_memory = D::new(bucket_count, blocks_per_bucket, block_size)?;
        let stash = ObliviousStash::new(stash_size, depth, blocks_per_bucket, block_size)?;

        Ok(Self {
            physical_memory,
            stash,
            block_size,
            blocks_per_bucket,
            height: depth - 1,
        })
    }

    /// Performs one oblivious access.
    ///
    /// A real access (`is_real`) looks up `block_id` on the path to `leaf`, which must be
    /// the leaf returned by the block's previous access, or any leaf if the block does not
    /// exist yet. If `write`, the block's payload is replaced with `data`, creating the
    /// block if needed; otherwise `data` receives the payload if the block exists and is
    /// left unchanged if it does not. Either way the block is remapped to a fresh leaf.
    ///
    /// A dummy access reads and writes a random path and changes nothing. Its memory trace
    /// is distributed like that of a real access, and `block_id`, `write` and `data` are
    /// ignored.
    pub fn access<R: RngCore + CryptoRng>(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        write: bool,
        is_real: bool,
        rng: &mut R,
    ) -> Result<AccessOutcome, OramError> {
        if data.len() != self.block_size {
            return Err(OramError::InvalidDataLength {
                expected: self.block_size,
                actual: data.len(),
            });
        }

        let is_write = Choice::from(u8::from(write));
        let is_real = Choice::from(u8::from(is_real));

        // A dummy access visits a random path instead of the one requested.
        let dummy_leaf = TreeIndex::random_leaf(self.height, rng).leaf_number(self.height);
        let path_leaf = LeafId::conditional_select(&dummy_leaf, &leaf, is_real);

        // This check is not constant-time, but only leaks whether the leaf is well-formed.
        let leaf_count = self.leaf_count();
        if path_leaf >= leaf_count {
            return Err(OramError::InvalidLeaf {
                leaf: path_leaf,
                leaf_count,
            });
        }

        if !self.stash.scratch_is_empty() {
            log::error!(
                "PathOram::access -- stash of {} blocks overflowed",
                self.stash.capacity()
            );
            return Err(OramError::StashOverflow);
        }

        let position = TreeIndex::from_leaf(path_leaf, self.height);
        log::debug!("PathOram::access -- path {}", position);

        self.stash
            .read_from_path(&mut self.physical_memory, position, self.height)?;

        let new_position = TreeIndex::random_leaf(self.height, rng);
        let found = self
            .stash
            .access(block_id, data, new_position, is_write, is_real);

        self.stash.assign_targets(position, self.height);
        self.stash.sort();
        self.stash
            .write_to_path(&mut self.physical_memory, position, self.height)?;

        let found = found | (is_write & is_real);
        let new_leaf = LeafId::conditional_select(
            &leaf,
            &new_position.leaf_number(self.height),
            is_real,
        );

        Ok(AccessOutcome {
            found: found.into(),
            new_leaf,
        })
    }

    /// Reads block `block_id`, mapped to `leaf`, into `data`.
    pub fn read<R: RngCore + CryptoRng>(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        rng: &mut R,
    ) -> Result<AccessOutcome, OramError> {
        self.access(block_id, leaf, data, false, true, rng)
    }

    /// Writes `data` to block `block_id`, mapped to `leaf`.
    pub fn write<R: RngCore + CryptoRng>(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        rng: &mut R,
    ) -> Result<AccessOutcome, OramError> {
        self.access(block_id, leaf, data, true, true, rng)
    }

    /// Performs an access that changes nothing.
    pub fn dummy_access<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), OramError> {
        let mut data = vec![0u8; self.block_size];
        self.access(0, 0, &mut data, false, false, rng)?;
        Ok(())
    }

    /// The size of a block payload in bytes.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// The number of blocks per bucket ("Z").
    pub fn blocks_per_bucket(&self) -> BucketSize {
        self.blocks_per_bucket
    }

    /// The number of levels of the tree.
    pub fn depth(&self) -> TreeHeight {
        self.height + 1
    }

    /// The number of leaves of the tree.
    pub fn leaf_count(&self) -> u64 {
        1 << self.height
    }

    /// The number of blocks the stash holds.
    pub fn stash_size(&self) -> StashSize {
        self.stash.capacity()
    }

    /// The untrusted memory holding the tree.
    pub fn physical_memory(&self) -> &D {
        &self.physical_memory
    }

    #[cfg(test)]
    pub(crate) fn physical_memory_mut(&mut self) -> &mut D {
        &mut self.physical_memory
    }

    #[cfg(test)]
    pub(crate) fn stash_occupancy(&self) -> StashSize {
        self.stash.occupancy()
    }

    #[cfg(test)]
    pub(crate) fn stash_trace(&self) -> &[usize] {
        self.stash.trace()
    }
}

/// The smallest depth `D >= 1` whose `2^(D-1)` leaves cover `num_blocks` blocks at
/// `blocks_per_bucket` blocks per leaf.
fn tree_depth(num_blocks: u64, blocks_per_bucket: BucketSize) -> Result<TreeHeight, OramError> {
    let blocks_per_bucket = u64::try_from(blocks_per_bucket)?;
    if blocks_per_bucket == 0 {
        return Err(OramError::InvalidConfigurationError);
    }

    let leaves_needed = num_blocks.div_ceil(blocks_per_bucket).max(1);
    let height = if leaves_needed == 1 {
        0
    } else {
        u64::BITS - (leaves_needed - 1).leading_zeros()
    };

    let depth = height + 1;
    if depth > MAXIMUM_TREE_DEPTH {
        return Err(OramError::InvalidConfigurationError);
    }
    Ok(depth)
}
