// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A fixed-size, obliviously accessed stash implemented using oblivious sorting.
//!
//! With `P = depth * blocks_per_bucket` slots per path and `S` slots in total, the stash is
//! laid out as follows during an access:
//!
//! - `[0, P)`: the path being accessed is read here.
//! - `[P, S - P - 1)`: blocks that could not be evicted on earlier accesses.
//! - `S - P - 1`: the insertion slot, used when a write creates a new block.
//! - `[S - P, S)`: padding, one slot per (level, slot-in-bucket) of the path.
//!
//! The last `P + 1` slots are the scratch region, which must be empty between accesses.
//! After eviction the stash is sorted so that its first `P` slots hold the new contents of
//! the path, bucket by bucket from the leaf up, and its retained blocks follow directly.

// Overriding Clippy's judgment and asserting that in this case,
// a range loop is the best way to convey the intent of the code.
#![allow(clippy::needless_range_loop)]

use super::{
    minimum_stash_size, tree_index::CompleteBinaryTreeIndex, BlockHeader, TreeHeight, TreeIndex,
};
use crate::{
    algorithms::generate_swaps,
    database::{try_filled_vec, Database},
    primitives::{cond_swap, mem_access, mem_swap},
    BlockId, BlockSize, BucketSize, OramError, StashSize,
};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};

#[derive(Debug)]
pub(crate) struct ObliviousStash {
    // The bucket each slot is evicted to, or 0 for none. Only meaningful during an access.
    targets: Vec<TreeIndex>,
    headers: Vec<BlockHeader>,
    payloads: Vec<u8>,
    // Blocks assigned to each level of the current path, indexed by depth.
    fullness: Vec<u64>,
    block_size: BlockSize,
    blocks_per_bucket: BucketSize,
    path_size: StashSize,
    #[cfg(test)]
    trace: Vec<usize>,
}

impl ObliviousStash {
    pub fn new(
        capacity: StashSize,
        depth: TreeHeight,
        blocks_per_bucket: BucketSize,
        block_size: BlockSize,
    ) -> Result<Self, OramError> {
        if capacity < minimum_stash_size(depth, blocks_per_bucket)? {
            return Err(OramError::InvalidConfigurationError);
        }
        let path_size = usize::try_from(depth)? * blocks_per_bucket;

        let payload_bytes = capacity
            .checked_mul(block_size)
            .ok_or(OramError::OutOfMemory)?;

        Ok(Self {
            targets: try_filled_vec(capacity, 0)?,
            headers: try_filled_vec(capacity, BlockHeader::dummy())?,
            payloads: try_filled_vec(payload_bytes, 0u8)?,
            fullness: try_filled_vec(depth as usize, 0)?,
            block_size,
            blocks_per_bucket,
            path_size,
            #[cfg(test)]
            trace: Vec::new(),
        })
    }

    pub fn capacity(&self) -> StashSize {
        self.headers.len()
    }

    fn insertion_slot(&self) -> usize {
        self.capacity() - self.path_size - 1
    }

    fn padding_start(&self) -> usize {
        self.capacity() - self.path_size
    }

    fn payload_range(&self, slot: usize) -> std::ops::Range<usize> {
        slot * self.block_size..(slot + 1) * self.block_size
    }

    fn touch(&mut self, _slot: usize) {
        #[cfg(test)]
        self.trace.push(_slot);
    }

    /// Returns whether every slot of the scratch region is empty. Every scratch slot is
    /// inspected, whatever the outcome.
    pub fn scratch_is_empty(&mut self) -> bool {
        #[cfg(test)]
        self.trace.clear();

        let mut occupied = Choice::from(0);
        for slot in self.insertion_slot()..self.capacity() {
            self.touch(slot);
            occupied |= self.headers[slot].is_valid();
        }
        !bool::from(occupied)
    }

    /// Moves the buckets on the path to `leaf` into the first slots of the stash, from the
    /// leaf up, leaving them empty in `physical_memory`.
    pub fn read_from_path<D: Database>(
        &mut self,
        physical_memory: &mut D,
        leaf: TreeIndex,
        height: TreeHeight,
    ) -> Result<(), OramError> {
        let z = self.blocks_per_bucket;
        for (i, depth) in (0..=height).rev().enumerate() {
            let first_slot = i * z;
            for slot in first_slot..first_slot + z {
                self.touch(slot);
            }

            let payloads = first_slot * self.block_size..(first_slot + z) * self.block_size;
            physical_memory.take_bucket(
                leaf.node_on_path(depth, height),
                &mut self.headers[first_slot..first_slot + z],
                &mut self.payloads[payloads],
            )?;
        }
        Ok(())
    }

    /// Serves one request against the stash.
    ///
    /// Every slot outside the scratch region is visited. The slot holding `block_id`, if
    /// `is_real`, exchanges its payload with `data` (a write into the slot if `is_write`,
    /// otherwise a read out of it) and is remapped to `new_position`. If no slot holds it and
    /// this is a real write, the block is created in the insertion slot.
    ///
    /// Returns whether a slot held `block_id`.
    pub fn access(
        &mut self,
        block_id: BlockId,
        data: &mut [u8],
        new_position: TreeIndex,
        is_write: Choice,
        is_real: Choice,
    ) -> Choice {
        let mut found = Choice::from(0);

        for slot in 0..self.insertion_slot() {
            self.touch(slot);
            let range = self.payload_range(slot);
            let header = &mut self.headers[slot];

            let is_requested_block = header.is_valid() & header.id.ct_eq(&block_id) & is_real;
            header
                .position
                .conditional_assign(&new_position, is_requested_block);
            mem_access(data, &mut self.payloads[range], is_write, is_requested_block);

            found |= is_requested_block;
        }

        // Only the validity bit depends on whether the block is new.
        let slot = self.insertion_slot();
        self.touch(slot);
        let is_inserted = is_write & !found & is_real;
        self.headers[slot] = BlockHeader {
            valid: is_inserted.unwrap_u8(),
            id: block_id,
            position: new_position,
        };
        let range = self.payload_range(slot);
        self.payloads[range].copy_from_slice(data);

        found
    }

    /// Chooses the bucket on the path to `leaf` that each block is evicted to, then tags
    /// enough padding slots that every bucket of the path receives exactly
    /// `blocks_per_bucket` slots.
    ///
    /// Blocks are placed greedily, each into the deepest bucket it may occupy that still
    /// has room. Blocks that fit nowhere, and empty slots, get target 0.
    pub fn assign_targets(&mut self, leaf: TreeIndex, height: TreeHeight) {
        let z = self.blocks_per_bucket as u64;
        for count in self.fullness.iter_mut() {
            *count = 0;
        }

        for slot in 0..self.padding_start() {
            self.touch(slot);
            let header = self.headers[slot];

            let mut target: TreeIndex = 0;
            let mut placed = !header.is_valid();
            for depth in (0..=height).rev() {
                let shift = height - depth;
                let node = leaf >> shift;
                let on_path = (header.position >> shift).ct_eq(&node);
                let has_room = self.fullness[depth as usize].ct_lt(&z);

                let accept = !placed & on_path & has_room;
                target.conditional_assign(&node, accept);
                self.fullness[depth as usize] += u64::from(accept.unwrap_u8());
                placed |= accept;
            }
            self.targets[slot] = target;
        }

        let padding_start = self.padding_start();
        for depth in 0..=height {
            let node = leaf.node_on_path(depth, height);
            let first_slot = padding_start + depth as usize * self.blocks_per_bucket;
            for j in 0..self.blocks_per_bucket {
                let slot = first_slot + j;
                self.touch(slot);

                let is_needed = (self.fullness[depth as usize] + j as u64).ct_lt(&z);
                self.headers[slot] = BlockHeader::dummy();
                self.targets[slot] = TreeIndex::conditional_select(&0, &node, is_needed);
            }
        }
    }

    /// Sorts the stash by descending target, with untargeted slots last. Among slots with
    /// the same target, occupied slots come first.
    pub fn sort(&mut self) {
        let block_size = self.block_size;
        let targets = &mut self.targets;
        let headers = &mut self.headers;
        let payloads = &mut self.payloads;
        #[cfg(test)]
        let trace = &mut self.trace;

        generate_swaps(targets.len(), |a, b| {
            #[cfg(test)]
            trace.extend([a, b]);

            let targets_ordered = targets[a].ct_lt(&targets[b]);
            let validity_ordered = targets[a].ct_eq(&targets[b])
                & !headers[a].is_valid()
                & headers[b].is_valid();
            let should_swap = targets_ordered | validity_ordered;

            let (left, right) = targets.split_at_mut(b);
            cond_swap(&mut left[a], &mut right[0], should_swap);
            let (left, right) = headers.split_at_mut(b);
            cond_swap(&mut left[a], &mut right[0], should_swap);
            let (left, right) = payloads.split_at_mut(b * block_size);
            mem_swap(
                &mut left[a * block_size..(a + 1) * block_size],
                &mut right[..block_size],
                should_swap,
            );
        });
    }

    /// Writes the first slots of the stash to the path to `leaf`, from the leaf up, and
    /// empties them.
    pub fn write_to_path<D: Database>(
        &mut self,
        physical_memory: &mut D,
        leaf: TreeIndex,
        height: TreeHeight,
    ) -> Result<(), OramError> {
        let z = self.blocks_per_bucket;
        for (i, depth) in (0..=height).rev().enumerate() {
            let first_slot = i * z;
            for slot in first_slot..first_slot + z {
                self.touch(slot);
            }

            let payloads = first_slot * self.block_size..(first_slot + z) * self.block_size;
            physical_memory.write_bucket(
                leaf.node_on_path(depth, height),
                &self.headers[first_slot..first_slot + z],
                &self.payloads[payloads],
            )?;

            for slot in first_slot..first_slot + z {
                self.headers[slot] = BlockHeader::dummy();
                self.targets[slot] = 0;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn occupancy(&self) -> StashSize {
        self.headers
            .iter()
            .filter(|header| bool::from(header.is_valid()))
            .count()
    }

    #[cfg(test)]
    pub fn trace(&self) -> &[usize] {
        &self.trace
    }
}
