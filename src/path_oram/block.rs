// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The metadata of a Path ORAM block.
//!
//! Payloads are stored apart from their headers, in byte arrays owned by the stash and the
//! database, so that the block size can be chosen at runtime.

use crate::{path_oram::TreeIndex, BlockId};
use subtle::{Choice, ConditionallySelectable};

/// The header of a block slot: whether it is occupied, which logical block it holds and
/// the leaf node that block is mapped to.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub(crate) valid: u8,
    pub(crate) id: BlockId,
    pub(crate) position: TreeIndex,
}

impl BlockHeader {
    const DUMMY_ID: BlockId = BlockId::MAX;
    const DUMMY_POSITION: TreeIndex = 0;

    /// An empty slot.
    pub fn dummy() -> Self {
        Self {
            valid: 0,
            id: Self::DUMMY_ID,
            position: Self::DUMMY_POSITION,
        }
    }

    /// Whether the slot holds a block.
    pub fn is_valid(&self) -> Choice {
        Choice::from(self.valid)
    }

    pub(crate) fn set_valid(&mut self, valid: Choice) {
        self.valid = valid.unwrap_u8();
    }
}

impl std::fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid == 0 {
            write!(f, "BlockHeader::Dummy")
        } else {
            f.debug_struct("BlockHeader")
                .field("id", &self.id)
                .field("position", &self.position)
                .finish()
        }
    }
}

impl ConditionallySelectable for BlockHeader {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        let valid = u8::conditional_select(&a.valid, &b.valid, choice);
        let id = BlockId::conditional_select(&a.id, &b.id, choice);
        let position = TreeIndex::conditional_select(&a.position, &b.position, choice);
        BlockHeader {
            valid,
            id,
            position,
        }
    }
}
