// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An oblivious computation kernel.
//!
//! Everything in this crate has a memory access pattern (which addresses are touched,
//! in what order, how many times) that is a function of public parameters only:
//! slice lengths, block counts and tree depths. Secret values and secret indices
//! influence the *values* written, never the addresses.
//!
//! The crate is layered:
//!
//! - [`primitives`]: branch-free conditional set, swap and access operations on words
//!   and byte ranges, and oblivious select/slice built from them.
//! - [`algorithms`]: a generalized Batcher odd-even merge sorting network and a
//!   stable oblivious compaction, both running fixed schedules that depend only on
//!   the element count.
//! - [`path_oram`]: a Path ORAM engine that uses both layers to read and write a
//!   logical block store without revealing which block was accessed.
//!
//! ```
//! use oblivious::path_oram::PathOram;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let mut oram: PathOram = PathOram::new(8, 64)?;
//!
//! let mut data = 123u64.to_le_bytes();
//! let written = oram.write(0xdeadbeef, 0, &mut data, &mut rng)?;
//!
//! let mut data = [0u8; 8];
//! let read = oram.read(0xdeadbeef, written.new_leaf, &mut data, &mut rng)?;
//! assert!(read.found);
//! assert_eq!(u64::from_le_bytes(data), 123);
//! # Ok::<(), oblivious::OramError>(())
//! ```

#![warn(clippy::cargo, clippy::doc_markdown, missing_docs, rustdoc::all)]

use std::num::TryFromIntError;
use thiserror::Error;

pub mod algorithms;
pub mod database;
pub mod path_oram;
pub mod primitives;

#[cfg(test)]
mod test_utils;

/// The numeric type used to specify the size of an ORAM block payload in bytes.
pub type BlockSize = usize;

/// The numeric type used to specify the size of an ORAM bucket in blocks.
pub type BucketSize = usize;

/// Numeric type used to represent the size of a Path ORAM stash in blocks.
pub type StashSize = usize;

/// A caller-chosen logical block identifier.
pub type BlockId = u64;

/// The index of a leaf of the Path ORAM tree, in `0..leaf_count`.
pub type LeafId = u64;

/// Errors that can arise while constructing or accessing an ORAM.
///
/// A read of a block that was never written is not an error; see
/// [`path_oram::AccessOutcome::found`].
#[derive(Error, Debug)]
pub enum OramError {
    /// Allocation of the tree or the stash failed during construction.
    #[error("Failed to allocate ORAM storage")]
    OutOfMemory,
    /// The stash scratch region was not empty at the start of an access.
    /// This is an obliviousness violation and cannot be recovered from by retrying.
    #[error("Stash overflowed its reserved scratch region")]
    StashOverflow,
    /// The supplied leaf is not a leaf of the tree.
    #[error("Leaf {leaf} is out of range for a tree with {leaf_count} leaves")]
    InvalidLeaf {
        /// The leaf that was supplied.
        leaf: LeafId,
        /// The number of leaves in the tree.
        leaf_count: u64,
    },
    /// The caller's data buffer does not match the block size.
    #[error("Data buffer is {actual} bytes but blocks are {expected} bytes")]
    InvalidDataLength {
        /// The configured block size.
        expected: BlockSize,
        /// The length of the supplied buffer.
        actual: usize,
    },
    /// The ORAM parameters are inconsistent.
    #[error("Invalid configuration")]
    InvalidConfigurationError,
    /// Errors arising from conversions between integer types.
    #[error("Arithmetic error encountered")]
    IntegerConversionError(#[from] TryFromIntError),
}
