// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Memory abstractions for the Path ORAM tree.
//!
//! The tree is stored bucket by bucket. Buckets are addressed by their 1-based node index
//! in the complete binary tree, so the root is bucket 1 and the children of bucket `i` are
//! `2i` and `2i + 1`.

use crate::{
    path_oram::{BlockHeader, TreeIndex},
    BlockSize, BucketSize, OramError,
};

/// A simple Memory trait to model the untrusted memory holding the tree.
pub trait Database
where
    Self: Sized,
{
    /// Returns a new `Database` of `bucket_count` buckets, each holding `blocks_per_bucket`
    /// empty blocks of `block_size` bytes.
    fn new(
        bucket_count: usize,
        blocks_per_bucket: BucketSize,
        block_size: BlockSize,
    ) -> Result<Self, OramError>;

    /// Returns the number of buckets stored by `self`.
    fn bucket_count(&self) -> usize;

    /// Copies bucket `index` into `headers` and `payloads`, and leaves the stored bucket
    /// empty.
    fn take_bucket(
        &mut self,
        index: TreeIndex,
        headers: &mut [BlockHeader],
        payloads: &mut [u8],
    ) -> Result<(), OramError>;

    /// Overwrites bucket `index` with `headers` and `payloads`.
    fn write_bucket(
        &mut self,
        index: TreeIndex,
        headers: &[BlockHeader],
        payloads: &[u8],
    ) -> Result<(), OramError>;
}

/// A simple Database that stores its headers and payloads in two flat `Vec`s.
#[derive(Debug)]
pub struct SimpleDatabase {
    headers: Vec<BlockHeader>,
    payloads: Vec<u8>,
    blocks_per_bucket: BucketSize,
    block_size: BlockSize,
}

impl SimpleDatabase {
    fn header_range(&self, index: TreeIndex) -> Result<std::ops::Range<usize>, OramError> {
        let start = (usize::try_from(index)? - 1) * self.blocks_per_bucket;
        Ok(start..start + self.blocks_per_bucket)
    }

    fn payload_range(&self, index: TreeIndex) -> Result<std::ops::Range<usize>, OramError> {
        let bucket_bytes = self.blocks_per_bucket * self.block_size;
        let start = (usize::try_from(index)? - 1) * bucket_bytes;
        Ok(start..start + bucket_bytes)
    }
}

/// Allocates a vector of `len` copies of `value`, reporting allocation failure.
pub(crate) fn try_filled_vec<T: Clone>(len: usize, value: T) -> Result<Vec<T>, OramError> {
    let mut result = Vec::new();
    result
        .try_reserve_exact(len)
        .map_err(|_| OramError::OutOfMemory)?;
    result.resize(len, value);
    Ok(result)
}

impl Database for SimpleDatabase {
    fn new(
        bucket_count: usize,
        blocks_per_bucket: BucketSize,
        block_size: BlockSize,
    ) -> Result<Self, OramError> {
        let block_count = bucket_count
            .checked_mul(blocks_per_bucket)
            .ok_or(OramError::OutOfMemory)?;
        let byte_count = block_count
            .checked_mul(block_size)
            .ok_or(OramError::OutOfMemory)?;

        Ok(Self {
            headers: try_filled_vec(block_count, BlockHeader::dummy())?,
            payloads: try_filled_vec(byte_count, 0u8)?,
            blocks_per_bucket,
            block_size,
        })
    }

    fn bucket_count(&self) -> usize {
        self.headers.len() / self.blocks_per_bucket
    }

    fn take_bucket(
        &mut self,
        index: TreeIndex,
        headers: &mut [BlockHeader],
        payloads: &mut [u8],
    ) -> Result<(), OramError> {
        let header_range = self.header_range(index)?;
        let payload_range = self.payload_range(index)?;

        headers.copy_from_slice(&self.headers[header_range.clone()]);
        payloads.copy_from_slice(&self.payloads[payload_range]);
        for header in &mut self.headers[header_range] {
            *header = BlockHeader::dummy();
        }
        Ok(())
    }

    fn write_bucket(
        &mut self,
        index: TreeIndex,
        headers: &[BlockHeader],
        payloads: &[u8],
    ) -> Result<(), OramError> {
        let header_range = self.header_range(index)?;
        let payload_range = self.payload_range(index)?;

        self.headers[header_range].copy_from_slice(headers);
        self.payloads[payload_range].copy_from_slice(payloads);
        Ok(())
    }
}

/// One bucket-granular access to physical memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicalAccess {
    /// The bucket at this index was read.
    Read(TreeIndex),
    /// The bucket at this index was written.
    Write(TreeIndex),
}

/// A Database that counts reads and writes. It can also record the order in which buckets
/// are touched, once recording is switched on with
/// [`set_trace_recording`](Self::set_trace_recording).
#[derive(Debug)]
pub struct CountAccessesDatabase {
    data: SimpleDatabase,
    /// `reads[i]` tracks the total number of reads made to bucket `i + 1`.
    pub reads: Vec<u64>,
    /// `writes[i]` tracks the total number of writes made to bucket `i + 1`.
    pub writes: Vec<u64>,
    /// Every physical access made while recording was on, oldest first.
    pub trace: Vec<PhysicalAccess>,
    record_trace: bool,
}

impl CountAccessesDatabase {
    /// Returns the total number of reads to the database.
    pub fn get_read_count(&self) -> u64 {
        self.reads.iter().sum()
    }

    /// Returns the total number of writes to the database.
    pub fn get_write_count(&self) -> u64 {
        self.writes.iter().sum()
    }

    /// Starts or stops appending physical accesses to `trace`. Recording is off by default,
    /// since the trace grows with every access.
    pub fn set_trace_recording(&mut self, enabled: bool) {
        self.record_trace = enabled;
    }

    /// Forgets the recorded trace, keeping the counts.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    #[cfg(test)]
    pub(crate) fn occupancy(&self) -> usize {
        self.data
            .headers
            .iter()
            .filter(|header| bool::from(header.is_valid()))
            .count()
    }
}

impl Database for CountAccessesDatabase {
    fn new(
        bucket_count: usize,
        blocks_per_bucket: BucketSize,
        block_size: BlockSize,
    ) -> Result<Self, OramError> {
        Ok(Self {
            data: SimpleDatabase::new(bucket_count, blocks_per_bucket, block_size)?,
            reads: try_filled_vec(bucket_count, 0u64)?,
            writes: try_filled_vec(bucket_count, 0u64)?,
            trace: Vec::new(),
            record_trace: false,
        })
    }

    fn bucket_count(&self) -> usize {
        self.data.bucket_count()
    }

    fn take_bucket(
        &mut self,
        index: TreeIndex,
        headers: &mut [BlockHeader],
        payloads: &mut [u8],
    ) -> Result<(), OramError> {
        log::debug!("Physical read -- {}", index);

        self.reads[usize::try_from(index)? - 1] += 1;
        if self.record_trace {
            self.trace.push(PhysicalAccess::Read(index));
        }
        self.data.take_bucket(index, headers, payloads)
    }

    fn write_bucket(
        &mut self,
        index: TreeIndex,
        headers: &[BlockHeader],
        payloads: &[u8],
    ) -> Result<(), OramError> {
        log::debug!("Physical write -- {}", index);

        self.writes[usize::try_from(index)? - 1] += 1;
        if self.record_trace {
            self.trace.push(PhysicalAccess::Write(index));
        }
        self.data.write_bucket(index, headers, payloads)
    }
}
