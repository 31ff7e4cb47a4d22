// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! This module contains common test utilities for the `oblivious` crate.

use std::collections::HashMap;
use std::sync::Once;
static INIT: Once = Once::new();
use crate::database::{CountAccessesDatabase, Database};
use crate::path_oram::{AccessOutcome, PathOram};
use crate::{BlockId, BlockSize, LeafId};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use simplelog::{Config, WriteLogger};

// For use in manual testing and inspection.
pub(crate) fn init_logger() {
    INIT.call_once(|| {
        WriteLogger::init(log::LevelFilter::Info, Config::default(), std::io::stdout()).unwrap()
    })
}

/// An ORAM under test, possibly wrapped in a monitor that checks invariants on every access.
pub(crate) trait Testable {
    fn new(block_size: BlockSize, num_blocks: u64) -> Self;

    fn access(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        write: bool,
        is_real: bool,
        rng: &mut StdRng,
    ) -> AccessOutcome;

    /// Called after every access with the number of distinct blocks written so far.
    fn test_hook(&self, _live_blocks: usize) {}
}

impl<D: Database> Testable for PathOram<D> {
    fn new(block_size: BlockSize, num_blocks: u64) -> Self {
        PathOram::new(block_size, num_blocks).unwrap()
    }

    fn access(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        write: bool,
        is_real: bool,
        rng: &mut StdRng,
    ) -> AccessOutcome {
        PathOram::access(self, block_id, leaf, data, write, is_real, rng).unwrap()
    }
}

fn random_payload(block_size: BlockSize, rng: &mut StdRng) -> Vec<u8> {
    let mut data = vec![0u8; block_size];
    rng.fill_bytes(&mut data);
    data
}

/// Reads `block_id` and checks it against `mirror`, updating the block's leaf.
fn checked_read<T: Testable>(
    oram: &mut T,
    mirror: &mut HashMap<BlockId, (Vec<u8>, LeafId)>,
    block_id: BlockId,
    block_size: BlockSize,
    rng: &mut StdRng,
) {
    let leaf = mirror.get(&block_id).map_or(0, |(_, leaf)| *leaf);
    let mut data = vec![0u8; block_size];
    let outcome = oram.access(block_id, leaf, &mut data, false, true, rng);

    match mirror.get_mut(&block_id) {
        Some((value, leaf)) => {
            assert!(outcome.found, "{block_id}");
            assert_eq!(&data, value, "{block_id}");
            *leaf = outcome.new_leaf;
        }
        None => {
            assert!(!outcome.found, "{block_id}");
            assert!(data.iter().all(|byte| *byte == 0));
        }
    }
}

fn checked_write<T: Testable>(
    oram: &mut T,
    mirror: &mut HashMap<BlockId, (Vec<u8>, LeafId)>,
    block_id: BlockId,
    block_size: BlockSize,
    rng: &mut StdRng,
) {
    let leaf = mirror.get(&block_id).map_or(0, |(_, leaf)| *leaf);
    let mut data = random_payload(block_size, rng);
    let outcome = oram.access(block_id, leaf, &mut data, true, true, rng);

    assert!(outcome.found);
    mirror.insert(block_id, (data, outcome.new_leaf));
}

fn check_all<T: Testable>(
    oram: &mut T,
    mirror: &mut HashMap<BlockId, (Vec<u8>, LeafId)>,
    block_size: BlockSize,
    rng: &mut StdRng,
) {
    let mut block_ids: Vec<BlockId> = mirror.keys().copied().collect();
    block_ids.sort();
    for block_id in block_ids {
        checked_read(oram, mirror, block_id, block_size, rng);
    }
}

/// Tests the correctness of an ORAM type T on a workload of random reads, writes and dummy
/// accesses.
pub(crate) fn test_correctness_random_workload<T: Testable>(
    block_size: BlockSize,
    capacity: u64,
    num_operations: u32,
) {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new(block_size, capacity);
    let mut mirror = HashMap::new();

    for _ in 0..num_operations {
        let block_id = rng.gen_range(0..capacity);

        match rng.gen_range(0..3) {
            0 => checked_read(&mut oram, &mut mirror, block_id, block_size, &mut rng),
            1 => checked_write(&mut oram, &mut mirror, block_id, block_size, &mut rng),
            _ => {
                let mut data = random_payload(block_size, &mut rng);
                let write = rng.gen();
                let outcome = oram.access(block_id, 0, &mut data, write, false, &mut rng);
                assert!(!outcome.found);
            }
        }
        oram.test_hook(mirror.len());
    }

    check_all(&mut oram, &mut mirror, block_size, &mut rng);
    oram.test_hook(mirror.len());
}

/// Tests the correctness of an ORAM type T on repeated passes of sequential accesses
/// 0, 1, ..., `capacity`.
pub(crate) fn test_correctness_linear_workload<T: Testable>(
    block_size: BlockSize,
    capacity: u64,
    num_operations: u32,
) {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new(block_size, capacity);
    let mut mirror = HashMap::new();

    let num_passes = u64::from(num_operations) / capacity;

    for _ in 0..num_passes {
        for block_id in 0..capacity {
            if rng.gen::<bool>() {
                checked_read(&mut oram, &mut mirror, block_id, block_size, &mut rng);
            } else {
                checked_write(&mut oram, &mut mirror, block_id, block_size, &mut rng);
            }
            oram.test_hook(mirror.len());
        }
    }

    check_all(&mut oram, &mut mirror, block_size, &mut rng);
}

macro_rules! create_correctness_test {
    ($function_name:ident, $oram_type: ident, $block_size: expr, $block_capacity:expr, $iterations_to_test: expr) => {
        paste::paste! {
            #[test]
            fn [<$function_name _ $oram_type:snake _ $block_capacity _ $block_size _ $iterations_to_test>]() {
                $function_name::<$oram_type>($block_size, $block_capacity, $iterations_to_test);
            }
        }
    };
}

macro_rules! create_correctness_tests_for_workload_and_oram_type {
    ($function_name: ident, $oram_type: ident) => {
        create_correctness_test!($function_name, $oram_type, 1, 1, 10);
        create_correctness_test!($function_name, $oram_type, 4, 8, 100);
        create_correctness_test!($function_name, $oram_type, 2, 16, 100);
        create_correctness_test!($function_name, $oram_type, 8, 64, 100);
        // Block size 16 bytes, block capacity 64 blocks, testing with 300 operations
        create_correctness_test!($function_name, $oram_type, 16, 64, 300);
        create_correctness_test!($function_name, $oram_type, 2, 32, 1000);
    };
}

macro_rules! create_correctness_tests_for_oram_type {
    ($oram_type: ident) => {
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_linear_workload,
            $oram_type
        );
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_random_workload,
            $oram_type
        );
    };
}

pub(crate) use create_correctness_test;
pub(crate) use create_correctness_tests_for_oram_type;
pub(crate) use create_correctness_tests_for_workload_and_oram_type;

macro_rules! monitor_boilerplate {
    () => {
        fn new(block_size: BlockSize, num_blocks: u64) -> Self {
            Self {
                oram: Testable::new(block_size, num_blocks),
            }
        }
    };
}

macro_rules! forward_access {
    () => {
        fn access(
            &mut self,
            block_id: BlockId,
            leaf: LeafId,
            data: &mut [u8],
            write: bool,
            is_real: bool,
            rng: &mut StdRng,
        ) -> AccessOutcome {
            Testable::access(&mut self.oram, block_id, leaf, data, write, is_real, rng)
        }
    };
}

/// Checks that few blocks are ever left behind in the stash.
#[derive(Debug)]
pub(crate) struct StashSizeMonitor {
    oram: PathOram<CountAccessesDatabase>,
}

impl Testable for StashSizeMonitor {
    monitor_boilerplate!();
    forward_access!();

    fn test_hook(&self, _live_blocks: usize) {
        let stash_size = self.oram.stash_occupancy();
        assert!(stash_size < 20);
    }
}

/// Checks that every block written is stored exactly once, in the tree or the stash.
#[derive(Debug)]
pub(crate) struct ConstantOccupancyMonitor {
    oram: PathOram<CountAccessesDatabase>,
}

impl Testable for ConstantOccupancyMonitor {
    monitor_boilerplate!();
    forward_access!();

    fn test_hook(&self, live_blocks: usize) {
        let stash_occupancy = self.oram.stash_occupancy();
        let tree_occupancy = self.oram.physical_memory().occupancy();
        assert_eq!(stash_occupancy + tree_occupancy, live_blocks);
    }
}

/// Checks that every access reads and writes exactly one bucket per level.
#[derive(Debug)]
pub(crate) struct PhysicalAccessCountMonitor {
    oram: PathOram<CountAccessesDatabase>,
}

impl Testable for PhysicalAccessCountMonitor {
    monitor_boilerplate!();

    fn access(
        &mut self,
        block_id: BlockId,
        leaf: LeafId,
        data: &mut [u8],
        write: bool,
        is_real: bool,
        rng: &mut StdRng,
    ) -> AccessOutcome {
        let pre_read_count = self.oram.physical_memory().get_read_count();
        let pre_write_count = self.oram.physical_memory().get_write_count();

        let result = Testable::access(&mut self.oram, block_id, leaf, data, write, is_real, rng);

        let post_read_count = self.oram.physical_memory().get_read_count();
        let post_write_count = self.oram.physical_memory().get_write_count();

        let reads = post_read_count - pre_read_count;
        let writes = post_write_count - pre_write_count;

        assert_eq!(reads, u64::from(self.oram.depth()));
        assert_eq!(writes, u64::from(self.oram.depth()));

        result
    }
}
