// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Tree index

use crate::{
    path_oram::{TreeHeight, TreeIndex},
    LeafId,
};
use rand::{CryptoRng, Rng, RngCore};
use std::mem::size_of;

/// Index arithmetic on a complete binary tree whose root is node 1 and whose leaves sit at
/// depth `height`, so that leaf `i` is node `2^height + i`.
pub trait CompleteBinaryTreeIndex {
    /// The ancestor of this leaf at `depth`.
    fn node_on_path(&self, depth: TreeHeight, height: TreeHeight) -> Self;
    /// A uniformly random leaf node, drawn with a single call to `rng`.
    fn random_leaf<R: RngCore + CryptoRng>(tree_height: TreeHeight, rng: &mut R) -> Self;
    /// The depth of this node; the root has depth 0.
    fn depth(&self) -> TreeHeight;
    /// Whether this node is a leaf of a tree of `height`.
    fn is_leaf(&self, height: TreeHeight) -> bool;
    /// The node of leaf number `leaf`, in `0..2^height`.
    fn from_leaf(leaf: LeafId, height: TreeHeight) -> Self;
    /// The leaf number of this leaf node.
    fn leaf_number(&self, height: TreeHeight) -> LeafId;
}

impl CompleteBinaryTreeIndex for TreeIndex {
    fn node_on_path(&self, depth: TreeHeight, height: TreeHeight) -> Self {
        assert_ne!(*self, 0);
        assert!(self.is_leaf(height));
        let shift = height - depth;
        self >> shift
    }

    fn random_leaf<R: RngCore + CryptoRng>(tree_height: TreeHeight, rng: &mut R) -> Self {
        2u64.pow(tree_height) + rng.gen_range(0..2u64.pow(tree_height))
    }

    fn depth(&self) -> TreeHeight {
        assert_ne!(*self, 0);
        let leading_zeroes = self.leading_zeros();
        let index_bitlength = 8 * (size_of::<TreeIndex>() as TreeHeight);
        index_bitlength - leading_zeroes - 1
    }

    fn is_leaf(&self, height: TreeHeight) -> bool {
        assert_ne!(*self, 0);
        self.depth() == height
    }

    fn from_leaf(leaf: LeafId, height: TreeHeight) -> Self {
        debug_assert!(leaf < 1 << height);
        (1 << height) + leaf
    }

    fn leaf_number(&self, height: TreeHeight) -> LeafId {
        debug_assert!(self.is_leaf(height));
        self - (1 << height)
    }
}
