//! Tiled accelerator-style kernels for `nki-rs`.
//!
//! This crate implements the compute kernels on flat slices plus explicit
//! shapes, so the main tensor crate can call into it without a circular
//! dependency. The centerpiece is [`fused_conv2d_maxpool`], a batched
//! multi-channel convolution decomposed into tile-sized matrix multiplies
//! and fused with a max-pool reduction, written against the explicit
//! two-level memory hierarchy in [`tile`].

use num_traits::{FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod conv2d_maxpool;
pub mod reference;
pub mod repack;
pub mod tile;

pub use conv2d_maxpool::fused_conv2d_maxpool;
pub use reference::direct_conv2d_maxpool;
pub use repack::{repack_weights, RepackedWeights};
pub use tile::{Accumulator, ScratchTile, MOVING_FREE_MAX, PARTITION_DIM, STATIONARY_FREE_MAX};

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Tile capacity exceeded: needed {needed}, limit {limit}")]
    CapacityExceeded { needed: usize, limit: usize },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
/// This mirrors `TensorElem` in the main crate to avoid circular dependencies.
///
/// Kernels accumulate in `f32` regardless of the storage type, so elements
/// must convert to and from `f32` (`ToPrimitive`/`FromPrimitive`).
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}
