//! The on-chip memory hierarchy used by the tiled kernels.
//!
//! Bulk tensors live in ordinary slices (the off-chip tier). Compute never
//! reads bulk memory directly: data is copied into a [`ScratchTile`] (the
//! small fast on-chip tier), matrix multiplies accumulate into an
//! [`Accumulator`] bank in `f32`, and finished rows are copied back out.
//! The three tiers are structurally distinct types with explicit copy
//! operations between them, not views of one buffer.
//!
//! Capacities are fixed architectural constants: a tile spans at most
//! [`PARTITION_DIM`] partitions, the stationary matmul operand is at most
//! [`STATIONARY_FREE_MAX`] wide, and the moving operand (and therefore one
//! accumulator bank) is at most [`MOVING_FREE_MAX`] wide.

use crate::{KernelElem, KernelError, Result};

/// Number of partitions (rows) addressable by one on-chip tile.
pub const PARTITION_DIM: usize = 128;

/// Maximum free dimension of the stationary matmul operand.
pub const STATIONARY_FREE_MAX: usize = 128;

/// Maximum free dimension of the moving matmul operand. One accumulator
/// bank holds one output row, so this also bounds the output width.
pub const MOVING_FREE_MAX: usize = 512;

pub(crate) fn to_f32<T: KernelElem>(v: T) -> f32 {
    v.to_f32().unwrap_or(0.0)
}

pub(crate) fn from_f32<T: KernelElem>(v: f32) -> T {
    T::from_f32(v).unwrap_or_else(T::zero)
}

/// A small fixed-capacity buffer in the fast on-chip tier.
///
/// Addressed by a partition dimension (at most [`PARTITION_DIM`] rows) and a
/// free dimension. Data is stored partition-major and always as `f32`;
/// copying in from a bulk slice performs the element conversion.
pub struct ScratchTile {
    partitions: usize,
    free: usize,
    data: Vec<f32>,
}

impl ScratchTile {
    pub fn new(partitions: usize, free: usize) -> Result<Self> {
        if partitions > PARTITION_DIM {
            return Err(KernelError::CapacityExceeded {
                needed: partitions,
                limit: PARTITION_DIM,
            });
        }
        Ok(Self {
            partitions,
            free,
            data: vec![0.0; partitions * free],
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn free(&self) -> usize {
        self.free
    }

    /// Returns one partition row.
    pub fn row(&self, p: usize) -> &[f32] {
        &self.data[p * self.free..(p + 1) * self.free]
    }

    /// Returns one partition row mutably.
    pub fn row_mut(&mut self, p: usize) -> &mut [f32] {
        &mut self.data[p * self.free..(p + 1) * self.free]
    }

    /// Copies a contiguous run of bulk memory into partition `p`,
    /// converting elements to `f32`.
    pub fn fill_partition<T: KernelElem>(&mut self, p: usize, src: &[T]) {
        debug_assert_eq!(src.len(), self.free);
        for (dst, &s) in self.row_mut(p).iter_mut().zip(src) {
            *dst = to_f32(s);
        }
    }
}

/// A high-precision accumulator bank.
///
/// Holds the running matrix-multiply sum for one output tile across the
/// input-channel/tap reduction: one `f32` output row per partition. The bank
/// is owned exclusively by the innermost reduction loop, zeroed at loop
/// entry via [`reset`](Accumulator::reset) and read back once the reduction
/// completes.
pub struct Accumulator {
    partitions: usize,
    free: usize,
    data: Vec<f32>,
}

impl Accumulator {
    pub fn new(partitions: usize, free: usize) -> Result<Self> {
        if partitions > PARTITION_DIM {
            return Err(KernelError::CapacityExceeded {
                needed: partitions,
                limit: PARTITION_DIM,
            });
        }
        if free > MOVING_FREE_MAX {
            return Err(KernelError::CapacityExceeded {
                needed: free,
                limit: MOVING_FREE_MAX,
            });
        }
        Ok(Self {
            partitions,
            free,
            data: vec![0.0; partitions * free],
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Zeroes the bank. Called at the entry of each reduction.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    /// Returns one accumulated output row.
    pub fn row(&self, p: usize) -> &[f32] {
        &self.data[p * self.free..p * self.free + self.free]
    }

    /// One step of the matmul decomposition:
    /// `self[p, x] += sum_k stationary[k, p] * moving[k, offset + x]`.
    ///
    /// `stationary` is a pre-transposed sub-matrix stored row-major with the
    /// contraction dimension along its rows (one row per partition of
    /// `moving`) and `self.partitions()` columns. `moving` contributes the
    /// window `[offset, offset + width)` of each of its partitions.
    pub fn matmul_acc(
        &mut self,
        stationary: &[f32],
        moving: &ScratchTile,
        offset: usize,
        width: usize,
    ) -> Result<()> {
        if width > self.free {
            return Err(KernelError::CapacityExceeded {
                needed: width,
                limit: self.free,
            });
        }
        if offset + width > moving.free() {
            return Err(KernelError::CapacityExceeded {
                needed: offset + width,
                limit: moving.free(),
            });
        }
        let contract = moving.partitions();
        debug_assert_eq!(stationary.len(), contract * self.partitions);
        debug_assert!(self.partitions <= STATIONARY_FREE_MAX);

        for (p, acc_row) in self.data.chunks_mut(self.free).enumerate() {
            for k in 0..contract {
                let w = stationary[k * self.partitions + p];
                let m = &moving.row(k)[offset..offset + width];
                for (acc, &x) in acc_row[..width].iter_mut().zip(m) {
                    *acc += w * x;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_capacity() {
        assert!(ScratchTile::new(128, 64).is_ok());
        let err = ScratchTile::new(129, 64);
        assert!(matches!(err, Err(KernelError::CapacityExceeded { .. })));
    }

    #[test]
    fn test_accumulator_capacity() {
        assert!(Accumulator::new(128, 512).is_ok());
        let err = Accumulator::new(128, 513);
        assert!(matches!(err, Err(KernelError::CapacityExceeded { .. })));
    }

    #[test]
    fn test_fill_and_read() {
        let mut tile = ScratchTile::new(2, 3).unwrap();
        tile.fill_partition(0, &[1.0f32, 2.0, 3.0]);
        tile.fill_partition(1, &[4.0f32, 5.0, 6.0]);
        assert_eq!(tile.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(tile.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_matmul_acc() {
        // moving: 2 partitions x 3 free, acc: 2 partitions x 2 free.
        // stationary (contract=2 rows, 2 cols): [[1, 2], [3, 4]].
        let mut moving = ScratchTile::new(2, 3).unwrap();
        moving.fill_partition(0, &[1.0f32, 2.0, 3.0]);
        moving.fill_partition(1, &[4.0f32, 5.0, 6.0]);

        let stationary = [1.0, 2.0, 3.0, 4.0];
        let mut acc = Accumulator::new(2, 2).unwrap();
        acc.matmul_acc(&stationary, &moving, 1, 2).unwrap();

        // acc[p, x] = stat[0, p] * moving[0, 1 + x] + stat[1, p] * moving[1, 1 + x]
        // p = 0: [1*2 + 3*5, 1*3 + 3*6] = [17, 21]
        // p = 1: [2*2 + 4*5, 2*3 + 4*6] = [24, 30]
        assert_eq!(acc.row(0), &[17.0, 21.0]);
        assert_eq!(acc.row(1), &[24.0, 30.0]);

        // Accumulates on top of the previous sum.
        acc.matmul_acc(&stationary, &moving, 1, 2).unwrap();
        assert_eq!(acc.row(0), &[34.0, 42.0]);

        acc.reset();
        assert_eq!(acc.row(0), &[0.0, 0.0]);
    }

    #[test]
    fn test_matmul_acc_window_out_of_range() {
        let moving = ScratchTile::new(1, 3).unwrap();
        let mut acc = Accumulator::new(1, 4).unwrap();
        let err = acc.matmul_acc(&[1.0], &moving, 2, 2);
        assert!(matches!(err, Err(KernelError::CapacityExceeded { .. })));
    }
}
