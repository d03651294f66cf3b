//! Weight repacking for the fused convolution kernel.
//!
//! The matmul hardware consumes a fixed "stationary" operand with input
//! channels along the partition axis, while convolution weights arrive as
//! `[out_channels, in_channels, fh, fw]`. Repacking transposes each tap's
//! `(out_channel_partition x in_channel_partition)` slice once per
//! invocation, so every filter tap has its stationary sub-matrix resident
//! and ready for the whole compute pass. No tensor is mutated in place.

use crate::tile::{to_f32, PARTITION_DIM};
use crate::{KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Convolution weights retiled into per-tap transposed sub-matrices.
///
/// Logically indexed as `(in_partition, in_tile, out_partition, out_tile,
/// i, j)`; physically each `(in_tile, out_tile, i, j)` sub-matrix is one
/// contiguous `PARTITION_DIM x PARTITION_DIM` block with the input-channel
/// partition along its rows, so [`tap`](RepackedWeights::tap) can hand the
/// matmul a ready stationary operand as a plain slice.
pub struct RepackedWeights {
    num_in_tiles: usize,
    num_out_tiles: usize,
    filter_size: usize,
    data: Vec<f32>,
}

impl RepackedWeights {
    pub fn num_in_tiles(&self) -> usize {
        self.num_in_tiles
    }

    pub fn num_out_tiles(&self) -> usize {
        self.num_out_tiles
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    /// Returns the transposed sub-matrix for one tap: `PARTITION_DIM` rows
    /// of input-channel partition, `PARTITION_DIM` columns of output-channel
    /// partition, row-major.
    pub fn tap(&self, in_tile: usize, out_tile: usize, i: usize, j: usize) -> &[f32] {
        let block = PARTITION_DIM * PARTITION_DIM;
        let f = self.filter_size;
        let idx = ((in_tile * self.num_out_tiles + out_tile) * f + i) * f + j;
        &self.data[idx * block..(idx + 1) * block]
    }
}

/// Retiles and transposes `[out_channels, in_channels, fh, fw]` weights.
///
/// Pure reshape/transpose: fails only on shape incompatibility, before any
/// data is touched.
pub fn repack_weights<T: KernelElem>(
    weight: &[T],
    weight_shape: &[usize],
) -> Result<RepackedWeights> {
    if weight_shape.len() != 4 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![4],
            got: vec![weight_shape.len()],
        });
    }
    let out_channels = weight_shape[0];
    let in_channels = weight_shape[1];
    let fh = weight_shape[2];
    let fw = weight_shape[3];

    if fh != fw {
        return Err(KernelError::Unsupported(format!(
            "filters must be square, got {}x{}",
            fh, fw
        )));
    }
    if in_channels % PARTITION_DIM != 0 || out_channels % PARTITION_DIM != 0 {
        return Err(KernelError::Unsupported(format!(
            "channel counts must be multiples of {}, got in={} out={}",
            PARTITION_DIM, in_channels, out_channels
        )));
    }

    let num_in_tiles = in_channels / PARTITION_DIM;
    let num_out_tiles = out_channels / PARTITION_DIM;
    let block = PARTITION_DIM * PARTITION_DIM;
    let mut data = vec![0.0f32; num_in_tiles * num_out_tiles * fh * fw * block];

    // One transposed sub-matrix per (in_tile, out_tile, i, j); blocks are
    // independent, so fill them in parallel.
    data.par_chunks_mut(block)
        .enumerate()
        .for_each(|(blk, dst)| {
            let j = blk % fw;
            let i = (blk / fw) % fh;
            let out_tile = (blk / (fh * fw)) % num_out_tiles;
            let in_tile = blk / (fh * fw * num_out_tiles);

            for p_in in 0..PARTITION_DIM {
                let c_in = in_tile * PARTITION_DIM + p_in;
                for p_out in 0..PARTITION_DIM {
                    let c_out = out_tile * PARTITION_DIM + p_out;
                    let src = ((c_out * in_channels + c_in) * fh + i) * fw + j;
                    dst[p_in * PARTITION_DIM + p_out] = to_f32(weight[src]);
                }
            }
        });

    Ok(RepackedWeights {
        num_in_tiles,
        num_out_tiles,
        filter_size: fh,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned_weights(out_channels: usize, in_channels: usize, f: usize) -> Vec<f32> {
        (0..out_channels * in_channels * f * f)
            .map(|i| ((i * 31) % 97) as f32 - 48.0)
            .collect()
    }

    #[test]
    fn test_tap_is_transpose_of_source_slice() {
        let (out_c, in_c, f) = (128, 128, 2);
        let w = patterned_weights(out_c, in_c, f);
        let packed = repack_weights(&w, &[out_c, in_c, f, f]).unwrap();

        for i in 0..f {
            for j in 0..f {
                let tap = packed.tap(0, 0, i, j);
                for p_in in 0..PARTITION_DIM {
                    for p_out in 0..PARTITION_DIM {
                        let src = ((p_out * in_c + p_in) * f + i) * f + j;
                        assert_eq!(tap[p_in * PARTITION_DIM + p_out], w[src]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_transpose_twice_is_identity() {
        let (out_c, in_c, f) = (128, 256, 1);
        let w = patterned_weights(out_c, in_c, f);
        let packed = repack_weights(&w, &[out_c, in_c, f, f]).unwrap();

        for in_tile in 0..packed.num_in_tiles() {
            let tap = packed.tap(in_tile, 0, 0, 0);
            // Transposing the packed block again must reproduce the original
            // (out_partition x in_partition) slice exactly.
            for p_out in 0..PARTITION_DIM {
                for p_in in 0..PARTITION_DIM {
                    let c_in = in_tile * PARTITION_DIM + p_in;
                    let back = tap[p_in * PARTITION_DIM + p_out];
                    assert_eq!(back, w[p_out * in_c + c_in]);
                }
            }
        }
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let w = vec![0.0f32; 128 * 100 * 9];
        let err = repack_weights(&w, &[128, 100, 3, 3]);
        assert!(matches!(err, Err(KernelError::Unsupported(_))));

        let w = vec![0.0f32; 128 * 128 * 6];
        let err = repack_weights(&w, &[128, 128, 3, 2]);
        assert!(matches!(err, Err(KernelError::Unsupported(_))));

        let err = repack_weights(&[0.0f32], &[128, 128, 3]);
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
