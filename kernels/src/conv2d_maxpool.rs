//! Fused 2D convolution + max-pool, decomposed into tile-sized matmuls.
//!
//! The convolution is realized as a sum of `fh * fw * num_in_tiles`
//! rank-reduced matrix multiplies per output row, avoiding an explicit
//! im2col materialization in bulk memory. For each raw output row, the
//! needed input window is copied into a scratch tile once per input-channel
//! tile and re-indexed for every filter tap; the per-tap stationary operand
//! comes from the repacked weights. Bias is added after the full
//! channel/tap reduction, and adjacent rows are reduced with a maximum to
//! produce one pooled output row, streamed straight back to bulk memory.

use crate::repack::repack_weights;
use crate::tile::{from_f32, to_f32, Accumulator, ScratchTile, MOVING_FREE_MAX, PARTITION_DIM};
use crate::{KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Performs fused 2D convolution + max pooling.
///
/// Stride 1, no padding, square filters, pool size 1 or 2. The pool window
/// is `pool_size x pool_size` applied jointly over both spatial axes with a
/// stride equal to the pool size.
///
/// # Arguments
///
/// * `input` - Input tensor data (flattened). Shape: `[batch_size, in_channels, height, width]`
/// * `weight` - Weight tensor data (flattened). Shape: `[out_channels, in_channels, fh, fw]`
/// * `bias` - Bias data. Shape: `[out_channels]`
/// * `input_shape` - Shape of the input tensor.
/// * `weight_shape` - Shape of the weight tensor.
/// * `pool_size` - Pool window edge and pool stride (1 or 2).
///
/// # Returns
///
/// A flattened vector with shape `[batch_size, out_channels, out_h / pool_size, out_w / pool_size]`
/// where `out_h = height - fh + 1` and `out_w = width - fw + 1`.
///
/// # Errors
///
/// Every failure is a precondition violation detected before any tile is
/// computed: rank or channel-count mismatch, bias-length mismatch,
/// non-square filters, channel counts not divisible by the partition width,
/// a pool size other than 1 or 2, an input smaller than the filter, or an
/// output row too wide for one accumulator bank.
pub fn fused_conv2d_maxpool<T: KernelElem>(
    input: &[T],
    weight: &[T],
    bias: &[T],
    input_shape: &[usize],
    weight_shape: &[usize],
    pool_size: usize,
) -> Result<Vec<T>> {
    if input_shape.len() != 4 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![4],
            got: vec![input_shape.len()],
        });
    }
    if weight_shape.len() != 4 {
        return Err(KernelError::ShapeMismatch {
            expected: vec![4],
            got: vec![weight_shape.len()],
        });
    }

    let batch_size = input_shape[0];
    let in_channels = input_shape[1];
    let in_h = input_shape[2];
    let in_w = input_shape[3];

    let out_channels = weight_shape[0];
    let weight_in_channels = weight_shape[1];
    let fh = weight_shape[2];
    let fw = weight_shape[3];

    if in_channels != weight_in_channels {
        return Err(KernelError::ShapeMismatch {
            expected: vec![in_channels],
            got: vec![weight_in_channels],
        });
    }
    if bias.len() != out_channels {
        return Err(KernelError::ShapeMismatch {
            expected: vec![out_channels],
            got: vec![bias.len()],
        });
    }
    if fh != fw {
        return Err(KernelError::Unsupported(format!(
            "filters must be square, got {}x{}",
            fh, fw
        )));
    }
    if pool_size != 1 && pool_size != 2 {
        return Err(KernelError::Unsupported(format!(
            "pool_size must be 1 or 2, got {}",
            pool_size
        )));
    }
    if in_channels % PARTITION_DIM != 0 || out_channels % PARTITION_DIM != 0 {
        return Err(KernelError::Unsupported(format!(
            "channel counts must be multiples of {}, got in={} out={}",
            PARTITION_DIM, in_channels, out_channels
        )));
    }
    if in_h < fh || in_w < fw {
        return Err(KernelError::ShapeMismatch {
            expected: vec![fh, fw],
            got: vec![in_h, in_w],
        });
    }

    let out_h = in_h - fh + 1;
    let out_w = in_w - fw + 1;
    let pooled_h = out_h / pool_size;
    let pooled_w = out_w / pool_size;

    // One accumulator bank must hold one full output row.
    if out_w > MOVING_FREE_MAX {
        return Err(KernelError::CapacityExceeded {
            needed: out_w,
            limit: MOVING_FREE_MAX,
        });
    }

    let num_in_tiles = in_channels / PARTITION_DIM;
    let num_out_tiles = out_channels / PARTITION_DIM;

    // Repack once; read-only and shared across every batch element and row
    // group from here on.
    let packed = repack_weights(weight, weight_shape)?;
    let bias_f32: Vec<f32> = bias.iter().map(|&b| to_f32(b)).collect();

    let out_size = batch_size * out_channels * pooled_h * pooled_w;
    let mut output = vec![T::zero(); out_size];

    // Each (batch, out-channel tile) pair writes a disjoint contiguous
    // output region exactly once, so that is the parallel axis. Every
    // worker owns its own scratch tiles and accumulator bank.
    let region = PARTITION_DIM * pooled_h * pooled_w;
    output
        .par_chunks_mut(region.max(1))
        .enumerate()
        .try_for_each(|(idx, out_region)| -> Result<()> {
            let b = idx / num_out_tiles;
            let out_tile = idx % num_out_tiles;
            let bias_seg = &bias_f32[out_tile * PARTITION_DIM..(out_tile + 1) * PARTITION_DIM];

            // The input window for one raw row: fh contiguous rows of each
            // of the tile's 128 input channels.
            let mut window = ScratchTile::new(PARTITION_DIM, fh * in_w)?;
            // One row group: pool_size raw output rows awaiting reduction.
            let mut group = ScratchTile::new(PARTITION_DIM, pool_size * out_w)?;
            let mut acc = Accumulator::new(PARTITION_DIM, out_w)?;

            for chunk in 0..pooled_h {
                for r in 0..pool_size {
                    let row0 = chunk * pool_size + r;
                    acc.reset();

                    for in_tile in 0..num_in_tiles {
                        for p in 0..PARTITION_DIM {
                            let c = in_tile * PARTITION_DIM + p;
                            let base = ((b * in_channels + c) * in_h + row0) * in_w;
                            window.fill_partition(p, &input[base..base + fh * in_w]);
                        }
                        for i in 0..fh {
                            for j in 0..fw {
                                acc.matmul_acc(
                                    packed.tap(in_tile, out_tile, i, j),
                                    &window,
                                    i * in_w + j,
                                    out_w,
                                )?;
                            }
                        }
                    }

                    // Reduction complete: add bias and park the row in the
                    // group buffer.
                    for p in 0..PARTITION_DIM {
                        let acc_row = acc.row(p);
                        let b_val = bias_seg[p];
                        let dst = &mut group.row_mut(p)[r * out_w..(r + 1) * out_w];
                        for (d, &v) in dst.iter_mut().zip(acc_row) {
                            *d = v + b_val;
                        }
                    }
                }

                // All pool_size rows of the group are filled: reduce each
                // pool_size x pool_size window with max and stream the
                // pooled row out. pool_size == 1 takes the same path with a
                // window of one element.
                for p in 0..PARTITION_DIM {
                    let rows = group.row(p);
                    let dst_base = (p * pooled_h + chunk) * pooled_w;
                    let dst = &mut out_region[dst_base..dst_base + pooled_w];
                    for (q, out_elem) in dst.iter_mut().enumerate() {
                        let mut m = f32::NEG_INFINITY;
                        for r in 0..pool_size {
                            for t in 0..pool_size {
                                let v = rows[r * out_w + q * pool_size + t];
                                if v > m {
                                    m = v;
                                }
                            }
                        }
                        *out_elem = from_f32(m);
                    }
                }
            }
            Ok(())
        })?;

    Ok(output)
}
