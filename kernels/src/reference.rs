//! Straightforward direct-convolution reference.
//!
//! Computes the same `conv -> bias -> max-pool` contract as the fused tiled
//! kernel, but as a plain loop nest over bulk memory. Used by tests and
//! benches as the correctness baseline; it places no divisibility or
//! capacity requirements on its inputs.

use crate::tile::{from_f32, to_f32};
use crate::{KernelElem, KernelError, Result};
use rayon::prelude::*;

/// Direct 2D convolution + bias + max pooling. Stride 1, no padding,
/// square filters. Accumulates in `f32`, adds bias after the full
/// channel/tap reduction, then reduces each `pool_size x pool_size` window
/// with max.
pub fn direct_conv2d_maxpool<T: KernelElem>(
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
    if pool_size == 0 {
        return Err(KernelError::Unsupported(
            "pool_size must be at least 1".to_string(),
        ));
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

    let out_size = batch_size * out_channels * pooled_h * pooled_w;
    let mut output = vec![T::zero(); out_size];

    let in_stride_b = in_channels * in_h * in_w;
    let in_stride_c = in_h * in_w;
    let w_stride_out = in_channels * fh * fw;
    let out_stride_b = out_channels * pooled_h * pooled_w;
    let out_stride_c = pooled_h * pooled_w;

    // Unpooled conv + bias for one output position, in f32.
    let conv_at = |b: usize, oc: usize, oh: usize, ow: usize| -> f32 {
        let mut sum = 0.0f32;
        for ic in 0..in_channels {
            let in_base = b * in_stride_b + ic * in_stride_c;
            let w_base = oc * w_stride_out + ic * fh * fw;
            for kh in 0..fh {
                for kw in 0..fw {
                    let x = to_f32(input[in_base + (oh + kh) * in_w + (ow + kw)]);
                    let w = to_f32(weight[w_base + kh * fw + kw]);
                    sum += x * w;
                }
            }
        }
        sum + to_f32(bias[oc])
    };

    output
        .par_chunks_mut(out_stride_b.max(1))
        .enumerate()
        .for_each(|(b, batch_out)| {
            batch_out
                .par_chunks_mut(out_stride_c.max(1))
                .enumerate()
                .for_each(|(oc, channel_out)| {
                    for ph in 0..pooled_h {
                        for pw in 0..pooled_w {
                            let mut max_val = f32::NEG_INFINITY;
                            for r in 0..pool_size {
                                for t in 0..pool_size {
                                    let v =
                                        conv_at(b, oc, ph * pool_size + r, pw * pool_size + t);
                                    if v > max_val {
                                        max_val = v;
                                    }
                                }
                            }
                            channel_out[ph * pooled_w + pw] = from_f32(max_val);
                        }
                    }
                });
        });

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_hand_computed() {
        // 1x1x3x3 input, 1x1x2x2 filter, bias 0.5, no pooling.
        let x = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let w = vec![1.0f32, 0.0, 0.0, 1.0];
        let bias = vec![0.5f32];

        let out = direct_conv2d_maxpool(&x, &w, &bias, &[1, 1, 3, 3], &[1, 1, 2, 2], 1).unwrap();
        // Each output: x[i, j] + x[i + 1, j + 1] + 0.5
        assert_eq!(out, vec![6.5, 8.5, 12.5, 14.5]);
    }

    #[test]
    fn test_pooled_window_max() {
        let x = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let w = vec![1.0f32, 0.0, 0.0, 1.0];
        let bias = vec![0.0f32];

        let out = direct_conv2d_maxpool(&x, &w, &bias, &[1, 1, 3, 3], &[1, 1, 2, 2], 2).unwrap();
        // Unpooled result is [6, 8, 12, 14]; the single 2x2 window maxes to 14.
        assert_eq!(out, vec![14.0]);
    }

    #[test]
    fn test_rejects_channel_mismatch() {
        let err = direct_conv2d_maxpool(
            &[0.0f32; 9],
            &[0.0f32; 8],
            &[0.0f32; 1],
            &[1, 1, 3, 3],
            &[1, 2, 2, 2],
            1,
        );
        assert!(matches!(err, Err(KernelError::ShapeMismatch { .. })));
    }
}
