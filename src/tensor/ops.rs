use super::{Cpu, Result, Tensor, TensorElem, TensorError};
use rayon::prelude::*;
use std::ops::{Add, Div, Mul, Sub};

// Simple macro to implement arithmetic traits
macro_rules! impl_bin_op {
    ($trait:ident, $method:ident) => {
        impl<T, const RANK: usize> $trait for &Tensor<T, RANK, Cpu>
        where
            T: TensorElem,
        {
            type Output = Result<Tensor<T, RANK, Cpu>>;

            fn $method(self, rhs: Self) -> Self::Output {
                if self.shape != rhs.shape {
                    return Err(TensorError::ShapeMismatch {
                        expected: self.shape.to_vec(),
                        got: rhs.shape.to_vec(),
                    });
                }

                let mut out = Tensor::zeros(self.shape);
                // Seamless parallelism using rayon
                out.data
                    .par_iter_mut()
                    .zip(self.data.par_iter())
                    .zip(rhs.data.par_iter())
                    .for_each(|((o, a), b)| {
                        *o = a.$method(*b);
                    });

                Ok(out)
            }
        }
    };
}

impl_bin_op!(Add, add);
impl_bin_op!(Sub, sub);
impl_bin_op!(Mul, mul);
impl_bin_op!(Div, div);

impl<T, const RANK: usize> Tensor<T, RANK, Cpu>
where
    T: TensorElem,
{
    /// Applies a function element-wise.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(T) -> T + Sync + Send,
    {
        let mut out = Tensor::zeros(self.shape);
        out.data
            .par_iter_mut()
            .zip(self.data.par_iter())
            .for_each(|(o, i)| *o = f(*i));
        out
    }
}

impl<T> Tensor<T, 4, Cpu>
where
    T: TensorElem,
{
    /// Fused 2D convolution + max pooling.
    ///
    /// `self` is the input `[batch, in_channels, height, width]`, `weight`
    /// is `[out_channels, in_channels, fh, fw]` and `bias` is
    /// `[out_channels]`. Stride 1, no padding, square filters; `pool_size`
    /// must be 1 or 2 and channel counts must be multiples of the hardware
    /// partition width (128). The result has shape
    /// `[batch, out_channels, out_h / pool_size, out_w / pool_size]`.
    ///
    /// Delegates to the tiled kernel in `nki-rs-kernels`; see
    /// `fused_conv2d_maxpool` there for the memory-hierarchy mechanics.
    pub fn conv2d_maxpool(
        &self,
        weight: &Self,
        bias: &Tensor<T, 1, Cpu>,
        pool_size: usize,
    ) -> Result<Self> {
        let data = nki_rs_kernels::fused_conv2d_maxpool(
            self.data(),
            weight.data(),
            bias.data(),
            self.shape(),
            weight.shape(),
            pool_size,
        )?;

        let [batch, _, in_h, in_w] = *self.shape();
        let [out_channels, _, fh, fw] = *weight.shape();
        let pooled_h = (in_h - fh + 1) / pool_size;
        let pooled_w = (in_w - fw + 1) / pool_size;

        Tensor::new(data, [batch, out_channels, pooled_h, pooled_w])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_ops() {
        let a = Tensor::<f32, 1>::new(vec![1.0, 2.0], [2]).unwrap();
        let b = Tensor::<f32, 1>::new(vec![3.0, 4.0], [2]).unwrap();

        let c = (&a + &b).unwrap();
        assert_eq!(c.data(), &[4.0, 6.0]);

        let d = (&a * &b).unwrap();
        assert_eq!(d.data(), &[3.0, 8.0]);

        let f = Tensor::<f32, 1>::new(vec![1.0, 2.0, 3.0], [3]).unwrap();
        let err = &a + &f;
        assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_map() {
        let a = Tensor::<f32, 1>::new(vec![1.0, -2.0], [2]).unwrap();
        let b = a.map(|v| v * v);
        assert_eq!(b.data(), &[1.0, 4.0]);
    }
}
