use crate::tensor::{Cpu, Result, Tensor, TensorElem};

/// Fused 2D Convolution + Max-Pool Layer.
///
/// Applies a 2D convolution followed by bias addition and a
/// `pool_size x pool_size` max pool in a single fused pass.
pub struct FusedConvPool2d<T>
where
    T: TensorElem,
{
    pub weight: Tensor<T, 4, Cpu>,
    pub bias: Tensor<T, 1, Cpu>,
    pub pool_size: usize,
}

impl<T> FusedConvPool2d<T>
where
    T: TensorElem,
{
    /// Creates a new layer with zero-initialized parameters.
    ///
    /// # Arguments
    ///
    /// * `in_channels` - Number of channels in the input image (multiple of 128).
    /// * `out_channels` - Number of channels produced by the convolution (multiple of 128).
    /// * `filter_size` - Edge of the square convolving kernel.
    /// * `pool_size` - Pool window edge and pool stride (1 or 2).
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        filter_size: usize,
        pool_size: usize,
    ) -> Self {
        // Shape: [out_channels, in_channels, fH, fW]
        let weight = Tensor::zeros([out_channels, in_channels, filter_size, filter_size]);
        let bias = Tensor::zeros([out_channels]);

        Self {
            weight,
            bias,
            pool_size,
        }
    }

    /// Performs the forward pass.
    pub fn forward(&self, input: &Tensor<T, 4, Cpu>) -> Result<Tensor<T, 4, Cpu>> {
        input.conv2d_maxpool(&self.weight, &self.bias, self.pool_size)
    }
}
