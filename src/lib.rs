//! # nki-rs
//!
//! `nki-rs` is a pure Rust implementation of the fused convolution + max-pool
//! tile kernel found on NeuronCore-style accelerators, designed for
//! understanding how such kernels manage an explicit memory hierarchy.
//!
//! Despite the name, it does not drive real Neuron hardware: everything runs
//! on **CPU**. What it keeps from the hardware model is the structure: bulk
//! tensors in off-chip storage, small fixed-capacity scratch tiles, `f32`
//! accumulator banks, and a convolution decomposed into tile-sized matrix
//! multiplies with the pooling reduction fused into the same pass.
//!
//! ## Modules
//!
//! - [`mod@tensor`]: The bulk-storage tier, an N-dimensional tensor with
//!   explicit shape and strides, and the `conv2d_maxpool` entry point.
//! - [`nn`]: A thin layer wrapper around the fused kernel.
//!
//! The tiled kernels themselves live in the `nki-rs-kernels` member crate.
//!
//! ## Example
//!
//! ```rust
//! use nki_rs::tensor::Tensor;
//!
//! let x = Tensor::<f32, 4>::ones([1, 128, 5, 5]);
//! let w = Tensor::<f32, 4>::ones([128, 128, 3, 3]);
//! let bias = Tensor::<f32, 1>::zeros([128]);
//!
//! let y = x.conv2d_maxpool(&w, &bias, 1).unwrap();
//! assert_eq!(y.shape(), &[1, 128, 3, 3]);
//! ```

/// Macro for creating a Tensor with compile-time shape checking.
///
/// # Examples
///
/// ```rust
/// use nki_rs::tensor;
/// use nki_rs::tensor::Tensor;
///
/// // Works
/// let t = tensor!([1.0, 2.0, 3.0, 4.0], [2, 2]);
///
/// // Fails to compile:
/// // let t = tensor!([1.0, 2.0, 3.0], [2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($data:expr, $shape:expr) => {{
        // Constants to force compile-time evaluation
        const DATA_LEN: usize = $data.len();
        const SHAPE: [usize; $shape.len()] = $shape;
        const EXPECTED_SIZE: usize = {
            let mut size = 1;
            let mut i = 0;
            while i < SHAPE.len() {
                size *= SHAPE[i];
                i += 1;
            }
            size
        };

        // This assertion triggers a compile-time error if false
        const _: () = assert!(
            DATA_LEN == EXPECTED_SIZE,
            "Shape mismatch: data length does not match shape product"
        );

        // Safe to unwrap because we checked at compile time
        $crate::tensor::Tensor::new($data.to_vec(), $shape).unwrap()
    }};
}

pub mod nn;
pub mod tensor;

pub use tensor::Tensor;
