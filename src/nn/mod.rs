//! Neural network layer wrappers over the tiled kernels.

pub mod conv;

pub use conv::FusedConvPool2d;
