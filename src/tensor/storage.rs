//! Storage abstraction for Tensors.
//!
//! "Storage" is the container holding a tensor's raw elements. In the
//! memory model of this crate it is the large off-chip tier that the tiled
//! kernels copy from and stream results back to.
//!
//! - **Contiguous memory**: the kernels address bulk data as flat row-major
//!   slices, so storage must expose its elements contiguously.
//! - **Abstraction**: keeping storage behind a trait leaves room for other
//!   backing stores (mmap files, device buffers) without changing the
//!   Tensor API. For the `Cpu` device this is simply `Vec<T>`.

use crate::tensor::TensorElem;
use std::fmt::Debug;

/// A trait for the underlying data storage.
pub trait Storage<T>: Clone + Debug + Send + Sync {
    /// Returns the data as an immutable slice.
    fn as_slice(&self) -> &[T];

    /// Returns the data as a mutable slice.
    fn as_mut_slice(&mut self) -> &mut [T];

    /// Returns the number of elements in the storage.
    fn len(&self) -> usize;

    /// Returns `true` if the storage contains no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: TensorElem> Storage<T> for Vec<T> {
    fn as_slice(&self) -> &[T] {
        self
    }
    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
    fn len(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total<T, S: Storage<T>>(s: &S) -> usize {
        s.len()
    }

    #[test]
    fn test_vec_storage() {
        let mut storage = vec![1.0f32, 2.0, 3.0];
        assert_eq!(Storage::as_slice(&storage), &[1.0, 2.0, 3.0]);
        assert_eq!(total(&storage), 3);

        Storage::as_mut_slice(&mut storage)[0] = 10.0;
        assert_eq!(Storage::as_slice(&storage), &[10.0, 2.0, 3.0]);
    }
}
