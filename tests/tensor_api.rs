use nki_rs::tensor;
use nki_rs::tensor::{Tensor, TensorError};

#[test]
fn test_tensor_macro_and_accessors() {
    let t = tensor!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]);
    assert_eq!(t.shape(), &[2, 3]);
    assert_eq!(t.size(), 6);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_reshape_round_trip() {
    let t = tensor!([0.0f32; 12], [3, 4]);
    let r = t.reshape([2, 2, 3]).unwrap();
    assert_eq!(r.shape(), &[2, 2, 3]);

    let err = r.reshape([5, 2, 1]);
    assert!(matches!(err, Err(TensorError::ShapeMismatch { .. })));
}

#[test]
fn test_elementwise_ops() {
    let a = Tensor::<f32, 2>::ones([2, 2]);
    let b = tensor!([1.0f32, 2.0, 3.0, 4.0], [2, 2]);

    let sum = (&a + &b).unwrap();
    assert_eq!(sum.data(), &[2.0, 3.0, 4.0, 5.0]);

    let diff = (&b - &a).unwrap();
    assert_eq!(diff.data(), &[0.0, 1.0, 2.0, 3.0]);
}
