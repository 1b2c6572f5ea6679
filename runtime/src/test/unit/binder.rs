use aotcall_device::Backend;
use aotcall_dtype::ScalarDType;
use smallvec::smallvec;

use crate::ArrayViewBinder;
use crate::envelope::{ArgumentDescriptor, Direction};
use crate::test::helpers::{Behavior, Buffer, MockBackend};

fn descriptor(direction: Direction, dtype: ScalarDType, shape: &[u32]) -> ArgumentDescriptor {
    ArgumentDescriptor {
        index: 0,
        direction,
        dtype,
        element_count: shape.iter().product::<u32>() as usize,
        shape: shape.iter().copied().collect(),
    }
}

#[test]
fn test_input_is_imported_verbatim() {
    let backend = MockBackend::new(Behavior::Succeed);
    let kernel = backend.load_kernel("k.so".as_ref(), "entry").unwrap();
    let mut buffer = Buffer::from_f32s(&[1.0, 2.0, 3.0, 4.0]);
    let arg = descriptor(Direction::Input, ScalarDType::Float32, &[2, 2]);

    let array = unsafe { ArrayViewBinder::new(&kernel).bind_input(&arg, buffer.as_mut_ptr()) }.unwrap();
    assert_eq!(array.memory().as_ptr(), buffer.as_mut_ptr());
    assert_eq!(array.memory().size(), 16);
    assert_eq!(array.shape(), &[2, 2]);
    assert_eq!(buffer.f32s(), [1.0, 2.0, 3.0, 4.0]);
    assert!(backend.log().zero_fills.is_empty());
}

#[test]
fn test_output_is_zero_filled_over_full_extent() {
    let backend = MockBackend::new(Behavior::Succeed);
    let kernel = backend.load_kernel("k.so".as_ref(), "entry").unwrap();
    let mut buffer = Buffer::filled(24, 0xAB);
    let arg = descriptor(Direction::Output, ScalarDType::UInt64, &[3]);

    let array = unsafe { ArrayViewBinder::new(&kernel).bind_output(&arg, buffer.as_mut_ptr()) }.unwrap();
    assert_eq!(array.memory().size(), 24);
    assert!(buffer.bytes().iter().all(|&b| b == 0));
    assert_eq!(backend.log().zero_fills, [24]);
}

#[test]
fn test_half_precision_output_zeroes_widened_extent() {
    let backend = MockBackend::new(Behavior::Succeed);
    let kernel = backend.load_kernel("k.so".as_ref(), "entry").unwrap();
    let mut buffer = Buffer::filled(8, 0xAB);
    let arg = descriptor(Direction::Output, ScalarDType::Float16, &[2]);

    unsafe { ArrayViewBinder::new(&kernel).bind_output(&arg, buffer.as_mut_ptr()) }.unwrap();
    assert_eq!(buffer.bytes(), &[0; 8]);
}

#[test]
fn test_null_region_fails_to_bind() {
    let backend = MockBackend::new(Behavior::Succeed);
    let kernel = backend.load_kernel("k.so".as_ref(), "entry").unwrap();
    let arg = ArgumentDescriptor { index: 3, ..descriptor(Direction::Input, ScalarDType::Int32, &[2]) };

    let err = unsafe { ArrayViewBinder::new(&kernel).bind_input(&arg, std::ptr::null_mut()) }.unwrap_err();
    assert!(matches!(err, crate::Error::Bind { index: 3, .. }), "{err}");
}

#[test]
fn test_empty_output_binds_without_writing() {
    let backend = MockBackend::new(Behavior::Succeed);
    let kernel = backend.load_kernel("k.so".as_ref(), "entry").unwrap();
    let arg = ArgumentDescriptor { shape: smallvec![0, 4], ..descriptor(Direction::Output, ScalarDType::Int8, &[0]) };

    let array = unsafe { ArrayViewBinder::new(&kernel).bind_output(&arg, std::ptr::null_mut()) }.unwrap();
    assert!(array.memory().is_empty());
    assert_eq!(array.shape(), &[0, 4]);
}
