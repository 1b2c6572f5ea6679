use aotcall_device::Target;
use aotcall_dtype::ScalarDType;

use crate::registry::{find, variant};
use crate::test::helpers::{Buffer, CallFixture};
use crate::{CallShape, registrations, take_last_error};

#[test]
fn test_registration_table() {
    let entries: Vec<_> = registrations().iter().map(|r| (r.name, r.target, r.call_shape)).collect();
    assert_eq!(
        entries,
        [
            ("aot_kernel_call_cpu", Target::X64, CallShape::MultiOutput),
            ("aot_kernel_call_cpu_single_result", Target::X64, CallShape::SingleOutput),
            ("aot_kernel_call_cpu_arm64", Target::Arm64, CallShape::MultiOutput),
            ("aot_kernel_call_cpu_arm64_single_result", Target::Arm64, CallShape::SingleOutput),
        ]
    );
    for registration in registrations() {
        assert!(!registration.as_ptr().is_null());
        assert!(registration.name.starts_with(&format!("aot_kernel_call_{}", registration.target.key())));
    }
    assert!(find("aot_kernel_call_gpu").is_none());
}

#[test]
fn test_variants_use_target_entry_points() {
    assert_eq!(variant(Target::X64).unwrap().entry_point(), "aot_kernel_cpu");
    assert_eq!(variant(Target::Arm64).unwrap().entry_point(), "aot_kernel_arm64");
    assert!(variant(Target::Gpu).is_none());
}

#[test]
fn test_failed_call_is_recorded_not_raised() {
    let mut fixture = CallFixture::new("/nonexistent/kernel.so")
        .input(ScalarDType::Float32, &[2], Buffer::from_f32s(&[1.0, 2.0]))
        .output(ScalarDType::Float32, &[2]);
    let (ins, out) = fixture.pointers(CallShape::MultiOutput);

    let entry = find("aot_kernel_call_cpu").unwrap();
    unsafe { (entry.function)(out, ins) };

    let message = take_last_error("aot_kernel_call_cpu").unwrap();
    assert!(message.contains("/nonexistent/kernel.so"), "{message}");
    assert_eq!(take_last_error("aot_kernel_call_cpu"), None);
}

#[test]
fn test_malformed_call_is_recorded() {
    let entry = find("aot_kernel_call_cpu_arm64_single_result").unwrap();
    unsafe { (entry.function)(std::ptr::null_mut(), std::ptr::null()) };

    let message = take_last_error("aot_kernel_call_cpu_arm64_single_result").unwrap();
    assert!(message.contains("malformed call envelope"), "{message}");
}

#[test]
fn test_unknown_entry_has_no_error() {
    assert_eq!(take_last_error("not_registered"), None);
}
