//! Custom-call registration table.
//!
//! The host runtime registers plain function pointers by name. Each entry dispatches into a process-wide
//! [`BackendVariant`] for its target with one of the two call shapes. Calls that fail cannot return an error
//! through the ABI, so the failure is logged and kept for [`take_last_error`].

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};

use aotcall_device::{NativeBackend, Target};
use once_cell::sync::Lazy;

use crate::config::RuntimeConfig;
use crate::envelope::{CallShape, OutputBuffers};
use crate::error::Error;
use crate::variant::BackendVariant;

/// Signature of a custom-call target.
pub type CustomCallFn = unsafe extern "C" fn(out: *mut c_void, ins: *const *const c_void);

static X64: Lazy<BackendVariant<NativeBackend>> =
    Lazy::new(|| BackendVariant::new(NativeBackend::new(Target::X64), RuntimeConfig::from_env()));

static ARM64: Lazy<BackendVariant<NativeBackend>> =
    Lazy::new(|| BackendVariant::new(NativeBackend::new(Target::Arm64), RuntimeConfig::from_env()));

/// The process-wide variant behind the registered entries for `target`.
///
/// Accelerator calls are not registered here, so [`Target::Gpu`] has none.
pub fn variant(target: Target) -> Option<&'static BackendVariant<NativeBackend>> {
    match target {
        Target::X64 => Some(&X64),
        Target::Arm64 => Some(&ARM64),
        Target::Gpu => None,
    }
}

/// One named entry of the registration table.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub target: Target,
    pub call_shape: CallShape,
    pub function: CustomCallFn,
}

impl Registration {
    /// Untyped pointer for the host's registration capsule.
    pub fn as_ptr(&self) -> *const c_void {
        self.function as *const c_void
    }
}

static REGISTRATIONS: [Registration; 4] = [
    Registration {
        name: "aot_kernel_call_cpu",
        target: Target::X64,
        call_shape: CallShape::MultiOutput,
        function: aot_kernel_call_cpu,
    },
    Registration {
        name: "aot_kernel_call_cpu_single_result",
        target: Target::X64,
        call_shape: CallShape::SingleOutput,
        function: aot_kernel_call_cpu_single_result,
    },
    Registration {
        name: "aot_kernel_call_cpu_arm64",
        target: Target::Arm64,
        call_shape: CallShape::MultiOutput,
        function: aot_kernel_call_cpu_arm64,
    },
    Registration {
        name: "aot_kernel_call_cpu_arm64_single_result",
        target: Target::Arm64,
        call_shape: CallShape::SingleOutput,
        function: aot_kernel_call_cpu_arm64_single_result,
    },
];

/// Every custom-call entry, keyed by name.
pub fn registrations() -> &'static [Registration] {
    &REGISTRATIONS
}

pub fn find(name: &str) -> Option<&'static Registration> {
    REGISTRATIONS.iter().find(|registration| registration.name == name)
}

/// Take the last failure recorded by the variant behind entry `name`.
pub fn take_last_error(name: &str) -> Option<String> {
    find(name).and_then(|registration| variant(registration.target)).and_then(BackendVariant::take_last_error)
}

unsafe fn dispatch(target: Target, call_shape: CallShape, out: *mut c_void, ins: *const *const c_void) {
    let outputs = match call_shape {
        CallShape::MultiOutput => OutputBuffers::Multi(out.cast_const().cast::<*mut c_void>()),
        CallShape::SingleOutput => OutputBuffers::Single(out),
    };

    let Some(variant) = variant(target) else {
        tracing::error!(backend.target = %target, "No custom-call variant for target");
        return;
    };

    let result = catch_unwind(AssertUnwindSafe(|| unsafe { variant.call(ins, outputs) }))
        .unwrap_or_else(|payload| Err(Error::Panic { message: panic_message(payload.as_ref()) }));

    if let Err(error) = result {
        tracing::error!(backend.target = %target, call.shape = ?call_shape, error = %error, "Custom call failed");
        variant.record_failure(error.to_string());
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// x64 CPU, array of output buffers.
///
/// # Safety
///
/// `out` and `ins` must follow the custom-call layout for this entry.
pub unsafe extern "C" fn aot_kernel_call_cpu(out: *mut c_void, ins: *const *const c_void) {
    unsafe { dispatch(Target::X64, CallShape::MultiOutput, out, ins) }
}

/// x64 CPU, one output buffer.
///
/// # Safety
///
/// `out` and `ins` must follow the custom-call layout for this entry.
pub unsafe extern "C" fn aot_kernel_call_cpu_single_result(out: *mut c_void, ins: *const *const c_void) {
    unsafe { dispatch(Target::X64, CallShape::SingleOutput, out, ins) }
}

/// arm64 CPU, array of output buffers.
///
/// # Safety
///
/// `out` and `ins` must follow the custom-call layout for this entry.
pub unsafe extern "C" fn aot_kernel_call_cpu_arm64(out: *mut c_void, ins: *const *const c_void) {
    unsafe { dispatch(Target::Arm64, CallShape::MultiOutput, out, ins) }
}

/// arm64 CPU, one output buffer.
///
/// # Safety
///
/// `out` and `ins` must follow the custom-call layout for this entry.
pub unsafe extern "C" fn aot_kernel_call_cpu_arm64_single_result(out: *mut c_void, ins: *const *const c_void) {
    unsafe { dispatch(Target::Arm64, CallShape::SingleOutput, out, ins) }
}
