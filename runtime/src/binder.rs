//! Array view binding.

use aotcall_device::{Kernel, MemoryImporter, NdArray};
use snafu::ResultExt;

use crate::dispatch;
use crate::envelope::{ArgumentDescriptor, Direction};
use crate::error::{BindSnafu, Result};

/// Turns decoded arguments into backend array views, zero-filling outputs first.
pub struct ArrayViewBinder<'k, K: Kernel> {
    kernel: &'k K,
}

impl<'k, K: Kernel> ArrayViewBinder<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        Self { kernel }
    }

    /// Import an input buffer without copying or touching it.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `arg.byte_len()` bytes until the kernel has completed.
    pub unsafe fn bind_input(&self, arg: &ArgumentDescriptor, ptr: *mut u8) -> Result<NdArray> {
        unsafe { self.bind(arg, ptr) }
    }

    /// Import an output buffer and zero its full byte extent.
    ///
    /// # Safety
    ///
    /// Same as [`ArrayViewBinder::bind_input`]; the buffer must also be writable.
    pub unsafe fn bind_output(&self, arg: &ArgumentDescriptor, ptr: *mut u8) -> Result<NdArray> {
        let array = unsafe { self.bind(arg, ptr)? };
        unsafe { self.kernel.zero_fill(array.memory()) }.context(BindSnafu { index: arg.index })?;
        Ok(array)
    }

    unsafe fn bind(&self, arg: &ArgumentDescriptor, ptr: *mut u8) -> Result<NdArray> {
        let binder = dispatch::binder(arg.dtype);
        if arg.dtype.is_widened() {
            tracing::warn!(
                arg.index = arg.index,
                arg.dtype = %arg.dtype,
                stored_as = %binder.stored_as,
                "Binding half-precision argument as 32-bit float storage"
            );
        }
        tracing::trace!(
            arg.index = arg.index,
            arg.output = arg.direction == Direction::Output,
            arg.dtype = %arg.dtype,
            arg.shape = ?arg.shape,
            arg.bytes = arg.byte_len(),
            "Binding argument"
        );
        let importer: &dyn MemoryImporter = self.kernel;
        unsafe { binder.import(importer, ptr, arg) }.context(BindSnafu { index: arg.index })
    }
}
