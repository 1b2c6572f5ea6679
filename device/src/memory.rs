//! Zero-copy views over caller-owned memory.

use std::ffi::c_void;
use std::ptr::NonNull;

use aotcall_dtype::ScalarDType;
use smallvec::SmallVec;

use crate::error::{Result, TooManyDimensionsSnafu};

/// Maximum rank of a kernel array argument.
pub const MAX_DIMS: usize = 16;

/// Array shape (stack-allocated for 0-4D arrays).
pub type Shape = SmallVec<[u32; 4]>;

/// A raw memory region imported into a backend without copying.
///
/// The region is borrowed from the caller for the duration of one call; dropping it never frees anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportedMemory {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: ImportedMemory is a plain address range. The caller of the custom call guarantees the region stays valid
// until the call returns, and each region is bound to at most one in-flight kernel handle.
unsafe impl Send for ImportedMemory {}

impl ImportedMemory {
    /// Wrap a raw region.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `size` bytes until the region is released.
    pub unsafe fn from_raw(ptr: *mut u8, size: usize) -> Result<Self> {
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None if size == 0 => NonNull::dangling(),
            None => return crate::error::NullPointerSnafu { size }.fail(),
        };
        Ok(Self { ptr, size })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Zero the region by writing through the pointer.
    ///
    /// # Safety
    ///
    /// The region must be host memory, valid for writes and not in use by a running kernel.
    pub unsafe fn zero_host(&self) {
        if !self.is_empty() {
            unsafe { std::ptr::write_bytes(self.as_ptr(), 0, self.size) };
        }
    }
}

/// A typed, shaped array argument over imported memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdArray {
    memory: ImportedMemory,
    shape: Shape,
    dtype: ScalarDType,
}

impl NdArray {
    pub fn new(memory: ImportedMemory, shape: Shape, dtype: ScalarDType) -> Result<Self> {
        snafu::ensure!(shape.len() <= MAX_DIMS, TooManyDimensionsSnafu { dims: shape.len(), max: MAX_DIMS });
        Ok(Self { memory, shape, dtype })
    }

    pub fn memory(&self) -> &ImportedMemory {
        &self.memory
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    pub fn dtype(&self) -> ScalarDType {
        self.dtype
    }

    /// Number of elements implied by the shape.
    pub fn numel(&self) -> usize {
        self.shape.iter().map(|&d| d as usize).product()
    }

    /// C view handed to compiled kernels.
    pub fn to_raw(&self) -> RawNdArray {
        let mut dims = [0u32; MAX_DIMS];
        dims[..self.shape.len()].copy_from_slice(&self.shape);
        RawNdArray {
            data: self.memory.as_ptr().cast::<c_void>(),
            size_bytes: self.memory.size() as u64,
            dtype: self.dtype.code(),
            dim_count: self.shape.len() as u32,
            dims,
        }
    }
}

/// Array argument as seen by a compiled kernel.
///
/// ```c
/// typedef struct {
///     void *data;
///     uint64_t size_bytes;
///     uint32_t dtype;
///     uint32_t dim_count;
///     uint32_t dims[16];
/// } aotcall_ndarray;
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawNdArray {
    pub data: *mut c_void,
    pub size_bytes: u64,
    pub dtype: u32,
    pub dim_count: u32,
    pub dims: [u32; MAX_DIMS],
}
