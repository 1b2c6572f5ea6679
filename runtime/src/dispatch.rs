//! Type-code dispatch table.
//!
//! One table shared by every backend variant maps each wire type code to a typed binder. A binder knows the
//! storage type of its elements and imports an argument's memory with the matching byte extent; the backend only
//! supplies the [`MemoryImporter`].

use aotcall_device::{MemoryImporter, NdArray};
use aotcall_dtype::{HasDType, ScalarDType};
use snafu::ResultExt;
use strum::EnumCount;

use crate::envelope::ArgumentDescriptor;
use crate::error::{Result, UnsupportedDTypeSnafu};

/// Imports one argument's buffer as an array view.
pub type ImportFn =
    unsafe fn(&dyn MemoryImporter, *mut u8, &ArgumentDescriptor) -> aotcall_device::Result<NdArray>;

/// Typed binder for one wire type code.
#[derive(Debug, Clone, Copy)]
pub struct TypedBinder {
    /// The element kind this binder serves.
    pub dtype: ScalarDType,
    /// The element type the caller's buffer actually holds.
    pub stored_as: ScalarDType,
    /// Storage width in bytes.
    pub width: usize,
    import: ImportFn,
}

impl TypedBinder {
    /// Import `ptr` as an array view described by `arg`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `arg.element_count` elements of this binder's storage type.
    pub unsafe fn import(
        &self,
        importer: &dyn MemoryImporter,
        ptr: *mut u8,
        arg: &ArgumentDescriptor,
    ) -> aotcall_device::Result<NdArray> {
        unsafe { (self.import)(importer, ptr, arg) }
    }
}

unsafe fn import_typed<T: HasDType>(
    importer: &dyn MemoryImporter,
    ptr: *mut u8,
    arg: &ArgumentDescriptor,
) -> aotcall_device::Result<NdArray> {
    let size = std::mem::size_of::<T>() * arg.element_count;
    let memory = unsafe { importer.import_memory(ptr, size)? };
    NdArray::new(memory, arg.shape.clone(), arg.dtype)
}

macro_rules! binder_table {
    ($($dtype:ident => $ty:ty),* $(,)?) => {
        [$(TypedBinder {
            dtype: ScalarDType::$dtype,
            stored_as: <$ty as HasDType>::DTYPE,
            width: std::mem::size_of::<$ty>(),
            import: import_typed::<$ty>,
        }),*]
    };
}

/// Indexed by wire type code.
static TABLE: [TypedBinder; ScalarDType::COUNT] = binder_table![
    Int32 => i32,
    Float32 => f32,
    Bool => bool,
    UInt8 => u8,
    UInt16 => u16,
    UInt32 => u32,
    UInt64 => u64,
    Int8 => i8,
    Int16 => i16,
    Int64 => i64,
    // Half precision is carried in 32-bit float slots.
    Float16 => f32,
    Float64 => f64,
];

/// The binder for a decoded element type.
pub fn binder(dtype: ScalarDType) -> &'static TypedBinder {
    &TABLE[dtype.code() as usize]
}

/// The binder for a raw wire type code of argument `index`.
pub fn lookup(index: usize, code: u32) -> Result<&'static TypedBinder> {
    let dtype = ScalarDType::from_code(code).context(UnsupportedDTypeSnafu { index })?;
    Ok(binder(dtype))
}

/// Every binder, in code order.
pub fn binders() -> &'static [TypedBinder] {
    &TABLE
}
