//! Backend capability traits.
//!
//! The kernel execution engine is external; the bridge only needs it to:
//! - **Load** a compiled artifact and resolve its entry point ([`Backend`])
//! - **Import** caller-owned memory without copying, and zero-fill it ([`MemoryImporter`])
//! - **Launch** a kernel over bound array arguments, **wait** for it and **report** the last error ([`Kernel`])
//!
//! Every backend variant (x64 CPU, arm64 CPU, accelerator) supplies these primitives and shares the rest of the
//! pipeline.

use std::path::Path;

use crate::error::{Error, Result};
use crate::memory::{ImportedMemory, NdArray};
use crate::target::Target;

/// Turns raw caller memory into regions the backend can bind.
///
/// Kept object safe so the typed-binder table can be shared by every backend.
pub trait MemoryImporter {
    /// Import `size` bytes at `ptr` without copying.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `size` bytes for as long as the returned region is bound.
    unsafe fn import_memory(&self, ptr: *mut u8, size: usize) -> Result<ImportedMemory> {
        unsafe { ImportedMemory::from_raw(ptr, size) }
    }

    /// Overwrite the whole region with zero bytes.
    ///
    /// The default writes through the pointer, which is only valid for host memory.
    ///
    /// # Safety
    ///
    /// The region must still be valid and not aliased by a running kernel.
    unsafe fn zero_fill(&self, memory: &ImportedMemory) -> Result<()> {
        unsafe { memory.zero_host() };
        Ok(())
    }
}

/// A loaded, invocable kernel.
pub trait Kernel: MemoryImporter + Send {
    /// Kernel name for logging.
    fn name(&self) -> &str;

    /// Start the kernel over `args`, in positional order.
    ///
    /// Backends may run asynchronously; completion is only guaranteed after [`Kernel::wait`].
    ///
    /// # Safety
    ///
    /// Every region referenced by `args` must be valid until `wait` returns.
    unsafe fn launch(&mut self, args: &[NdArray]) -> Result<()>;

    /// Block until the last launch completed.
    fn wait(&mut self) -> Result<()>;

    /// Take the error the backend recorded since the last call, if any.
    fn take_last_error(&mut self) -> Option<Error>;
}

/// Loads compiled artifacts for one execution target.
pub trait Backend: Send + Sync {
    type Kernel: Kernel;

    fn target(&self) -> Target;

    /// Load the artifact at `artifact` and resolve `entry_point`.
    fn load_kernel(&self, artifact: &Path, entry_point: &str) -> Result<Self::Kernel>;
}
