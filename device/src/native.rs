//! Native shared-library backend.
//!
//! Compiled artifacts are shared libraries loaded via `dlopen`. Each exports the target's conventional entry
//! point plus a few optional runtime hooks:
//!
//! ```c
//! int32_t  <entry_point>(const aotcall_ndarray *args, uint32_t num_args); // required, nonzero = failure
//! int32_t  aotcall_wait(void);                                           // block until completion
//! int32_t  aotcall_zero_fill(void *ptr, uint64_t size);                  // required for device memory
//! uint64_t aotcall_last_error(char *buf, uint64_t capacity);             // message for the last failure
//! ```

use std::ffi::{c_char, c_void};
use std::path::Path;

use snafu::ResultExt;

use crate::device::{Backend, Kernel, MemoryImporter};
use crate::error::{EntryPointNotFoundSnafu, Error, LibraryLoadSnafu, Result, SyncSnafu, ZeroFillSnafu};
use crate::memory::{ImportedMemory, NdArray, RawNdArray};
use crate::target::{MemorySpace, Target};

pub const WAIT_SYMBOL: &str = "aotcall_wait";
pub const ZERO_FILL_SYMBOL: &str = "aotcall_zero_fill";
pub const LAST_ERROR_SYMBOL: &str = "aotcall_last_error";

const MESSAGE_CAPACITY: usize = 1024;

type LaunchFn = unsafe extern "C" fn(*const RawNdArray, u32) -> i32;
type WaitFn = unsafe extern "C" fn() -> i32;
type ZeroFillFn = unsafe extern "C" fn(*mut c_void, u64) -> i32;
type LastErrorFn = unsafe extern "C" fn(*mut c_char, u64) -> u64;

/// Backend loading artifacts as native shared libraries.
#[derive(Debug, Clone, Copy)]
pub struct NativeBackend {
    target: Target,
}

impl NativeBackend {
    pub const fn new(target: Target) -> Self {
        Self { target }
    }
}

impl Backend for NativeBackend {
    type Kernel = NativeKernel;

    fn target(&self) -> Target {
        self.target
    }

    fn load_kernel(&self, artifact: &Path, entry_point: &str) -> Result<NativeKernel> {
        NativeKernel::open(artifact, entry_point, self.target.memory_space())
    }
}

/// A kernel entry point resolved from a loaded shared library.
pub struct NativeKernel {
    /// Keep the library alive (prevents dlclose).
    _lib: libloading::Library,
    launch: LaunchFn,
    wait: Option<WaitFn>,
    zero_fill: Option<ZeroFillFn>,
    last_error_message: Option<LastErrorFn>,
    name: String,
    last_error: Option<Error>,
}

// SAFETY: The function pointers point to read-only code in the loaded library, which stays mapped while `_lib`
// lives. The kernel is only driven by one thread at a time (callers hold the handle lock).
unsafe impl Send for NativeKernel {}

impl NativeKernel {
    /// Open `artifact` and resolve `entry_point` and the optional hooks.
    pub fn open(artifact: &Path, entry_point: &str, memory: MemorySpace) -> Result<Self> {
        let lib = unsafe { libloading::Library::new(artifact) }.context(LibraryLoadSnafu { artifact })?;

        let launch = unsafe {
            let symbol: libloading::Symbol<LaunchFn> = lib.get(entry_point.as_bytes()).map_err(|e| {
                EntryPointNotFoundSnafu { artifact, entry_point, reason: e.to_string() }.build()
            })?;
            *symbol
        };
        let wait = unsafe { optional_symbol::<WaitFn>(&lib, WAIT_SYMBOL) };
        let zero_fill = unsafe { optional_symbol::<ZeroFillFn>(&lib, ZERO_FILL_SYMBOL) };
        let last_error_message = unsafe { optional_symbol::<LastErrorFn>(&lib, LAST_ERROR_SYMBOL) };

        if memory == MemorySpace::Device && zero_fill.is_none() {
            return EntryPointNotFoundSnafu {
                artifact,
                entry_point: ZERO_FILL_SYMBOL,
                reason: "device-memory targets cannot be zero-filled from the host",
            }
            .fail();
        }

        let name = format!("{}:{entry_point}", artifact.display());
        tracing::debug!(
            kernel.name = %name,
            kernel.wait_hook = wait.is_some(),
            kernel.zero_fill_hook = zero_fill.is_some(),
            "Native kernel loaded"
        );

        Ok(Self { _lib: lib, launch, wait, zero_fill, last_error_message, name, last_error: None })
    }

    fn error_message(&self) -> String {
        let Some(last_error) = self.last_error_message else {
            return "kernel exported no error message".to_string();
        };
        let mut buf = vec![0u8; MESSAGE_CAPACITY];
        let written = unsafe { last_error(buf.as_mut_ptr().cast::<c_char>(), MESSAGE_CAPACITY as u64) };
        let len = (written as usize).min(MESSAGE_CAPACITY);
        let end = buf[..len].iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&buf[..end]).into_owned()
    }
}

unsafe fn optional_symbol<T: Copy>(lib: &libloading::Library, name: &str) -> Option<T> {
    unsafe { lib.get::<T>(name.as_bytes()) }.ok().map(|symbol| *symbol)
}

impl MemoryImporter for NativeKernel {
    unsafe fn zero_fill(&self, memory: &ImportedMemory) -> Result<()> {
        match self.zero_fill {
            Some(zero_fill) => {
                let code = unsafe { zero_fill(memory.as_ptr().cast::<c_void>(), memory.size() as u64) };
                snafu::ensure!(code == 0, ZeroFillSnafu { size: memory.size(), code });
                Ok(())
            }
            None => {
                unsafe { memory.zero_host() };
                Ok(())
            }
        }
    }
}

impl Kernel for NativeKernel {
    fn name(&self) -> &str {
        &self.name
    }

    unsafe fn launch(&mut self, args: &[NdArray]) -> Result<()> {
        let raw: Vec<RawNdArray> = args.iter().map(NdArray::to_raw).collect();
        tracing::debug!(kernel.name = %self.name, kernel.num_args = raw.len(), "Launching native kernel");

        let code = unsafe { (self.launch)(raw.as_ptr(), raw.len() as u32) };
        if code != 0 {
            let message = self.error_message();
            self.last_error = Some(Error::Launch { kernel: self.name.clone(), code, message });
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        if let Some(wait) = self.wait {
            let code = unsafe { wait() };
            snafu::ensure!(code == 0, SyncSnafu { kernel: self.name.clone(), code });
        }
        Ok(())
    }

    fn take_last_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }
}
