//! Backend capability layer for the custom-call kernel bridge.
//!
//! Abstracts the kernel execution engine behind three primitives (import memory, launch, wait) and ships a
//! native shared-library implementation.

pub mod device;
pub mod error;
pub mod memory;
pub mod native;
pub mod target;


pub use device::{Backend, Kernel, MemoryImporter};
pub use error::{Error, Result};
pub use memory::{ImportedMemory, MAX_DIMS, NdArray, RawNdArray, Shape};
pub use native::{NativeBackend, NativeKernel};
pub use target::{MemorySpace, Target};
