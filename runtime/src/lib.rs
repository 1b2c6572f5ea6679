//! Custom-call bridge between a host numerical runtime and ahead-of-time compiled kernels.
//!
//! The host hands every call over as an opaque positional array of buffer pointers. This crate decodes it,
//! reconstructs per-argument shapes, dispatches each argument to a typed binder, loads (or reuses) the kernel
//! named by the call and invokes it:
//!
//! ```text
//! RawEnvelope::read -> CallEnvelope::decode -> KernelCache::load -> KernelInvoker::invoke
//!                        (ShapeTable, ScalarDType)                  (ArrayViewBinder, dispatch table)
//! ```
//!
//! [`BackendVariant`] owns one instance of that pipeline per execution target. The `registry` module exposes the
//! process-wide CPU variants as named `extern "C"` entry points.

pub mod binder;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod invoker;
pub mod kernel_cache;
pub mod registry;
pub mod shape;
pub mod variant;


pub use binder::ArrayViewBinder;
pub use config::{RetentionPolicy, RuntimeConfig};
pub use dispatch::TypedBinder;
pub use envelope::{ArgumentDescriptor, ArtifactId, CallEnvelope, CallShape, Direction, OutputBuffers, RawEnvelope};
pub use error::*;
pub use invoker::{InvocationState, KernelInvoker};
pub use kernel_cache::{CacheStats, KernelCache, KernelHandle, SharedHandle};
pub use registry::{Registration, registrations, take_last_error};
pub use shape::ShapeTable;
pub use variant::BackendVariant;
