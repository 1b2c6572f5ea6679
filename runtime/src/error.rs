//! Error types for the call pipeline.

use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while dispatching one custom call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The positional envelope is malformed.
    #[snafu(display("malformed call envelope: {reason}"))]
    Decode { reason: String },

    /// An argument carries a type code outside the dtype table.
    #[snafu(display("argument {index}: {source}"))]
    UnsupportedDType { index: usize, source: aotcall_dtype::Error },

    /// The artifact could not be loaded or lacks its entry point.
    #[snafu(display("failed to load kernel '{artifact}': {source}"))]
    Load { artifact: String, source: aotcall_device::Error },

    /// The backend rejected an argument's memory.
    #[snafu(display("failed to bind argument {index}: {source}"))]
    Bind { index: usize, source: aotcall_device::Error },

    /// The backend reported failure during launch, wait or the post-wait check.
    #[snafu(display("kernel '{kernel}' execution failed: {source}"))]
    Execution { kernel: String, source: aotcall_device::Error },

    /// A panic was caught at the FFI boundary.
    #[snafu(display("panic during custom call: {message}"))]
    Panic { message: String },
}
