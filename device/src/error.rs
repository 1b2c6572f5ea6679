use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The compiled artifact could not be opened.
    #[snafu(display("failed to load artifact {}: {source}", artifact.display()))]
    LibraryLoad { artifact: PathBuf, source: libloading::Error },

    /// The artifact does not export the symbol the target expects.
    #[snafu(display("entry point '{entry_point}' not found in {}: {reason}", artifact.display()))]
    EntryPointNotFound { artifact: PathBuf, entry_point: String, reason: String },

    /// A non-empty memory region was given as a null pointer.
    #[snafu(display("cannot import null pointer as a {size}-byte region"))]
    NullPointer { size: usize },

    /// Shape rank above what the backend array type can carry.
    #[snafu(display("array rank {dims} exceeds the backend limit of {max}"))]
    TooManyDimensions { dims: usize, max: usize },

    /// The backend rejected the argument list or the kernel reported failure.
    #[snafu(display("kernel '{kernel}' failed with status {code}: {message}"))]
    Launch { kernel: String, code: i32, message: String },

    /// Waiting for completion failed.
    #[snafu(display("kernel '{kernel}' failed to synchronize with status {code}"))]
    Sync { kernel: String, code: i32 },

    /// Zero-filling an output region failed.
    #[snafu(display("zero-fill of {size} bytes failed with status {code}"))]
    ZeroFill { size: usize, code: i32 },
}
