//! Execution targets a backend variant can be instantiated for.

/// Where argument buffers live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    /// Host memory, writable from the calling thread.
    Host,
    /// Accelerator memory, only reachable through the backend.
    Device,
}

/// Execution target of a backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::VariantArray)]
pub enum Target {
    /// Generic 64-bit x86 CPU.
    X64,
    /// 64-bit ARM CPU.
    Arm64,
    /// Accelerator.
    Gpu,
}

impl Target {
    /// Conventional entry point every artifact compiled for this target exports.
    pub const fn entry_point(self) -> &'static str {
        match self {
            Self::X64 => "aot_kernel_cpu",
            Self::Arm64 => "aot_kernel_arm64",
            Self::Gpu => "aot_kernel_gpu",
        }
    }

    /// Stem used in registration keys, e.g. `aot_kernel_call_cpu_arm64`.
    pub const fn key(self) -> &'static str {
        match self {
            Self::X64 => "cpu",
            Self::Arm64 => "cpu_arm64",
            Self::Gpu => "gpu",
        }
    }

    pub const fn memory_space(self) -> MemorySpace {
        match self {
            Self::X64 | Self::Arm64 => MemorySpace::Host,
            Self::Gpu => MemorySpace::Device,
        }
    }

    /// CPU target matching the architecture this crate was built for, if any.
    pub const fn host() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::X64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Arm64)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
