//! Element types understood by the custom-call bridge.
//!
//! The host runtime describes every argument with a small integer type code. This crate owns the fixed
//! 12-entry table mapping those codes to element kinds and storage widths.

pub mod error;
pub mod ext;


pub use error::{Error, Result};
pub use ext::HasDType;

use snafu::OptionExt;

use crate::error::UnsupportedCodeSnafu;

/// Scalar element types, discriminants equal to their wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u32)]
pub enum ScalarDType {
    Int32 = 0,
    Float32 = 1,
    /// 1-bit boolean, stored as one byte.
    Bool = 2,
    UInt8 = 3,
    UInt16 = 4,
    UInt32 = 5,
    UInt64 = 6,
    Int8 = 7,
    Int16 = 8,
    Int64 = 9,
    /// Half precision. Stored and processed as a 32-bit float, see [`ScalarDType::is_widened`].
    Float16 = 10,
    Float64 = 11,
}

impl ScalarDType {
    /// Decode a wire type code.
    pub fn from_code(code: u32) -> Result<Self> {
        Self::from_repr(code).context(UnsupportedCodeSnafu { code })
    }

    /// The wire type code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Storage width in bytes, as laid out in the caller's buffers.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            // Half precision travels in 32-bit slots.
            Self::Float16 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Width in bytes implied by the element kind alone.
    pub const fn nominal_bytes(self) -> usize {
        match self {
            Self::Float16 => 2,
            other => other.bytes(),
        }
    }

    /// True when the storage width differs from the nominal width of the element kind.
    pub const fn is_widened(self) -> bool {
        self.bytes() != self.nominal_bytes()
    }

    /// The type the element is actually stored as.
    pub const fn storage(self) -> Self {
        match self {
            Self::Float16 => Self::Float32,
            other => other,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Lowercase name, e.g. `"float32"`.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u32> for ScalarDType {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        Self::from_code(code)
    }
}
