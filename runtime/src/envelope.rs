//! Calling-convention decoding.
//!
//! The host passes one opaque array of buffer pointers:
//!
//! ```text
//! in[0]  header           { input_count: u32, output_count: u32 }
//! in[1]  type codes       u32[n]                 n = input_count + output_count
//! in[2]  dimension counts u32[n]
//! in[3]  element counts   u32[n]
//! in[4]  shape table      u32[n * max(dimension counts)], row-major
//! in[5]  artifact         NUL-terminated path
//! in[6..6 + input_count]  input buffers
//! out                     array of output buffers, or the single output buffer
//! ```
//!
//! Decoding happens in two steps. [`RawEnvelope::read`] follows the pointers and borrows the metadata arrays;
//! [`CallEnvelope::decode`] validates everything and builds typed argument descriptors. Nothing is loaded,
//! zero-filled or imported until both succeed.

use std::ffi::{CStr, c_char, c_void};
use std::path::{Path, PathBuf};

use aotcall_device::{MAX_DIMS, Shape};
use aotcall_dtype::ScalarDType;

use crate::config::RuntimeConfig;
use crate::dispatch;
use crate::error::{DecodeSnafu, Result};
use crate::shape::{self, ShapeTable};

/// Slot indices of the positional input array.
pub mod slot {
    pub const HEADER: usize = 0;
    pub const TYPE_CODES: usize = 1;
    pub const DIM_COUNTS: usize = 2;
    pub const ELEMENT_COUNTS: usize = 3;
    pub const SHAPE_TABLE: usize = 4;
    pub const ARTIFACT: usize = 5;
    pub const FIRST_INPUT: usize = 6;
}

/// Output arity of a registered entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// `out` is an array of `output_count` buffer pointers.
    MultiOutput,
    /// `out` is the one output buffer.
    SingleOutput,
}

/// The `out` argument of a custom call.
#[derive(Debug, Clone, Copy)]
pub enum OutputBuffers {
    Multi(*const *mut c_void),
    Single(*mut c_void),
}

impl OutputBuffers {
    pub fn call_shape(&self) -> CallShape {
        match self {
            Self::Multi(_) => CallShape::MultiOutput,
            Self::Single(_) => CallShape::SingleOutput,
        }
    }
}

/// Whether an argument is read or written by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// Identifier of a compiled kernel artifact: an opaque filesystem path, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(PathBuf);

impl ArtifactId {
    pub fn new(id: impl Into<PathBuf>) -> Self {
        Self(id.into())
    }

    /// Build from the raw identifier bytes of a call.
    #[cfg(unix)]
    fn from_c_str(raw: &CStr) -> Result<Self> {
        use std::os::unix::ffi::OsStrExt;
        Ok(Self::new(std::ffi::OsStr::from_bytes(raw.to_bytes())))
    }

    #[cfg(not(unix))]
    fn from_c_str(raw: &CStr) -> Result<Self> {
        let id = raw
            .to_str()
            .map_err(|e| DecodeSnafu { reason: format!("artifact identifier is not UTF-8: {e}") }.build())?;
        Ok(Self::new(id))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The positional envelope with its pointers followed, not yet validated.
#[derive(Debug, Clone)]
pub struct RawEnvelope<'a> {
    pub call_shape: CallShape,
    pub input_count: u32,
    pub output_count: u32,
    pub type_codes: &'a [u32],
    pub dim_counts: &'a [u32],
    pub element_counts: &'a [u32],
    pub shape_table: &'a [u32],
    pub artifact: &'a CStr,
    pub inputs: Vec<*mut u8>,
    pub outputs: Vec<*mut u8>,
}

impl<'a> RawEnvelope<'a> {
    /// Follow the pointers of a custom call.
    ///
    /// Null metadata slots, misaligned arrays and dimension counts above [`MAX_DIMS`] are rejected before the
    /// shape table is sized from them.
    ///
    /// # Safety
    ///
    /// `ins` must point to at least `6 + input_count` slots laid out as described in the module docs, every
    /// metadata array must hold the number of entries the header implies, and `outputs` must hold
    /// `output_count` pointers for [`OutputBuffers::Multi`]. All of it must stay valid for `'a`.
    pub unsafe fn read(ins: *const *const c_void, outputs: OutputBuffers) -> Result<Self> {
        snafu::ensure!(!ins.is_null(), DecodeSnafu { reason: "input pointer array is null" });
        let slot_ptr = |index: usize| unsafe { *ins.add(index) };

        let header = unsafe { read_slice(slot_ptr(slot::HEADER), 2, "header")? };
        let (input_count, output_count) = (header[0], header[1]);
        let n = input_count as usize + output_count as usize;

        let type_codes = unsafe { read_slice(slot_ptr(slot::TYPE_CODES), n, "type codes")? };
        let dim_counts = unsafe { read_slice(slot_ptr(slot::DIM_COUNTS), n, "dimension counts")? };
        check_ranks(dim_counts)?;
        let element_counts = unsafe { read_slice(slot_ptr(slot::ELEMENT_COUNTS), n, "element counts")? };
        let table_len = shape::table_len(dim_counts)?;
        let shape_table = unsafe { read_slice(slot_ptr(slot::SHAPE_TABLE), table_len, "shape table")? };

        let artifact = slot_ptr(slot::ARTIFACT).cast::<c_char>();
        snafu::ensure!(!artifact.is_null(), DecodeSnafu { reason: "artifact identifier is null" });
        let artifact = unsafe { CStr::from_ptr(artifact) };

        let call_shape = outputs.call_shape();
        let inputs =
            (0..input_count as usize).map(|i| slot_ptr(slot::FIRST_INPUT + i).cast_mut().cast::<u8>()).collect();
        let outputs = match outputs {
            OutputBuffers::Multi(out) => {
                snafu::ensure!(
                    output_count == 0 || !out.is_null(),
                    DecodeSnafu { reason: "output pointer array is null" }
                );
                (0..output_count as usize).map(|i| unsafe { *out.add(i) }.cast::<u8>()).collect()
            }
            OutputBuffers::Single(out) => vec![out.cast::<u8>()],
        };

        Ok(Self {
            call_shape,
            input_count,
            output_count,
            type_codes,
            dim_counts,
            element_counts,
            shape_table,
            artifact,
            inputs,
            outputs,
        })
    }
}

/// Borrow `len` `u32`s at `ptr`; empty arrays may be null.
unsafe fn read_slice<'a>(ptr: *const c_void, len: usize, what: &str) -> Result<&'a [u32]> {
    if len == 0 {
        return Ok(&[]);
    }
    let ptr = ptr.cast::<u32>();
    snafu::ensure!(!ptr.is_null(), DecodeSnafu { reason: format!("{what} array is null") });
    snafu::ensure!(ptr.is_aligned(), DecodeSnafu { reason: format!("{what} array is not 4-byte aligned") });
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

fn check_ranks(dim_counts: &[u32]) -> Result<()> {
    if let Some((index, &dims)) = dim_counts.iter().enumerate().find(|&(_, &dims)| dims as usize > MAX_DIMS) {
        return DecodeSnafu { reason: format!("argument {index} has {dims} dimensions, at most {MAX_DIMS} supported") }
            .fail();
    }
    Ok(())
}

/// Typed description of one kernel argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDescriptor {
    /// Position among all arguments (inputs first).
    pub index: usize,
    pub direction: Direction,
    pub dtype: ScalarDType,
    pub element_count: usize,
    /// Effective shape, exactly `dim_count` entries.
    pub shape: Shape,
}

impl ArgumentDescriptor {
    pub fn dim_count(&self) -> usize {
        self.shape.len()
    }

    /// Full byte extent of the argument's buffer.
    pub fn byte_len(&self) -> usize {
        self.dtype.bytes() * self.element_count
    }
}

/// A validated custom call: typed descriptors, buffers and the artifact to run.
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    pub call_shape: CallShape,
    pub input_count: usize,
    pub output_count: usize,
    /// Inputs in index order, then outputs in index order.
    pub arguments: Vec<ArgumentDescriptor>,
    /// One buffer per argument, same order.
    pub buffers: Vec<*mut u8>,
    pub artifact: ArtifactId,
}

impl CallEnvelope {
    /// Validate a raw envelope.
    ///
    /// Checks array lengths against the header, the single-output arity, the artifact identifier, every type
    /// code, ranks, shape / element count consistency (when `config.strict_shapes`) and non-null buffers for
    /// non-empty arguments.
    pub fn decode(raw: &RawEnvelope<'_>, config: &RuntimeConfig) -> Result<Self> {
        let input_count = raw.input_count as usize;
        let output_count = raw.output_count as usize;
        let n = input_count + output_count;

        for (what, len) in [
            ("type codes", raw.type_codes.len()),
            ("dimension counts", raw.dim_counts.len()),
            ("element counts", raw.element_counts.len()),
        ] {
            snafu::ensure!(len == n, DecodeSnafu { reason: format!("{len} {what} for {n} arguments") });
        }
        snafu::ensure!(
            raw.inputs.len() == input_count,
            DecodeSnafu { reason: format!("{} input buffers for {input_count} inputs", raw.inputs.len()) }
        );
        if raw.call_shape == CallShape::SingleOutput {
            snafu::ensure!(
                output_count == 1,
                DecodeSnafu { reason: format!("single-output call declares {output_count} outputs") }
            );
        }
        snafu::ensure!(
            raw.outputs.len() == output_count,
            DecodeSnafu { reason: format!("{} output buffers for {output_count} outputs", raw.outputs.len()) }
        );

        snafu::ensure!(!raw.artifact.is_empty(), DecodeSnafu { reason: "artifact identifier is empty" });
        let artifact = ArtifactId::from_c_str(raw.artifact)?;

        check_ranks(raw.dim_counts)?;
        let table = ShapeTable::new(raw.shape_table, raw.dim_counts)?;

        let buffers: Vec<*mut u8> = raw.inputs.iter().chain(&raw.outputs).copied().collect();
        let mut arguments = Vec::with_capacity(n);
        for (index, buffer) in buffers.iter().enumerate() {
            let dtype = dispatch::lookup(index, raw.type_codes[index])?.dtype;
            let direction = if index < input_count { Direction::Input } else { Direction::Output };
            let shape: Shape = table.shape(index).iter().copied().collect();
            let element_count = raw.element_counts[index] as usize;

            if config.strict_shapes {
                let numel = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d as usize));
                snafu::ensure!(
                    numel.is_some(),
                    DecodeSnafu { reason: format!("argument {index} shape {shape:?} product overflows") }
                );
                snafu::ensure!(
                    numel == Some(element_count),
                    DecodeSnafu {
                        reason: format!("argument {index} has shape {shape:?} but {element_count} elements")
                    }
                );
            }
            let byte_len = element_count.checked_mul(dtype.bytes()).filter(|&len| len <= isize::MAX as usize);
            snafu::ensure!(
                byte_len.is_some(),
                DecodeSnafu { reason: format!("argument {index} byte size overflows") }
            );
            snafu::ensure!(
                !buffer.is_null() || element_count == 0,
                DecodeSnafu { reason: format!("argument {index} buffer is null") }
            );

            arguments.push(ArgumentDescriptor { index, direction, dtype, element_count, shape });
        }

        Ok(Self {
            call_shape: raw.call_shape,
            input_count,
            output_count,
            arguments,
            buffers,
            artifact,
        })
    }

    /// Input descriptors with their buffers, in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = (&ArgumentDescriptor, *mut u8)> {
        self.arguments.iter().zip(self.buffers.iter().copied()).take(self.input_count)
    }

    /// Output descriptors with their buffers, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&ArgumentDescriptor, *mut u8)> {
        self.arguments.iter().zip(self.buffers.iter().copied()).skip(self.input_count)
    }
}
