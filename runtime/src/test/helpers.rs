//! Recording mock backend and custom-call fixtures.

use std::ffi::{CString, c_void};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aotcall_device::{Backend, Error, ImportedMemory, Kernel, MemoryImporter, NdArray, Target};
use aotcall_dtype::ScalarDType;
use parking_lot::Mutex;

use crate::envelope::{CallShape, OutputBuffers, RawEnvelope};

/// What a mock kernel does when launched.
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Write nothing, report success.
    Succeed,
    /// Run a host function over the bound arguments.
    Run(fn(&[NdArray])),
    /// Record a launch failure for the post-wait check.
    FailLaunch,
    /// Fail while waiting.
    FailWait,
    Panic,
}

/// One argument as the kernel saw it at launch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Launched {
    pub dtype: ScalarDType,
    pub shape: Vec<u32>,
    pub ptr: usize,
    pub size: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MockLog {
    pub loads: Vec<PathBuf>,
    pub zero_fills: Vec<usize>,
    pub launches: Vec<Vec<Launched>>,
    pub waits: usize,
}

/// Backend that loads any artifact whose path does not contain `missing`.
#[derive(Clone)]
pub struct MockBackend {
    pub target: Target,
    pub behavior: Behavior,
    pub log: Arc<Mutex<MockLog>>,
}

impl MockBackend {
    pub fn new(behavior: Behavior) -> Self {
        Self { target: Target::X64, behavior, log: Arc::default() }
    }

    pub fn log(&self) -> MockLog {
        self.log.lock().clone()
    }
}

impl Backend for MockBackend {
    type Kernel = MockKernel;

    fn target(&self) -> Target {
        self.target
    }

    fn load_kernel(&self, artifact: &Path, entry_point: &str) -> aotcall_device::Result<MockKernel> {
        if artifact.to_string_lossy().contains("missing") {
            return Err(Error::EntryPointNotFound {
                artifact: artifact.to_path_buf(),
                entry_point: entry_point.to_string(),
                reason: "no such artifact".to_string(),
            });
        }
        self.log.lock().loads.push(artifact.to_path_buf());
        Ok(MockKernel {
            name: format!("{}:{entry_point}", artifact.display()),
            behavior: self.behavior,
            log: Arc::clone(&self.log),
            last_error: None,
        })
    }
}

pub struct MockKernel {
    name: String,
    behavior: Behavior,
    log: Arc<Mutex<MockLog>>,
    last_error: Option<Error>,
}

impl MockKernel {
    pub fn set_behavior(&mut self, behavior: Behavior) {
        self.behavior = behavior;
    }
}

impl MemoryImporter for MockKernel {
    unsafe fn zero_fill(&self, memory: &ImportedMemory) -> aotcall_device::Result<()> {
        self.log.lock().zero_fills.push(memory.size());
        unsafe { memory.zero_host() };
        Ok(())
    }
}

impl Kernel for MockKernel {
    fn name(&self) -> &str {
        &self.name
    }

    unsafe fn launch(&mut self, args: &[NdArray]) -> aotcall_device::Result<()> {
        let launched = args
            .iter()
            .map(|arg| {
                let memory = arg.memory();
                let bytes = if memory.is_empty() {
                    Vec::new()
                } else {
                    unsafe { std::slice::from_raw_parts(memory.as_ptr(), memory.size()) }.to_vec()
                };
                Launched {
                    dtype: arg.dtype(),
                    shape: arg.shape().to_vec(),
                    ptr: memory.as_ptr() as usize,
                    size: memory.size(),
                    bytes,
                }
            })
            .collect();
        self.log.lock().launches.push(launched);

        match self.behavior {
            Behavior::Run(kernel) => kernel(args),
            Behavior::FailLaunch => {
                self.last_error =
                    Some(Error::Launch { kernel: self.name.clone(), code: 7, message: "mock failure".to_string() })
            }
            Behavior::Panic => panic!("mock kernel panicked"),
            Behavior::Succeed | Behavior::FailWait => {}
        }
        Ok(())
    }

    fn wait(&mut self) -> aotcall_device::Result<()> {
        self.log.lock().waits += 1;
        if let Behavior::FailWait = self.behavior {
            return Err(Error::Sync { kernel: self.name.clone(), code: 9 });
        }
        Ok(())
    }

    fn take_last_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }
}

/// Reads an argument's memory as `f32`s.
pub fn f32s(array: &NdArray) -> &[f32] {
    let memory = array.memory();
    if memory.is_empty() {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(memory.as_ptr().cast::<f32>(), memory.size() / 4) }
}

/// Writes `2 * input[0]` into the last argument.
pub fn double_first_into_last(args: &[NdArray]) {
    let (Some(input), Some(output)) = (args.first(), args.last()) else { return };
    let doubled: Vec<f32> = f32s(input).iter().map(|x| 2.0 * x).collect();
    unsafe {
        std::ptr::copy_nonoverlapping(doubled.as_ptr(), output.memory().as_ptr().cast::<f32>(), doubled.len())
    };
}

/// Eight-byte aligned byte buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    words: Vec<u64>,
    len: usize,
}

impl Buffer {
    pub fn zeroed(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(8)], len }
    }

    pub fn filled(len: usize, byte: u8) -> Self {
        let mut buffer = Self::zeroed(len);
        buffer.bytes_mut().fill(byte);
        buffer
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        let mut buffer = Self::zeroed(values.len() * 4);
        for (chunk, value) in buffer.bytes_mut().chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        buffer
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    pub fn f32s(&self) -> Vec<f32> {
        self.bytes().chunks_exact(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast::<u8>()
    }
}

/// One argument of a [`CallFixture`].
#[derive(Debug, Clone)]
pub struct FixtureArg {
    pub code: u32,
    pub shape: Vec<u32>,
    pub element_count: u32,
    pub buffer: Buffer,
}

/// Owns every buffer of a custom call and builds the positional pointer arrays over them.
pub struct CallFixture {
    pub artifact: CString,
    pub inputs: Vec<FixtureArg>,
    pub outputs: Vec<FixtureArg>,
    /// Written into unused shape-table columns.
    pub padding: u32,
    header: [u32; 2],
    type_codes: Vec<u32>,
    dim_counts: Vec<u32>,
    element_counts: Vec<u32>,
    shape_table: Vec<u32>,
    ins: Vec<*const c_void>,
    outs: Vec<*mut c_void>,
}

impl CallFixture {
    pub fn new(artifact: &str) -> Self {
        Self {
            artifact: CString::new(artifact).unwrap(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            padding: 0xDEAD_BEEF,
            header: [0; 2],
            type_codes: Vec::new(),
            dim_counts: Vec::new(),
            element_counts: Vec::new(),
            shape_table: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
        }
    }

    pub fn input(mut self, dtype: ScalarDType, shape: &[u32], buffer: Buffer) -> Self {
        self.inputs.push(FixtureArg { code: dtype.code(), shape: shape.to_vec(), element_count: numel(shape), buffer });
        self
    }

    /// Output pre-filled with `0xAB` garbage.
    pub fn output(mut self, dtype: ScalarDType, shape: &[u32]) -> Self {
        let buffer = Buffer::filled(numel(shape) as usize * dtype.bytes(), 0xAB);
        self.outputs.push(FixtureArg { code: dtype.code(), shape: shape.to_vec(), element_count: numel(shape), buffer });
        self
    }

    /// Build the positional input array and the `out` argument for `call_shape`.
    ///
    /// The pointers stay valid until the fixture is modified or dropped.
    pub fn pointers(&mut self, call_shape: CallShape) -> (*const *const c_void, *mut c_void) {
        let args: Vec<&FixtureArg> = self.inputs.iter().chain(&self.outputs).collect();
        self.header = [self.inputs.len() as u32, self.outputs.len() as u32];
        self.type_codes = args.iter().map(|arg| arg.code).collect();
        self.dim_counts = args.iter().map(|arg| arg.shape.len() as u32).collect();
        self.element_counts = args.iter().map(|arg| arg.element_count).collect();

        let width = self.dim_counts.iter().copied().max().unwrap_or(0) as usize;
        self.shape_table = args
            .iter()
            .flat_map(|arg| arg.shape.iter().copied().chain(std::iter::repeat(self.padding)).take(width))
            .collect();

        self.ins = vec![
            self.header.as_ptr().cast(),
            self.type_codes.as_ptr().cast(),
            self.dim_counts.as_ptr().cast(),
            self.element_counts.as_ptr().cast(),
            self.shape_table.as_ptr().cast(),
            self.artifact.as_ptr().cast(),
        ];
        for input in &mut self.inputs {
            self.ins.push(input.buffer.as_mut_ptr().cast_const().cast());
        }
        self.outs = self.outputs.iter_mut().map(|output| output.buffer.as_mut_ptr().cast()).collect();

        let out = match call_shape {
            CallShape::MultiOutput => self.outs.as_mut_ptr().cast(),
            CallShape::SingleOutput => self.outs.first().copied().unwrap_or(std::ptr::null_mut()),
        };
        (self.ins.as_ptr(), out)
    }

    pub fn output_buffers(&mut self, call_shape: CallShape) -> (*const *const c_void, OutputBuffers) {
        let (ins, out) = self.pointers(call_shape);
        let outputs = match call_shape {
            CallShape::MultiOutput => OutputBuffers::Multi(out.cast_const().cast()),
            CallShape::SingleOutput => OutputBuffers::Single(out),
        };
        (ins, outputs)
    }

    /// Follow the fixture's pointers like a real call would.
    pub fn raw(&mut self, call_shape: CallShape) -> RawEnvelope<'_> {
        let (ins, outputs) = self.output_buffers(call_shape);
        unsafe { RawEnvelope::read(ins, outputs) }.unwrap()
    }
}

pub fn numel(shape: &[u32]) -> u32 {
    shape.iter().product()
}
