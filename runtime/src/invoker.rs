//! Kernel invocation.
//!
//! One call on a handle:
//!
//! ```text
//! Ready -> bind inputs, bind outputs -> Bound -> launch + wait -> Executing -> clear -> Ready
//!                                                                          \-> Failed (error surfaced)
//! ```
//!
//! Bound arguments are cleared before and after every call, so a handle never carries views of a previous
//! caller's memory.

use aotcall_device::Kernel;
use snafu::ResultExt;

use crate::binder::ArrayViewBinder;
use crate::envelope::CallEnvelope;
use crate::error::{Error, ExecutionSnafu, Result};
use crate::kernel_cache::KernelHandle;

/// Where a handle is in its current invocation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum InvocationState {
    Ready,
    Bound,
    Executing,
    /// The last call failed; the next call starts over from a cleared handle.
    Failed,
}

/// Drives one call through bind, launch and wait.
pub struct KernelInvoker;

impl KernelInvoker {
    /// Bind every argument of `call` to `handle` in declared order, launch, block until completion and surface
    /// the first backend error.
    ///
    /// Outputs are zero-filled while binding, so on failure they hold zeros (or whatever the kernel wrote).
    ///
    /// # Safety
    ///
    /// Every buffer in `call` must be valid for its argument's byte extent for the duration of the call.
    #[tracing::instrument(
        skip_all,
        fields(artifact = %call.artifact, inputs = call.input_count, outputs = call.output_count)
    )]
    pub unsafe fn invoke<K: Kernel>(handle: &mut KernelHandle<K>, call: &CallEnvelope) -> Result<()> {
        handle.clear_args();
        handle.state = InvocationState::Ready;

        let result = unsafe { Self::bind_and_launch(handle, call) };
        handle.clear_args();
        handle.state = if result.is_ok() { InvocationState::Ready } else { InvocationState::Failed };
        result
    }

    unsafe fn bind_and_launch<K: Kernel>(handle: &mut KernelHandle<K>, call: &CallEnvelope) -> Result<()> {
        let binder = ArrayViewBinder::new(&handle.kernel);
        for (arg, ptr) in call.inputs() {
            handle.args.push(unsafe { binder.bind_input(arg, ptr)? });
        }
        for (arg, ptr) in call.outputs() {
            handle.args.push(unsafe { binder.bind_output(arg, ptr)? });
        }
        handle.state = InvocationState::Bound;

        let kernel = handle.kernel.name().to_string();
        tracing::debug!(kernel.name = %kernel, kernel.num_args = handle.args.len(), "Launching kernel");

        handle.state = InvocationState::Executing;
        unsafe { handle.kernel.launch(&handle.args) }.context(ExecutionSnafu { kernel: kernel.clone() })?;
        let waited = handle.kernel.wait();

        // A failure recorded during launch precedes anything the wait reports.
        if let Some(source) = handle.kernel.take_last_error() {
            return Err(Error::Execution { kernel, source });
        }
        waited.context(ExecutionSnafu { kernel })
    }
}
