//! Backend variants.
//!
//! A [`BackendVariant`] is the whole call pipeline for one execution target: its backend, configuration, kernel
//! cache and last-error slot. Variants share no state, so several can coexist in one process.

use std::ffi::c_void;

use aotcall_device::{Backend, Target};
use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::envelope::{CallEnvelope, OutputBuffers, RawEnvelope};
use crate::error::Result;
use crate::invoker::KernelInvoker;
use crate::kernel_cache::{CacheStats, KernelCache};

/// The call pipeline instantiated for one backend.
pub struct BackendVariant<B: Backend> {
    backend: B,
    config: RuntimeConfig,
    entry_point: String,
    cache: Mutex<KernelCache<B::Kernel>>,
    last_error: Mutex<Option<String>>,
}

impl<B: Backend> BackendVariant<B> {
    pub fn new(backend: B, config: RuntimeConfig) -> Self {
        let entry_point = config.entry_point.clone().unwrap_or_else(|| backend.target().entry_point().to_string());
        let cache = Mutex::new(KernelCache::new(config.retention));
        Self { backend, config, entry_point, cache, last_error: Mutex::new(None) }
    }

    pub fn target(&self) -> Target {
        self.backend.target()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Entry point resolved in every artifact this variant loads.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Decode a raw custom call and run it.
    ///
    /// # Safety
    ///
    /// `ins` and `outputs` must follow the custom-call layout described in [`crate::envelope`] and stay valid
    /// until this returns.
    pub unsafe fn call(&self, ins: *const *const c_void, outputs: OutputBuffers) -> Result<()> {
        let raw = unsafe { RawEnvelope::read(ins, outputs)? };
        let call = CallEnvelope::decode(&raw, &self.config)?;
        unsafe { self.invoke(&call) }
    }

    /// Load (or reuse) the call's kernel and run it.
    ///
    /// The cache lock is released before binding; the handle stays locked until its arguments are cleared again.
    ///
    /// # Safety
    ///
    /// Every buffer in `call` must be valid for its argument's byte extent until this returns.
    pub unsafe fn invoke(&self, call: &CallEnvelope) -> Result<()> {
        let handle = self
            .cache
            .lock()
            .load(&call.artifact, |id| self.backend.load_kernel(id.as_path(), &self.entry_point))?;
        let mut handle = handle.lock();
        unsafe { KernelInvoker::invoke(&mut handle, call) }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Remember a failure that could not be returned to the caller.
    pub fn record_failure(&self, message: String) {
        *self.last_error.lock() = Some(message);
    }

    /// The last recorded failure, cleared on read.
    pub fn take_last_error(&self) -> Option<String> {
        self.last_error.lock().take()
    }
}
