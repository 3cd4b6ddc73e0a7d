//! Session-scoped collection of interceptors

use std::cell::RefCell;
use std::ptr;
use std::sync::Arc;

use mprof_config::ProfilerConfig;
use tracing::{debug, warn};

use crate::error::Result;
use crate::interceptor::Interceptor;
use crate::report::Report;
use crate::stats::MethodStats;
use crate::table::{Instrumented, MethodTable};

thread_local! {
    /// Registry behind the crate-level convenience functions, one per thread
    static THREAD_REGISTRY: RefCell<ProfilerRegistry> =
        RefCell::new(ProfilerRegistry::with_config(ProfilerConfig::from_env()));
}

/// Runs `f` with this thread's default registry.
///
/// # Panics
///
/// Panics if called again from inside `f`.
pub fn with_thread_registry<R>(f: impl FnOnce(&mut ProfilerRegistry) -> R) -> R {
    THREAD_REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

/// Owns one interceptor per observed type.
///
/// Dropping or clearing the registry restores every type it wrapped, so the
/// same type can be observed again later by this or another registry.
#[derive(Debug, Default)]
pub struct ProfilerRegistry {
    // Registration order; registries hold a handful of types, so lookups scan.
    interceptors: Vec<Arc<Interceptor>>,
    observing: bool,
    config: ProfilerConfig,
}

impl ProfilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProfilerConfig) -> Self {
        Self {
            interceptors: Vec::new(),
            observing: false,
            config,
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Begins or resumes profiling `T`.
    ///
    /// The first call wraps the type's methods; later calls return the same
    /// interceptor and restart it.
    pub fn observe<T: Instrumented>(&mut self) -> Result<Arc<Interceptor>> {
        self.observe_table(T::method_table())
    }

    pub fn observe_table(&mut self, table: &'static MethodTable) -> Result<Arc<Interceptor>> {
        self.observing = true;

        if let Some(existing) = self.find(table) {
            let existing = Arc::clone(existing);
            self.activate(&existing);
            return Ok(existing);
        }

        let interceptor = Arc::new(Interceptor::with_options(
            table,
            self.config.record_panics,
        ));
        if let Err(err) = interceptor.wrap() {
            warn!(owner = table.owner(), error = %err, "observe failed");
            return Err(err);
        }

        debug!(owner = table.owner(), "observing");
        self.activate(&interceptor);
        self.interceptors.push(Arc::clone(&interceptor));
        Ok(interceptor)
    }

    /// The interceptor for `T`, if it is observed by this registry
    pub fn interceptor<T: Instrumented>(&self) -> Option<Arc<Interceptor>> {
        self.find(T::method_table()).cloned()
    }

    pub fn interceptors(&self) -> &[Arc<Interceptor>] {
        &self.interceptors
    }

    /// True once `observe` has been called on this registry.
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn stop_all(&self) {
        for interceptor in &self.interceptors {
            interceptor.stop();
        }
    }

    /// Stops and restores every observed type, discarding their statistics.
    pub fn clear(&mut self) {
        self.stop_all();
        for interceptor in self.interceptors.drain(..) {
            interceptor.restore();
        }
        debug!("profiler registry cleared");
    }

    pub fn collect_all(&self) -> Vec<MethodStats> {
        self.interceptors
            .iter()
            .flat_map(|interceptor| interceptor.get_data())
            .collect()
    }

    /// Combined report over every observed type, labelled `all`.
    pub fn get_report(&self) -> Report {
        Report::new(self.collect_all(), "all").with_config(self.config.report)
    }

    fn find(&self, table: &'static MethodTable) -> Option<&Arc<Interceptor>> {
        self.interceptors
            .iter()
            .find(|interceptor| ptr::eq(interceptor.table(), table))
    }

    fn activate(&self, interceptor: &Interceptor) {
        if self.config.enabled {
            interceptor.start();
        }
    }
}

impl Drop for ProfilerRegistry {
    fn drop(&mut self) {
        if !self.interceptors.is_empty() {
            self.clear();
        }
    }
}
