//! Per-method wall-clock profiling.
//!
//! Annotate an inherent `impl` block with [`profiled`], observe the type
//! through a [`ProfilerRegistry`] (or the thread's default registry via the
//! functions below) and read the collected timings back as a [`Report`].
//!
//! ```rust,ignore
//! use method_profiler::profiled;
//!
//! struct Index;
//!
//! #[profiled]
//! impl Index {
//!     pub fn build() -> Self { Index }
//!     pub fn lookup(&self, key: &str) -> usize { key.len() }
//! }
//!
//! method_profiler::observe::<Index>()?;
//! Index::build().lookup("otter");
//! println!("{}", method_profiler::get_report());
//! ```

use std::sync::Arc;

pub use mprof_config::{ConfigError, ProfilerConfig, ReportConfig, SortKey, SortOrder};
pub use mprof_core::{
    CallGuard, Instrumented, Interceptor, MethodDecl, MethodIdentity, MethodKind, MethodStats,
    MethodTable, ProfilerError, ProfilerRegistry, Report, ReportRow, Result, StatAccumulator,
    with_thread_registry as with_registry,
};
pub use mprof_macros::profiled;
pub use mprof_utils::init_logging;

/// Observe `T` in this thread's registry.
pub fn observe<T: Instrumented>() -> Result<Arc<Interceptor>> {
    with_registry(ProfilerRegistry::observe::<T>)
}

/// Pause every interceptor in this thread's registry.
pub fn stop_all() {
    with_registry(|registry| registry.stop_all());
}

/// Restore every type observed by this thread's registry and drop its data.
pub fn clear() {
    with_registry(ProfilerRegistry::clear);
}

pub fn get_report() -> Report {
    with_registry(|registry| registry.get_report())
}
