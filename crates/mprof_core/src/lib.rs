//! Interception and aggregation engine
//!
//! Types opt in with the `#[profiled]` attribute, which records their methods
//! in a static [`MethodTable`] and routes every call through
//! [`MethodTable::enter`]. A [`ProfilerRegistry`] installs an
//! [`Interceptor`] into that table; while the interceptor is active each call
//! is timed and its duration is accumulated per [`MethodIdentity`].

pub mod error;
pub mod identity;
pub mod interceptor;
pub mod registry;
pub mod report;
pub mod stats;
pub mod table;

pub use error::{ProfilerError, Result};
pub use identity::MethodIdentity;
pub use interceptor::{CallGuard, Interceptor};
pub use registry::{ProfilerRegistry, with_thread_registry};
pub use report::{Report, ReportRow};
pub use stats::{MethodStats, StatAccumulator};
pub use table::{Instrumented, MethodDecl, MethodKind, MethodTable};

pub use mprof_config::{ProfilerConfig, ReportConfig, SortKey, SortOrder};
