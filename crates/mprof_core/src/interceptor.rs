use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use mprof_utils::Stopwatch;
use tracing::debug;

use crate::error::Result;
use crate::identity::MethodIdentity;
use crate::report::Report;
use crate::stats::{MethodStats, StatAccumulator};
use crate::table::MethodTable;

/// Times the calls made to one profiled type.
///
/// Once [wrapped](Interceptor::wrap) into the type's [`MethodTable`], every
/// call to a profiled method is measured while the interceptor is active and
/// forwarded untouched while it is stopped. Stopping never removes the
/// wrapping, so profiling can be paused and resumed cheaply.
pub struct Interceptor {
    table: &'static MethodTable,
    data: Mutex<StatAccumulator>,
    active: AtomicBool,
    record_panics: bool,
}

impl Interceptor {
    /// Creates a stopped, unwrapped interceptor for `table`.
    pub fn new(table: &'static MethodTable) -> Self {
        Self::with_options(table, true)
    }

    pub fn with_options(table: &'static MethodTable, record_panics: bool) -> Self {
        Self {
            table,
            data: Mutex::new(StatAccumulator::new()),
            active: AtomicBool::new(false),
            record_panics,
        }
    }

    pub fn owner(&self) -> &'static str {
        self.table.owner()
    }

    pub fn table(&self) -> &'static MethodTable {
        self.table
    }

    /// Installs this interceptor into its method table.
    ///
    /// Wrapping twice is a no-op. Fails if the table is sealed or already
    /// owned by a different interceptor.
    pub fn wrap(self: &Arc<Self>) -> Result<()> {
        if self.table.install(self)? {
            debug!(
                owner = self.owner(),
                methods = self.table.methods().len(),
                "wrapped methods"
            );
        }
        Ok(())
    }

    /// Removes this interceptor from its method table.
    ///
    /// The methods fall back to plain forwarding. Returns false if the
    /// interceptor was not installed.
    pub fn restore(&self) -> bool {
        let restored = self.table.uninstall(self);
        if restored {
            debug!(owner = self.owner(), "restored methods");
        }
        restored
    }

    pub fn is_wrapped(&self) -> bool {
        self.table.is_hooked_by(self)
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_observing(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Appends one measured call.
    pub fn record(&self, identity: MethodIdentity, duration: Duration) {
        self.data.lock().record(identity, duration);
    }

    /// Finalized statistics for every method called so far.
    pub fn get_data(&self) -> Vec<MethodStats> {
        self.data.lock().finalize()
    }

    pub fn report(&self) -> Report {
        Report::new(self.get_data(), self.owner())
    }

    /// Discards recorded calls without touching the wrapping or active state.
    pub fn reset(&self) {
        self.data.lock().clear();
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("owner", &self.owner())
            .field("active", &self.is_observing())
            .field("wrapped", &self.is_wrapped())
            .finish_non_exhaustive()
    }
}

/// Times one call to a profiled method.
///
/// Generated wrappers hold a guard for the duration of the original body; the
/// elapsed time is recorded when it drops, including while a panic unwinds.
#[must_use]
pub struct CallGuard {
    call: Option<ActiveCall>,
}

struct ActiveCall {
    interceptor: Arc<Interceptor>,
    identity: MethodIdentity,
    stopwatch: Stopwatch,
    // Already unwinding when the call began, e.g. from inside a `Drop` impl.
    unwinding: bool,
}

impl CallGuard {
    pub(crate) fn idle() -> Self {
        Self { call: None }
    }

    pub(crate) fn start(interceptor: Arc<Interceptor>, identity: MethodIdentity) -> Self {
        Self {
            call: Some(ActiveCall {
                interceptor,
                identity,
                stopwatch: Stopwatch::start_new(),
                unwinding: thread::panicking(),
            }),
        }
    }

    /// Whether this call will be recorded
    pub fn is_recording(&self) -> bool {
        self.call.is_some()
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };
        let elapsed = call.stopwatch.elapsed();
        let panicked = thread::panicking() && !call.unwinding;
        if !panicked || call.interceptor.record_panics {
            call.interceptor.record(call.identity, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprof_macros::profiled;

    struct Parser {
        radix: u32,
    }

    #[profiled(crate = "crate")]
    impl Parser {
        fn parse(&self, input: &str) -> std::result::Result<u32, std::num::ParseIntError> {
            u32::from_str_radix(input, self.radix)
        }

        fn explode(&self) -> u32 {
            panic!("parser exploded with radix {}", self.radix)
        }
    }

    struct Quiet;

    #[profiled(crate = "crate")]
    impl Quiet {
        fn fail() {
            panic!("quiet failure")
        }
    }

    struct Worker;

    #[profiled(crate = "crate")]
    impl Worker {
        fn tick(&self) {}
    }

    struct Flusher;

    #[profiled(crate = "crate")]
    impl Flusher {
        fn flush(&self) {}
    }

    struct FlushOnDrop;

    impl Drop for FlushOnDrop {
        fn drop(&mut self) {
            Flusher.flush();
        }
    }

    fn wrapped<T: crate::Instrumented>(record_panics: bool) -> Arc<Interceptor> {
        let interceptor = Arc::new(Interceptor::with_options(T::method_table(), record_panics));
        interceptor.wrap().unwrap();
        interceptor.start();
        interceptor
    }

    #[test]
    fn test_errors_pass_through_and_are_timed() {
        let interceptor = wrapped::<Parser>(true);
        let parser = Parser { radix: 10 };

        assert_eq!(parser.parse("42"), Ok(42));
        let expected = u32::from_str_radix("4x2", 10).unwrap_err();
        assert_eq!(parser.parse("4x2"), Err(expected));

        let data = interceptor.get_data();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].label(), "Parser#parse");
        assert_eq!(data[0].count, 2);

        let caught = std::panic::catch_unwind(|| parser.explode()).unwrap_err();
        assert_eq!(
            caught.downcast_ref::<String>().map(String::as_str),
            Some("parser exploded with radix 10")
        );
        assert_eq!(interceptor.get_data().len(), 2);

        assert!(interceptor.restore());
        assert!(!interceptor.restore());
    }

    #[test]
    fn test_panics_can_be_left_unrecorded() {
        let interceptor = wrapped::<Quiet>(false);

        assert!(std::panic::catch_unwind(Quiet::fail).is_err());
        assert!(interceptor.get_data().is_empty());
        interceptor.restore();
    }

    #[test]
    fn test_concurrent_calls_are_all_recorded() {
        let interceptor = wrapped::<Worker>(true);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let worker = Worker;
                    for _ in 0..250 {
                        worker.tick();
                    }
                });
            }
        });

        let data = interceptor.get_data();
        assert_eq!(data[0].count, 1000);

        interceptor.reset();
        assert!(interceptor.get_data().is_empty());
        assert!(interceptor.is_observing());
        assert!(interceptor.is_wrapped());
        interceptor.restore();
    }

    #[test]
    fn test_calls_made_while_unwinding_are_not_panics() {
        let interceptor = wrapped::<Flusher>(false);

        let outcome: std::thread::Result<()> = std::panic::catch_unwind(|| {
            let _flush = FlushOnDrop;
            panic!("unwinding through a flush");
        });
        assert!(outcome.is_err());
        assert_eq!(interceptor.get_data()[0].count, 1);
        interceptor.restore();
    }
}
