use std::time::{Duration, Instant};

/// Simple stopwatch helper for wall-clock measurements.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start_new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Runs `f` and returns the wall-clock time it took together with its output.
pub fn measure<F, T>(f: F) -> (Duration, T)
where
    F: FnOnce() -> T,
{
    let stopwatch = Stopwatch::start_new();
    let output = f();
    (stopwatch.elapsed(), output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_measure_returns_output() {
        let (elapsed, value) = measure(|| {
            thread::sleep(Duration::from_millis(5));
            21 * 2
        });

        assert_eq!(value, 42);
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_stopwatch_is_monotonic() {
        let stopwatch = Stopwatch::start_new();
        let first = stopwatch.elapsed();
        thread::sleep(Duration::from_millis(1));
        assert!(stopwatch.elapsed() > first);
    }
}
