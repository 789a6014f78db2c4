//! Percentage progress reporting with sub-range composition.
//!
//! Every stage receives a [`Progress`] reporting 0-100. A stage that delegates
//! part of its work hands the delegate a [`Progress::scoped`] handle, so the
//! delegate still reports 0-100 while the parent observes its own sub-range.

use std::{fmt, sync::Arc};

/// Callback receiving a percentage in `0..=100`.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Progress handle passed to stages and collaborators.
#[derive(Clone)]
pub struct Progress {
    sink: Option<ProgressSink>,
    start: f64,
    end: f64,
}

impl Progress {
    /// Creates a handle reporting the full 0-100 range to `sink`.
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
            start: 0.0,
            end: 100.0,
        }
    }

    /// Creates a handle that discards every report.
    pub fn none() -> Self {
        Self {
            sink: None,
            start: 0.0,
            end: 100.0,
        }
    }

    /// Returns a handle whose 0-100 maps linearly onto `start..=end` of this one.
    pub fn scoped(&self, start: u8, end: u8) -> Self {
        let width = self.end - self.start;
        Self {
            sink: self.sink.clone(),
            start: self.start + width * f64::from(start.min(100)) / 100.0,
            end: self.start + width * f64::from(end.min(100)) / 100.0,
        }
    }

    /// Reports a percentage of this handle's range.
    pub fn report(&self, percent: u8) {
        if let Some(sink) = &self.sink {
            let fraction = f64::from(percent.min(100)) / 100.0;
            let mapped = self.start + (self.end - self.start) * fraction;
            sink(mapped.round().clamp(0.0, 100.0) as u8);
        }
    }

    /// Reports `done / total` as a percentage; an empty total counts as complete.
    pub fn report_fraction(&self, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            ((done.min(total) as f64 / total as f64) * 100.0).round() as u8
        };
        self.report(percent);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("observed", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Progress, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(move |p| sink.lock().unwrap().push(p));
        (progress, seen)
    }

    #[test]
    fn scoped_maps_into_sub_range() {
        let (progress, seen) = recorder();
        let archive = progress.scoped(30, 100);
        archive.report(0);
        archive.report(50);
        archive.report(100);
        assert_eq!(*seen.lock().unwrap(), vec![30, 65, 100]);
    }

    #[test]
    fn nested_scopes_compose() {
        let (progress, seen) = recorder();
        progress.scoped(0, 30).scoped(50, 100).report(100);
        progress.scoped(0, 30).scoped(50, 100).report(0);
        assert_eq!(*seen.lock().unwrap(), vec![30, 15]);
    }

    #[test]
    fn fractions_clamp_and_handle_empty_totals() {
        let (progress, seen) = recorder();
        progress.report_fraction(1, 4);
        progress.report_fraction(9, 4);
        progress.report_fraction(0, 0);
        progress.report(250);
        assert_eq!(*seen.lock().unwrap(), vec![25, 100, 100, 100]);
    }
}
