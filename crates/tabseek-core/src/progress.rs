//! Progress reporting interface shared by loaders and the search scheduler.
//!
//! A sink may be invoked from any worker thread. It must not block: the
//! producer applies no backpressure.

use std::sync::atomic::{AtomicU8, Ordering};

pub trait ProgressSink: Send + Sync {
    /// `percent` is in `0..=100`.
    fn report(&self, message: &str, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, u8) + Send + Sync,
{
    fn report(&self, message: &str, percent: u8) {
        self(message, percent)
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str, _percent: u8) {}
}

/// Maps a child's `0..=100` onto `lo..=hi` of a parent sink and never lets
/// the forwarded percent go backwards, even with concurrent reporters.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    lo: u8,
    hi: u8,
    last: AtomicU8,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, lo: u8, hi: u8) -> Self {
        let hi = hi.min(100);
        let lo = lo.min(hi);
        Self {
            inner,
            lo,
            hi,
            last: AtomicU8::new(lo),
        }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, message: &str, percent: u8) {
        let span = (self.hi - self.lo) as u32;
        let mapped = self.lo + ((percent.min(100) as u32 * span) / 100) as u8;
        let prev = self.last.fetch_max(mapped, Ordering::AcqRel);
        self.inner.report(message, prev.max(mapped));
    }
}
