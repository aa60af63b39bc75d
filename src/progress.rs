//! Synthetic progress for conversions.
//!
//! The pipeline is a single opaque await: nothing inside it reports granular
//! completion. The progress a caller displays is therefore *cosmetic*. While
//! the work runs, a timer advances the percentage by small random steps up
//! to a cap, and only the real outcome settles it: 100 on success, stop in
//! place on failure. The percentage is feedback that work is happening, not
//! a measurement.
//!
//! # Why a scoped handle?
//!
//! [`SyntheticProgress`] owns the ticker task, so every exit path settles
//! the indicator. [`finish`](SyntheticProgress::finish) jumps to 100,
//! [`fail`](SyntheticProgress::fail) stops where it is, and dropping the
//! handle without settling counts as failure. An early `?` return can never
//! leak a forever-ticking indicator.
//!
//! # Example
//!
//! ```rust
//! use docx2md::{ProgressObserver, ConversionConfig};
//! use std::sync::Arc;
//!
//! struct StderrBar;
//!
//! impl ProgressObserver for StderrBar {
//!     fn on_advance(&self, percent: f32) {
//!         eprintln!("converting… {percent:.0}%");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_observer(Arc::new(StderrBar) as Arc<dyn ProgressObserver>)
//!     .build()
//!     .unwrap();
//! ```

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Smallest synthetic increment per tick, in percent.
const MIN_STEP: f32 = 2.0;
/// Largest synthetic increment per tick, in percent.
const MAX_STEP: f32 = 9.0;

/// Receives synthetic progress events from a running conversion.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; the ticker
/// runs on a spawned task.
///
/// # Ordering
///
/// `on_start` arrives first and exactly one of `on_finish` / `on_fail`
/// arrives last. `on_advance` values never decrease, except that a tick
/// already in flight when the handle settles may deliver one late value.
pub trait ProgressObserver: Send + Sync {
    /// Called once when the indicator should appear.
    fn on_start(&self) {}

    /// Called with the current percentage, in `0.0..=100.0`.
    fn on_advance(&self, percent: f32) {
        let _ = percent;
    }

    /// Called once when the conversion succeeded; follows an
    /// `on_advance(100.0)`.
    fn on_finish(&self) {}

    /// Called once when the conversion failed. The percentage stays wherever
    /// it was; it never reaches 100.
    fn on_fail(&self) {}
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressObserver;

impl ProgressObserver for NoopProgressObserver {}

/// Convenience alias matching the type stored in
/// [`crate::config::ConversionConfig`].
pub type ProgressSink = Arc<dyn ProgressObserver>;

/// Scoped handle over a running synthetic progress ticker.
///
/// Created by [`SyntheticProgress::start`]; the ticker stops when the handle
/// settles or drops, whichever comes first.
pub struct SyntheticProgress {
    sink: ProgressSink,
    ticker: Option<JoinHandle<()>>,
    settled: bool,
}

impl SyntheticProgress {
    /// Show the indicator at zero and start advancing it every `tick` by a
    /// random step of [`MIN_STEP`]..[`MAX_STEP`] percent, saturating at
    /// `cap`.
    pub fn start(sink: ProgressSink, tick: Duration, cap: f32) -> Self {
        sink.on_start();
        sink.on_advance(0.0);

        let ticker_sink = Arc::clone(&sink);
        let ticker = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + tick;
            let mut interval = tokio::time::interval_at(start, tick);
            let mut percent = 0.0f32;
            loop {
                interval.tick().await;
                percent = (percent + rand::rng().random_range(MIN_STEP..MAX_STEP)).min(cap);
                ticker_sink.on_advance(percent);
                if percent >= cap {
                    break;
                }
            }
        });

        Self {
            sink,
            ticker: Some(ticker),
            settled: false,
        }
    }

    /// Settle at 100 percent. Consumes the handle; the ticker stops first so
    /// the full value is the last scheduled one.
    pub fn finish(mut self) {
        self.stop_ticker();
        self.settled = true;
        self.sink.on_advance(100.0);
        self.sink.on_finish();
    }

    /// Stop without completing. The observer's indicator should disappear
    /// without ever claiming 100 percent.
    pub fn fail(mut self) {
        self.stop_ticker();
        self.settled = true;
        self.sink.on_fail();
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for SyntheticProgress {
    fn drop(&mut self) {
        self.stop_ticker();
        if !self.settled {
            self.sink.on_fail();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq, Clone)]
    enum Event {
        Start,
        Advance(f32),
        Finish,
        Fail,
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressObserver for Recorder {
        fn on_start(&self) {
            self.events.lock().unwrap().push(Event::Start);
        }
        fn on_advance(&self, percent: f32) {
            self.events.lock().unwrap().push(Event::Advance(percent));
        }
        fn on_finish(&self) {
            self.events.lock().unwrap().push(Event::Finish);
        }
        fn on_fail(&self) {
            self.events.lock().unwrap().push(Event::Fail);
        }
    }

    /// A tick far longer than any test body, so no synthetic step can race
    /// into the recorded events.
    const SLOW: Duration = Duration::from_secs(600);

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopProgressObserver;
        obs.on_start();
        obs.on_advance(42.0);
        obs.on_finish();
        obs.on_fail();
    }

    #[tokio::test]
    async fn finish_settles_at_one_hundred() {
        let recorder = Arc::new(Recorder::default());
        let handle = SyntheticProgress::start(recorder.clone(), SLOW, 90.0);
        handle.finish();

        assert_eq!(
            recorder.events(),
            vec![
                Event::Start,
                Event::Advance(0.0),
                Event::Advance(100.0),
                Event::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn fail_never_reaches_one_hundred() {
        let recorder = Arc::new(Recorder::default());
        let handle = SyntheticProgress::start(recorder.clone(), SLOW, 90.0);
        handle.fail();

        let events = recorder.events();
        assert_eq!(events.last(), Some(&Event::Fail));
        assert!(!events.contains(&Event::Advance(100.0)));
        assert!(!events.contains(&Event::Finish));
    }

    #[tokio::test]
    async fn dropping_an_unsettled_handle_counts_as_failure() {
        let recorder = Arc::new(Recorder::default());
        {
            let _handle = SyntheticProgress::start(recorder.clone(), SLOW, 90.0);
        }
        assert_eq!(recorder.events().last(), Some(&Event::Fail));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_monotonically_and_saturates() {
        let recorder = Arc::new(Recorder::default());
        let cap = 15.0;
        let handle = SyntheticProgress::start(recorder.clone(), Duration::from_millis(50), cap);

        // 20 ticks at the minimum step is 40 percent, well past the cap.
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let advances: Vec<f32> = recorder
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::Advance(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(advances.len() >= 2, "got: {advances:?}");
        assert!(advances.windows(2).all(|w| w[0] <= w[1]), "got: {advances:?}");
        assert!(advances.iter().all(|p| *p <= cap), "got: {advances:?}");
        assert_eq!(advances.last(), Some(&cap));

        // The ticker parks itself at the cap instead of spinning.
        let seen = recorder.events().len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(recorder.events().len(), seen);

        handle.finish();
        assert_eq!(recorder.events().last(), Some(&Event::Finish));
    }
}
