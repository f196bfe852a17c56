//! Frame navigation and timed review playback

use crate::error::{AnnotateError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use vidmark_core::FrameIndex;

/// Current-frame pointer over a fixed-length sequence.
#[derive(Debug, Clone)]
pub struct FrameNavigator {
    current: Option<FrameIndex>,
    frame_count: usize,
}

impl FrameNavigator {
    pub fn new(frame_count: usize) -> Self {
        Self {
            current: None,
            frame_count,
        }
    }

    pub fn current(&self) -> Option<FrameIndex> {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Select `index`. Returns whether the current frame changed.
    pub fn set(&mut self, index: FrameIndex) -> Result<bool> {
        if index >= self.frame_count {
            return Err(AnnotateError::OutOfRangeFrame {
                index,
                frame_count: self.frame_count,
            });
        }
        let changed = self.current != Some(index);
        self.current = Some(index);
        Ok(changed)
    }

    /// Step forward, stopping at the last frame. Does nothing while no
    /// frame is selected.
    pub fn next(&mut self) -> Option<FrameIndex> {
        let current = self.current?;
        self.current = Some((current + 1).min(self.frame_count.saturating_sub(1)));
        self.current
    }

    /// Step back, stopping at frame 0. With no frame selected, selects 0.
    pub fn prev(&mut self) -> Option<FrameIndex> {
        if self.frame_count == 0 {
            return None;
        }
        let prev = self.current.map_or(0, |i| i.saturating_sub(1));
        self.current = Some(prev);
        self.current
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 >= self.frame_count)
    }
}

/// Something the review player can step through.
pub trait FrameCursor: Send + Sync + 'static {
    /// Move to the next frame. Returns `false` when already at the end.
    fn advance(&self) -> bool;
}

#[derive(Debug, Default)]
struct ReviewState {
    running: bool,
    run_id: u64,
}

/// Advances a [`FrameCursor`] at a fixed cadence until the end of the
/// sequence or [`ReviewPlayer::stop`].
pub struct ReviewPlayer {
    interval: Duration,
    state: Arc<Mutex<ReviewState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReviewPlayer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(ReviewState::default())),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Begin playback on the current Tokio runtime. Fails with
    /// [`AnnotateError::NoRuntime`] when called outside one.
    pub fn start(&self, cursor: Arc<dyn FrameCursor>) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| AnnotateError::NoRuntime("review"))?;
        let run_id = {
            let mut state = self.state.lock();
            if state.running {
                return Err(AnnotateError::ReviewActive);
            }
            state.running = true;
            state.run_id += 1;
            state.run_id
        };

        let state = Arc::clone(&self.state);
        let period = self.interval;
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // The advance happens under the state lock, so once stop()
                // returns no further frame change can be observed.
                let mut guard = state.lock();
                if !guard.running || guard.run_id != run_id {
                    break;
                }
                if !cursor.advance() {
                    guard.running = false;
                    debug!("Review reached the last frame");
                    break;
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        info!("Review started ({:?} per frame)", self.interval);
        Ok(())
    }

    /// Halt playback. Safe to call repeatedly; returns whether it was running.
    pub fn stop(&self) -> bool {
        let was_running = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.running, false)
        };
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        if was_running {
            info!("Review stopped");
        }
        was_running
    }
}

impl Drop for ReviewPlayer {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        position: AtomicUsize,
        last: usize,
    }

    impl Counter {
        fn new(last: usize) -> Arc<Self> {
            Arc::new(Self {
                position: AtomicUsize::new(0),
                last,
            })
        }

        fn position(&self) -> usize {
            self.position.load(Ordering::SeqCst)
        }
    }

    impl FrameCursor for Counter {
        fn advance(&self) -> bool {
            let current = self.position.load(Ordering::SeqCst);
            if current >= self.last {
                return false;
            }
            self.position.store(current + 1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_navigator_set() {
        let mut nav = FrameNavigator::new(5);
        assert_eq!(nav.current(), None);
        assert!(nav.set(2).unwrap());
        assert!(!nav.set(2).unwrap());
        assert!(matches!(
            nav.set(5),
            Err(AnnotateError::OutOfRangeFrame { index: 5, frame_count: 5 })
        ));
        assert_eq!(nav.current(), Some(2));
    }

    #[test]
    fn test_navigator_clamps() {
        let mut nav = FrameNavigator::new(3);
        assert_eq!(nav.next(), None);
        assert_eq!(nav.current(), None);
        assert_eq!(nav.prev(), Some(0));
        assert_eq!(nav.prev(), Some(0));
        assert_eq!(nav.next(), Some(1));
        assert_eq!(nav.next(), Some(2));
        assert_eq!(nav.next(), Some(2));
        assert!(nav.is_at_end());

        let mut empty = FrameNavigator::new(0);
        assert_eq!(empty.next(), None);
        assert_eq!(empty.prev(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_advances_on_cadence() {
        let player = ReviewPlayer::new(Duration::from_millis(500));
        let cursor = Counter::new(100);
        player.start(cursor.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cursor.position(), 0);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(cursor.position(), 2);
        assert!(player.is_running());
        player.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_stop_is_final_and_idempotent() {
        let player = ReviewPlayer::new(Duration::from_millis(500));
        let cursor = Counter::new(100);
        player.start(cursor.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert!(player.stop());
        let stopped_at = cursor.position();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cursor.position(), stopped_at);
        assert!(!player.stop());
        assert!(!player.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_ends_at_last_frame() {
        let player = ReviewPlayer::new(Duration::from_millis(500));
        let cursor = Counter::new(3);
        player.start(cursor.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cursor.position(), 3);
        assert!(!player.is_running());
    }

    #[test]
    fn test_review_needs_runtime() {
        let player = ReviewPlayer::new(Duration::from_millis(500));
        assert!(matches!(
            player.start(Counter::new(10)),
            Err(AnnotateError::NoRuntime(_))
        ));
        assert!(!player.is_running());
        assert!(!player.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_rejects_double_start() {
        let player = ReviewPlayer::new(Duration::from_millis(500));
        player.start(Counter::new(10)).unwrap();
        assert!(matches!(
            player.start(Counter::new(10)),
            Err(AnnotateError::ReviewActive)
        ));
        player.stop();
        assert!(player.start(Counter::new(10)).is_ok());
        player.stop();
    }
}
