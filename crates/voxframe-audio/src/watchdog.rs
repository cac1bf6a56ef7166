use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Detects a stalled capture stream.
///
/// The render callback feeds the watchdog on every delivered block; a
/// monitor thread flags and logs when no block has arrived within the
/// timeout. Diagnosis only: the pipeline itself stays silent about
/// missing input, so this is the one place a stall becomes visible.
#[derive(Clone)]
pub struct WatchdogTimer {
    timeout: Duration,
    last_feed: Arc<RwLock<Option<Instant>>>,
    triggered: Arc<AtomicBool>,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl WatchdogTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_feed: Arc::new(RwLock::new(None)),
            triggered: Arc::new(AtomicBool::new(false)),
            handle: Arc::new(RwLock::new(None)),
        }
    }

    pub fn start(&mut self, running: Arc<AtomicBool>) {
        let timeout = self.timeout;
        let last_feed = Arc::clone(&self.last_feed);
        let triggered = Arc::clone(&self.triggered);

        *last_feed.write() = Some(Instant::now());

        let handle = thread::Builder::new()
            .name("capture-watchdog".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(500));

                    let elapsed = last_feed.read().map(|t| t.elapsed());
                    if let Some(elapsed) = elapsed {
                        if elapsed > timeout && !triggered.swap(true, Ordering::SeqCst) {
                            tracing::error!(
                                "Watchdog timeout: no sample blocks for {:?}",
                                elapsed
                            );
                        }
                    }
                }
            });

        match handle {
            Ok(h) => *self.handle.write() = Some(h),
            Err(e) => tracing::error!("Failed to spawn watchdog thread: {}", e),
        }
    }

    /// Called from the render callback; cheap enough for the hot path.
    pub fn feed(&self) {
        *self.last_feed.write() = Some(Instant::now());
        self.triggered.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.write().take() {
            let _ = handle.join();
        }
        self.triggered.store(false, Ordering::SeqCst);
        *self.last_feed.write() = None;
    }
}
