//! Lifecycle management for the shared browser process
//!
//! One browser serves every conversion. It is started lazily on first use,
//! reused while its DevTools connection is alive, and relaunched when the
//! connection has dropped. Concurrent callers that arrive while a launch is in
//! progress wait for that launch instead of starting their own.

use crate::{BrowserEngine, ConversionError, EngineBrowser, Metrics};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

type LaunchFuture = Shared<BoxFuture<'static, Result<Arc<dyn EngineBrowser>, ConversionError>>>;

struct InFlightLaunch {
    generation: u64,
    future: LaunchFuture,
}

#[derive(Default)]
struct ManagerState {
    current: Option<Arc<dyn EngineBrowser>>,
    launching: Option<InFlightLaunch>,
    generation: u64,
}

pub struct BrowserManager {
    engine: Arc<dyn BrowserEngine>,
    state: Mutex<ManagerState>,
    metrics: Arc<Metrics>,
}

impl BrowserManager {
    pub fn new(engine: Arc<dyn BrowserEngine>, metrics: Arc<Metrics>) -> Self {
        Self {
            engine,
            state: Mutex::new(ManagerState::default()),
            metrics,
        }
    }

    /// Return a connected browser, launching one if needed.
    pub async fn acquire(&self) -> Result<Arc<dyn EngineBrowser>, ConversionError> {
        let (generation, launch) = {
            let mut state = self.state.lock().await;

            if let Some(browser) = &state.current {
                if browser.is_connected() {
                    return Ok(browser.clone());
                }
                warn!("Browser connection lost, relaunching");
                state.current = None;
            }

            match &state.launching {
                Some(in_flight) => (in_flight.generation, in_flight.future.clone()),
                None => {
                    state.generation += 1;
                    let engine = self.engine.clone();
                    let future = async move { engine.launch().await }.boxed().shared();
                    state.launching = Some(InFlightLaunch {
                        generation: state.generation,
                        future: future.clone(),
                    });
                    (state.generation, future)
                }
            }
        };

        let result = launch.await;

        let mut state = self.state.lock().await;
        // Only the first waiter to get here settles the launch
        if matches!(&state.launching, Some(in_flight) if in_flight.generation == generation) {
            state.launching = None;
            match &result {
                Ok(browser) => {
                    info!("Browser launched");
                    self.metrics.record_browser_launch(true);
                    state.current = Some(browser.clone());
                }
                Err(e) => {
                    error!("Browser launch failed: {}", e);
                    self.metrics.record_browser_launch(false);
                }
            }
        }

        result
    }

    /// Close the browser process if one is running. Safe to call repeatedly.
    pub async fn teardown(&self) {
        let browser = self.state.lock().await.current.take();

        if let Some(browser) = browser {
            info!("Closing browser");
            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {}", e);
            }
        }
    }

    pub async fn has_browser(&self) -> bool {
        self.state.lock().await.current.is_some()
    }
}
