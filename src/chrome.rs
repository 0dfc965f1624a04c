//! Chromium binding for the engine traits, built on `chromiumoxide`.

use crate::{
    create_browser_config, BrowserEngine, Config, ConversionError, EngineBrowser, PrintParams,
    RenderingSurface, WaitUntil,
};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Resolves once the document has finished loading, including when the load
/// event fired before this script ran.
const DOCUMENT_COMPLETE_JS: &str = r#"new Promise((resolve) => {
    if (document.readyState === 'complete') {
        resolve(true);
    } else {
        window.addEventListener('load', () => resolve(true), { once: true });
    }
})"#;

/// Launches headless Chromium processes.
pub struct ChromeEngine {
    config: Config,
}

impl ChromeEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn launch(&self) -> Result<Arc<dyn EngineBrowser>, ConversionError> {
        let browser_config = create_browser_config(&self.config)?;

        info!("Launching headless Chrome");
        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ConversionError::BrowserLaunchFailed(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_task = tokio::spawn(drive_handler(handler, alive.clone()));

        Ok(Arc::new(ChromeBrowser {
            browser: Mutex::new(browser),
            handler: handler_task,
            alive,
            network_idle_window: self.config.network_idle_window,
        }))
    }
}

/// Poll the CDP handler until the connection fails or ends, then mark the
/// browser as gone.
///
/// The handler must be polled for the DevTools connection to make progress.
/// After the websocket drops it may stay pending forever instead of ending,
/// so the first error is treated as a lost connection.
async fn drive_handler<S, T, E>(mut handler: S, alive: Arc<AtomicBool>)
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        match handler.next().await {
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("CDP handler error, dropping browser connection: {}", e);
                break;
            }
            None => {
                info!("CDP handler stream ended");
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
}

pub struct ChromeBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    network_idle_window: Duration,
}

#[async_trait]
impl EngineBrowser for ChromeBrowser {
    fn is_connected(&self) -> bool {
        if !self.alive.load(Ordering::SeqCst) || self.handler.is_finished() {
            return false;
        }

        // A clean shutdown of the child can leave the handler pending, so
        // also ask whether the process has exited. Busy means in use.
        match self.browser.try_lock() {
            Ok(mut browser) => matches!(browser.try_wait(), Ok(None)),
            Err(_) => true,
        }
    }

    async fn open_surface(&self) -> Result<Box<dyn RenderingSurface>, ConversionError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| ConversionError::PageError(e.to_string()))?;

        Ok(Box::new(ChromeSurface {
            page,
            network_idle_window: self.network_idle_window,
        }))
    }

    async fn close(&self) -> Result<(), ConversionError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ConversionError::PageError(format!("failed to close browser: {e}")));

        if closed.is_ok() {
            if let Err(e) = browser.wait().await {
                warn!("Waiting for browser process exit failed: {}", e);
            }
        }
        self.handler.abort();
        self.alive.store(false, Ordering::SeqCst);
        closed
    }
}

pub struct ChromeSurface {
    page: Page,
    network_idle_window: Duration,
}

impl ChromeSurface {
    async fn watch_network(&self, wait_until: WaitUntil) -> Result<Option<NetworkIdleWatcher>, ConversionError> {
        match wait_until {
            WaitUntil::Load => Ok(None),
            WaitUntil::NetworkIdle => NetworkIdleWatcher::subscribe(&self.page).await.map(Some),
        }
    }
}

#[async_trait]
impl RenderingSurface for ChromeSurface {
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<(), ConversionError> {
        // Subscribe before navigating so no request slips past the watcher
        let watcher = self.watch_network(wait_until).await?;

        self.page
            .goto(url)
            .await
            .map_err(|e| ConversionError::Navigation(format!("{url}: {e}")))?;

        if let Some(watcher) = watcher {
            watcher.wait_for_idle(self.network_idle_window).await;
        }
        Ok(())
    }

    async fn set_content(&mut self, html: &str, wait_until: WaitUntil) -> Result<(), ConversionError> {
        let watcher = self.watch_network(wait_until).await?;

        self.page
            .set_content(html)
            .await
            .map_err(|e| ConversionError::Navigation(format!("setting page content: {e}")))?;

        if let Some(watcher) = watcher {
            watcher.wait_for_idle(self.network_idle_window).await;
        }
        Ok(())
    }

    async fn wait_for_document_complete(&mut self) -> Result<(), ConversionError> {
        let params = EvaluateParams::builder()
            .expression(DOCUMENT_COMPLETE_JS)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(ConversionError::PageError)?;

        self.page
            .evaluate_expression(params)
            .await
            .map(|_| ())
            .map_err(|e| ConversionError::PageError(format!("waiting for document readiness: {e}")))
    }

    async fn print_to_pdf(&mut self, params: &PrintParams, output: &Path) -> Result<(), ConversionError> {
        let bytes = self
            .page
            .save_pdf(to_cdp_params(params), output)
            .await
            .map_err(|e| ConversionError::RenderFailed(e.to_string()))?;

        debug!(bytes = bytes.len(), path = %output.display(), "PDF written");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConversionError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ConversionError::PageError(format!("failed to close page: {e}")))
    }
}

pub fn to_cdp_params(params: &PrintParams) -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(params.landscape),
        display_header_footer: Some(params.display_header_footer),
        print_background: Some(params.print_background),
        scale: Some(params.scale),
        paper_width: Some(params.paper_width),
        paper_height: Some(params.paper_height),
        margin_top: Some(params.margin_top),
        margin_bottom: Some(params.margin_bottom),
        margin_left: Some(params.margin_left),
        margin_right: Some(params.margin_right),
        header_template: params.header_template.clone(),
        footer_template: params.footer_template.clone(),
        prefer_css_page_size: Some(params.prefer_css_page_size),
        ..Default::default()
    }
}

enum NetworkActivity {
    Started(String),
    Settled(String),
}

/// Tracks in-flight requests of one page to detect network idleness.
struct NetworkIdleWatcher {
    events: BoxStream<'static, NetworkActivity>,
}

impl NetworkIdleWatcher {
    async fn subscribe(page: &Page) -> Result<Self, ConversionError> {
        let listen_err = |e: chromiumoxide::error::CdpError| {
            ConversionError::PageError(format!("subscribing to network events: {e}"))
        };

        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen_err)?
            .map(|ev| NetworkActivity::Started(ev.request_id.inner().clone()));
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen_err)?
            .map(|ev| NetworkActivity::Settled(ev.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen_err)?
            .map(|ev| NetworkActivity::Settled(ev.request_id.inner().clone()));

        Ok(Self {
            events: stream::select_all(vec![started.boxed(), finished.boxed(), failed.boxed()]).boxed(),
        })
    }

    /// Returns once no request has been in flight for `window`.
    ///
    /// Unbounded on its own; the caller's deadline limits it.
    async fn wait_for_idle(mut self, window: Duration) {
        let mut in_flight = HashSet::new();

        loop {
            let next = if in_flight.is_empty() {
                match tokio::time::timeout(window, self.events.next()).await {
                    Ok(next) => next,
                    Err(_) => return,
                }
            } else {
                self.events.next().await
            };

            match next {
                Some(NetworkActivity::Started(id)) => {
                    in_flight.insert(id);
                }
                Some(NetworkActivity::Settled(id)) => {
                    in_flight.remove(&id);
                }
                // Page went away; nothing left to wait for
                None => return,
            }
        }
    }
}
