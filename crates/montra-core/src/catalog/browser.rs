//! Page fetching seam used by the refresh job
//!
//! The job only needs to open a page, wait for it to load and read its
//! markup. [`HttpBrowser`] does that with a plain HTTP client that presents a
//! mobile user agent; a scripted browser can be plugged in behind the same
//! traits.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// One open page
#[async_trait]
pub trait Page: Send {
    /// Navigate and wait for the document; fails with `Error::Timeout` past `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Markup of the loaded document
    async fn content(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// A running browser session
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>>;

    /// Release the session; pages opened after this fail
    async fn close(&self) -> Result<()>;
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Browser>>;
}

/// A launched browser that is released however its owner finishes
///
/// [`BrowserSession::close`] releases it in place. If the session is dropped
/// first, for example because the task running a refresh was aborted, the
/// release is spawned onto the current runtime instead.
pub struct BrowserSession {
    browser: Arc<dyn Browser>,
    closed: bool,
}

impl BrowserSession {
    pub async fn launch(launcher: &dyn BrowserLauncher) -> Result<Self> {
        Ok(Self {
            browser: Arc::from(launcher.launch().await?),
            closed: false,
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            error!(error = %e, "Failed to close browser session");
        }
        self.closed = true;
    }
}

impl Deref for BrowserSession {
    type Target = dyn Browser;

    fn deref(&self) -> &Self::Target {
        self.browser.as_ref()
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Browser session dropped outside a runtime, not closed");
            return;
        };
        debug!("Browser session dropped before close, releasing in background");
        let browser = self.browser.clone();
        runtime.spawn(async move {
            if let Err(e) = browser.close().await {
                error!(error = %e, "Failed to close browser session");
            }
        });
    }
}

/// Load one page in a throwaway session
///
/// The page and the session are closed whether or not the load succeeds.
pub async fn fetch_markup(launcher: &dyn BrowserLauncher, url: &str, timeout: Duration) -> Result<String> {
    let browser = BrowserSession::launch(launcher).await?;
    let loaded = match browser.new_page().await {
        Ok(mut page) => {
            let loaded = match page.goto(url, timeout).await {
                Ok(()) => page.content().await,
                Err(e) => Err(e),
            };
            if let Err(e) = page.close().await {
                debug!(url, error = %e, "Failed to close page");
            }
            loaded
        }
        Err(e) => Err(e),
    };
    browser.close().await;
    loaded
}

/// Launches [`HttpBrowser`] sessions
#[derive(Clone)]
pub struct HttpBrowserLauncher {
    user_agent: String,
}

impl HttpBrowserLauncher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for HttpBrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| Error::Browser(format!("Failed to start HTTP client: {}", e)))?;
        debug!(user_agent = %self.user_agent, "Browser session started");
        Ok(Box::new(HttpBrowser {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// Browser session backed by an HTTP client
pub struct HttpBrowser {
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Browser("Browser session is closed".into()));
        }
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            document: None,
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Browser session closed");
        Ok(())
    }
}

struct HttpPage {
    client: reqwest::Client,
    document: Option<String>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let load = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Browser(format!("{} returned {}", url, status)));
            }
            Ok::<String, Error>(response.text().await?)
        };

        let body = tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| Error::Timeout(format!("{} did not load within {:?}", url, timeout)))??;
        self.document = Some(body);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.document
            .clone()
            .ok_or_else(|| Error::Browser("No document loaded".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.document = None;
        Ok(())
    }
}
