//! Scoped ownership of one browser page.

use crate::config::SessionConfig;
use crate::console::ConsoleLog;
use crate::driver::{BrowserLauncher, PageDriver};
use crate::network::{InterceptionLog, MockRegistry};
use crate::result::{LifecyclePhase, ProofError, ProofResult};
use std::sync::Arc;

/// One browser, one context, one page.
///
/// A session is opened once and closed once; after [`close`](Self::close)
/// every page accessor returns an error. Dropping an open session logs a
/// warning; the driver's own drop releases what it can, but only `close`
/// reports failures.
#[derive(Debug)]
pub struct Session {
    page: Option<Box<dyn PageDriver>>,
    registry: Arc<MockRegistry>,
    log: InterceptionLog,
    console: ConsoleLog,
    config: SessionConfig,
}

impl Session {
    /// Launch a page and route its traffic through `registry`.
    ///
    /// The registry is frozen from here on. Console output and page errors
    /// are recorded from here on too. If either hook cannot be installed,
    /// the freshly launched page is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid config, or a session
    /// lifecycle error if the browser cannot be launched or prepared.
    pub async fn open<L>(
        launcher: &L,
        config: &SessionConfig,
        registry: Arc<MockRegistry>,
    ) -> ProofResult<Self>
    where
        L: BrowserLauncher + ?Sized,
    {
        config.validate()?;
        tracing::debug!(viewport = %config.viewport, headless = config.headless, "opening session");

        let mut page = launcher.launch(config).await.map_err(|err| match err {
            err @ ProofError::SessionLifecycle { .. } => err,
            other => ProofError::lifecycle(LifecyclePhase::Open, other.to_string()),
        })?;

        let log = InterceptionLog::new();
        let console = ConsoleLog::new();
        let installed = match page
            .install_interception(Arc::clone(&registry), log.clone())
            .await
        {
            Ok(()) => page
                .capture_console(console.clone())
                .await
                .map_err(|err| format!("installing console capture: {err}")),
            Err(err) => Err(format!("installing request interception: {err}")),
        };
        if let Err(message) = installed {
            if let Err(close_err) = page.close().await {
                tracing::warn!(error = %close_err, "close after failed open also failed");
            }
            return Err(ProofError::lifecycle(LifecyclePhase::Open, message));
        }

        Ok(Self {
            page: Some(page),
            registry,
            log,
            console,
            config: config.clone(),
        })
    }

    /// The page
    ///
    /// # Errors
    ///
    /// Returns a driver error once the session is closed.
    pub fn page(&self) -> ProofResult<&dyn PageDriver> {
        self.page
            .as_deref()
            .ok_or_else(|| ProofError::driver("session is closed"))
    }

    /// The page, mutably
    ///
    /// # Errors
    ///
    /// Returns a driver error once the session is closed.
    pub fn page_mut(&mut self) -> ProofResult<&mut (dyn PageDriver + 'static)> {
        match self.page.as_deref_mut() {
            Some(page) => Ok(page),
            None => Err(ProofError::driver("session is closed")),
        }
    }

    /// Whether the page is still open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.page.is_some()
    }

    /// The mock rules this session serves
    #[must_use]
    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    /// Requests seen so far
    #[must_use]
    pub const fn interception_log(&self) -> &InterceptionLog {
        &self.log
    }

    /// Console messages and page errors seen so far
    #[must_use]
    pub const fn console_log(&self) -> &ConsoleLog {
        &self.console
    }

    /// Config the session was opened with
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Release the page. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Returns a session lifecycle error if the first close fails; the
    /// session counts as closed either way.
    pub async fn close(&mut self) -> ProofResult<()> {
        let Some(mut page) = self.page.take() else {
            return Ok(());
        };
        tracing::debug!("closing session");
        page.close().await.map_err(|err| match err {
            err @ ProofError::SessionLifecycle { .. } => err,
            other => ProofError::lifecycle(LifecyclePhase::Close, other.to_string()),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.page.is_some() {
            tracing::warn!("session dropped without close()");
        }
    }
}
