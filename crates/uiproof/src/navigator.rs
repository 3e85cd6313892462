//! Page loads and ready conditions.

use crate::config::HarnessConfig;
use crate::driver::PageDriver;
use crate::locator::Selector;
use crate::result::{ProofError, ProofResult};
use crate::session::Session;
use crate::wait::{poll_until, Polled, Check, ReadyCondition};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// What a successful navigation reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResult {
    /// Document status, if the driver reported one
    pub status: Option<u16>,
    /// URL once ready
    pub final_url: String,
    /// Time from request to ready
    pub elapsed_ms: u64,
}

/// Drives page loads
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    config: &'a HarnessConfig,
}

impl<'a> Navigator<'a> {
    /// Navigator using `config` for base URL, default ready condition and polling
    #[must_use]
    pub const fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Load `url` and wait for `ready` (or the configured default).
    ///
    /// The whole operation, including the ready wait, is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - `NavigationTimeout` with the last URL and status if the page never becomes ready
    /// - `Configuration` if a `selector_present` condition has a malformed selector
    /// - `Driver` if the browser rejects the navigation
    pub async fn goto(
        &self,
        session: &mut Session,
        url: &str,
        ready: Option<&ReadyCondition>,
        timeout: Duration,
    ) -> ProofResult<NavigationResult> {
        let target = self.config.resolve_url(url);
        let condition = ready.unwrap_or(&self.config.default_ready);
        let selector = match condition {
            ReadyCondition::SelectorPresent { selector } => Some(Selector::parse(selector)?),
            _ => None,
        };
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let started = Instant::now();
        let deadline = started + timeout;
        tracing::info!(url = %target, ready = %condition, timeout_ms, "navigating");

        let page = session.page_mut()?;
        let outcome = match tokio::time::timeout(timeout, page.navigate(&target)).await {
            Ok(result) => result?,
            Err(_) => {
                let last_url = page.current_url().await.unwrap_or_default();
                return Err(ProofError::NavigationTimeout {
                    url: target,
                    last_url,
                    last_status: None,
                    condition: condition.to_string(),
                    timeout_ms,
                });
            }
        };

        let page: &dyn PageDriver = page;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ready = self
            .wait_ready(page, condition, selector.as_ref(), remaining)
            .await?;
        let final_url = page.current_url().await.unwrap_or_else(|_| outcome.url.clone());
        if !ready {
            return Err(ProofError::NavigationTimeout {
                url: target,
                last_url: final_url,
                last_status: outcome.status,
                condition: condition.to_string(),
                timeout_ms,
            });
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(url = %final_url, status = ?outcome.status, elapsed_ms, "page ready");
        Ok(NavigationResult {
            status: outcome.status,
            final_url,
            elapsed_ms,
        })
    }

    async fn wait_ready(
        &self,
        page: &dyn PageDriver,
        condition: &ReadyCondition,
        selector: Option<&Selector>,
        remaining: Duration,
    ) -> ProofResult<bool> {
        let interval = self.config.poll_interval();
        let polled = match condition {
            ReadyCondition::Immediate => return Ok(true),
            ReadyCondition::FixedDelay { ms } => {
                let delay = Duration::from_millis(*ms);
                tokio::time::sleep(delay.min(remaining)).await;
                return Ok(delay <= remaining);
            }
            ReadyCondition::NetworkIdle { quiet_ms } => {
                let quiet = Duration::from_millis(*quiet_ms);
                poll_until(remaining, interval, || async move {
                    let activity = page.network_activity().await?;
                    Ok(if activity.is_idle(quiet) {
                        Check::Ready(())
                    } else {
                        Check::Pending(activity.in_flight)
                    })
                })
                .await?
            }
            ReadyCondition::SelectorPresent { .. } => {
                let Some(selector) = selector else {
                    return Ok(true);
                };
                poll_until(remaining, interval, || async move {
                    let found = page.query(selector).await?;
                    Ok(if found.is_empty() {
                        Check::Pending(0)
                    } else {
                        Check::Ready(())
                    })
                })
                .await?
            }
        };
        Ok(matches!(polled, Polled::Ready(())))
    }
}
