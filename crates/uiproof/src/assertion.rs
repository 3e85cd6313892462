//! Polling assertions against the live page.
//!
//! Each assertion re-queries the page at the configured interval until the
//! condition holds or the timeout passes; a condition that only becomes true
//! late in the window still passes. Failures carry the last state observed.

use crate::config::HarnessConfig;
use crate::driver::ElementHandle;
use crate::locator::{normalize_whitespace, Selector};
use crate::result::{ProofError, ProofResult};
use crate::session::Session;
use crate::wait::{poll_until, PollTimeout, Polled, Check};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How expected text is compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Equal after whitespace normalisation
    #[default]
    Exact,
    /// Substring after whitespace normalisation
    Contains,
}

impl TextMatch {
    /// Compare `actual` against `expected`
    #[must_use]
    pub fn matches(self, actual: &str, expected: &str) -> bool {
        let actual = normalize_whitespace(actual);
        let expected = normalize_whitespace(expected);
        match self {
            Self::Exact => actual == expected,
            Self::Contains => actual.contains(&expected),
        }
    }
}

/// Evaluates conditions with bounded polling
#[derive(Debug, Clone, Copy)]
pub struct AssertionEngine<'a> {
    config: &'a HarnessConfig,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn timed_out(
    selector: &Selector,
    expected: String,
    timeout: Duration,
    diag: PollTimeout<String>,
) -> ProofError {
    let last_observed = match (diag.last_observed, diag.last_error) {
        (_, Some(err)) => format!("error: {err}"),
        (Some(observed), None) => observed,
        (None, None) => "nothing".to_string(),
    };
    ProofError::AssertionTimeout {
        selector: selector.as_str().to_string(),
        expected,
        last_observed,
        timeout_ms: millis(timeout),
    }
}

fn describe_texts(found: &[ElementHandle]) -> String {
    let texts: Vec<String> = found.iter().take(3).map(|h| format!("{:?}", h.text)).collect();
    let more = if found.len() > 3 { ", ..." } else { "" };
    format!("text {}{more}", texts.join(", "))
}

impl<'a> AssertionEngine<'a> {
    /// Engine polling at `config.poll_interval_ms`
    #[must_use]
    pub const fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Wait until some match is visible
    ///
    /// # Errors
    ///
    /// `AssertionTimeout` with the last observed state.
    pub async fn assert_visible(
        &self,
        session: &Session,
        selector: &Selector,
        timeout: Duration,
    ) -> ProofResult<ElementHandle> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let found = page.query(selector).await?;
            let count = found.len();
            Ok(match found.into_iter().find(|h| h.visible) {
                Some(handle) => Check::Ready(handle),
                None if count == 0 => Check::Pending("absent".to_string()),
                None => Check::Pending(format!("{count} match(es), none visible")),
            })
        })
        .await?;
        match polled {
            Polled::Ready(handle) => Ok(handle),
            Polled::TimedOut(diag) => Err(timed_out(selector, "visible".to_string(), timeout, diag)),
        }
    }

    /// Wait until no match is visible (absent or hidden)
    ///
    /// # Errors
    ///
    /// `AssertionTimeout` with the last observed state.
    pub async fn assert_hidden(
        &self,
        session: &Session,
        selector: &Selector,
        timeout: Duration,
    ) -> ProofResult<()> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let visible = page.query(selector).await?.iter().filter(|h| h.visible).count();
            Ok(if visible == 0 {
                Check::Ready(())
            } else {
                Check::Pending(format!("{visible} visible match(es)"))
            })
        })
        .await?;
        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut(diag) => Err(timed_out(selector, "hidden".to_string(), timeout, diag)),
        }
    }

    /// Wait until some match's text equals (or contains) `expected`
    ///
    /// # Errors
    ///
    /// `AssertionTimeout` with the texts last observed.
    pub async fn assert_text(
        &self,
        session: &Session,
        selector: &Selector,
        expected: &str,
        mode: TextMatch,
        timeout: Duration,
    ) -> ProofResult<()> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let found = page.query(selector).await?;
            Ok(if found.iter().any(|h| mode.matches(&h.text, expected)) {
                Check::Ready(())
            } else if found.is_empty() {
                Check::Pending("absent".to_string())
            } else {
                Check::Pending(describe_texts(&found))
            })
        })
        .await?;
        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut(diag) => {
                let expected = match mode {
                    TextMatch::Exact => format!("text {expected:?}"),
                    TextMatch::Contains => format!("text containing {expected:?}"),
                };
                Err(timed_out(selector, expected, timeout, diag))
            }
        }
    }

    /// Wait until some match has `attr` equal to `expected`
    ///
    /// # Errors
    ///
    /// `AssertionTimeout` with the value last observed.
    pub async fn assert_attribute(
        &self,
        session: &Session,
        selector: &Selector,
        attr: &str,
        expected: &str,
        timeout: Duration,
    ) -> ProofResult<()> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let found = page.query(selector).await?;
            if found.is_empty() {
                return Ok(Check::Pending("absent".to_string()));
            }
            let mut seen = Vec::with_capacity(found.len());
            for handle in &found {
                match page.attribute(handle, attr).await? {
                    Some(value) if value == expected => return Ok(Check::Ready(())),
                    Some(value) => seen.push(format!("{attr}={value:?}")),
                    None => seen.push(format!("{attr} missing")),
                }
            }
            Ok(Check::Pending(seen.join(", ")))
        })
        .await?;
        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut(diag) => Err(timed_out(
                selector,
                format!("{attr}={expected:?}"),
                timeout,
                diag,
            )),
        }
    }

    /// Wait until the selector matches anything, visible or not
    ///
    /// # Errors
    ///
    /// `AssertionTimeout` if nothing matched in time.
    pub async fn wait_for_selector(
        &self,
        session: &Session,
        selector: &Selector,
        timeout: Duration,
    ) -> ProofResult<ElementHandle> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let mut found = page.query(selector).await?;
            Ok(if found.is_empty() {
                Check::Pending("absent".to_string())
            } else {
                Check::Ready(found.swap_remove(0))
            })
        })
        .await?;
        match polled {
            Polled::Ready(handle) => Ok(handle),
            Polled::TimedOut(diag) => Err(timed_out(selector, "present".to_string(), timeout, diag)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::mock::{MockLauncher, MockNode, MockPage, MockSite};
    use crate::network::MockRegistry;
    use std::sync::Arc;

    fn site() -> MockSite {
        MockSite::new().page(
            "/",
            MockPage::fixed(vec![
                MockNode::new("div")
                    .class("splash")
                    .text("Loading")
                    .removed_after(Duration::from_millis(400)),
                MockNode::new("div")
                    .attr("role", "dialog")
                    .attr("data-state", "open")
                    .text("  Sol   Floor ")
                    .appears_after(Duration::from_millis(250)),
                MockNode::new("p").class("note").text("hidden note").hidden(),
            ])
            .network_delay(Duration::ZERO),
        )
    }

    async fn loaded(launcher: &MockLauncher) -> Session {
        let mut session =
            Session::open(launcher, &SessionConfig::default(), Arc::new(MockRegistry::new()))
                .await
                .unwrap();
        session.page_mut().unwrap().navigate("/").await.unwrap();
        session
    }

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_modes() {
            assert!(TextMatch::Exact.matches(" Sol \n Floor", "Sol Floor"));
            assert!(!TextMatch::Exact.matches("Sol Floor", "Sol"));
            assert!(TextMatch::Contains.matches("Sol Floor", "Sol"));
        }
    }

    mod polling_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_visible_after_first_check_fails() {
            let launcher = MockLauncher::new(site());
            let mut session = loaded(&launcher).await;
            let config = HarnessConfig::new();
            let start = tokio::time::Instant::now();
            let handle = AssertionEngine::new(&config)
                .assert_visible(&session, &sel("[role=dialog]"), TIMEOUT)
                .await
                .unwrap();
            assert_eq!(handle.text, "Sol Floor");
            assert!(start.elapsed() >= Duration::from_millis(250));
            assert!(start.elapsed() < Duration::from_millis(400));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_visible_timeout_reports_last_observed() {
            let launcher = MockLauncher::new(site());
            let mut session = loaded(&launcher).await;
            let config = HarnessConfig::new();
            let engine = AssertionEngine::new(&config);

            let err = engine
                .assert_visible(&session, &sel(".missing"), Duration::from_millis(300))
                .await
                .unwrap_err();
            match err {
                ProofError::AssertionTimeout {
                    selector,
                    expected,
                    last_observed,
                    timeout_ms,
                } => {
                    assert_eq!(selector, ".missing");
                    assert_eq!(expected, "visible");
                    assert_eq!(last_observed, "absent");
                    assert_eq!(timeout_ms, 300);
                }
                other => panic!("unexpected {other:?}"),
            }

            let err = engine
                .assert_visible(&session, &sel(".note"), Duration::from_millis(300))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("none visible"));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_hidden_waits_for_splash_to_detach() {
            let launcher = MockLauncher::new(site());
            let mut session = loaded(&launcher).await;
            let config = HarnessConfig::new();
            let engine = AssertionEngine::new(&config);
            let start = tokio::time::Instant::now();
            engine.assert_hidden(&session, &sel(".splash"), TIMEOUT).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(400));
            assert!(start.elapsed() < Duration::from_millis(500));
            engine.assert_hidden(&session, &sel(".note"), Duration::ZERO).await.unwrap();
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_text_and_attribute() {
            let launcher = MockLauncher::new(site());
            let mut session = loaded(&launcher).await;
            let config = HarnessConfig::new();
            let engine = AssertionEngine::new(&config);
            let dialog = sel("[role=dialog]");

            engine.assert_text(&session, &dialog, "Sol Floor", TextMatch::Exact, TIMEOUT).await.unwrap();
            engine.assert_text(&session, &dialog, "Floor", TextMatch::Contains, TIMEOUT).await.unwrap();
            engine.assert_attribute(&session, &dialog, "data-state", "open", TIMEOUT).await.unwrap();

            let err = engine
                .assert_text(&session, &dialog, "Vault", TextMatch::Exact, Duration::from_millis(200))
                .await
                .unwrap_err();
            assert!(err.to_string().contains(r#"last observed text "Sol Floor""#));

            let err = engine
                .assert_attribute(&session, &dialog, "data-state", "closed", Duration::from_millis(200))
                .await
                .unwrap_err();
            assert!(err.to_string().contains(r#"data-state="open""#));
            session.close().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_selector_accepts_hidden() {
            let launcher = MockLauncher::new(site());
            let mut session = loaded(&launcher).await;
            let config = HarnessConfig::new();
            let handle = AssertionEngine::new(&config)
                .wait_for_selector(&session, &sel(".note"), TIMEOUT)
                .await
                .unwrap();
            assert!(!handle.visible);
            session.close().await.unwrap();
        }
    }
}
