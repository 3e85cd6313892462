//! Pointer and keyboard actions against located elements.
//!
//! Every element action resolves the element's geometry first and refuses
//! to act on detached, zero-area or hidden elements. Pointer-down and
//! pointer-up are separate operations so a pressed state can be held across
//! steps.

use crate::config::{HarnessConfig, Viewport};
use crate::driver::{ElementHandle, PageDriver};
use crate::locator::{Point, Selector};
use crate::result::{NotInteractableReason, ProofError, ProofResult};
use crate::session::Session;
use crate::wait::{poll_until, Polled, Check};
use std::time::Duration;

/// Performs user input on a session's page
#[derive(Debug, Clone, Copy)]
pub struct InteractionDriver<'a> {
    config: &'a HarnessConfig,
}

fn not_interactable(selector: &str, reason: NotInteractableReason) -> ProofError {
    ProofError::ElementNotInteractable {
        selector: selector.to_string(),
        reason,
    }
}

/// Visible matches first, then document order
fn best_match(mut found: Vec<ElementHandle>) -> Option<ElementHandle> {
    let idx = found.iter().position(|h| h.visible).unwrap_or(0);
    (!found.is_empty()).then(|| found.swap_remove(idx))
}

impl<'a> InteractionDriver<'a> {
    /// Driver using `config` for the existence check and polling
    #[must_use]
    pub const fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Short existence check; `None` if nothing matches in time
    ///
    /// # Errors
    ///
    /// Returns non-transient driver errors and configuration errors.
    pub async fn locate(
        &self,
        session: &Session,
        selector: &Selector,
    ) -> ProofResult<Option<ElementHandle>> {
        let page = session.page()?;
        let polled = poll_until(
            self.config.existence_check(),
            self.config.poll_interval(),
            || async move {
                let found = page.query(selector).await?;
                Ok(match best_match(found) {
                    Some(handle) => Check::Ready(handle),
                    None => Check::Pending(()),
                })
            },
        )
        .await?;
        Ok(match polled {
            Polled::Ready(handle) => Some(handle),
            Polled::TimedOut(_) => None,
        })
    }

    /// Wait up to `timeout` for a visible match.
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` with `NotFound` if nothing matched, or with
    /// the reason the last match could not be used.
    pub async fn locate_within(
        &self,
        session: &Session,
        selector: &Selector,
        timeout: Duration,
    ) -> ProofResult<ElementHandle> {
        let page = session.page()?;
        let polled = poll_until(timeout, self.config.poll_interval(), || async move {
            let found = page.query(selector).await?;
            Ok(match best_match(found) {
                Some(handle) if handle.visible => Check::Ready(handle),
                other => Check::Pending(other),
            })
        })
        .await?;

        match polled {
            Polled::Ready(handle) => Ok(handle),
            Polled::TimedOut(timeout) => match timeout.last_observed.flatten() {
                Some(handle) => {
                    // report why the match that exists is unusable
                    self.actionable_point(page, &handle).await?;
                    Ok(handle)
                }
                None => Err(not_interactable(
                    selector.as_str(),
                    NotInteractableReason::NotFound,
                )),
            },
        }
    }

    /// Center of the element, if it can receive pointer input
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` with `Detached`, `ZeroArea` or `Hidden`.
    pub async fn actionable_point(
        &self,
        page: &dyn PageDriver,
        handle: &ElementHandle,
    ) -> ProofResult<Point> {
        let Some(bbox) = page.bounding_box(handle).await? else {
            return Err(not_interactable(&handle.selector, NotInteractableReason::Detached));
        };
        if bbox.is_zero_area() {
            return Err(not_interactable(&handle.selector, NotInteractableReason::ZeroArea));
        }
        if !page.is_visible(handle).await? {
            return Err(not_interactable(&handle.selector, NotInteractableReason::Hidden));
        }
        Ok(bbox.center())
    }

    /// Move, press and release over the element
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` if the element cannot take input.
    pub async fn click(&self, session: &mut Session, handle: &ElementHandle) -> ProofResult<()> {
        let point = self.actionable_point(session.page()?, handle).await?;
        tracing::debug!(selector = %handle.selector, x = point.x, y = point.y, "click");
        let page = session.page_mut()?;
        page.mouse_move(point).await?;
        page.mouse_down(point).await?;
        page.mouse_up(point).await
    }

    /// Move the pointer over the element
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` if the element cannot take input.
    pub async fn hover(&self, session: &mut Session, handle: &ElementHandle) -> ProofResult<()> {
        let point = self.actionable_point(session.page()?, handle).await?;
        tracing::debug!(selector = %handle.selector, "hover");
        session.page_mut()?.mouse_move(point).await
    }

    /// Press (`down = true`) or release the primary button over the element.
    ///
    /// Unlike [`click`](Self::click) the state persists until the opposite
    /// call, so `:active` styling can be observed in between.
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` if the element cannot take input.
    pub async fn set_pointer_state(
        &self,
        session: &mut Session,
        handle: &ElementHandle,
        down: bool,
    ) -> ProofResult<()> {
        let point = self.actionable_point(session.page()?, handle).await?;
        tracing::debug!(selector = %handle.selector, down, "pointer state");
        let page = session.page_mut()?;
        page.mouse_move(point).await?;
        if down {
            page.mouse_down(point).await
        } else {
            page.mouse_up(point).await
        }
    }

    /// Click to focus, then type
    ///
    /// # Errors
    ///
    /// `ElementNotInteractable` if the element cannot take input.
    pub async fn type_text(
        &self,
        session: &mut Session,
        handle: &ElementHandle,
        text: &str,
    ) -> ProofResult<()> {
        self.click(session, handle).await?;
        session.page_mut()?.insert_text(text).await
    }

    /// Press and release a named key
    ///
    /// # Errors
    ///
    /// Driver errors.
    pub async fn press_key(&self, session: &mut Session, key: &str) -> ProofResult<()> {
        if key.trim().is_empty() {
            return Err(ProofError::configuration("key name must not be empty"));
        }
        session.page_mut()?.press_key(key).await
    }

    /// Scroll by `(dx, dy)` with the pointer at the viewport center
    ///
    /// # Errors
    ///
    /// Driver errors.
    pub async fn scroll(&self, session: &mut Session, dx: f32, dy: f32) -> ProofResult<()> {
        let page = session.page_mut()?;
        let viewport = page.viewport();
        let center = Point::new(viewport.width as f32 / 2.0, viewport.height as f32 / 2.0);
        page.wheel(center, dx, dy).await
    }

    /// Resize the viewport
    ///
    /// # Errors
    ///
    /// Configuration error for invalid sizes, otherwise driver errors.
    pub async fn set_viewport(&self, session: &mut Session, viewport: Viewport) -> ProofResult<()> {
        viewport.validate()?;
        session.page_mut()?.set_viewport(viewport).await
    }
}
