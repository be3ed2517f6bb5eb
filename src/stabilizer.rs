//! Overlay-tolerant interactions with an asynchronously rendering page.
//!
//! The board re-renders under our feet and a modal overlay pops up at random,
//! swallowing whatever click lands on it. [`Stabilizer`] wraps a [`Driver`]
//! with three things:
//!
//! - bounded waits before every interaction (see [`crate::wait`]),
//! - [`Stabilizer::dismiss_interfering_overlay`], a cheap probe-and-close,
//! - [`with_recovery`], the retry combinator that runs the dismissal between
//!   failed attempts.
//!
//! Interactions are issued through a [`Scope`], which pins the rendering
//! context (main document or an iframe) for as long as it is alive. Dropping
//! the scope is how a flow "switches back": there is no session-wide frame
//! state to restore, so a flow that fails inside an iframe cannot leak that
//! context into the next one.

use crate::config::Config;
use crate::driver::{Driver, ElementState};
use crate::locator::{xpath_literal, Frame, Locator};
use crate::wait::{WaitPolicies, WaitPolicy};
use crate::{Error, Result};
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Message line of an ant-design notification toast.
pub const NOTIFICATION_XPATH: &str = "//div[@class='ant-notification-notice-message']";

/// Outcome of a retried action, with the effort it took either way.
#[derive(Debug)]
pub struct Retried<T> {
    /// The successful value, or the last attempt's error unchanged.
    pub outcome: Result<T>,
    /// Attempts made, the last one included.
    pub attempts: u32,
    /// Recovery steps that ran between attempts.
    pub recoveries: u32,
}

impl<T> Retried<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

/// Run `action` up to `max_attempts` times, running `recover` between failed
/// attempts.
///
/// `recover` runs at most `max_attempts - 1` times and never after the final
/// failure. When every attempt fails, the last error is kept as is in
/// [`Retried::outcome`]. A `max_attempts` of zero is treated as one.
pub async fn with_recovery<T, A, AF, R, RF>(
    what: &str,
    max_attempts: u32,
    mut action: A,
    mut recover: R,
) -> Retried<T>
where
    A: FnMut(u32) -> AF,
    AF: Future<Output = Result<T>>,
    R: FnMut(u32) -> RF,
    RF: Future<Output = ()>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match action(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}/{}", what, attempt, max_attempts);
                }
                return Retried {
                    outcome: Ok(value),
                    attempts: attempt,
                    recoveries: attempt - 1,
                };
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    "{} failed on attempt {}/{}: {}",
                    what, attempt, max_attempts, e
                );
                recover(attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!("{} failed after {} attempts: {}", what, attempt, e);
                return Retried {
                    outcome: Err(e),
                    attempts: attempt,
                    recoveries: attempt - 1,
                };
            }
        }
    }
}

/// Notification texts on screen at one moment.
///
/// Taken before the action whose confirmation is awaited, so a toast left over
/// from an earlier action is not mistaken for the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSnapshot {
    texts: Vec<String>,
}

impl NotificationSnapshot {
    pub fn new(texts: Vec<String>) -> Self {
        Self { texts }
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Last non-empty text in `current` that this snapshot does not account
    /// for. Each snapshot entry absorbs one equal text, so a repeat of an old
    /// message still counts as new.
    pub fn newest_since(&self, current: Vec<String>) -> Option<String> {
        let mut seen = self.texts.clone();
        let mut fresh = None;
        for text in current {
            if let Some(pos) = seen.iter().position(|t| *t == text) {
                seen.swap_remove(pos);
            } else if !text.is_empty() {
                fresh = Some(text);
            }
        }
        fresh
    }
}

/// Interaction layer bound to one browser session.
pub struct Stabilizer<D> {
    driver: D,
    waits: WaitPolicies,
    overlay_dialog: Locator,
    overlay_close: Locator,
    notification: Locator,
    click_attempts: u32,
}

impl<D: Driver> Stabilizer<D> {
    pub fn new(driver: D, config: &Config) -> Self {
        Self::with_policies(
            driver,
            WaitPolicies::from_config(&config.waits),
            &config.overlay.title,
            config.retry.click_attempts,
        )
    }

    /// Build with explicit policies, overlay title and click attempts.
    pub fn with_policies(
        driver: D,
        waits: WaitPolicies,
        overlay_title: &str,
        click_attempts: u32,
    ) -> Self {
        let dialog = format!(
            "//div[@role='dialog' and .//div[@class='ant-modal-title' and contains(text(), {})]]",
            xpath_literal(overlay_title)
        );
        Self {
            driver,
            waits,
            overlay_close: Locator::xpath(format!("{}//button", dialog)),
            overlay_dialog: Locator::xpath(dialog),
            notification: Locator::xpath(NOTIFICATION_XPATH),
            click_attempts,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn waits(&self) -> &WaitPolicies {
        &self.waits
    }

    /// Attempts used by overlay-tolerant click sequences.
    pub fn click_attempts(&self) -> u32 {
        self.click_attempts
    }

    pub fn overlay_dialog(&self) -> &Locator {
        &self.overlay_dialog
    }

    pub fn overlay_close(&self) -> &Locator {
        &self.overlay_close
    }

    pub fn notification(&self) -> &Locator {
        &self.notification
    }

    /// Load `url` in the top-level document. Every scope opened before the
    /// navigation refers to a document that no longer exists.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!("navigate: {}", url);
        self.driver.goto(url).await
    }

    /// Scope over the top-level document.
    pub fn main(&self) -> Scope<'_, D> {
        Scope {
            stabilizer: self,
            frame: Frame::Main,
        }
    }

    /// Wait (default policy) for `iframe` in the top-level document and open a
    /// scope over its document.
    pub async fn enter_frame(&self, iframe: Locator) -> Result<Scope<'_, D>> {
        self.main().wait_present(&iframe).await?;
        debug!("entering iframe {}", iframe);
        Ok(Scope {
            stabilizer: self,
            frame: Frame::Child(iframe),
        })
    }

    /// Close the interfering modal if it is up.
    ///
    /// Probes under the short policy, so the common "not there" case costs at
    /// most one short deadline. Returns `true` only when the close control was
    /// found visible and enabled and was clicked. A present overlay whose close
    /// control is missing or disabled is left alone and reported as `false`.
    pub async fn dismiss_interfering_overlay(&self) -> Result<bool> {
        let main = Frame::Main;
        match self
            .poll_state(&main, &self.overlay_dialog, self.waits.short, ElementState::is_visible)
            .await
        {
            Ok(()) => {}
            Err(Error::ElementWaitTimeout { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        info!("interfering overlay detected");

        let close = self.driver.inspect(&main, &self.overlay_close).await?;
        if !close.is_interactable() {
            warn!("overlay close control not usable ({:?}), leaving overlay", close);
            return Ok(false);
        }
        self.driver.click(&main, &self.overlay_close).await?;
        info!("interfering overlay dismissed");
        Ok(true)
    }

    /// [`Scope::safe_click`] in the top-level document.
    pub async fn safe_click(&self, locator: &Locator) -> Result<()> {
        self.main().safe_click(locator).await
    }

    /// [`Scope::click_with_overlay_retry`] in the top-level document.
    pub async fn click_with_overlay_retry(
        &self,
        locator: &Locator,
        max_attempts: u32,
    ) -> Retried<()> {
        self.main()
            .click_with_overlay_retry(locator, max_attempts)
            .await
    }

    /// Notifications currently on screen.
    pub async fn notifications(&self) -> Result<NotificationSnapshot> {
        let texts = self.driver.texts(&Frame::Main, &self.notification).await?;
        debug!("{} notification(s) on screen", texts.len());
        Ok(NotificationSnapshot::new(texts))
    }

    /// Wait (long policy) for a notification with text that is not in
    /// `before` and return it.
    pub async fn wait_for_notification(&self, before: &NotificationSnapshot) -> Result<String> {
        let driver = &self.driver;
        let main = &Frame::Main;
        let toast = &self.notification;
        let text = self
            .waits
            .long
            .until(toast, move || fresh_notification(driver, main, toast, before))
            .await?;
        info!("notification: {}", text);
        Ok(text)
    }

    async fn recover_from_overlay(&self, attempt: u32) {
        match self.dismiss_interfering_overlay().await {
            Ok(true) => debug!("recovery after attempt {}: overlay closed", attempt),
            Ok(false) => debug!("recovery after attempt {}: no overlay to close", attempt),
            Err(e) => warn!("recovery after attempt {} failed: {}", attempt, e),
        }
    }

    async fn poll_state(
        &self,
        frame: &Frame,
        locator: &Locator,
        policy: WaitPolicy,
        want: fn(&ElementState) -> bool,
    ) -> Result<()> {
        let driver = &self.driver;
        policy
            .until(locator, move || check_state(driver, frame, locator, want))
            .await
    }
}

async fn check_state<D: Driver>(
    driver: &D,
    frame: &Frame,
    locator: &Locator,
    want: fn(&ElementState) -> bool,
) -> Result<Option<()>> {
    let state = driver.inspect(frame, locator).await?;
    Ok(want(&state).then_some(()))
}

async fn fresh_notification<D: Driver>(
    driver: &D,
    frame: &Frame,
    toast: &Locator,
    before: &NotificationSnapshot,
) -> Result<Option<String>> {
    let current = driver.texts(frame, toast).await?;
    Ok(before.newest_since(current))
}

/// Interactions pinned to one rendering context.
pub struct Scope<'a, D> {
    stabilizer: &'a Stabilizer<D>,
    frame: Frame,
}

impl<'a, D: Driver> Scope<'a, D> {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Wait (default policy) until `locator` matches something in the tree.
    pub async fn wait_present(&self, locator: &Locator) -> Result<()> {
        self.wait_present_within(locator, self.stabilizer.waits.default)
            .await
    }

    pub async fn wait_present_within(&self, locator: &Locator, policy: WaitPolicy) -> Result<()> {
        self.stabilizer
            .poll_state(&self.frame, locator, policy, ElementState::is_present)
            .await
    }

    /// Wait (default policy) until `locator` matches a visible element.
    pub async fn wait_visible(&self, locator: &Locator) -> Result<()> {
        self.wait_visible_within(locator, self.stabilizer.waits.default)
            .await
    }

    pub async fn wait_visible_within(&self, locator: &Locator, policy: WaitPolicy) -> Result<()> {
        self.stabilizer
            .poll_state(&self.frame, locator, policy, ElementState::is_visible)
            .await
    }

    /// Wait for presence, scroll into view, wait for visibility, click.
    ///
    /// Elements can sit in the tree before their enter transition finishes,
    /// and scrolling can itself change visibility, hence the second wait. The
    /// click is only dispatched once the visibility wait succeeded. A timeout
    /// in either wait surfaces as [`Error::NotInteractable`].
    pub async fn safe_click(&self, locator: &Locator) -> Result<()> {
        let driver = &self.stabilizer.driver;
        self.wait_present(locator).await.map_err(not_interactable)?;
        driver.scroll_into_view(&self.frame, locator).await?;
        self.wait_visible(locator).await.map_err(not_interactable)?;
        debug!("click: {}", locator);
        driver.click(&self.frame, locator).await
    }

    /// [`Scope::safe_click`] with overlay dismissal between failed attempts.
    pub async fn click_with_overlay_retry(
        &self,
        locator: &Locator,
        max_attempts: u32,
    ) -> Retried<()> {
        self.click_sequence_with_overlay_retry(std::slice::from_ref(locator), max_attempts)
            .await
    }

    /// Click `locators` in order; a failure anywhere restarts the whole
    /// sequence after an overlay dismissal.
    ///
    /// Used for open-then-pick controls such as a select and its option, where
    /// retrying only the second click would target a dropdown that is gone.
    pub async fn click_sequence_with_overlay_retry(
        &self,
        locators: &[Locator],
        max_attempts: u32,
    ) -> Retried<()> {
        let what = match locators {
            [only] => format!("click {}", only),
            [first, ..] => format!("click sequence from {}", first),
            [] => {
                return Retried {
                    outcome: Ok(()),
                    attempts: 0,
                    recoveries: 0,
                }
            }
        };
        let stabilizer = self.stabilizer;
        with_recovery(
            &what,
            max_attempts,
            move |_| async move {
                for locator in locators {
                    self.safe_click(locator).await?;
                }
                Ok::<(), Error>(())
            },
            move |attempt| stabilizer.recover_from_overlay(attempt),
        )
        .await
    }

    /// Wait for visibility, then move the pointer over the element.
    pub async fn hover(&self, locator: &Locator) -> Result<()> {
        self.wait_visible(locator).await?;
        self.stabilizer.driver.hover(&self.frame, locator).await
    }

    /// Drag `source` onto `target`. Both are expected to be visible already.
    pub async fn drag(&self, source: &Locator, target: &Locator) -> Result<()> {
        info!("drag: {} -> {}", source, target);
        self.stabilizer
            .driver
            .drag_and_drop(&self.frame, source, target)
            .await
    }

    /// Wait for presence, then read the element's visible text.
    pub async fn read_text(&self, locator: &Locator) -> Result<String> {
        self.wait_present(locator).await?;
        self.stabilizer.driver.text(&self.frame, locator).await
    }

    /// Wait for presence, then read `name` (property first, then attribute).
    pub async fn read_attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.wait_present(locator).await?;
        self.stabilizer
            .driver
            .attribute(&self.frame, locator, name)
            .await
    }

    /// Wait for visibility, then replace the field's contents with `value`.
    pub async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.wait_visible(locator).await?;
        self.stabilizer
            .driver
            .fill(&self.frame, locator, value)
            .await
    }
}

fn not_interactable(e: Error) -> Error {
    match e {
        Error::ElementWaitTimeout { locator, timeout_ms } => Error::NotInteractable(format!(
            "{} did not become ready within {}ms",
            locator, timeout_ms
        )),
        other => other,
    }
}
