//! The browser-automation collaborator.
//!
//! [`Driver`] is the whole surface the stabilizer depends on: one-shot element
//! inspection plus the click / hover / drag / scroll / read / type primitives,
//! each taking an explicit [`Frame`]. None of the calls wait; waiting is the
//! stabilizer's job.

mod page;

pub use page::EokaDriver;

use crate::locator::{Frame, Locator};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Snapshot of an element at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    /// Nothing in the tree matches.
    #[default]
    Missing,
    /// In the tree; may still be hidden or disabled.
    Present { visible: bool, enabled: bool },
}

impl ElementState {
    pub fn is_present(&self) -> bool {
        matches!(self, ElementState::Present { .. })
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, ElementState::Present { visible: true, .. })
    }

    /// Visible and enabled.
    pub fn is_interactable(&self) -> bool {
        matches!(
            self,
            ElementState::Present {
                visible: true,
                enabled: true
            }
        )
    }
}

#[derive(Deserialize)]
pub(crate) struct RawState {
    visible: bool,
    enabled: bool,
}

impl From<Option<RawState>> for ElementState {
    fn from(raw: Option<RawState>) -> Self {
        match raw {
            None => ElementState::Missing,
            Some(r) => ElementState::Present {
                visible: r.visible,
                enabled: r.enabled,
            },
        }
    }
}

/// Primitive, non-waiting page operations.
///
/// Implementations own one browser session; calls are issued strictly one at a
/// time, so the futures need not be `Send`.
#[async_trait(?Send)]
pub trait Driver {
    /// Load `url` in the top-level document.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Resolve `locator` once and report what was found.
    async fn inspect(&self, frame: &Frame, locator: &Locator) -> Result<ElementState>;

    async fn scroll_into_view(&self, frame: &Frame, locator: &Locator) -> Result<()>;

    /// Click the element's centre. Fails with `NotInteractable` when another
    /// element would receive the click.
    async fn click(&self, frame: &Frame, locator: &Locator) -> Result<()>;

    /// Move the pointer over the element's centre.
    async fn hover(&self, frame: &Frame, locator: &Locator) -> Result<()>;

    /// Press on `source`, move onto `target`, release.
    async fn drag_and_drop(&self, frame: &Frame, source: &Locator, target: &Locator)
        -> Result<()>;

    /// Visible text, trimmed.
    async fn text(&self, frame: &Frame, locator: &Locator) -> Result<String>;

    /// Trimmed text of every match, in document order. No match is an empty list.
    async fn texts(&self, frame: &Frame, locator: &Locator) -> Result<Vec<String>>;

    /// Property value if the element exposes `name` as a string property
    /// (e.g. the resolved `href`), else the raw attribute.
    async fn attribute(&self, frame: &Frame, locator: &Locator, name: &str)
        -> Result<Option<String>>;

    /// Replace the contents of a text input by typing `value`.
    async fn fill(&self, frame: &Frame, locator: &Locator, value: &str) -> Result<()>;
}
