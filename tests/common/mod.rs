//! Scripted in-memory `Driver` and a one-line HTTP server for tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bugtracker_flows::{Driver, ElementState, Error, Frame, Locator, Result, WaitPolicies, WaitPolicy};
use std::cell::RefCell;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const VISIBLE: ElementState = ElementState::Present {
    visible: true,
    enabled: true,
};
pub const HIDDEN: ElementState = ElementState::Present {
    visible: false,
    enabled: true,
};
pub const DISABLED: ElementState = ElementState::Present {
    visible: true,
    enabled: false,
};
pub const MISSING: ElementState = ElementState::Missing;

/// Short policies so timeouts resolve quickly.
pub fn fast_policies() -> WaitPolicies {
    let poll = Duration::from_millis(10);
    WaitPolicies {
        short: WaitPolicy::new("short", Duration::from_millis(100), poll),
        default: WaitPolicy::new("default", Duration::from_millis(200), poll),
        long: WaitPolicy::new("long", Duration::from_millis(300), poll),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Goto(String),
    Inspect(Locator, ElementState),
    Scroll(Locator),
    Click(Locator),
    Hover(Locator),
    Drag(Locator, Locator),
    Fill(Locator, String),
}

/// A page mutation triggered by an action.
#[derive(Debug, Clone)]
pub enum Change {
    /// Replace the first match, or add it.
    Show(Frame, Locator, ElementState, String),
    /// Add another match after the existing ones, reporting `states` in order.
    Append(Frame, Locator, Vec<ElementState>, String),
    Remove(Locator),
}

#[derive(Debug)]
struct Element {
    frame: Frame,
    locator: Locator,
    /// Reported one per inspection; the last one sticks.
    states: Vec<ElementState>,
    text: String,
    attrs: Vec<(String, String)>,
    click_failures: u32,
}

impl Element {
    fn current(&self) -> ElementState {
        self.states.first().copied().unwrap_or_default()
    }
}

#[derive(Default)]
struct Page {
    elements: Vec<Element>,
    calls: Vec<Call>,
    /// Dialog that swallows every click except on its close control.
    blocker: Option<(Locator, Locator)>,
    click_effects: Vec<(Locator, Vec<Change>)>,
    drag_effects: Vec<Change>,
    failing_urls: Vec<String>,
}

impl Page {
    fn find(&self, frame: &Frame, locator: &Locator) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| &e.frame == frame && &e.locator == locator)
    }

    fn state(&self, frame: &Frame, locator: &Locator) -> ElementState {
        self.find(frame, locator)
            .map(|i| self.elements[i].current())
            .unwrap_or_default()
    }

    fn apply(&mut self, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::Show(frame, locator, state, text) => match self.find(&frame, &locator) {
                    Some(i) => {
                        self.elements[i].states = vec![state];
                        self.elements[i].text = text;
                    }
                    None => self.elements.push(Element {
                        frame,
                        locator,
                        states: vec![state],
                        text,
                        attrs: vec![],
                        click_failures: 0,
                    }),
                },
                Change::Append(frame, locator, states, text) => self.elements.push(Element {
                    frame,
                    locator,
                    states,
                    text,
                    attrs: vec![],
                    click_failures: 0,
                }),
                Change::Remove(locator) => self.elements.retain(|e| e.locator != locator),
            }
        }
    }
}

/// Scripted page. Effects registered with `after_click` / `after_drag` fire once.
#[derive(Default)]
pub struct FakeDriver {
    page: RefCell<Page>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element in the main document with a fixed state.
    pub fn add(&self, locator: Locator, state: ElementState) -> &Self {
        self.script(Frame::Main, locator, vec![state])
    }

    /// Register an element whose inspections report `states` in order.
    pub fn script(&self, frame: Frame, locator: Locator, states: Vec<ElementState>) -> &Self {
        let mut page = self.page.borrow_mut();
        match page.find(&frame, &locator) {
            Some(i) => page.elements[i].states = states,
            None => page.elements.push(Element {
                frame,
                locator,
                states,
                text: String::new(),
                attrs: vec![],
                click_failures: 0,
            }),
        }
        drop(page);
        self
    }

    pub fn set_text(&self, frame: &Frame, locator: &Locator, text: &str) -> &Self {
        let mut page = self.page.borrow_mut();
        if let Some(i) = page.find(frame, locator) {
            page.elements[i].text = text.to_string();
        }
        drop(page);
        self
    }

    pub fn set_attr(&self, frame: &Frame, locator: &Locator, name: &str, value: &str) -> &Self {
        let mut page = self.page.borrow_mut();
        if let Some(i) = page.find(frame, locator) {
            page.elements[i].attrs.push((name.to_string(), value.to_string()));
        }
        drop(page);
        self
    }

    /// The next `count` clicks on `locator` are intercepted.
    pub fn fail_clicks(&self, locator: &Locator, count: u32) -> &Self {
        let mut page = self.page.borrow_mut();
        if let Some(i) = page.find(&Frame::Main, locator) {
            page.elements[i].click_failures = count;
        }
        drop(page);
        self
    }

    /// While `dialog` is visible, clicks anywhere but `close` are intercepted.
    pub fn block_with(&self, dialog: &Locator, close: &Locator) -> &Self {
        self.page.borrow_mut().blocker = Some((dialog.clone(), close.clone()));
        self
    }

    pub fn after_click(&self, locator: &Locator, changes: Vec<Change>) -> &Self {
        self.page
            .borrow_mut()
            .click_effects
            .push((locator.clone(), changes));
        self
    }

    pub fn after_drag(&self, changes: Vec<Change>) -> &Self {
        self.page.borrow_mut().drag_effects = changes;
        self
    }

    pub fn fail_goto(&self, url: &str) -> &Self {
        self.page.borrow_mut().failing_urls.push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.page.borrow().calls.clone()
    }

    /// Every `Click` on `locator`.
    pub fn clicks_on(&self, locator: &Locator) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Click(l) if l == locator))
            .count()
    }

    /// Interaction calls only, inspections left out.
    pub fn actions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Inspect(..)))
            .collect()
    }

    fn require(&self, frame: &Frame, locator: &Locator, visible: bool) -> Result<()> {
        let state = self.page.borrow().state(frame, locator);
        let ok = if visible {
            state.is_visible()
        } else {
            state.is_present()
        };
        if ok {
            Ok(())
        } else {
            Err(Error::NotInteractable(format!("{} is {:?}", locator, state)))
        }
    }
}

#[async_trait(?Send)]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut page = self.page.borrow_mut();
        page.calls.push(Call::Goto(url.to_string()));
        if page.failing_urls.iter().any(|u| u == url) {
            return Err(Error::ActionFailed(format!("navigation to {} failed", url)));
        }
        Ok(())
    }

    async fn inspect(&self, frame: &Frame, locator: &Locator) -> Result<ElementState> {
        let mut page = self.page.borrow_mut();
        let state = match page.find(frame, locator) {
            Some(i) => {
                let el = &mut page.elements[i];
                let state = el.current();
                if el.states.len() > 1 {
                    el.states.remove(0);
                }
                state
            }
            None => ElementState::Missing,
        };
        page.calls.push(Call::Inspect(locator.clone(), state));
        Ok(state)
    }

    async fn scroll_into_view(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        self.page
            .borrow_mut()
            .calls
            .push(Call::Scroll(locator.clone()));
        self.require(frame, locator, false)
    }

    async fn click(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        self.page
            .borrow_mut()
            .calls
            .push(Call::Click(locator.clone()));
        self.require(frame, locator, true)?;

        let mut page = self.page.borrow_mut();
        if let Some((dialog, close)) = page.blocker.clone() {
            if locator != &close && page.state(&Frame::Main, &dialog).is_visible() {
                return Err(Error::NotInteractable(format!(
                    "click on {} would be received by the modal",
                    locator
                )));
            }
        }
        if let Some(i) = page.find(frame, locator) {
            if page.elements[i].click_failures > 0 {
                page.elements[i].click_failures -= 1;
                return Err(Error::NotInteractable(format!("{} intercepted", locator)));
            }
        }
        if let Some(pos) = page.click_effects.iter().position(|(l, _)| l == locator) {
            let (_, changes) = page.click_effects.remove(pos);
            page.apply(changes);
        }
        Ok(())
    }

    async fn hover(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        self.page
            .borrow_mut()
            .calls
            .push(Call::Hover(locator.clone()));
        self.require(frame, locator, true)
    }

    async fn drag_and_drop(
        &self,
        frame: &Frame,
        source: &Locator,
        target: &Locator,
    ) -> Result<()> {
        self.page
            .borrow_mut()
            .calls
            .push(Call::Drag(source.clone(), target.clone()));
        self.require(frame, source, true)?;
        self.require(frame, target, true)?;
        let mut page = self.page.borrow_mut();
        let changes = std::mem::take(&mut page.drag_effects);
        page.apply(changes);
        Ok(())
    }

    async fn text(&self, frame: &Frame, locator: &Locator) -> Result<String> {
        let page = self.page.borrow();
        page.find(frame, locator)
            .map(|i| page.elements[i].text.clone())
            .ok_or_else(|| Error::NotInteractable(format!("{} is gone", locator)))
    }

    async fn texts(&self, frame: &Frame, locator: &Locator) -> Result<Vec<String>> {
        let mut page = self.page.borrow_mut();
        let mut texts = Vec::new();
        for el in page
            .elements
            .iter_mut()
            .filter(|e| &e.frame == frame && &e.locator == locator)
        {
            let state = el.current();
            if el.states.len() > 1 {
                el.states.remove(0);
            }
            if state.is_present() {
                texts.push(el.text.clone());
            }
        }
        Ok(texts)
    }

    async fn attribute(
        &self,
        frame: &Frame,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>> {
        let page = self.page.borrow();
        let i = page
            .find(frame, locator)
            .ok_or_else(|| Error::NotInteractable(format!("{} is gone", locator)))?;
        Ok(page.elements[i]
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    async fn fill(&self, frame: &Frame, locator: &Locator, value: &str) -> Result<()> {
        self.page
            .borrow_mut()
            .calls
            .push(Call::Fill(locator.clone(), value.to_string()));
        self.require(frame, locator, true)
    }
}

/// Serve every request with `status` and an empty body; returns a URL on it.
pub async fn serve_status(status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/api/analytics", addr)
}

/// A URL on a port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/analytics", addr)
}
