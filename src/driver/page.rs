use super::{Driver, ElementState, RawState};
use crate::locator::{js_str, Frame, Locator};
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::Page;
use serde::Deserialize;
use tracing::debug;

/// Pointer moves between press and release during a drag.
const DRAG_STEPS: u32 = 10;

/// Pause between synthetic drag events, in milliseconds.
const DRAG_STEP_MS: u64 = 30;

/// Visibility and enabled-ness, roughly what a WebDriver `is_displayed` /
/// `is_enabled` pair reports.
const INSPECT_BODY: &str = r#"
    if (!el) return null;
    const view = el.ownerDocument.defaultView || window;
    const style = view.getComputedStyle(el);
    const r = el.getBoundingClientRect();
    let visible = r.width > 0 && r.height > 0
        && style.visibility !== 'hidden'
        && style.display !== 'none'
        && parseFloat(style.opacity || '1') > 0;
    if (visible && typeof el.checkVisibility === 'function') {
        visible = el.checkVisibility({ checkOpacity: true, checkVisibilityCSS: true });
    }
    const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    return { visible, enabled };
"#;

/// Centre of the element in frame-local coordinates, plus the frame's offset
/// within the top-level viewport.
const CENTER_BODY: &str = r#"
    if (!el) return null;
    const r = el.getBoundingClientRect();
    let ox = 0, oy = 0;
    if (frameEl) {
        const fr = frameEl.getBoundingClientRect();
        ox = fr.left + frameEl.clientLeft;
        oy = fr.top + frameEl.clientTop;
    }
    return { x: r.left + r.width / 2, y: r.top + r.height / 2, ox, oy, width: r.width, height: r.height };
"#;

/// Hit-test the element's centre and, when it would receive the click, return
/// a CSS path the page can click through.
const CLICK_TARGET_BODY: &str = r#"
    if (!el) return { status: 'missing' };
    const r = el.getBoundingClientRect();
    if (r.width === 0 || r.height === 0) return { status: 'zero_size' };
    const x = r.left + r.width / 2, y = r.top + r.height / 2;
    const hit = doc.elementFromPoint(x, y);
    if (hit && hit !== el && !el.contains(hit)) {
        const cls = (hit.className && hit.className.baseVal === undefined) ? hit.className : '';
        return { status: 'intercepted', by: hit.tagName.toLowerCase() + (cls ? '.' + String(cls).trim().split(/\s+/).join('.') : '') };
    }
    function cssPath(node) {
        if (node.id) return '#' + CSS.escape(node.id);
        const path = [];
        let n = node;
        while (n && n.nodeType === 1) {
            let s = n.tagName.toLowerCase();
            if (n.id) { path.unshift('#' + CSS.escape(n.id)); break; }
            const p = n.parentElement;
            if (p) {
                const sibs = [...p.children].filter(c => c.tagName === n.tagName);
                if (sibs.length > 1) s += ':nth-of-type(' + (sibs.indexOf(n) + 1) + ')';
            }
            path.unshift(s);
            n = p;
        }
        return path.join(' > ');
    }
    return { status: 'ok', selector: cssPath(el), x, y };
"#;

#[derive(Debug, Deserialize)]
struct Center {
    x: f64,
    y: f64,
    ox: f64,
    oy: f64,
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
struct ClickTarget {
    status: String,
    selector: Option<String>,
    by: Option<String>,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct AttributeValue {
    found: bool,
    value: Option<String>,
}

/// [`Driver`] over an `eoka::Page`.
pub struct EokaDriver {
    page: Page,
}

impl EokaDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Get a reference to the underlying page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn center(&self, frame: &Frame, locator: &Locator) -> Result<Center> {
        let js = frame.script(locator, CENTER_BODY);
        let center: Option<Center> = self.page.evaluate(&js).await?;
        let center = center.ok_or_else(|| detached(frame, locator))?;
        if center.width == 0.0 || center.height == 0.0 {
            return Err(Error::NotInteractable(format!(
                "{} in {} has no size",
                locator, frame
            )));
        }
        Ok(center)
    }

    /// Dispatch a synthetic mouse event at frame-local `(x, y)`. `on_element`
    /// targets the located element itself instead of whatever is under the point.
    async fn fire_mouse(
        &self,
        frame: &Frame,
        locator: &Locator,
        kind: &str,
        (x, y): (f64, f64),
        buttons: u8,
        on_element: bool,
    ) -> Result<()> {
        let target = if on_element {
            "el"
        } else {
            "(doc.elementFromPoint(x, y) || doc.body)"
        };
        let body = format!(
            r#"
    if (!doc) return false;
    const x = {x}, y = {y};
    const t = {target};
    if (!t) return false;
    const init = {{ bubbles: true, cancelable: true, view: doc.defaultView, button: 0, buttons: {buttons}, clientX: x, clientY: y }};
    t.dispatchEvent(new MouseEvent({kind}, init));
    return true;
"#,
            x = x,
            y = y,
            target = target,
            buttons = buttons,
            kind = js_str(kind),
        );
        let delivered: bool = self.page.evaluate(&frame.script(locator, &body)).await?;
        if !delivered {
            return Err(detached(frame, locator));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Driver for EokaDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("goto: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn inspect(&self, frame: &Frame, locator: &Locator) -> Result<ElementState> {
        let raw: Option<RawState> = self.page.evaluate(&frame.script(locator, INSPECT_BODY)).await?;
        Ok(raw.into())
    }

    async fn scroll_into_view(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        let js = frame.script(locator, "    if (!el) return false;\n    el.scrollIntoView(true);\n    return true;");
        let scrolled: bool = self.page.evaluate(&js).await?;
        if !scrolled {
            return Err(detached(frame, locator));
        }
        Ok(())
    }

    async fn click(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        let target: ClickTarget = self
            .page
            .evaluate(&frame.script(locator, CLICK_TARGET_BODY))
            .await?;
        match target.status.as_str() {
            "ok" => {}
            "missing" => return Err(detached(frame, locator)),
            "intercepted" => {
                return Err(Error::NotInteractable(format!(
                    "click on {} would be received by <{}>",
                    locator,
                    target.by.unwrap_or_default()
                )))
            }
            other => {
                return Err(Error::NotInteractable(format!(
                    "{} is not clickable ({})",
                    locator, other
                )))
            }
        }

        if frame.is_main() {
            let selector = target
                .selector
                .ok_or_else(|| Error::NotInteractable(format!("no selector for {}", locator)))?;
            debug!("click: {} via '{}'", locator, selector);
            self.page.click(&selector).await?;
        } else {
            debug!("click: {} in {}", locator, frame);
            for kind in ["mousedown", "mouseup", "click"] {
                let buttons = if kind == "mousedown" { 1 } else { 0 };
                self.fire_mouse(frame, locator, kind, (target.x, target.y), buttons, true)
                    .await?;
            }
        }
        Ok(())
    }

    async fn hover(&self, frame: &Frame, locator: &Locator) -> Result<()> {
        let c = self.center(frame, locator).await?;
        let (x, y) = (c.x + c.ox, c.y + c.oy);
        debug!("hover: {} at ({:.0}, {:.0})", locator, x, y);
        self.page
            .session()
            .dispatch_mouse_event(eoka::cdp::MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        self.page.wait(100).await;
        Ok(())
    }

    async fn drag_and_drop(
        &self,
        frame: &Frame,
        source: &Locator,
        target: &Locator,
    ) -> Result<()> {
        let from = self.center(frame, source).await?;
        let to = self.center(frame, target).await?;
        debug!(
            "drag: {} ({:.0}, {:.0}) -> {} ({:.0}, {:.0})",
            source, from.x, from.y, target, to.x, to.y
        );

        self.fire_mouse(frame, source, "mousedown", (from.x, from.y), 1, true)
            .await?;
        self.page.wait(DRAG_STEP_MS).await;

        // Past the sloppy-click threshold so the board starts a drag, not a click.
        self.fire_mouse(frame, source, "mousemove", (from.x + 6.0, from.y + 6.0), 1, false)
            .await?;
        self.page.wait(DRAG_STEP_MS).await;

        for step in 1..=DRAG_STEPS {
            let t = f64::from(step) / f64::from(DRAG_STEPS);
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            self.fire_mouse(frame, source, "mousemove", (x, y), 1, false)
                .await?;
            self.page.wait(DRAG_STEP_MS).await;
        }

        self.fire_mouse(frame, source, "mouseup", (to.x, to.y), 0, false)
            .await?;
        Ok(())
    }

    async fn text(&self, frame: &Frame, locator: &Locator) -> Result<String> {
        let js = frame.script(
            locator,
            "    if (!el) return null;\n    return (el.innerText || el.textContent || '').trim();",
        );
        let text: Option<String> = self.page.evaluate(&js).await?;
        text.ok_or_else(|| detached(frame, locator))
    }

    async fn texts(&self, frame: &Frame, locator: &Locator) -> Result<Vec<String>> {
        let js = frame.script_all(
            locator,
            "    return els.map(e => (e.innerText || e.textContent || '').trim());",
        );
        let texts: Vec<String> = self.page.evaluate(&js).await?;
        Ok(texts)
    }

    async fn attribute(
        &self,
        frame: &Frame,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>> {
        let body = format!(
            r#"
    if (!el) return {{ found: false, value: null }};
    const name = {name};
    const prop = el[name];
    const value = typeof prop === 'string' ? prop : el.getAttribute(name);
    return {{ found: true, value }};
"#,
            name = js_str(name)
        );
        let attr: AttributeValue = self.page.evaluate(&frame.script(locator, &body)).await?;
        if !attr.found {
            return Err(detached(frame, locator));
        }
        Ok(attr.value)
    }

    async fn fill(&self, frame: &Frame, locator: &Locator, value: &str) -> Result<()> {
        // Typing over a full selection replaces it, so the field ends up
        // holding exactly `value` through real key events.
        let js = frame.script(
            locator,
            "    if (!el) return false;\n    el.focus();\n    if (typeof el.select === 'function') el.select();\n    return true;",
        );
        let focused: bool = self.page.evaluate(&js).await?;
        if !focused {
            return Err(detached(frame, locator));
        }
        debug!("fill: {} = '{}'", locator, value);
        self.page.type_text(value).await?;
        Ok(())
    }
}

fn detached(frame: &Frame, locator: &Locator) -> Error {
    Error::NotInteractable(format!("{} is no longer in {}", locator, frame))
}
