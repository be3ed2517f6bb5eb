//! Element locators and rendering contexts, resolved live via JS.
//!
//! Nothing here holds a reference into the page. A [`Locator`] is re-resolved
//! on every call, and a [`Frame`] names the document it is resolved in, so no
//! element or frame handle survives a navigation or a re-render.

use std::fmt;

/// How to find an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `//div[@data-testid='ticket-TICKET-0002']`
    XPath(String),
    /// `iframe[src='./analytics.html']`
    Css(String),
    /// Element id, without `#`.
    Id(String),
    /// First `<a>` whose visible text contains the value.
    PartialLinkText(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn partial_link_text(text: impl Into<String>) -> Self {
        Locator::PartialLinkText(text.into())
    }

    fn as_js_args(&self) -> (&'static str, &str) {
        match self {
            Locator::XPath(v) => ("xpath", v),
            Locator::Css(v) => ("css", v),
            Locator::Id(v) => ("id", v),
            Locator::PartialLinkText(v) => ("link_text", v),
        }
    }

    /// JS expression evaluating to the element (or `null`) inside `doc_expr`.
    fn find_js(&self, doc_expr: &str) -> String {
        let (kind, value) = self.as_js_args();
        format!("__locate({}, {}, {})", doc_expr, js_str(kind), js_str(value))
    }

    /// JS expression evaluating to every match, in document order.
    fn find_all_js(&self, doc_expr: &str) -> String {
        let (kind, value) = self.as_js_args();
        format!("__locateAll({}, {}, {})", doc_expr, js_str(kind), js_str(value))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(v) => write!(f, "xpath {}", v),
            Locator::Css(v) => write!(f, "css {}", v),
            Locator::Id(v) => write!(f, "id {}", v),
            Locator::PartialLinkText(v) => write!(f, "link text '{}'", v),
        }
    }
}

/// The rendering context an interaction runs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Frame {
    /// The top-level document.
    #[default]
    Main,
    /// The document of the (same-origin) iframe matched in the top-level document.
    Child(Locator),
}

const LOCATE_JS: &str = r#"
    function __locate(doc, kind, value) {
        if (!doc) return null;
        switch (kind) {
            case 'xpath':
                return doc.evaluate(value, doc, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            case 'css':
                return doc.querySelector(value);
            case 'id':
                return doc.getElementById(value);
            case 'link_text':
                return Array.from(doc.querySelectorAll('a'))
                    .find(a => (a.innerText || a.textContent || '').includes(value)) || null;
        }
        return null;
    }
    function __locateAll(doc, kind, value) {
        if (!doc) return [];
        switch (kind) {
            case 'xpath': {
                const snap = doc.evaluate(value, doc, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
                return out;
            }
            case 'css':
                return Array.from(doc.querySelectorAll(value));
            case 'id': {
                const el = doc.getElementById(value);
                return el ? [el] : [];
            }
            case 'link_text':
                return Array.from(doc.querySelectorAll('a'))
                    .filter(a => (a.innerText || a.textContent || '').includes(value));
        }
        return [];
    }
"#;

impl Frame {
    /// Build a self-invoking script with `frameEl` (the iframe element, or
    /// `null` for the main document), `doc` and `el` bound, then run `body`.
    pub fn script(&self, locator: &Locator, body: &str) -> String {
        self.wrap(&format!("const el = {};", locator.find_js("doc")), body)
    }

    /// Like [`Frame::script`], but binds `els`, the array of every match.
    pub fn script_all(&self, locator: &Locator, body: &str) -> String {
        self.wrap(&format!("const els = {};", locator.find_all_js("doc")), body)
    }

    fn wrap(&self, binding: &str, body: &str) -> String {
        let frame_el = match self {
            Frame::Main => "null".to_string(),
            Frame::Child(iframe) => iframe.find_js("document"),
        };
        let doc = match self {
            Frame::Main => "document",
            Frame::Child(_) => "(frameEl && frameEl.contentDocument)",
        };
        format!(
            "(() => {{{locate}\n    const frameEl = {frame_el};\n    const doc = {doc};\n    {binding}\n{body}\n}})()",
            locate = LOCATE_JS,
            frame_el = frame_el,
            doc = doc,
            binding = binding,
            body = body,
        )
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Frame::Main)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Main => f.write_str("main document"),
            Frame::Child(l) => write!(f, "iframe [{}]", l),
        }
    }
}

/// JSON-encode a string for embedding in a script.
pub fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Quote `s` as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences, so text containing both quote kinds is
/// split and joined with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }
    let parts: Vec<String> = s
        .split('\'')
        .map(|p| format!("'{}'", p))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
