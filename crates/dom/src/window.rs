//! DOM Window object implementation.

use crate::document::{Document, DocumentRef};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a browsing context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        WindowId(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Browsing context: a document plus the windows it opened.
pub struct Window {
    id: WindowId,
    /// Associated document.
    pub document: DocumentRef,
    /// Window name (the `target` it was opened with).
    pub name: String,
    /// Current location.
    pub location: Url,
    /// Window that opened this one.
    pub opener: Option<WindowId>,
    /// Whether `open` may create new browsing contexts.
    pub popups_allowed: bool,
    /// Closed flag.
    pub closed: bool,
    opened: Vec<WindowRef>,
}

/// Shared window reference.
pub type WindowRef = Arc<RwLock<Window>>;

impl Window {
    pub fn new(document: DocumentRef) -> Self {
        let location = document.read().url.clone();
        Self {
            id: WindowId::next(),
            document,
            name: String::new(),
            location,
            opener: None,
            popups_allowed: true,
            closed: false,
            opened: Vec::new(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Open a URL in a new browsing context.
    ///
    /// Returns `None` when popups are blocked or the URL does not parse,
    /// mirroring `window.open` returning `null`.
    pub fn open(&mut self, url: &str, target: &str) -> Option<WindowRef> {
        if !self.popups_allowed {
            warn!(target = target, "window.open blocked");
            return None;
        }
        let location = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "window.open with invalid URL");
                return None;
            }
        };

        let document = Arc::new(RwLock::new(Document::with_skeleton(location.clone())));
        let mut child = Window::new(document);
        child.name = target.to_string();
        child.opener = Some(self.id);

        debug!(id = child.id.get(), scheme = location.scheme(), "opened window");
        let child = Arc::new(RwLock::new(child));
        self.opened.push(child.clone());
        Some(child)
    }

    /// Windows opened from this one that are still open, oldest first.
    pub fn opened(&self) -> Vec<WindowRef> {
        self.opened
            .iter()
            .filter(|w| !w.read().closed)
            .cloned()
            .collect()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(Arc::new(RwLock::new(Document::blank())))
    }

    #[test]
    fn test_open_records_child() {
        let mut win = window();
        let child = win.open("data:text/plain,hi", "_blank").unwrap();

        assert_eq!(child.read().opener, Some(win.id()));
        assert_eq!(child.read().location.scheme(), "data");
        assert_eq!(win.opened().len(), 1);

        child.write().close();
        assert!(win.opened().is_empty());
    }

    #[test]
    fn test_open_blocked() {
        let mut win = window();
        win.popups_allowed = false;
        assert!(win.open("about:blank", "_blank").is_none());
    }

    #[test]
    fn test_open_invalid_url() {
        let mut win = window();
        assert!(win.open("not a url", "_blank").is_none());
    }
}
