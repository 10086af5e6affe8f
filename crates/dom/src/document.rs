//! DOM Document implementation.

use crate::element::{ElementData, TagName};
use crate::events::EventManager;
use crate::node::NodeId;
use crate::tree::DomTree;
use common::{MediafyError, MediafyResult};
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// Document ready state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// DOM Document.
pub struct Document {
    /// The DOM tree.
    pub tree: DomTree,
    /// Document URL.
    pub url: Url,
    /// Ready state.
    pub ready_state: ReadyState,
    /// Document element (<html>).
    pub document_element: Option<NodeId>,
    /// Head element.
    pub head: Option<NodeId>,
    /// Body element.
    pub body: Option<NodeId>,
    /// Listeners and `on<type>` handlers of every node in this document.
    pub events: EventManager,
}

impl Document {
    /// Create an empty document with no elements.
    pub fn new(url: Url) -> Self {
        Self {
            tree: DomTree::new(),
            url,
            ready_state: ReadyState::Loading,
            document_element: None,
            head: None,
            body: None,
            events: EventManager::new(),
        }
    }

    /// Create a document with the `<html><head></head><body></body></html>` skeleton.
    pub fn with_skeleton(url: Url) -> Self {
        let mut doc = Self::new(url);
        let root = doc.tree.root();

        let html = doc.tree.create_element(ElementData::new(TagName::html()));
        let head = doc.tree.create_element(ElementData::new(TagName::head()));
        let body = doc.tree.create_element(ElementData::new(TagName::body()));
        doc.tree.append_child(root, html);
        doc.tree.append_child(html, head);
        doc.tree.append_child(html, body);

        doc.document_element = Some(html);
        doc.head = Some(head);
        doc.body = Some(body);
        doc.ready_state = ReadyState::Complete;
        doc
    }

    /// Create a blank document (`about:blank`) with a body.
    pub fn blank() -> Self {
        Self::with_skeleton(Url::parse("about:blank").expect("static URL is valid"))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.body
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.tree.create_element(ElementData::new(TagName::new(tag_name)))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree.find_element_by_id(id)
    }

    pub fn query_selector(&self, selector: &str) -> MediafyResult<Option<NodeId>> {
        self.tree.query_selector(selector)
    }

    pub fn query_selector_all(&self, selector: &str) -> MediafyResult<Vec<NodeId>> {
        self.tree.query_selector_all(selector)
    }

    /// Append a node to `<body>`.
    pub fn append_to_body(&mut self, node: NodeId) -> MediafyResult<()> {
        let body = self.body.ok_or(MediafyError::NoBody)?;
        self.tree.append_child(body, node);
        Ok(())
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.tree.outer_html(self.tree.root())
    }
}

/// Shared document reference.
pub type DocumentRef = Arc<RwLock<Document>>;
