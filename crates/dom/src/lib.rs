//! DOM (Document Object Model) implementation.
//!
//! This crate provides the element tree the media wrappers operate on:
//! documents with a body, elements with attributes, reflected properties
//! and pixel surfaces, event handler slots, and windows.

pub mod attributes;
pub mod document;
pub mod element;
pub mod events;
pub mod node;
pub mod properties;
pub mod tree;
pub mod window;

pub use attributes::AttributeMap;
pub use document::{Document, DocumentRef, ReadyState};
pub use element::{ElementData, TagName, DEFAULT_CANVAS_SIZE};
pub use events::{Event, EventCallback, EventListenerOptions, EventManager, EventType};
pub use node::{Node, NodeData, NodeId};
pub use properties::{PropertyMap, PropertyValue};
pub use tree::DomTree;
pub use window::{Window, WindowId, WindowRef};
