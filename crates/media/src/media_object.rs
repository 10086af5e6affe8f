//! Base element wrapper shared by [`Video`](crate::Video) and
//! [`Canvas`](crate::Canvas).

use crate::environment::Environment;
use crate::util;
use common::{MediafyError, MediafyResult};
use dom::{ElementData, NodeId, PropertyMap, PropertyValue};
use tracing::{debug, trace, warn};

/// How a wrapper obtains its element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Source<'a> {
    /// Wrap the first element matching a selector.
    Select(&'a str),
    /// Create a new element, optionally sized, and append it to `<body>`.
    Create(Option<(u32, u32)>),
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(selector: &'a str) -> Self {
        Source::Select(selector)
    }
}

impl From<(u32, u32)> for Source<'_> {
    fn from(size: (u32, u32)) -> Self {
        Source::Create(Some(size))
    }
}

impl From<Option<(u32, u32)>> for Source<'_> {
    fn from(size: Option<(u32, u32)>) -> Self {
        Source::Create(size)
    }
}

/// Result of [`ElementWrapper::get`].
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    /// No attribute was asked for, or the property is absent.
    Element(NodeId),
    /// The property value, even when falsy.
    Value(PropertyValue),
}

impl Lookup {
    pub fn value(&self) -> Option<&PropertyValue> {
        match self {
            Lookup::Value(v) => Some(v),
            Lookup::Element(_) => None,
        }
    }

    pub fn element(&self) -> Option<NodeId> {
        match self {
            Lookup::Element(id) => Some(*id),
            Lookup::Value(_) => None,
        }
    }
}

/// A handle to one element of an [`Environment`]'s document.
#[derive(Clone, Debug)]
pub struct MediaObject {
    env: Environment,
    node: NodeId,
}

impl MediaObject {
    /// Select or create an element with tag `tag`.
    pub fn new(env: &Environment, tag: &'static str, source: Source<'_>) -> MediafyResult<Self> {
        let node = match source {
            Source::Select(selector) => Self::select(env, tag, selector)?,
            Source::Create(size) => Self::create(env, tag, size)?,
        };
        Ok(Self {
            env: env.clone(),
            node,
        })
    }

    fn select(env: &Environment, tag: &'static str, selector: &str) -> MediafyResult<NodeId> {
        let doc = env.document().read();
        let Some(node) = doc.query_selector(selector)? else {
            warn!(selector, "no element matches selector");
            return Err(MediafyError::not_found(selector));
        };
        let found = doc
            .tree
            .get_element(node)
            .map(|e| e.tag_name.as_str().to_string())
            .unwrap_or_default();
        if found != tag {
            return Err(MediafyError::TagMismatch { expected: tag, found });
        }
        trace!(selector, tag, "selected element");
        Ok(node)
    }

    fn create(env: &Environment, tag: &'static str, size: Option<(u32, u32)>) -> MediafyResult<NodeId> {
        let mut doc = env.document().write();
        let node = doc.create_element(tag);
        if let Some((width, height)) = size {
            if let Some(elem) = doc.tree.get_element_mut(node) {
                elem.set_property("width", width.into());
                elem.set_property("height", height.into());
            }
        }
        doc.append_to_body(node)?;
        debug!(tag, ?size, "created element");
        Ok(node)
    }

    pub fn element(&self) -> NodeId {
        self.node
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run `f` against the element's data.
    pub fn with_element<R>(&self, f: impl FnOnce(&ElementData) -> R) -> MediafyResult<R> {
        let doc = self.env.document().read();
        let elem = doc.tree.get_element(self.node).ok_or(MediafyError::StaleElement)?;
        Ok(f(elem))
    }

    pub fn with_element_mut<R>(&self, f: impl FnOnce(&mut ElementData) -> R) -> MediafyResult<R> {
        let mut doc = self.env.document().write();
        let elem = doc
            .tree
            .get_element_mut(self.node)
            .ok_or(MediafyError::StaleElement)?;
        Ok(f(elem))
    }

    /// Detach the element from its parent.
    pub fn remove(&self) -> MediafyResult<()> {
        let mut doc = self.env.document().write();
        if doc.tree.get(self.node).is_none() {
            return Err(MediafyError::StaleElement);
        }
        doc.tree
            .remove_from_parent(self.node)
            .ok_or(MediafyError::NoParent)?;
        debug!("removed element from document");
        Ok(())
    }

    /// Flip the hide class. Returns whether the element is now hidden.
    pub fn toggle_visibility(&self) -> MediafyResult<bool> {
        let class = self.env.config().hide_class.clone();
        self.with_element_mut(|e| e.toggle_class(&class))
    }

    pub fn get(&self, attr: Option<&str>) -> MediafyResult<Lookup> {
        let Some(attr) = attr else {
            return Ok(Lookup::Element(self.node));
        };
        let value = self.with_element(|e| e.property(attr))?;
        Ok(match value {
            Some(v) => Lookup::Value(v),
            None => Lookup::Element(self.node),
        })
    }

    /// Property value, or `None` when absent.
    pub fn property(&self, attr: &str) -> MediafyResult<Option<PropertyValue>> {
        self.with_element(|e| e.property(attr))
    }

    pub fn set(&self, attr: &str, value: PropertyValue) -> MediafyResult<()> {
        trace!(attr, %value, "set property");
        self.with_element_mut(|e| e.set_property(attr, value))
    }

    /// Merge `props` onto the element's expando properties, then write every
    /// merged property back.
    pub fn assign(&self, props: &PropertyMap) -> MediafyResult<()> {
        self.with_element_mut(|e| {
            let current: PropertyMap = e
                .expando_names()
                .filter_map(|name| e.property(name).map(|v| (name.to_string(), v)))
                .collect();
            let merged = util::extend(current, props);
            for (name, value) in merged {
                e.set_property(&name, value);
            }
        })
    }

    /// Reported width and height, zero when absent or non-numeric.
    pub fn dimensions(&self) -> MediafyResult<(f64, f64)> {
        self.with_element(|e| {
            let read = |name| e.property(name).and_then(|v| v.as_f64()).unwrap_or(0.0);
            (read("width"), read("height"))
        })
    }
}

/// Behaviour shared by every element wrapper.
///
/// Mutators return the wrapper itself so calls chain:
/// `video.set("id", "cam".into())?.toggle_visibility()?`.
pub trait ElementWrapper {
    /// Tag name of the element this wrapper creates.
    const TAG: &'static str;

    fn object(&self) -> &MediaObject;

    fn element(&self) -> NodeId {
        self.object().element()
    }

    fn remove(&self) -> MediafyResult<&Self> {
        self.object().remove()?;
        Ok(self)
    }

    fn toggle_visibility(&self) -> MediafyResult<&Self> {
        self.object().toggle_visibility()?;
        Ok(self)
    }

    /// The element when `attr` is `None` or the property is absent,
    /// otherwise the property value.
    fn get(&self, attr: Option<&str>) -> MediafyResult<Lookup> {
        self.object().get(attr)
    }

    fn set(&self, attr: &str, value: PropertyValue) -> MediafyResult<&Self> {
        self.object().set(attr, value)?;
        Ok(self)
    }

    fn assign(&self, props: &PropertyMap) -> MediafyResult<&Self> {
        self.object().assign(props)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediafyConfig;
    use crate::Video;

    fn env() -> Environment {
        Environment::new(MediafyConfig::default()).unwrap()
    }

    #[test]
    fn test_create_appends_to_body() {
        let env = env();
        let obj = MediaObject::new(&env, "video", Source::Create(Some((320, 240)))).unwrap();

        let doc = env.document().read();
        let body = doc.body().unwrap();
        assert_eq!(doc.tree.parent(obj.element()), Some(body));
        drop(doc);

        assert_eq!(obj.dimensions().unwrap(), (320.0, 240.0));
    }

    #[test]
    fn test_create_without_size() {
        let env = env();
        let obj = MediaObject::new(&env, "canvas", Source::Create(None)).unwrap();
        assert_eq!(obj.dimensions().unwrap(), (300.0, 150.0));
    }

    #[test]
    fn test_select_existing() {
        let env = env();
        let created = MediaObject::new(&env, "video", Source::Create(None)).unwrap();
        created.set("id", "cam".into()).unwrap();

        let selected = MediaObject::new(&env, "video", "#cam".into()).unwrap();
        assert_eq!(selected.element(), created.element());
    }

    #[test]
    fn test_select_missing() {
        let env = env();
        let err = MediaObject::new(&env, "video", "#nope".into()).unwrap_err();
        assert!(matches!(err, MediafyError::NotFound(s) if s == "#nope"));
    }

    #[test]
    fn test_select_through_combinators() {
        let env = env();
        let created = Video::new(&env, Source::Create(None)).unwrap();

        let selected = Video::new(&env, "body video").unwrap();
        assert_eq!(selected.element(), created.element());
        let selected = Video::new(&env, "html > body > video").unwrap();
        assert_eq!(selected.element(), created.element());
        assert!(matches!(
            Video::new(&env, "head video"),
            Err(MediafyError::NotFound(_))
        ));
    }

    #[test]
    fn test_select_bad_syntax() {
        let env = env();
        Video::new(&env, Source::Create(None)).unwrap();
        assert!(matches!(
            Video::new(&env, "body >"),
            Err(MediafyError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_select_wrong_tag() {
        let env = env();
        MediaObject::new(&env, "canvas", Source::Create(None)).unwrap();
        let err = MediaObject::new(&env, "video", "canvas".into()).unwrap_err();
        assert!(matches!(
            err,
            MediafyError::TagMismatch { expected: "video", .. }
        ));
    }

    #[test]
    fn test_remove_twice() {
        let env = env();
        let obj = MediaObject::new(&env, "canvas", Source::Create(None)).unwrap();
        obj.remove().unwrap();
        assert!(!env.document().read().tree.is_connected(obj.element()));
        assert!(matches!(obj.remove(), Err(MediafyError::NoParent)));
    }

    #[test]
    fn test_toggle_visibility() {
        let env = Environment::new(MediafyConfig::default().with_hide_class("gone")).unwrap();
        let obj = MediaObject::new(&env, "video", Source::Create(None)).unwrap();

        assert!(obj.toggle_visibility().unwrap());
        assert_eq!(
            obj.get(Some("className")).unwrap(),
            Lookup::Value("gone".into())
        );
        assert!(!obj.toggle_visibility().unwrap());
        assert_eq!(obj.get(Some("className")).unwrap(), Lookup::Value("".into()));
    }

    #[test]
    fn test_get_falsy_and_absent() {
        let env = env();
        let obj = MediaObject::new(&env, "video", Source::Create(None)).unwrap();
        let elem = obj.element();

        assert_eq!(obj.get(None).unwrap(), Lookup::Element(elem));
        assert_eq!(obj.get(Some("poster")).unwrap(), Lookup::Element(elem));
        assert_eq!(
            obj.get(Some("width")).unwrap(),
            Lookup::Value(PropertyValue::Number(0.0))
        );
        assert_eq!(
            obj.get(Some("paused")).unwrap(),
            Lookup::Value(PropertyValue::Bool(true))
        );

        obj.set("label", "".into()).unwrap();
        assert_eq!(obj.get(Some("label")).unwrap(), Lookup::Value("".into()));
    }

    #[test]
    fn test_assign_merges() {
        let env = env();
        let obj = MediaObject::new(&env, "video", Source::Create(None)).unwrap();
        obj.set("label", "front".into()).unwrap();

        let mut props = PropertyMap::new();
        props.insert("id".to_string(), "cam".into());
        props.insert("label".to_string(), "back".into());
        obj.assign(&props).unwrap();

        assert_eq!(obj.property("id").unwrap(), Some("cam".into()));
        assert_eq!(obj.property("label").unwrap(), Some("back".into()));
        assert_eq!(obj.property("muted").unwrap(), Some(false.into()));
    }

    #[test]
    fn test_stale_element() {
        let env = env();
        let obj = MediaObject::new(&env, "video", Source::Create(None)).unwrap();
        env.document().write().tree.remove(obj.element());
        assert!(matches!(obj.get(Some("id")), Err(MediafyError::StaleElement)));
        assert!(matches!(obj.remove(), Err(MediafyError::StaleElement)));
    }
}
