//! DOM Element implementation.

use crate::attributes::AttributeMap;
use crate::properties::PropertyValue;
use bitflags::bitflags;
use common::{Bitmap, SharedBitmap, Size};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Default canvas dimensions when no width/height attribute is present.
pub const DEFAULT_CANVAS_SIZE: Size = Size::new(300, 150);

/// Interned, lowercase tag name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagName(Arc<str>);

impl TagName {
    pub fn new(name: &str) -> Self {
        static INTERNED: Lazy<RwLock<HashMap<String, Arc<str>>>> =
            Lazy::new(|| RwLock::new(HashMap::new()));

        let lower = name.to_ascii_lowercase();

        {
            let cache = INTERNED.read();
            if let Some(s) = cache.get(&lower) {
                return TagName(s.clone());
            }
        }

        let mut cache = INTERNED.write();
        let s = cache
            .entry(lower.clone())
            .or_insert_with(|| Arc::from(lower.as_str()))
            .clone();
        TagName(s)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn html() -> Self {
        Self::new("html")
    }
    pub fn head() -> Self {
        Self::new("head")
    }
    pub fn body() -> Self {
        Self::new("body")
    }
    pub fn canvas() -> Self {
        Self::new("canvas")
    }
    pub fn video() -> Self {
        Self::new("video")
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for TagName {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other.to_ascii_lowercase()
    }
}

impl PartialEq<&str> for TagName {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == other.to_ascii_lowercase()
    }
}

bitflags! {
    /// Element flags for quick property checks.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ElementFlags: u32 {
        const VOID = 1 << 0;
        const HIDDEN = 1 << 1;
        const MEDIA = 1 << 2;
        const REPLACED = 1 << 3;
    }
}

/// Element-specific data.
#[derive(Clone, Debug)]
pub struct ElementData {
    /// Tag name (lowercase).
    pub tag_name: TagName,
    /// Attributes.
    pub attributes: AttributeMap,
    /// ID attribute (cached).
    pub id: Option<Arc<str>>,
    /// Class list (cached).
    pub class_list: SmallVec<[Arc<str>; 4]>,
    /// Element flags.
    pub flags: ElementFlags,
    /// Properties that do not reflect an attribute.
    expando: IndexMap<Arc<str>, PropertyValue>,
    /// Pixel surface: backing store for canvases, current frame for videos.
    surface: Option<SharedBitmap>,
}

impl ElementData {
    pub fn new(tag_name: TagName) -> Self {
        let flags = Self::default_flags(&tag_name);
        let mut expando = IndexMap::new();
        let mut surface = None;

        match tag_name.as_str() {
            "canvas" => {
                surface = Bitmap::new(DEFAULT_CANVAS_SIZE.width, DEFAULT_CANVAS_SIZE.height)
                    .ok()
                    .map(Bitmap::shared);
            }
            "video" | "audio" => {
                expando.insert(Arc::from("paused"), PropertyValue::Bool(true));
                expando.insert(Arc::from("readyState"), PropertyValue::Number(0.0));
                expando.insert(Arc::from("muted"), PropertyValue::Bool(false));
            }
            _ => {}
        }

        Self {
            tag_name,
            attributes: AttributeMap::new(),
            id: None,
            class_list: SmallVec::new(),
            flags,
            expando,
            surface,
        }
    }

    fn default_flags(tag_name: &TagName) -> ElementFlags {
        let mut flags = ElementFlags::empty();
        let name = tag_name.as_str();

        if matches!(
            name,
            "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
                | "param" | "source" | "track" | "wbr"
        ) {
            flags |= ElementFlags::VOID;
        }

        if matches!(name, "video" | "audio") {
            flags |= ElementFlags::MEDIA;
        }

        if matches!(name, "canvas" | "video" | "img") {
            flags |= ElementFlags::REPLACED;
        }

        flags
    }

    /// Set an attribute, updating cached values.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let name_lower = name.to_ascii_lowercase();

        match name_lower.as_str() {
            "id" => {
                self.id = Some(Arc::from(value));
            }
            "class" => {
                self.class_list = value.split_whitespace().map(Arc::from).collect();
            }
            "hidden" => {
                self.flags.insert(ElementFlags::HIDDEN);
            }
            _ => {}
        }

        self.attributes.set(&name_lower, value);

        if self.tag_name == "canvas" && matches!(name_lower.as_str(), "width" | "height") {
            self.reset_canvas_surface();
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, name: &str) {
        let name_lower = name.to_ascii_lowercase();

        match name_lower.as_str() {
            "id" => self.id = None,
            "class" => self.class_list.clear(),
            "hidden" => self.flags.remove(ElementFlags::HIDDEN),
            _ => {}
        }

        self.attributes.remove(&name_lower);

        if self.tag_name == "canvas" && matches!(name_lower.as_str(), "width" | "height") {
            self.reset_canvas_surface();
        }
    }

    #[inline]
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(&name.to_ascii_lowercase())
    }

    #[inline]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(&name.to_ascii_lowercase())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list.iter().any(|c| c.as_ref() == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.class_list.push(Arc::from(class));
            self.update_class_attribute();
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        if let Some(pos) = self.class_list.iter().position(|c| c.as_ref() == class) {
            self.class_list.remove(pos);
            self.update_class_attribute();
        }
    }

    /// Toggle a class. Returns whether the class is now present.
    pub fn toggle_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            self.remove_class(class);
            false
        } else {
            self.add_class(class);
            true
        }
    }

    fn update_class_attribute(&mut self) {
        let class_str = self
            .class_list
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.attributes.set("class", &class_str);
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.flags.contains(ElementFlags::VOID)
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ElementFlags::HIDDEN)
    }

    #[inline]
    pub fn is_media(&self) -> bool {
        self.flags.contains(ElementFlags::MEDIA)
    }

    // Properties

    /// Read a property. Reflected properties are derived from attributes or
    /// the surface; everything else comes from the expando map.
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "tagName" => Some(PropertyValue::Text(self.tag_name.as_str().to_ascii_uppercase())),
            "id" => Some(PropertyValue::Text(
                self.get_attribute("id").unwrap_or_default().to_string(),
            )),
            "className" => Some(PropertyValue::Text(
                self.get_attribute("class").unwrap_or_default().to_string(),
            )),
            "hidden" => Some(PropertyValue::Bool(self.is_hidden())),
            "width" | "height" if self.flags.contains(ElementFlags::REPLACED) => {
                Some(PropertyValue::Number(self.dimension(name) as f64))
            }
            "src" if self.is_media() || self.tag_name == "img" => Some(PropertyValue::Text(
                self.get_attribute("src").unwrap_or_default().to_string(),
            )),
            "videoWidth" | "videoHeight" if self.tag_name == "video" => {
                let size = self.surface_size().unwrap_or(Size::ZERO);
                let v = if name == "videoWidth" { size.width } else { size.height };
                Some(PropertyValue::Number(v as f64))
            }
            _ => self.expando.get(name).cloned(),
        }
    }

    /// Assign a property. Reflected properties write through to attributes.
    pub fn set_property(&mut self, name: &str, value: PropertyValue) {
        match name {
            "tagName" | "videoWidth" | "videoHeight" => {}
            "id" => self.set_attribute("id", &value.to_string()),
            "className" => self.set_attribute("class", &value.to_string()),
            "hidden" => {
                if value.is_truthy() {
                    self.set_attribute("hidden", "");
                } else {
                    self.remove_attribute("hidden");
                }
            }
            "width" | "height" if self.flags.contains(ElementFlags::REPLACED) => {
                let n = value.as_dimension().unwrap_or(0);
                self.set_attribute(name, &n.to_string());
            }
            "src" if self.is_media() || self.tag_name == "img" => {
                self.set_attribute("src", &value.to_string())
            }
            _ => {
                self.expando.insert(Arc::from(name), value);
            }
        }
    }

    /// Names of all expando properties, in assignment order.
    pub fn expando_names(&self) -> impl Iterator<Item = &str> {
        self.expando.keys().map(|k| k.as_ref())
    }

    /// Width or height as an integer, with per-tag defaults.
    pub fn dimension(&self, name: &str) -> u32 {
        if let Some(n) = self.get_attribute(name).and_then(|v| v.trim().parse::<u32>().ok()) {
            return n;
        }
        if self.tag_name == "canvas" {
            if name == "width" {
                DEFAULT_CANVAS_SIZE.width
            } else {
                DEFAULT_CANVAS_SIZE.height
            }
        } else {
            0
        }
    }

    // Surface

    /// Shared pixel surface, if this element has one.
    pub fn surface(&self) -> Option<SharedBitmap> {
        self.surface.clone()
    }

    /// Attach or replace the pixel surface.
    pub fn set_surface(&mut self, surface: Option<SharedBitmap>) {
        self.surface = surface;
    }

    pub fn surface_size(&self) -> Option<Size> {
        self.surface.as_ref().map(|s| s.read().size())
    }

    /// Resize the backing store. A size over the bitmap limits leaves the
    /// canvas without a surface, so no context can be acquired for it.
    fn reset_canvas_surface(&mut self) {
        let width = self.dimension("width");
        let height = self.dimension("height");
        let result = match self.surface.clone() {
            Some(surface) => surface.write().reset(width, height),
            None => Bitmap::new(width, height).map(|b| self.surface = Some(b.shared())),
        };
        if let Err(e) = result {
            warn!(width, height, error = %e, "canvas surface not allocated");
            self.surface = None;
        }
    }
}
