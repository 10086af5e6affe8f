//! Object URLs (`URL.createObjectURL` / `URL.revokeObjectURL`).

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;
use url::Url;
use uuid::Uuid;

/// Registry mapping `blob:` URLs to the id of the object they stand for.
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    origin: String,
    entries: RwLock<HashMap<String, String>>,
}

impl ObjectUrlRegistry {
    /// URLs are minted under the serialized origin of `base`
    /// (`null` for opaque origins such as `about:blank`).
    pub fn new(base: &Url) -> Self {
        Self::with_origin(base.origin().ascii_serialization())
    }

    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Mint a new URL for `object_id`.
    pub fn create_object_url(&self, object_id: &str) -> String {
        let url = format!("blob:{}/{}", self.origin, Uuid::new_v4());
        trace!(url = %url, object = object_id, "object URL created");
        self.entries.write().insert(url.clone(), object_id.to_string());
        url
    }

    /// Revoke a URL. Returns false if it was not registered.
    pub fn revoke_object_url(&self, url: &str) -> bool {
        let removed = self.entries.write().remove(url).is_some();
        if removed {
            trace!(url = %url, "object URL revoked");
        }
        removed
    }

    /// Id of the object a live URL stands for.
    pub fn resolve(&self, url: &str) -> Option<String> {
        self.entries.read().get(url).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_revoke() {
        let registry = ObjectUrlRegistry::new(&Url::parse("https://example.com/app").unwrap());
        let url = registry.create_object_url("stream-1");
        assert!(url.starts_with("blob:https://example.com/"));
        assert_eq!(registry.resolve(&url).as_deref(), Some("stream-1"));

        assert!(registry.revoke_object_url(&url));
        assert!(!registry.revoke_object_url(&url));
        assert!(registry.resolve(&url).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_opaque_origin() {
        let registry = ObjectUrlRegistry::new(&Url::parse("about:blank").unwrap());
        let a = registry.create_object_url("a");
        let b = registry.create_object_url("b");
        assert!(a.starts_with("blob:null/"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_url_path_is_random_uuid() {
        let registry = ObjectUrlRegistry::with_origin("https://example.com");
        let url = registry.create_object_url("stream");
        let id = url.strip_prefix("blob:https://example.com/").unwrap();
        let parsed = Uuid::parse_str(id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.to_string(), id);
    }
}
