//! The host a set of wrappers runs against.

use crate::canvas::{Context2d, Context2dRef};
use crate::config::MediafyConfig;
use common::{MediafyError, MediafyResult};
use dom::{Document, DocumentRef, Event, EventType, NodeId, Window, WindowRef};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;
use web_apis::{Navigator, ObjectUrlRegistry, UserMedia};

/// Document, window and navigator handles shared by wrappers.
///
/// The camera entry point is resolved once, when the environment is
/// built; later changes to the navigator are not observed.
#[derive(Clone)]
pub struct Environment {
    document: DocumentRef,
    window: WindowRef,
    navigator: Arc<Navigator>,
    user_media: UserMedia,
    object_urls: Arc<ObjectUrlRegistry>,
    contexts: Arc<Mutex<HashMap<NodeId, Context2dRef>>>,
    config: Arc<MediafyConfig>,
}

impl Environment {
    /// Blank document at `config.document_url` with a default navigator.
    pub fn new(config: MediafyConfig) -> MediafyResult<Self> {
        let url = Url::parse(&config.document_url)
            .map_err(|e| MediafyError::invalid(format!("document URL {}: {}", config.document_url, e)))?;
        let document = Arc::new(RwLock::new(Document::with_skeleton(url)));
        Ok(Self::with_host(document, Navigator::new(), config))
    }

    /// Wrap an existing document and navigator.
    pub fn with_host(document: DocumentRef, navigator: Navigator, config: MediafyConfig) -> Self {
        let user_media = UserMedia::detect(&navigator);
        let object_urls = Arc::new(ObjectUrlRegistry::new(&document.read().url));
        let window = Arc::new(RwLock::new(Window::new(document.clone())));
        debug!(
            url = %document.read().url,
            camera = ?user_media.api(),
            "environment created"
        );
        Self {
            document,
            window,
            navigator: Arc::new(navigator),
            user_media,
            object_urls,
            contexts: Arc::new(Mutex::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn window(&self) -> &WindowRef {
        &self.window
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Camera capability resolved at construction.
    pub fn user_media(&self) -> &UserMedia {
        &self.user_media
    }

    pub fn object_urls(&self) -> &Arc<ObjectUrlRegistry> {
        &self.object_urls
    }

    pub fn config(&self) -> &MediafyConfig {
        &self.config
    }

    /// The 2D context of a canvas, created on first request. Contexts of
    /// canvases freed from the tree are dropped first.
    pub(crate) fn context_2d(&self, canvas: NodeId) -> Context2dRef {
        let doc = self.document.read();
        let mut contexts = self.contexts.lock();
        let before = contexts.len();
        contexts.retain(|node, _| doc.tree.get(*node).is_some());
        if contexts.len() < before {
            trace!(evicted = before - contexts.len(), "dropped contexts of freed canvases");
        }
        contexts
            .entry(canvas)
            .or_insert_with(|| Arc::new(Mutex::new(Context2d::new(self.document.clone(), canvas))))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn context_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Fire an event at `target`. Callbacks run with no document lock held.
    pub fn dispatch_event(&self, target: NodeId, event_type: EventType) -> bool {
        let callbacks = self.document.write().events.take_callbacks(target, &event_type);
        trace!(event = event_type.as_str(), listeners = callbacks.len(), "dispatching");
        let mut event = Event::new(event_type);
        dom::events::invoke(target, &callbacks, &mut event)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("url", &self.document.read().url.as_str())
            .field("camera", &self.user_media.api())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use web_apis::{CameraApis, UserMediaApi};

    #[test]
    fn test_new_has_body_and_camera() {
        let env = Environment::new(MediafyConfig::default()).unwrap();
        assert!(env.document().read().body().is_some());
        assert_eq!(env.user_media().api(), Some(UserMediaApi::MediaDevices));
        assert!(env.object_urls().origin() == "null");
    }

    #[test]
    fn test_invalid_document_url() {
        let config = MediafyConfig::default().with_document_url("no scheme");
        assert!(matches!(
            Environment::new(config),
            Err(MediafyError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_capability_resolved_once() {
        let document = Arc::new(RwLock::new(Document::blank()));
        let navigator = Navigator::new().with_camera_apis(CameraApis::MS);
        let env = Environment::with_host(document, navigator, MediafyConfig::default());
        assert_eq!(env.user_media().api(), Some(UserMediaApi::Ms));
    }

    #[test]
    fn test_handler_may_lock_document() {
        let env = Environment::new(MediafyConfig::default()).unwrap();
        let node = env.document().write().create_element("video");
        let fired = Arc::new(AtomicBool::new(false));

        let inner_env = env.clone();
        let flag = fired.clone();
        env.document().write().events.set_handler(
            node,
            &EventType::LoadedMetadata,
            Some(Arc::new(move |_: &mut Event| {
                // Would deadlock if dispatch held the lock.
                let _ = inner_env.document().write().body();
                flag.store(true, Ordering::SeqCst);
            })),
        );

        env.dispatch_event(node, EventType::LoadedMetadata);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_freed_canvas_context_evicted() {
        let env = Environment::new(MediafyConfig::default()).unwrap();
        let (first, second) = {
            let mut doc = env.document().write();
            (doc.create_element("canvas"), doc.create_element("canvas"))
        };

        let ctx = env.context_2d(first);
        assert!(Arc::ptr_eq(&ctx, &env.context_2d(first)));
        assert_eq!(env.context_count(), 1);

        env.document().write().tree.remove(first);
        env.context_2d(second);
        assert_eq!(env.context_count(), 1);

        for _ in 0..8 {
            let node = env.document().write().create_element("canvas");
            env.context_2d(node);
            env.document().write().tree.remove(node);
        }
        assert_eq!(env.context_count(), 2);
    }
}
