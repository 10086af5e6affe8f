//! DOM Events implementation.
//!
//! Only target-phase dispatch is modelled: media element events do not
//! bubble, and nothing in this workspace listens on ancestors.

use crate::node::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Event type enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    // Media events
    LoadStart,
    LoadedMetadata,
    LoadedData,
    Play,
    Playing,
    Pause,
    Emptied,
    Ended,

    // Document/Window events
    Load,
    Error,

    Custom(String),
}

impl EventType {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "loadstart" => EventType::LoadStart,
            "loadedmetadata" => EventType::LoadedMetadata,
            "loadeddata" => EventType::LoadedData,
            "play" => EventType::Play,
            "playing" => EventType::Playing,
            "pause" => EventType::Pause,
            "emptied" => EventType::Emptied,
            "ended" => EventType::Ended,
            "load" => EventType::Load,
            "error" => EventType::Error,
            _ => EventType::Custom(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::LoadStart => "loadstart",
            EventType::LoadedMetadata => "loadedmetadata",
            EventType::LoadedData => "loadeddata",
            EventType::Play => "play",
            EventType::Playing => "playing",
            EventType::Pause => "pause",
            EventType::Emptied => "emptied",
            EventType::Ended => "ended",
            EventType::Load => "load",
            EventType::Error => "error",
            EventType::Custom(s) => s,
        }
    }
}

/// An event being dispatched.
#[derive(Clone, Debug)]
pub struct Event {
    pub event_type: EventType,
    pub target: Option<NodeId>,
    pub cancelable: bool,
    pub default_prevented: bool,
    pub immediate_propagation_stopped: bool,
    /// Milliseconds since the Unix epoch.
    pub time_stamp: f64,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        let time_stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        Self {
            event_type,
            target: None,
            cancelable: false,
            default_prevented: false,
            immediate_propagation_stopped: false,
            time_stamp,
        }
    }

    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.immediate_propagation_stopped = true;
    }
}

/// Event listener callback type.
pub type EventCallback = Arc<dyn Fn(&mut Event) + Send + Sync>;

/// Event listener options.
#[derive(Clone, Debug, Default)]
pub struct EventListenerOptions {
    pub once: bool,
}

#[derive(Clone)]
struct EventListener {
    callback: EventCallback,
    options: EventListenerOptions,
}

/// Listener registry keyed by node and event type.
///
/// Each `(node, type)` pair has an ordered list of `addEventListener`-style
/// listeners plus at most one `on<type>` handler slot; assigning the slot
/// replaces the previous handler.
#[derive(Default)]
pub struct EventManager {
    listeners: HashMap<NodeId, HashMap<String, Vec<EventListener>>>,
    handlers: HashMap<NodeId, HashMap<String, EventCallback>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &mut self,
        node: NodeId,
        event_type: &EventType,
        callback: EventCallback,
        options: EventListenerOptions,
    ) {
        self.listeners
            .entry(node)
            .or_default()
            .entry(event_type.as_str().to_string())
            .or_default()
            .push(EventListener { callback, options });
    }

    /// Assign the `on<type>` handler slot. `None` clears it.
    pub fn set_handler(&mut self, node: NodeId, event_type: &EventType, callback: Option<EventCallback>) {
        let slots = self.handlers.entry(node).or_default();
        match callback {
            Some(cb) => {
                slots.insert(event_type.as_str().to_string(), cb);
            }
            None => {
                slots.remove(event_type.as_str());
            }
        }
    }

    pub fn has_handler(&self, node: NodeId, event_type: &EventType) -> bool {
        self.handlers
            .get(&node)
            .map_or(false, |slots| slots.contains_key(event_type.as_str()))
    }

    /// Take the callbacks to run for an event, dropping `once` listeners.
    ///
    /// Callers invoke the returned callbacks with no lock held, so a
    /// handler may freely touch the document or register more listeners.
    pub fn take_callbacks(&mut self, node: NodeId, event_type: &EventType) -> Vec<EventCallback> {
        let key = event_type.as_str();
        let mut callbacks = Vec::new();

        if let Some(list) = self.listeners.get_mut(&node).and_then(|m| m.get_mut(key)) {
            callbacks.extend(list.iter().map(|l| l.callback.clone()));
            list.retain(|l| !l.options.once);
        }
        if let Some(handler) = self.handlers.get(&node).and_then(|m| m.get(key)) {
            callbacks.push(handler.clone());
        }

        callbacks
    }

    /// Dispatch directly to the target's callbacks.
    pub fn dispatch(&mut self, target: NodeId, event: &mut Event) -> bool {
        let callbacks = self.take_callbacks(target, &event.event_type);
        invoke(target, &callbacks, event)
    }

    /// Remove all listeners and handlers for a node.
    pub fn remove_all(&mut self, node: NodeId) {
        self.listeners.remove(&node);
        self.handlers.remove(&node);
    }
}

/// Run callbacks for an event at `target`. Returns false if the default
/// action was prevented.
pub fn invoke(target: NodeId, callbacks: &[EventCallback], event: &mut Event) -> bool {
    event.target = Some(target);
    for callback in callbacks {
        callback(event);
        if event.immediate_propagation_stopped {
            break;
        }
    }
    !event.default_prevented
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node() -> NodeId {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(EventType::parse("loadedmetadata"), EventType::LoadedMetadata);
        assert_eq!(EventType::parse("PLAY"), EventType::Play);
        assert_eq!(
            EventType::parse("frame"),
            EventType::Custom("frame".to_string())
        );
    }

    #[test]
    fn test_handler_slot_replaces() {
        let target = node();
        let mut events = EventManager::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        events.set_handler(target, &EventType::LoadedMetadata, Some(Arc::new(move |_: &mut Event| {
            f.fetch_add(1, Ordering::SeqCst);
        })));
        let s = second.clone();
        events.set_handler(target, &EventType::LoadedMetadata, Some(Arc::new(move |_: &mut Event| {
            s.fetch_add(1, Ordering::SeqCst);
        })));

        events.dispatch(target, &mut Event::new(EventType::LoadedMetadata));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_once_listener() {
        let target = node();
        let mut events = EventManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        events.add_listener(
            target,
            &EventType::Play,
            Arc::new(move |_: &mut Event| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            EventListenerOptions { once: true },
        );

        events.dispatch(target, &mut Event::new(EventType::Play));
        events.dispatch(target, &mut Event::new(EventType::Play));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prevent_default_requires_cancelable() {
        let mut event = Event::new(EventType::Play);
        event.prevent_default();
        assert!(!event.default_prevented);

        event.cancelable = true;
        event.prevent_default();
        assert!(event.default_prevented);
    }
}
