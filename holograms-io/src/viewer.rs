use crate::location::Location;
use crate::version::ProtocolVersion;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Stable identity of a connected participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(pub Uuid);

impl ViewerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Snapshot of a viewer as the world engine reports it.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: ViewerId,
    pub name: String,
    pub location: Location,
    pub permissions: HashSet<String>,
    pub protocol: ProtocolVersion,
    pub sneaking: bool,
}

impl Viewer {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: ViewerId::random(),
            name: name.into(),
            location,
            permissions: HashSet::new(),
            protocol: ProtocolVersion::default(),
            sneaking: false,
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }
}

/// Connect/disconnect notifications from the connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    Connected(ViewerId),
    Disconnected(ViewerId),
}

/// Read access to the set of connected viewers.
///
/// Lookups for unknown or disconnected viewers answer "no" / `None`; they never fail.
pub trait ViewerDirectory: Send + Sync {
    fn is_connected(&self, viewer: ViewerId) -> bool;

    /// Feet position of the viewer.
    fn location(&self, viewer: ViewerId) -> Option<Location>;

    fn has_permission(&self, viewer: ViewerId, permission: &str) -> bool;

    fn protocol(&self, viewer: ViewerId) -> Option<ProtocolVersion>;

    fn is_sneaking(&self, _viewer: ViewerId) -> bool {
        false
    }

    /// Every viewer currently connected.
    fn online(&self) -> Vec<ViewerId>;
}

/// In-memory viewer directory fed by the connection layer.
/// Connects and disconnects are broadcast to subscribers.
pub struct ViewerRegistry {
    viewers: DashMap<ViewerId, Viewer>,
    events: broadcast::Sender<ViewerEvent>,
}

impl fmt::Debug for ViewerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerRegistry")
            .field("online", &self.viewers.len())
            .finish()
    }
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            viewers: DashMap::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.events.subscribe()
    }

    pub fn connect(&self, viewer: Viewer) -> ViewerId {
        let id = viewer.id;
        tracing::debug!(viewer = %id, name = %viewer.name, "viewer connected");
        self.viewers.insert(id, viewer);
        // No subscribers is fine.
        let _ = self.events.send(ViewerEvent::Connected(id));
        id
    }

    pub fn disconnect(&self, id: ViewerId) -> Option<Viewer> {
        let removed = self.viewers.remove(&id).map(|(_, v)| v);
        if removed.is_some() {
            tracing::debug!(viewer = %id, "viewer disconnected");
            let _ = self.events.send(ViewerEvent::Disconnected(id));
        }
        removed
    }

    pub fn move_to(&self, id: ViewerId, location: Location) -> bool {
        match self.viewers.get_mut(&id) {
            Some(mut viewer) => {
                viewer.location = location;
                true
            }
            None => false,
        }
    }

    pub fn set_sneaking(&self, id: ViewerId, sneaking: bool) -> bool {
        match self.viewers.get_mut(&id) {
            Some(mut viewer) => {
                viewer.sneaking = sneaking;
                true
            }
            None => false,
        }
    }

    pub fn grant(&self, id: ViewerId, permission: impl Into<String>) -> bool {
        match self.viewers.get_mut(&id) {
            Some(mut viewer) => viewer.permissions.insert(permission.into()),
            None => false,
        }
    }

    pub fn revoke(&self, id: ViewerId, permission: &str) -> bool {
        match self.viewers.get_mut(&id) {
            Some(mut viewer) => viewer.permissions.remove(permission),
            None => false,
        }
    }

    pub fn get(&self, id: ViewerId) -> Option<Viewer> {
        self.viewers.get(&id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

impl ViewerDirectory for ViewerRegistry {
    fn is_connected(&self, viewer: ViewerId) -> bool {
        self.viewers.contains_key(&viewer)
    }

    fn location(&self, viewer: ViewerId) -> Option<Location> {
        self.viewers.get(&viewer).map(|v| v.location.clone())
    }

    fn has_permission(&self, viewer: ViewerId, permission: &str) -> bool {
        self.viewers
            .get(&viewer)
            .is_some_and(|v| v.permissions.contains(permission))
    }

    fn protocol(&self, viewer: ViewerId) -> Option<ProtocolVersion> {
        self.viewers.get(&viewer).map(|v| v.protocol)
    }

    fn is_sneaking(&self, viewer: ViewerId) -> bool {
        self.viewers.get(&viewer).is_some_and(|v| v.sneaking)
    }

    fn online(&self) -> Vec<ViewerId> {
        self.viewers.iter().map(|entry| *entry.key()).collect()
    }
}
