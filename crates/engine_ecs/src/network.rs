//! Network identity hand-off.
//!
//! The core only guarantees that a [`NetworkBridge`] hears about each
//! [`NetworkIdentity`] exactly once when it joins a world and once when it
//! leaves. Message formats belong to the bridge.

use std::sync::Arc;

use engine_component::{Capabilities, Component};
use uuid::Uuid;

use crate::entity::Entity;

/// Marks an entity as replicated over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    network_id: Uuid,
    trigger_message: bool,
}

impl NetworkIdentity {
    /// A fresh identity that notifies the bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// An identity received from a peer.
    #[must_use]
    pub fn with_id(network_id: Uuid) -> Self {
        Self {
            network_id,
            trigger_message: true,
        }
    }

    /// Suppress bridge notifications, e.g. for replicas created by the
    /// bridge itself.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.trigger_message = false;
        self
    }

    #[must_use]
    pub fn network_id(&self) -> Uuid {
        self.network_id
    }

    /// Whether joining or leaving a world notifies the bridge.
    #[must_use]
    pub fn trigger_message(&self) -> bool {
        self.trigger_message
    }
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for NetworkIdentity {
    fn type_name() -> &'static str {
        "NetworkIdentity"
    }

    fn capabilities() -> Capabilities {
        Capabilities::NETWORK_IDENTITY
    }
}

/// Receives spawn/destroy notifications for networked entities.
pub trait NetworkBridge: Send + Sync {
    /// `entity` joined a world.
    fn spawn(&self, entity: &Arc<Entity>, identity: &NetworkIdentity);

    /// `entity` left a world.
    fn destroy(&self, entity: &Arc<Entity>, identity: &NetworkIdentity);
}
