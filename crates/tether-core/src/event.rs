//! Registry event definitions
//!
//! Events are what the application's update function sees. They are
//! produced by the dispatcher from two foreign streams: generic registry
//! announcements and per-node info notifications.

use serde::{Deserialize, Serialize};

use crate::{ObjectId, PropertyDictionary};

/// Interface type name of a schedulable node
pub const NODE_INTERFACE: &str = "PipeWire:Interface:Node";

/// Lifecycle event of a server-side object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A global object appeared
    Added {
        id: ObjectId,
        type_name: String,
        props: PropertyDictionary,
    },
    /// A global object went away
    Removed { id: ObjectId },
    /// Properties or parameters of a bound object changed
    Updated {
        id: ObjectId,
        props: PropertyDictionary,
    },
}

impl RegistryEvent {
    pub fn id(&self) -> ObjectId {
        match self {
            RegistryEvent::Added { id, .. }
            | RegistryEvent::Removed { id }
            | RegistryEvent::Updated { id, .. } => *id,
        }
    }

    /// Properties carried by the event, if any
    pub fn props(&self) -> Option<&PropertyDictionary> {
        match self {
            RegistryEvent::Added { props, .. } | RegistryEvent::Updated { props, .. } => {
                Some(props)
            }
            RegistryEvent::Removed { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::Added { .. } => "added",
            RegistryEvent::Removed { .. } => "removed",
            RegistryEvent::Updated { .. } => "updated",
        }
    }
}
