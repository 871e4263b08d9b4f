//! Marker change notifications.

use crate::id::{MarkerId, PortDirection, PortRef};
use crate::types::KindSet;

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerEvent {
    /// A marker's candidate kinds changed.
    KindsChanged {
        marker: MarkerId,
        port: PortRef,
        direction: PortDirection,
        kinds: KindSet,
    },
    /// A wire was added from an output marker to an input marker.
    Connected { from: MarkerId, to: MarkerId },
    /// A wire was removed.
    Disconnected { from: MarkerId, to: MarkerId },
}

impl MarkerEvent {
    pub fn marker(&self) -> MarkerId {
        match self {
            MarkerEvent::KindsChanged { marker, .. } => *marker,
            MarkerEvent::Connected { to, .. } | MarkerEvent::Disconnected { to, .. } => *to,
        }
    }
}
