//! One marker per port per placed block.

use crate::id::{MarkerId, PortDirection, PortRef};
use crate::types::{KindSet, PrimitiveKind};

/// Type-narrowing state of one port.
///
/// An input marker has at most one `connection` (its upstream output). An
/// output marker has any number of `downstream` inputs.
#[derive(Debug, Clone)]
pub struct Marker {
    pub(crate) id: MarkerId,
    pub(crate) port: PortRef,
    pub(crate) direction: PortDirection,
    pub(crate) group: Option<String>,
    /// The port's accepted kinds from its definition.
    pub(crate) declared: KindSet,
    /// Kind of the input's configured value, if it has one.
    pub(crate) pinned: Option<PrimitiveKind>,
    pub(crate) candidates: KindSet,
    pub(crate) group_peers: Vec<MarkerId>,
    pub(crate) connection: Option<MarkerId>,
    pub(crate) downstream: Vec<MarkerId>,
}

impl Marker {
    pub(crate) fn new(
        id: MarkerId,
        port: PortRef,
        direction: PortDirection,
        group: Option<String>,
        declared: KindSet,
    ) -> Self {
        Self {
            id,
            port,
            direction,
            group,
            declared,
            pinned: None,
            candidates: declared,
            group_peers: Vec::new(),
            connection: None,
            downstream: Vec::new(),
        }
    }

    pub fn id(&self) -> MarkerId {
        self.id
    }

    pub fn port(&self) -> &PortRef {
        &self.port
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn declared_kinds(&self) -> KindSet {
        self.declared
    }

    pub fn pinned_kind(&self) -> Option<PrimitiveKind> {
        self.pinned
    }

    /// What this marker allows on its own: its pin, else its declared kinds.
    pub fn base_kinds(&self) -> KindSet {
        self.pinned.map_or(self.declared, KindSet::of)
    }

    pub fn candidate_kinds(&self) -> KindSet {
        self.candidates
    }

    pub fn group_peers(&self) -> &[MarkerId] {
        &self.group_peers
    }

    /// Upstream output of an input marker.
    pub fn connection(&self) -> Option<MarkerId> {
        self.connection
    }

    /// Inputs fed by an output marker.
    pub fn downstream(&self) -> &[MarkerId] {
        &self.downstream
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() || !self.downstream.is_empty()
    }

    /// Markers one hop away: wires in both directions plus group peers.
    pub(crate) fn neighbors(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.connection
            .iter()
            .chain(self.downstream.iter())
            .chain(self.group_peers.iter())
            .copied()
    }
}
