//! Wire compatibility and kind narrowing.
//!
//! Markers form an undirected graph whose edges are wires and group peers
//! (ports of one block sharing a `group`). Every connected component shares
//! one candidate set:
//!
//! - **connect** narrows: the new component's candidates are the
//!   intersection of the current candidates of every marker in it.
//! - **disconnect** widens: each remaining component is recomputed from the
//!   base kinds of its markers, so earlier narrowing is forgotten. A marker's
//!   base is its declared set, or the kind of its configured value when the
//!   input is pinned by one.
//!
//! Component walks track a visited set, so reconvergent wiring terminates.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::events::MarkerEvent;
use super::marker::Marker;
use crate::catalog::Catalog;
use crate::error::{CircuitError, Result};
use crate::id::{BlockUuid, MarkerId, PortDirection, PortRef};
use crate::plot::{PlacedBlock, PlotSnapshot};
use crate::types::{KindSet, PrimitiveKind};

type PortKey = (BlockUuid, PortDirection, String);

/// Owns the markers of one plot.
pub struct WireManager {
    catalog: Arc<Catalog>,
    markers: Vec<Option<Marker>>,
    by_port: HashMap<PortKey, MarkerId>,
    by_block: BTreeMap<BlockUuid, Vec<MarkerId>>,
    subscribers: Vec<Sender<MarkerEvent>>,
}

impl WireManager {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            markers: Vec::new(),
            by_port: HashMap::new(),
            by_block: BTreeMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every marker event emitted from now on.
    pub fn subscribe(&mut self) -> Receiver<MarkerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber, dropping those whose receiver is gone.
    fn emit(&mut self, event: MarkerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn emit_kinds(&mut self, changed: &[MarkerId]) {
        let events: Vec<MarkerEvent> = changed
            .iter()
            .filter_map(|&id| {
                self.marker(id).map(|marker| MarkerEvent::KindsChanged {
                    marker: id,
                    port: marker.port.clone(),
                    direction: marker.direction,
                    kinds: marker.candidates,
                })
            })
            .collect();
        for event in events {
            self.emit(event);
        }
    }

    // ── Lookup ──

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(id.index()).and_then(Option::as_ref)
    }

    fn get(&self, id: MarkerId) -> Result<&Marker> {
        self.marker(id).ok_or(CircuitError::UnknownMarker(id))
    }

    fn get_mut(&mut self, id: MarkerId) -> Result<&mut Marker> {
        self.markers
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(CircuitError::UnknownMarker(id))
    }

    pub fn marker_for(&self, block: &BlockUuid, direction: PortDirection, port: &str) -> Option<MarkerId> {
        self.by_port
            .get(&(block.clone(), direction, port.to_string()))
            .copied()
    }

    fn require(&self, block: &BlockUuid, direction: PortDirection, port: &str) -> Result<MarkerId> {
        self.marker_for(block, direction, port)
            .ok_or_else(|| CircuitError::UnknownPort {
                block: block.to_string(),
                port: port.to_string(),
            })
    }

    /// Markers of one block: inputs in definition order, then outputs.
    pub fn markers_of(&self, block: &BlockUuid) -> &[MarkerId] {
        self.by_block.get(block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn candidates(&self, id: MarkerId) -> Option<KindSet> {
        self.marker(id).map(|m| m.candidates)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_port.is_empty()
    }

    // ── Building ──

    /// Rebuild every marker from a placement snapshot.
    ///
    /// Inputs configured with a value start narrowed to that value's kind;
    /// persisted wires are then connected in snapshot order.
    pub fn build_from_plot(&mut self, plot: &PlotSnapshot) -> Result<BTreeMap<BlockUuid, Vec<MarkerId>>> {
        self.markers.clear();
        self.by_port.clear();
        self.by_block.clear();

        for block in &plot.blocks {
            self.add_block(block)?;
        }
        for block in &plot.blocks {
            for (port, wire) in block.wires() {
                let from = self.require(&wire.block, PortDirection::Output, &wire.port)?;
                let to = self.require(&block.uuid, PortDirection::Input, port)?;
                self.connect(from, to)?;
            }
        }

        tracing::info!(
            "Built {} markers for {} blocks",
            self.len(),
            self.by_block.len()
        );
        Ok(self.by_block.clone())
    }

    /// Create markers for a newly placed block.
    pub fn add_block(&mut self, block: &PlacedBlock) -> Result<Vec<MarkerId>> {
        if self.by_block.contains_key(&block.uuid) {
            return Err(CircuitError::DuplicateBlock(block.uuid.to_string()));
        }
        let definition = self
            .catalog
            .definition(&block.block_type)
            .ok_or_else(|| CircuitError::UnknownBlockType(block.block_type.clone()))?;
        let pins = block.values();
        for port in definition.ports(PortDirection::Input) {
            if let Some(value) = pins.get(&port.name) {
                if !port.accepted_kinds.has(value.kind()) {
                    return Err(CircuitError::KindNotAvailable {
                        port: format!("{}.{}", block.uuid, port.name),
                        kind: value.kind(),
                    });
                }
            }
        }

        let mut ids = Vec::new();
        for direction in [PortDirection::Input, PortDirection::Output] {
            for port in definition.ports(direction) {
                let id = MarkerId(self.markers.len() as u32);
                let mut marker = Marker::new(
                    id,
                    PortRef::new(block.uuid.clone(), port.name.clone()),
                    direction,
                    port.group.clone(),
                    port.accepted_kinds,
                );
                if let Some(value) = pins.get(&port.name).filter(|_| direction == PortDirection::Input) {
                    marker.pinned = Some(value.kind());
                    marker.candidates = KindSet::of(value.kind());
                }
                self.markers.push(Some(marker));
                self.by_port
                    .insert((block.uuid.clone(), direction, port.name.clone()), id);
                ids.push(id);
            }
        }

        // Group peers are the other markers of this block sharing a group.
        for &id in &ids {
            let group = self.get(id)?.group.clone();
            let Some(group) = group else { continue };
            let peers: Vec<MarkerId> = ids
                .iter()
                .copied()
                .filter(|&other| {
                    other != id && self.marker(other).and_then(Marker::group) == Some(group.as_str())
                })
                .collect();
            self.get_mut(id)?.group_peers = peers;
        }
        self.by_block.insert(block.uuid.clone(), ids.clone());

        let changed = self.narrow(&ids)?;
        if let Some(&empty) = ids.iter().find(|&&id| self.candidates(id) == Some(KindSet::empty())) {
            let port = self.get(empty)?.port.to_string();
            self.remove_block(&block.uuid)?;
            return Err(CircuitError::IncompatibleKinds {
                from: port,
                to: format!("configured values of {}", block.uuid),
            });
        }
        self.emit_kinds(&changed);
        tracing::debug!(
            "Added {} markers for block {} ({})",
            ids.len(),
            block.uuid,
            block.block_type
        );
        Ok(ids)
    }

    /// Drop a block's markers, disconnecting every wire touching them.
    ///
    /// Returns the surviving markers whose candidates widened.
    pub fn remove_block(&mut self, block: &BlockUuid) -> Result<Vec<MarkerId>> {
        let ids = self
            .by_block
            .remove(block)
            .ok_or_else(|| CircuitError::UnknownBlock(block.to_string()))?;

        let mut neighbors = Vec::new();
        for &id in &ids {
            let marker = self.get(id)?;
            let upstream: Vec<(MarkerId, MarkerId)> =
                marker.connection.map(|from| (from, id)).into_iter().collect();
            let downstream: Vec<(MarkerId, MarkerId)> =
                marker.downstream.iter().map(|&to| (id, to)).collect();
            for (from, to) in upstream.into_iter().chain(downstream) {
                self.unlink(from, to)?;
                self.emit(MarkerEvent::Disconnected { from, to });
                neighbors.push(if from == id { to } else { from });
            }
        }

        for &id in &ids {
            if let Some(marker) = self.markers.get_mut(id.index()).and_then(Option::take) {
                self.by_port
                    .remove(&(marker.port.block, marker.direction, marker.port.port));
            }
        }

        neighbors.retain(|n| !ids.contains(n));
        let changed = self.widen(&neighbors)?;
        self.emit_kinds(&changed);
        tracing::debug!("Removed markers of block {}", block);
        Ok(changed)
    }

    // ── Wiring ──

    /// True iff `from` is an output, `to` is an unconnected input, and their
    /// candidate kinds overlap.
    pub fn can_connect(&self, from: MarkerId, to: MarkerId) -> bool {
        self.check_connect(from, to).is_ok()
    }

    fn check_connect(&self, from: MarkerId, to: MarkerId) -> Result<()> {
        let output = self.get(from)?;
        let input = self.get(to)?;
        if output.direction != PortDirection::Output || input.direction != PortDirection::Input {
            return Err(CircuitError::InvalidDirection(format!(
                "{} -> {}",
                output.port, input.port
            )));
        }
        if input.connection.is_some() {
            return Err(CircuitError::AlreadyConnected(input.port.to_string()));
        }
        let forward = output.candidates & input.candidates;
        let backward = input.candidates & output.candidates;
        if forward.is_empty() || backward.is_empty() {
            return Err(CircuitError::IncompatibleKinds {
                from: format!("{} {}", output.port, output.candidates),
                to: format!("{} {}", input.port, input.candidates),
            });
        }
        Ok(())
    }

    /// Wire `from` (an output) to `to` (an input) and narrow the joined
    /// component. Returns the markers whose candidates changed.
    pub fn connect(&mut self, from: MarkerId, to: MarkerId) -> Result<Vec<MarkerId>> {
        self.check_connect(from, to)?;

        self.get_mut(to)?.connection = Some(from);
        self.get_mut(from)?.downstream.push(to);

        let changed = self.narrow(&[from])?;
        self.emit(MarkerEvent::Connected { from, to });
        self.emit_kinds(&changed);
        tracing::debug!(
            "Connected {} -> {}, {} markers narrowed",
            self.get(from)?.port,
            self.get(to)?.port,
            changed.len()
        );
        Ok(changed)
    }

    /// Remove the wire into input `to` and widen both remaining components.
    pub fn disconnect(&mut self, to: MarkerId) -> Result<Vec<MarkerId>> {
        let input = self.get(to)?;
        if input.direction != PortDirection::Input {
            return Err(CircuitError::InvalidDirection(input.port.to_string()));
        }
        let from = input
            .connection
            .ok_or_else(|| CircuitError::NotConnected(input.port.to_string()))?;

        self.unlink(from, to)?;
        let changed = self.widen(&[from, to])?;
        self.emit(MarkerEvent::Disconnected { from, to });
        self.emit_kinds(&changed);
        tracing::debug!(
            "Disconnected {} -> {}, {} markers widened",
            self.get(from)?.port,
            self.get(to)?.port,
            changed.len()
        );
        Ok(changed)
    }

    /// Pin an unconnected input to `kind` (its configured value changed) and
    /// recompute its component. Fails, leaving the pin as it was, if the
    /// component cannot hold `kind`.
    pub fn pin(&mut self, id: MarkerId, kind: PrimitiveKind) -> Result<Vec<MarkerId>> {
        let marker = self.get(id)?;
        if marker.direction != PortDirection::Input {
            return Err(CircuitError::InvalidDirection(marker.port.to_string()));
        }
        if marker.connection.is_some() {
            return Err(CircuitError::ReadOnlyPort(marker.port.to_string()));
        }
        if !marker.declared.has(kind) {
            return Err(CircuitError::KindNotAvailable {
                port: marker.port.to_string(),
                kind,
            });
        }
        if marker.pinned == Some(kind) {
            return Ok(Vec::new());
        }

        let previous = marker.pinned;
        self.get_mut(id)?.pinned = Some(kind);
        let kinds = self
            .closure(id)
            .iter()
            .filter_map(|&m| self.marker(m))
            .fold(KindSet::all(), |acc, m| acc & m.base_kinds());
        if kinds.is_empty() {
            let marker = self.get_mut(id)?;
            marker.pinned = previous;
            return Err(CircuitError::KindNotAvailable {
                port: marker.port.to_string(),
                kind,
            });
        }

        let changed = self.widen(&[id])?;
        self.emit_kinds(&changed);
        tracing::debug!("Pinned {} to {}", self.get(id)?.port, kind);
        Ok(changed)
    }

    fn unlink(&mut self, from: MarkerId, to: MarkerId) -> Result<()> {
        self.get_mut(to)?.connection = None;
        self.get_mut(from)?.downstream.retain(|&d| d != to);
        Ok(())
    }

    // ── Narrowing ──

    /// Every marker reachable from `seed` through wires and group peers.
    pub fn closure(&self, seed: MarkerId) -> Vec<MarkerId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(marker) = self.marker(id) else {
                continue;
            };
            order.push(id);
            queue.extend(marker.neighbors().filter(|n| !visited.contains(n)));
        }
        order
    }

    /// Intersect current candidates over each component touching `seeds`.
    fn narrow(&mut self, seeds: &[MarkerId]) -> Result<Vec<MarkerId>> {
        self.recompute(seeds, |m| m.candidates)
    }

    /// Recompute each component touching `seeds` from base kinds.
    fn widen(&mut self, seeds: &[MarkerId]) -> Result<Vec<MarkerId>> {
        self.recompute(seeds, Marker::base_kinds)
    }

    fn recompute(&mut self, seeds: &[MarkerId], base: impl Fn(&Marker) -> KindSet) -> Result<Vec<MarkerId>> {
        let mut done = HashSet::new();
        let mut changed = Vec::new();
        for &seed in seeds {
            if done.contains(&seed) || self.marker(seed).is_none() {
                continue;
            }
            let component = self.closure(seed);
            let kinds = component
                .iter()
                .filter_map(|&id| self.marker(id))
                .fold(KindSet::all(), |acc, m| acc & base(m));

            for &id in &component {
                done.insert(id);
                let marker = self.get_mut(id)?;
                if marker.candidates != kinds {
                    marker.candidates = kinds;
                    changed.push(id);
                }
            }
        }
        Ok(changed)
    }
}

impl std::fmt::Debug for WireManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireManager")
            .field("markers", &self.len())
            .field("blocks", &self.by_block.len())
            .finish()
    }
}
