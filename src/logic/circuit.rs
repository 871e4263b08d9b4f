//! Circuit arena: owns every running block and drives ticks.
//!
//! Blocks live in a `Vec<Option<BlockLogic>>` addressed by [`BlockId`].
//! Removing a block empties its slot; backed inputs still pointing at it
//! read `AvailableLater` instead of dangling.
//!
//! Each [`Circuit::step`]:
//! 1. Advances the tick.
//! 2. Pulls every live block once, in id order. Blocks already recalculated
//!    this tick (because something downstream pulled them) are skipped.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::catalog::Catalog;
use crate::error::{CircuitError, Result};
use crate::id::{BlockId, BlockUuid, PortDirection};
use crate::logic::block::BlockLogic;
use crate::logic::storage::SignalGraph;
use crate::logic::tick::TickDriver;
use crate::logic::value::{PortValue, Tick, TickContext, ValueResult};
use crate::types::{KindSet, Value};

/// Notifications emitted by the circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitEvent {
    BlockPlaced { block: BlockId, uuid: BlockUuid },
    BlockRemoved { block: BlockId, uuid: BlockUuid },
    /// A block's outputs turned into garbage (emitted once per transition).
    Garbage { block: BlockId, uuid: BlockUuid, tick: Tick },
}

/// The running block graph of one plot.
pub struct Circuit {
    catalog: Arc<Catalog>,
    blocks: Vec<Option<BlockLogic>>,
    uuids: HashMap<BlockUuid, BlockId>,
    driver: TickDriver,
    /// Senders whose receiver was dropped are pruned on the next emit.
    subscribers: RefCell<Vec<Sender<CircuitEvent>>>,
}

impl Circuit {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            blocks: Vec::new(),
            uuids: HashMap::new(),
            driver: TickDriver::new(),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&mut self) -> Receiver<CircuitEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.get_mut().push(tx);
        rx
    }

    fn emit(&self, event: CircuitEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ── Block lifecycle ──

    /// Place a block of `block_type` with its persisted input config.
    pub fn place(
        &mut self,
        uuid: BlockUuid,
        block_type: &str,
        config: &BTreeMap<String, Value>,
    ) -> Result<BlockId> {
        if self.uuids.contains_key(&uuid) {
            return Err(CircuitError::DuplicateBlock(uuid.to_string()));
        }
        let definition = self
            .catalog
            .definition(block_type)
            .ok_or_else(|| CircuitError::UnknownBlockType(block_type.to_string()))?;

        let id = BlockId(self.blocks.len() as u32);
        let mut logic = BlockLogic::new(id, uuid.clone(), definition, config, self.context())?;
        if let Some(behavior) = self.catalog.behavior(block_type) {
            behavior.install(&mut logic)?;
        }

        self.blocks.push(Some(logic));
        self.uuids.insert(uuid.clone(), id);
        tracing::debug!("Placed block {} ({}) as {:?}", uuid, block_type, id);
        self.emit(CircuitEvent::BlockPlaced { block: id, uuid });
        Ok(id)
    }

    /// Remove a block. Downstream inputs wired to it read `AvailableLater`.
    pub fn remove(&mut self, id: BlockId) -> Result<BlockLogic> {
        let logic = self
            .blocks
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| CircuitError::UnknownBlock(format!("{:?}", id)))?;
        self.uuids.remove(logic.uuid());
        tracing::debug!("Removed block {} ({:?})", logic.uuid(), id);
        self.emit(CircuitEvent::BlockRemoved {
            block: id,
            uuid: logic.uuid().clone(),
        });
        Ok(logic)
    }

    pub fn id_of(&self, uuid: &BlockUuid) -> Option<BlockId> {
        self.uuids.get(uuid).copied()
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockLogic> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BlockLogic> {
        self.blocks.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn require_mut(&mut self, id: BlockId) -> Result<&mut BlockLogic> {
        self.block_mut(id)
            .ok_or_else(|| CircuitError::UnknownBlock(format!("{:?}", id)))
    }

    /// Live blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockLogic> {
        self.blocks.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.uuids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty()
    }

    // ── Ticking ──

    pub fn current_tick(&self) -> Tick {
        self.driver.current_tick()
    }

    pub fn context(&self) -> TickContext {
        self.driver.context()
    }

    /// Advance the tick counter without pulling anything.
    pub fn tick(&mut self) -> Tick {
        self.driver.tick()
    }

    /// Pull every live block that has not been recalculated this tick.
    pub fn sweep(&self) {
        let ctx = self.context();
        for block in self.blocks() {
            block.recalculate_if_needed(ctx, self);
        }
    }

    /// Advance one tick and recalculate the whole circuit.
    pub fn step(&mut self) -> Tick {
        let tick = self.tick();
        self.sweep();
        tick
    }

    /// Read an output at the current tick.
    pub fn get_output(&self, id: BlockId, port: &str) -> PortValue {
        self.output(self.context(), id, port)
    }

    /// Read an input at the current tick.
    pub fn get_input(&self, id: BlockId, port: &str) -> PortValue {
        match self.block(id) {
            Some(block) => block.get_input(self.context(), self, port),
            None => Err(ValueResult::AvailableLater),
        }
    }

    // ── Live editing ──

    pub fn set_input(&mut self, id: BlockId, port: &str, value: Value) -> Result<()> {
        let ctx = self.context();
        self.require_mut(id)?.set_input(ctx, port, value)
    }

    /// Back `to.to_port` by `from.from_port`.
    pub fn wire(&mut self, from: BlockId, from_port: &str, to: BlockId, to_port: &str) -> Result<()> {
        let source = self
            .block(from)
            .ok_or_else(|| CircuitError::UnknownBlock(format!("{:?}", from)))?;
        if source.definition().output(from_port).is_none() {
            return Err(CircuitError::UnknownPort {
                block: source.uuid().to_string(),
                port: from_port.to_string(),
            });
        }
        self.require_mut(to)?.wire_input(to_port, from, from_port)
    }

    pub fn unwire(&mut self, to: BlockId, to_port: &str) -> Result<()> {
        let ctx = self.context();
        self.require_mut(to)?.unwire_input(ctx, to_port)
    }

    /// Drop every wire reading from `source`. Returns the `(block, port)`
    /// inputs that were unwired.
    pub fn unwire_from(&mut self, source: BlockId) -> Vec<(BlockId, String)> {
        let ctx = self.context();
        let mut unwired = Vec::new();
        for logic in self.blocks.iter_mut().flatten() {
            let id = logic.id();
            unwired.extend(logic.unwire_from(ctx, source).into_iter().map(|port| (id, port)));
        }
        unwired
    }

    pub fn set_available(
        &mut self,
        id: BlockId,
        direction: PortDirection,
        port: &str,
        kinds: KindSet,
    ) -> Result<()> {
        let ctx = self.context();
        self.require_mut(id)?.set_available(ctx, direction, port, kinds)
    }

    pub fn set_enabled(&mut self, id: BlockId, enabled: bool) -> Result<()> {
        self.require_mut(id)?.set_enabled(enabled);
        Ok(())
    }
}

impl SignalGraph for Circuit {
    fn output(&self, ctx: TickContext, block: BlockId, port: &str) -> PortValue {
        match self.block(block) {
            Some(logic) => logic.get_output(ctx, self, port),
            None => Err(ValueResult::AvailableLater),
        }
    }

    fn report_garbage(&self, block: BlockId, ctx: TickContext) {
        let Some(logic) = self.block(block) else {
            return;
        };
        tracing::warn!(
            "Block {} ({}) produced garbage at tick {}",
            logic.uuid(),
            logic.block_type(),
            ctx.tick
        );
        self.emit(CircuitEvent::Garbage {
            block,
            uuid: logic.uuid().clone(),
            tick: ctx.tick,
        });
    }
}

impl std::fmt::Debug for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circuit")
            .field("blocks", &self.len())
            .field("tick", &self.current_tick())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    fn circuit() -> Circuit {
        Circuit::new(Arc::new(Catalog::builtin().unwrap()))
    }

    fn constant(circuit: &mut Circuit, uuid: &str, value: Value) -> BlockId {
        let config = BTreeMap::from([("value".to_string(), value)]);
        circuit.place(uuid.into(), "constant", &config).unwrap()
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut circuit = circuit();
        let kept = circuit.subscribe();
        drop(circuit.subscribe());
        assert_eq!(circuit.subscribers.borrow().len(), 2);

        constant(&mut circuit, "c1", Value::Bool(true));
        assert_eq!(circuit.subscribers.borrow().len(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn test_place_and_lookup() {
        let mut circuit = circuit();
        let id = constant(&mut circuit, "c1", Value::Bool(true));
        assert_eq!(circuit.id_of(&"c1".into()), Some(id));
        assert_eq!(circuit.len(), 1);
        assert!(matches!(
            circuit.place("c1".into(), "constant", &BTreeMap::new()),
            Err(CircuitError::DuplicateBlock(_))
        ));
        assert!(matches!(
            circuit.place("x".into(), "teleporter", &BTreeMap::new()),
            Err(CircuitError::UnknownBlockType(_))
        ));
    }

    #[test]
    fn test_pull_through_wire() {
        let mut circuit = circuit();
        let a = constant(&mut circuit, "a", Value::Bool(true));
        let not = circuit.place("not".into(), "not", &BTreeMap::new()).unwrap();
        circuit.wire(a, "result", not, "value").unwrap();

        circuit.tick();
        let out = circuit.get_output(not, "result").unwrap();
        assert_eq!(out.value, Value::Bool(false));
        assert!(out.changed_this_tick);
    }

    #[test]
    fn test_removed_source_reads_available_later() {
        let mut circuit = circuit();
        let a = constant(&mut circuit, "a", Value::Bool(true));
        let not = circuit.place("not".into(), "not", &BTreeMap::new()).unwrap();
        circuit.wire(a, "result", not, "value").unwrap();
        circuit.step();

        circuit.remove(a).unwrap();
        circuit.step();
        assert_eq!(
            circuit.get_output(not, "result"),
            Err(ValueResult::AvailableLater)
        );
        assert!(circuit.block(a).is_none());
    }

    #[test]
    fn test_self_loop_is_garbage() {
        let mut circuit = circuit();
        let not = circuit.place("not".into(), "not", &BTreeMap::new()).unwrap();
        circuit.wire(not, "result", not, "value").unwrap();
        let events = circuit.subscribe();

        for _ in 0..3 {
            circuit.step();
            assert_eq!(circuit.get_output(not, "result"), Err(ValueResult::Garbage));
        }
        let garbage: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, CircuitEvent::Garbage { .. }))
            .collect();
        assert_eq!(garbage.len(), 1);
    }

    #[test]
    fn test_wire_unknown_output_rejected() {
        let mut circuit = circuit();
        let a = constant(&mut circuit, "a", Value::Bool(true));
        let not = circuit.place("not".into(), "not", &BTreeMap::new()).unwrap();
        assert!(matches!(
            circuit.wire(a, "nope", not, "value"),
            Err(CircuitError::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_set_available_through_circuit() {
        let mut circuit = circuit();
        let add = circuit.place("add".into(), "add", &BTreeMap::new()).unwrap();
        circuit
            .set_available(add, PortDirection::Input, "value1", KindSet::NUMBER)
            .unwrap();
        assert_eq!(
            circuit
                .block(add)
                .unwrap()
                .available(PortDirection::Input, "value1"),
            Some(KindSet::of(PrimitiveKind::Number))
        );
    }
}
