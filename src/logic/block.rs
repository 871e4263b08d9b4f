//! Running block instances.
//!
//! A [`BlockLogic`] owns one storage per input and output port, built from the
//! block's static definition. Outputs are pulled: [`BlockLogic::get_output`]
//! recalculates the block at most once per tick and then serves the cached
//! value.
//!
//! # Cycle safety
//!
//! `recalculate` marks the block as `Recalculating(tick)` *before* pulling
//! any inputs. A cycle (A reads B reads A) re-enters `get_output` on A while
//! it is still recalculating, which short-circuits to `Garbage` instead of
//! recursing. No graph analysis is needed, and the result is the same
//! whichever block in the cycle is pulled first.
//!
//! # Reactions
//!
//! Concrete block behaviors register reactions with
//! [`BlockLogic::on_recalc_inputs`]. A reaction runs during a recalculation
//! only if one of its inputs was written since its last run (or it is primed,
//! see below), so a block that skipped some ticks still sees what changed.
//! If any of its inputs is unavailable, its `on_unavailable` handler runs
//! instead and the reaction is primed again, so it recomputes once the
//! inputs come back even if they did not change on that tick.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::BlockDefinition;
use crate::error::{CircuitError, Result};
use crate::id::{BlockId, BlockUuid, PortDirection};
use crate::logic::storage::{BackedStorage, PortStorage, SignalGraph};
use crate::logic::value::{PortValue, Tick, TickContext, TypedValue, ValueResult};
use crate::types::{KindSet, Value};

/// Installs a block type's reactions onto freshly built block instances.
pub trait BlockBehavior: Send + Sync {
    /// Catalog id of the block type this behavior drives.
    fn block_type(&self) -> &str;

    /// Register reactions on `logic`. Runs once per placed instance.
    fn install(&self, logic: &mut BlockLogic) -> Result<()>;
}

/// Per-tick recalculation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcState {
    NotRecalculated,
    Recalculating(Tick),
    Recalculated(Tick),
}

impl RecalcState {
    /// The state as seen from `tick`; anything from an older tick is stale.
    pub fn at(self, tick: Tick) -> RecalcState {
        match self {
            RecalcState::Recalculating(t) | RecalcState::Recalculated(t) if t != tick => {
                RecalcState::NotRecalculated
            }
            other => other,
        }
    }
}

/// One port's storage plus the kinds it may currently hold.
#[derive(Debug, Clone)]
pub struct PortSlot {
    storage: PortStorage,
    available: KindSet,
}

impl PortSlot {
    pub fn storage(&self) -> &PortStorage {
        &self.storage
    }

    pub fn available(&self) -> KindSet {
        self.available
    }
}

/// Input values resolved for one reaction.
pub struct Inputs<'a> {
    definition: &'a BlockDefinition,
    values: Vec<Option<TypedValue>>,
}

impl Inputs<'_> {
    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        let index = self.definition.port_index(PortDirection::Input, name)?;
        self.values.get(index)?.as_ref()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|v| &v.value)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_number)
    }

    /// True if any input was written after `tick` (or `tick` is `None`).
    pub fn any_newer_than(&self, tick: Option<Tick>) -> bool {
        self.values.iter().flatten().any(|v| v.newer_than(tick))
    }
}

/// Write access to a block's outputs during a reaction.
pub struct Outputs<'a> {
    definition: &'a BlockDefinition,
    ports: &'a mut [PortSlot],
    ctx: TickContext,
    entered_garbage: bool,
}

impl Outputs<'_> {
    pub fn tick(&self) -> Tick {
        self.ctx.tick
    }

    /// Set an output. A kind the port cannot currently hold unsets it instead.
    pub fn set(&mut self, name: &str, value: Value) {
        let ctx = self.ctx;
        let definition = self.definition;
        let Some(slot) = self.slot(name) else {
            return;
        };
        let entered_garbage = if slot.available.has(value.kind()) {
            slot.storage.set(ctx, value)
        } else {
            tracing::warn!(
                "Output {}.{} cannot hold {} (available {}), unsetting",
                definition.id,
                name,
                value.kind(),
                slot.available
            );
            slot.storage.set_result(ctx, ValueResult::AvailableLater)
        };
        self.entered_garbage |= entered_garbage;
    }

    pub fn set_result(&mut self, name: &str, result: ValueResult) {
        let ctx = self.ctx;
        if let Some(slot) = self.slot(name) {
            let entered_garbage = slot.storage.set_result(ctx, result);
            self.entered_garbage |= entered_garbage;
        }
    }

    pub fn unset(&mut self, name: &str) {
        self.set_result(name, ValueResult::AvailableLater);
    }

    /// Replace every output with `result`.
    pub fn fill(&mut self, result: ValueResult) {
        for slot in self.ports.iter_mut() {
            self.entered_garbage |= slot.storage.set_result(self.ctx, result);
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut PortSlot> {
        match self.definition.port_index(PortDirection::Output, name) {
            Some(index) => self.ports.get_mut(index),
            None => {
                tracing::warn!("Block {} has no output {}", self.definition.id, name);
                None
            }
        }
    }
}

type RecalcFn = Box<dyn FnMut(&Inputs<'_>, &mut Outputs<'_>)>;
type UnavailableFn = Box<dyn FnMut(ValueResult, &mut Outputs<'_>)>;

struct Reaction {
    keys: Vec<usize>,
    callback: RecalcFn,
    on_unavailable: UnavailableFn,
    /// Run on the next recalculation with available inputs, changed or not.
    primed: bool,
    /// Tick of the last run of `callback`.
    last_run: Option<Tick>,
}

/// One running block on a plot.
pub struct BlockLogic {
    id: BlockId,
    uuid: BlockUuid,
    definition: Arc<BlockDefinition>,
    inputs: RefCell<Vec<PortSlot>>,
    outputs: RefCell<Vec<PortSlot>>,
    /// User-configured input values, restored when a wire is removed.
    input_config: Vec<Option<Value>>,
    reactions: RefCell<Vec<Reaction>>,
    state: Cell<RecalcState>,
    enabled: bool,
}

impl BlockLogic {
    /// Build an instance from its definition and persisted input config.
    ///
    /// Fails if the definition is invalid (a catalog error) or if `config`
    /// names unknown inputs or values of kinds the input does not accept.
    pub fn new(
        id: BlockId,
        uuid: BlockUuid,
        definition: Arc<BlockDefinition>,
        config: &BTreeMap<String, Value>,
        ctx: TickContext,
    ) -> Result<Self> {
        definition.validate()?;

        if let Some(unknown) = config.keys().find(|k| definition.input(k).is_none()) {
            return Err(CircuitError::UnknownPort {
                block: uuid.to_string(),
                port: unknown.clone(),
            });
        }

        let mut inputs = Vec::with_capacity(definition.inputs.len());
        let mut input_config = Vec::with_capacity(definition.inputs.len());
        for port in &definition.inputs {
            let configured = config.get(&port.name).cloned();
            if let Some(value) = &configured {
                if !port.accepted_kinds.has(value.kind()) {
                    return Err(CircuitError::KindNotAvailable {
                        port: format!("{}.{}", uuid, port.name),
                        kind: value.kind(),
                    });
                }
            }

            let mut storage = PortStorage::settable(port.filter.as_ref());
            if let Some(value) = configured.clone().or_else(|| port.initial_value()) {
                storage.set(ctx, value);
            }
            inputs.push(PortSlot {
                storage,
                available: port.accepted_kinds,
            });
            input_config.push(configured);
        }

        let outputs = definition
            .outputs
            .iter()
            .map(|port| PortSlot {
                storage: PortStorage::settable(port.filter.as_ref()),
                available: port.accepted_kinds,
            })
            .collect();

        Ok(Self {
            id,
            uuid,
            definition,
            inputs: RefCell::new(inputs),
            outputs: RefCell::new(outputs),
            input_config,
            reactions: RefCell::new(Vec::new()),
            state: Cell::new(RecalcState::NotRecalculated),
            enabled: true,
        })
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn uuid(&self) -> &BlockUuid {
        &self.uuid
    }

    pub fn definition(&self) -> &BlockDefinition {
        &self.definition
    }

    pub fn block_type(&self) -> &str {
        &self.definition.id
    }

    pub fn state(&self) -> RecalcState {
        self.state.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ── Reaction registration ──

    /// Register `callback` to run when any of `keys` was written since its
    /// last run.
    ///
    /// If any of `keys` is unavailable, `on_unavailable` runs instead with
    /// the merged result (garbage wins over available-later).
    pub fn on_recalc_inputs<F, U>(&mut self, keys: &[&str], callback: F, on_unavailable: U) -> Result<()>
    where
        F: FnMut(&Inputs<'_>, &mut Outputs<'_>) + 'static,
        U: FnMut(ValueResult, &mut Outputs<'_>) + 'static,
    {
        let keys = keys
            .iter()
            .map(|key| {
                self.definition
                    .port_index(PortDirection::Input, key)
                    .ok_or_else(|| CircuitError::UnknownPort {
                        block: self.definition.id.clone(),
                        port: key.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.reactions.get_mut().push(Reaction {
            keys,
            callback: Box::new(callback),
            on_unavailable: Box::new(on_unavailable),
            primed: true,
            last_run: None,
        });
        Ok(())
    }

    /// Like [`Self::on_recalc_inputs`], copying an unavailable result onto
    /// every output.
    pub fn on_recalc_inputs_or_fill<F>(&mut self, keys: &[&str], callback: F) -> Result<()>
    where
        F: FnMut(&Inputs<'_>, &mut Outputs<'_>) + 'static,
    {
        self.on_recalc_inputs(keys, callback, |result, outputs: &mut Outputs<'_>| {
            outputs.fill(result)
        })
    }

    fn prime(&mut self) {
        for reaction in self.reactions.get_mut().iter_mut() {
            reaction.primed = true;
        }
    }

    // ── Pull evaluation ──

    /// Read an output, recalculating the block first if it has not been
    /// recalculated this tick.
    pub fn get_output(&self, ctx: TickContext, graph: &dyn SignalGraph, port: &str) -> PortValue {
        if !self.enabled {
            return Err(ValueResult::AvailableLater);
        }
        let Some(index) = self.definition.port_index(PortDirection::Output, port) else {
            tracing::debug!("Block {} has no output {}", self.uuid, port);
            return Err(ValueResult::AvailableLater);
        };

        match self.state.get().at(ctx.tick) {
            RecalcState::Recalculating(_) => return Err(ValueResult::Garbage),
            RecalcState::Recalculated(_) => {}
            RecalcState::NotRecalculated => self.recalculate(ctx, graph),
        }

        let outputs = self.outputs.borrow();
        outputs[index].storage.get(ctx, graph)
    }

    /// Read an input as the block's reactions would see it.
    pub fn get_input(&self, ctx: TickContext, graph: &dyn SignalGraph, port: &str) -> PortValue {
        match self.definition.port_index(PortDirection::Input, port) {
            Some(index) => self.read_input(ctx, graph, index),
            None => Err(ValueResult::AvailableLater),
        }
    }

    /// Recalculate unless already done (or in progress) this tick.
    pub fn recalculate_if_needed(&self, ctx: TickContext, graph: &dyn SignalGraph) {
        if self.enabled && self.state.get().at(ctx.tick) == RecalcState::NotRecalculated {
            self.recalculate(ctx, graph);
        }
    }

    fn recalculate(&self, ctx: TickContext, graph: &dyn SignalGraph) {
        // Mark first: a cycle back into this block must see Recalculating.
        self.state.set(RecalcState::Recalculating(ctx.tick));
        tracing::trace!("Recalculating block {} at tick {}", self.uuid, ctx.tick);

        let mut entered_garbage = false;
        let mut reactions = self.reactions.borrow_mut();
        for reaction in reactions.iter_mut() {
            let resolved = self.resolve_inputs(ctx, graph, &reaction.keys);

            let mut ports = self.outputs.borrow_mut();
            let mut outputs = Outputs {
                definition: &self.definition,
                ports: &mut ports[..],
                ctx,
                entered_garbage: false,
            };
            match resolved {
                Err(result) => {
                    (reaction.on_unavailable)(result, &mut outputs);
                    reaction.primed = true;
                }
                Ok(inputs) => {
                    if reaction.primed || inputs.any_newer_than(reaction.last_run) {
                        (reaction.callback)(&inputs, &mut outputs);
                        reaction.primed = false;
                        reaction.last_run = Some(ctx.tick);
                    }
                }
            }
            entered_garbage |= outputs.entered_garbage;
        }
        drop(reactions);

        self.state.set(RecalcState::Recalculated(ctx.tick));

        if entered_garbage {
            graph.report_garbage(self.id, ctx);
        }
    }

    fn resolve_inputs(
        &self,
        ctx: TickContext,
        graph: &dyn SignalGraph,
        keys: &[usize],
    ) -> std::result::Result<Inputs<'_>, ValueResult> {
        let mut values = vec![None; self.definition.inputs.len()];
        let mut failure: Option<ValueResult> = None;

        for &index in keys {
            match self.read_input(ctx, graph, index) {
                Ok(value) => values[index] = Some(value),
                Err(result) => failure = Some(failure.map_or(result, |f| f.merge(result))),
            }
        }

        match failure {
            Some(result) => Err(result),
            None => Ok(Inputs {
                definition: &self.definition,
                values,
            }),
        }
    }

    fn read_input(&self, ctx: TickContext, graph: &dyn SignalGraph, index: usize) -> PortValue {
        // Release the borrow before pulling upstream; the pull may recurse.
        let (backing, available) = {
            let inputs = self.inputs.borrow();
            let Some(slot) = inputs.get(index) else {
                return Err(ValueResult::AvailableLater);
            };
            (slot.storage.backing().cloned(), slot.available)
        };

        let value = match backing {
            Some(backed) => backed.get(ctx, graph)?,
            None => self.inputs.borrow()[index].storage.get(ctx, graph)?,
        };

        if available.has(value.kind()) {
            Ok(value)
        } else {
            Err(ValueResult::AvailableLater)
        }
    }

    // ── Live editing ──

    /// Set an unwired input's value (a user config change).
    ///
    /// The value is stamped with `ctx.tick`, but the block's reactions are
    /// primed so the edit is picked up by the next recalculation either way.
    pub fn set_input(&mut self, ctx: TickContext, port: &str, value: Value) -> Result<()> {
        let index = self.input_index(port)?;
        let slot = &mut self.inputs.get_mut()[index];
        if slot.storage.is_backed() {
            return Err(CircuitError::ReadOnlyPort(format!("{}.{}", self.uuid, port)));
        }
        if !slot.available.has(value.kind()) {
            return Err(CircuitError::KindNotAvailable {
                port: format!("{}.{}", self.uuid, port),
                kind: value.kind(),
            });
        }
        slot.storage.set(ctx, value.clone());
        self.input_config[index] = Some(value);
        // Edits land between ticks; rerun on the next recalculation.
        self.prime();
        Ok(())
    }

    /// Back an input by another block's output.
    pub fn wire_input(&mut self, port: &str, source: BlockId, source_port: &str) -> Result<()> {
        let index = self.input_index(port)?;
        self.inputs.get_mut()[index].storage =
            PortStorage::Backed(BackedStorage::new(source, source_port));
        self.prime();
        Ok(())
    }

    /// Drop an input's wire, restoring its configured (or default) value.
    pub fn unwire_input(&mut self, ctx: TickContext, port: &str) -> Result<()> {
        let index = self.input_index(port)?;
        let definition = &self.definition.inputs[index];
        let slot = &mut self.inputs.get_mut()[index];
        let mut storage = PortStorage::settable(definition.filter.as_ref());
        let restored = self.input_config[index]
            .clone()
            .or_else(|| definition.initial_value())
            .filter(|v| slot.available.has(v.kind()));
        if let Some(value) = restored {
            storage.set(ctx, value);
        }
        slot.storage = storage;
        self.prime();
        Ok(())
    }

    /// Drop every input wire that reads from `source`. Returns the ports unwired.
    pub fn unwire_from(&mut self, ctx: TickContext, source: BlockId) -> Vec<String> {
        let ports: Vec<String> = self
            .inputs
            .get_mut()
            .iter()
            .zip(&self.definition.inputs)
            .filter(|(slot, _)| {
                slot.storage
                    .backing()
                    .is_some_and(|b| b.source_block == source)
            })
            .map(|(_, def)| def.name.clone())
            .collect();
        for port in &ports {
            let _ = self.unwire_input(ctx, port);
        }
        ports
    }

    /// Replace the kinds a port may hold. A held value of a dropped kind is unset.
    pub fn set_available(
        &mut self,
        ctx: TickContext,
        direction: PortDirection,
        port: &str,
        kinds: KindSet,
    ) -> Result<()> {
        let index = self.port_index(direction, port)?;
        let slot = match direction {
            PortDirection::Input => &mut self.inputs.get_mut()[index],
            PortDirection::Output => &mut self.outputs.get_mut()[index],
        };
        if slot.available == kinds {
            return Ok(());
        }
        slot.available = kinds;
        if let Some(kind) = slot.storage.local_kind() {
            if !kinds.has(kind) {
                tracing::debug!(
                    "Unsetting {}.{}: {} no longer in {}",
                    self.uuid,
                    port,
                    kind,
                    kinds
                );
                slot.storage.set_result(ctx, ValueResult::AvailableLater);
            }
        }
        self.prime();
        Ok(())
    }

    pub fn available(&self, direction: PortDirection, port: &str) -> Option<KindSet> {
        let index = self.definition.port_index(direction, port)?;
        let slots = match direction {
            PortDirection::Input => self.inputs.borrow(),
            PortDirection::Output => self.outputs.borrow(),
        };
        slots.get(index).map(|s| s.available)
    }

    /// Where an input reads from, if it is wired.
    pub fn input_source(&self, port: &str) -> Option<BackedStorage> {
        let index = self.definition.port_index(PortDirection::Input, port)?;
        self.inputs.borrow()[index].storage.backing().cloned()
    }

    /// Disabled blocks read as `AvailableLater` to everything downstream.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.state.set(RecalcState::NotRecalculated);
            self.prime();
        }
    }

    fn input_index(&self, port: &str) -> Result<usize> {
        self.port_index(PortDirection::Input, port)
    }

    fn port_index(&self, direction: PortDirection, port: &str) -> Result<usize> {
        self.definition
            .port_index(direction, port)
            .ok_or_else(|| CircuitError::UnknownPort {
                block: self.uuid.to_string(),
                port: port.to_string(),
            })
    }
}

impl std::fmt::Debug for BlockLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockLogic")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("block_type", &self.definition.id)
            .field("state", &self.state.get())
            .field("enabled", &self.enabled)
            .finish()
    }
}
