//! Simulation: a circuit and its wire markers kept in sync.
//!
//! Every graph edit goes through the simulation so that the narrowed kinds
//! computed by the [`WireManager`] land in the running ports' available
//! sets. Edits take `&mut self`, so they can never interleave with a sweep.
//!
//! # Run loop
//!
//! ```text
//! while running && tick < max_ticks:
//!     step()        advance tick, pull every block once
//!     rate_limit()  sleep to hold tick_rate_hz
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{CircuitError, Result, ResultExt};
use crate::id::{BlockId, BlockUuid, MarkerId, PortDirection, PortRef};
use crate::logic::{Circuit, CircuitEvent, PortValue, Tick, ValueResult};
use crate::plot::{PlacedBlock, PlotSnapshot};
use crate::types::Value;
use crate::wire::{MarkerEvent, WireManager};

/// One port read, in a serializable shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PortReading {
    Value {
        value: Value,
        changed_this_tick: bool,
    },
    Unavailable {
        result: ValueResult,
    },
}

impl From<PortValue> for PortReading {
    fn from(value: PortValue) -> Self {
        match value {
            Ok(v) => PortReading::Value {
                value: v.value,
                changed_this_tick: v.changed_this_tick,
            },
            Err(result) => PortReading::Unavailable { result },
        }
    }
}

pub struct Simulation {
    config: EngineConfig,
    circuit: Circuit,
    wires: WireManager,
    marker_rx: Receiver<MarkerEvent>,
    last_tick_time: Instant,
}

impl Simulation {
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        let circuit = Circuit::new(catalog.clone());
        let mut wires = WireManager::new(catalog);
        let marker_rx = wires.subscribe();
        Self {
            config,
            circuit,
            wires,
            marker_rx,
            last_tick_time: Instant::now(),
        }
    }

    /// Build a simulation from a placement snapshot.
    pub fn from_snapshot(catalog: Arc<Catalog>, config: EngineConfig, plot: &PlotSnapshot) -> Result<Self> {
        let mut sim = Self::new(catalog, config);

        for block in &plot.blocks {
            sim.circuit
                .place(block.uuid.clone(), &block.block_type, &block.values())
                .with_context(|| format!("Failed to place block {}", block.uuid))?;
        }
        sim.wires.build_from_plot(plot)?;
        for block in &plot.blocks {
            let to = sim.require_block(&block.uuid)?;
            for (port, wire) in block.wires() {
                let from = sim.require_block(&wire.block)?;
                sim.circuit.wire(from, &wire.port, to, port)?;
            }
        }
        sim.sync()?;

        tracing::info!("Simulation built with {} blocks", sim.circuit.len());
        Ok(sim)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn wires(&self) -> &WireManager {
        &self.wires
    }

    pub fn subscribe_circuit(&mut self) -> Receiver<CircuitEvent> {
        self.circuit.subscribe()
    }

    pub fn subscribe_markers(&mut self) -> Receiver<MarkerEvent> {
        self.wires.subscribe()
    }

    fn require_block(&self, uuid: &BlockUuid) -> Result<BlockId> {
        self.circuit
            .id_of(uuid)
            .ok_or_else(|| CircuitError::UnknownBlock(uuid.to_string()))
    }

    fn require_marker(&self, port: &PortRef, direction: PortDirection) -> Result<MarkerId> {
        self.wires
            .marker_for(&port.block, direction, &port.port)
            .ok_or_else(|| CircuitError::UnknownPort {
                block: port.block.to_string(),
                port: port.port.clone(),
            })
    }

    /// Push marker kind changes into the running ports.
    fn sync(&mut self) -> Result<()> {
        let events: Vec<MarkerEvent> = self.marker_rx.try_iter().collect();
        for event in events {
            if let MarkerEvent::KindsChanged {
                port,
                direction,
                kinds,
                ..
            } = event
            {
                if let Some(id) = self.circuit.id_of(&port.block) {
                    self.circuit.set_available(id, direction, &port.port, kinds)?;
                }
            }
        }
        Ok(())
    }

    // ── Live editing ──

    /// Place a block. Wired inputs in its config are connected too.
    ///
    /// On error nothing stays placed: a wire that fails to connect removes
    /// the block again.
    pub fn place_block(&mut self, block: &PlacedBlock) -> Result<BlockId> {
        self.wires.add_block(block)?;
        let id = match self.circuit.place(block.uuid.clone(), &block.block_type, &block.values()) {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback) = self.wires.remove_block(&block.uuid).and_then(|_| self.sync()) {
                    tracing::warn!("Failed to drop markers of {}: {}", block.uuid, rollback);
                }
                return Err(e);
            }
        };
        self.sync()?;

        for (port, wire) in block.wires() {
            let connected = self.connect(
                &PortRef::new(wire.block.clone(), wire.port.clone()),
                &PortRef::new(block.uuid.clone(), port),
            );
            if let Err(e) = connected {
                if let Err(rollback) = self.remove_block(&block.uuid) {
                    tracing::warn!("Failed to remove half-placed block {}: {}", block.uuid, rollback);
                }
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Remove a block. Inputs it fed fall back to their configured values.
    pub fn remove_block(&mut self, uuid: &BlockUuid) -> Result<()> {
        let id = self.require_block(uuid)?;
        self.wires.remove_block(uuid)?;
        self.sync()?;
        let unwired = self.circuit.unwire_from(id);
        self.circuit.remove(id)?;
        tracing::debug!("Removed block {}, {} inputs unwired", uuid, unwired.len());
        Ok(())
    }

    pub fn can_connect(&self, from: &PortRef, to: &PortRef) -> bool {
        match (
            self.require_marker(from, PortDirection::Output),
            self.require_marker(to, PortDirection::Input),
        ) {
            (Ok(from), Ok(to)) => self.wires.can_connect(from, to),
            _ => false,
        }
    }

    /// Wire output `from` into input `to`.
    pub fn connect(&mut self, from: &PortRef, to: &PortRef) -> Result<()> {
        let from_marker = self.require_marker(from, PortDirection::Output)?;
        let to_marker = self.require_marker(to, PortDirection::Input)?;
        let from_id = self.require_block(&from.block)?;
        let to_id = self.require_block(&to.block)?;

        self.wires.connect(from_marker, to_marker)?;
        self.circuit.wire(from_id, &from.port, to_id, &to.port)?;
        self.sync()
    }

    /// Remove the wire into input `to`.
    pub fn disconnect(&mut self, to: &PortRef) -> Result<()> {
        let to_marker = self.require_marker(to, PortDirection::Input)?;
        let to_id = self.require_block(&to.block)?;

        self.wires.disconnect(to_marker)?;
        // Widen first so the restored config value is legal again.
        self.sync()?;
        self.circuit.unwire(to_id, &to.port)
    }

    /// Change an unwired input's configured value. The value's kind becomes
    /// the port's pin, so its component re-narrows around it.
    pub fn set_input(&mut self, port: &PortRef, value: Value) -> Result<()> {
        let id = self.require_block(&port.block)?;
        let marker = self.require_marker(port, PortDirection::Input)?;
        self.wires.pin(marker, value.kind())?;
        self.sync()?;
        self.circuit.set_input(id, &port.port, value)
    }

    pub fn set_enabled(&mut self, uuid: &BlockUuid, enabled: bool) -> Result<()> {
        let id = self.require_block(uuid)?;
        self.circuit.set_enabled(id, enabled)
    }

    // ── Reading ──

    pub fn current_tick(&self) -> Tick {
        self.circuit.current_tick()
    }

    pub fn get_output(&self, port: &PortRef) -> PortValue {
        match self.circuit.id_of(&port.block) {
            Some(id) => self.circuit.get_output(id, &port.port),
            None => Err(ValueResult::AvailableLater),
        }
    }

    pub fn get_input(&self, port: &PortRef) -> PortValue {
        match self.circuit.id_of(&port.block) {
            Some(id) => self.circuit.get_input(id, &port.port),
            None => Err(ValueResult::AvailableLater),
        }
    }

    /// Every output of every live block at the current tick.
    pub fn read_outputs(&self) -> BTreeMap<BlockUuid, BTreeMap<String, PortReading>> {
        self.circuit
            .blocks()
            .map(|block| {
                let ports: BTreeMap<String, PortReading> = block
                    .definition()
                    .outputs
                    .iter()
                    .map(|port| {
                        let reading = PortReading::from(self.circuit.get_output(block.id(), &port.name));
                        (port.name.clone(), reading)
                    })
                    .collect();
                (block.uuid().clone(), ports)
            })
            .collect()
    }

    // ── Ticking ──

    /// Advance the tick without pulling anything. Reads pull lazily.
    pub fn tick(&mut self) -> Tick {
        self.circuit.tick()
    }

    /// Advance one tick and pull every block.
    pub fn step(&mut self) -> Tick {
        self.circuit.step()
    }

    fn reached_limit(&self) -> bool {
        self.config
            .max_ticks
            .is_some_and(|max| self.current_tick() >= max)
    }

    /// Tick at `tick_rate_hz` until `running` is cleared or `max_ticks` is
    /// reached. Returns the last tick.
    pub fn run(&mut self, running: &AtomicBool) -> Tick {
        tracing::info!(
            "Simulation started at {} Hz (limit {:?})",
            self.config.tick_rate_hz,
            self.config.max_ticks
        );
        self.last_tick_time = Instant::now();

        while running.load(Ordering::SeqCst) && !self.reached_limit() {
            self.step();
            self.rate_limit();
        }

        tracing::info!("Simulation stopped at tick {}", self.current_tick());
        self.current_tick()
    }

    /// Rate limit the tick loop
    fn rate_limit(&mut self) {
        if self.config.tick_rate_hz == 0 {
            std::thread::yield_now();
            return;
        }

        let target_interval = Duration::from_micros(1_000_000 / self.config.tick_rate_hz as u64);
        let elapsed = self.last_tick_time.elapsed();

        if elapsed < target_interval {
            std::thread::sleep(target_interval - elapsed);
        }

        self.last_tick_time = Instant::now();
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("circuit", &self.circuit)
            .field("wires", &self.wires)
            .finish()
    }
}
