//! Integration tests for wire compatibility and kind narrowing

mod common;

use block_logic::{
    BlockDefinition, CatalogBuilder, CircuitError, KindSet, MarkerEvent, PlacedBlock, PortDefinition,
    PortDirection, PrimitiveKind, Simulation, Value, WireManager,
};
use common::{catalog, fast_config, port};
use proptest::prelude::*;
use std::sync::Arc;

const SENSORS: &str = r#"
[[blocks]]
id = "sensor"
[[blocks.outputs]]
name = "reading"
types = ["number", "vector3"]

[[blocks]]
id = "display"
[[blocks.inputs]]
name = "shown"
types = ["number", "bool"]

[[blocks]]
id = "relay"
[[blocks.inputs]]
name = "value"
types = ["number", "vector3", "bool"]
group = "value"
[[blocks.outputs]]
name = "result"
types = ["number", "vector3", "bool"]
group = "value"
"#;

fn sensor_sim() -> Simulation {
    let catalog = CatalogBuilder::new()
        .load_toml_str(SENSORS)
        .unwrap()
        .build()
        .unwrap();
    let mut sim = Simulation::new(Arc::new(catalog), fast_config());
    sim.place_block(&PlacedBlock::new("s", "sensor")).unwrap();
    sim.place_block(&PlacedBlock::new("r", "relay")).unwrap();
    sim.place_block(&PlacedBlock::new("d", "display")).unwrap();
    sim
}

fn candidates(sim: &Simulation, block: &str, direction: PortDirection, name: &str) -> KindSet {
    let wires = sim.wires();
    let marker = wires.marker_for(&block.into(), direction, name).unwrap();
    wires.candidates(marker).unwrap()
}

#[test]
fn test_number_vector_meets_number_bool() {
    let mut sim = sensor_sim();
    assert!(sim.can_connect(&port("s", "reading"), &port("d", "shown")));
    sim.connect(&port("s", "reading"), &port("d", "shown")).unwrap();

    assert_eq!(candidates(&sim, "s", PortDirection::Output, "reading"), KindSet::NUMBER);
    assert_eq!(candidates(&sim, "d", PortDirection::Input, "shown"), KindSet::NUMBER);
}

#[test]
fn test_narrowing_reaches_group_peers_across_blocks() {
    let mut sim = sensor_sim();
    sim.connect(&port("s", "reading"), &port("r", "value")).unwrap();
    assert_eq!(
        candidates(&sim, "r", PortDirection::Output, "result"),
        KindSet::NUMBER | KindSet::VECTOR3
    );

    sim.connect(&port("r", "result"), &port("d", "shown")).unwrap();
    for (block, direction, name) in [
        ("s", PortDirection::Output, "reading"),
        ("r", PortDirection::Input, "value"),
        ("r", PortDirection::Output, "result"),
        ("d", PortDirection::Input, "shown"),
    ] {
        assert_eq!(candidates(&sim, block, direction, name), KindSet::NUMBER);
    }

    // Narrowed sets reach the running ports.
    let relay = sim.circuit().id_of(&"r".into()).unwrap();
    assert_eq!(
        sim.circuit()
            .block(relay)
            .unwrap()
            .available(PortDirection::Input, "value"),
        Some(KindSet::NUMBER)
    );
}

#[test]
fn test_widen_forgets_removed_constraint() {
    let mut sim = sensor_sim();
    sim.connect(&port("s", "reading"), &port("r", "value")).unwrap();
    sim.connect(&port("r", "result"), &port("d", "shown")).unwrap();

    sim.disconnect(&port("r", "value")).unwrap();
    // relay + display still constrain each other; the sensor is free again.
    assert_eq!(
        candidates(&sim, "s", PortDirection::Output, "reading"),
        KindSet::NUMBER | KindSet::VECTOR3
    );
    assert_eq!(
        candidates(&sim, "r", PortDirection::Input, "value"),
        KindSet::NUMBER | KindSet::BOOL
    );

    sim.disconnect(&port("d", "shown")).unwrap();
    assert_eq!(
        candidates(&sim, "r", PortDirection::Output, "result"),
        KindSet::NUMBER | KindSet::VECTOR3 | KindSet::BOOL
    );
}

#[test]
fn test_disjoint_connection_rejected_and_graph_unchanged() {
    let mut sim = sensor_sim();
    sim.place_block(&PlacedBlock::new("b", "relay").with_value("value", Value::Bool(true)))
        .unwrap();
    assert_eq!(candidates(&sim, "b", PortDirection::Output, "result"), KindSet::BOOL);

    let before = candidates(&sim, "s", PortDirection::Output, "reading");
    assert!(!sim.can_connect(&port("s", "reading"), &port("b", "value")));
    assert!(matches!(
        sim.connect(&port("s", "reading"), &port("b", "value")),
        Err(CircuitError::IncompatibleKinds { .. })
    ));
    assert_eq!(candidates(&sim, "s", PortDirection::Output, "reading"), before);
    assert_eq!(candidates(&sim, "b", PortDirection::Input, "value"), KindSet::BOOL);
}

#[test]
fn test_input_accepts_a_single_wire() {
    let mut sim = sensor_sim();
    sim.connect(&port("s", "reading"), &port("d", "shown")).unwrap();

    assert!(!sim.can_connect(&port("r", "result"), &port("d", "shown")));
    assert!(matches!(
        sim.connect(&port("r", "result"), &port("d", "shown")),
        Err(CircuitError::AlreadyConnected(_))
    ));
}

#[test]
fn test_arithmetic_group_pinned_by_constant() {
    let mut sim = Simulation::new(catalog(), fast_config());
    sim.place_block(&PlacedBlock::new("n", "constant").with_value("value", Value::Number(1.0)))
        .unwrap();
    sim.place_block(&PlacedBlock::new("add", "add")).unwrap();
    let events = sim.subscribe_markers();

    sim.connect(&port("n", "result"), &port("add", "value2")).unwrap();
    for name in ["value1", "value2"] {
        assert_eq!(candidates(&sim, "add", PortDirection::Input, name), KindSet::NUMBER);
    }
    assert_eq!(candidates(&sim, "add", PortDirection::Output, "result"), KindSet::NUMBER);

    let changed = events
        .try_iter()
        .filter(|e| matches!(e, MarkerEvent::KindsChanged { .. }))
        .count();
    assert_eq!(changed, 3);
}

#[test]
fn test_pinned_constant_stays_pinned_after_disconnect() {
    let mut sim = Simulation::new(catalog(), fast_config());
    sim.place_block(&PlacedBlock::new("n", "constant").with_value("value", Value::Number(1.0)))
        .unwrap();
    sim.place_block(&PlacedBlock::new("add", "add")).unwrap();
    sim.connect(&port("n", "result"), &port("add", "value1")).unwrap();
    sim.disconnect(&port("add", "value1")).unwrap();

    assert_eq!(candidates(&sim, "n", PortDirection::Output, "result"), KindSet::NUMBER);
    assert_eq!(candidates(&sim, "add", PortDirection::Output, "result"), KindSet::ARITHMETIC);
}

#[test]
fn test_set_input_repins_constant() {
    let mut sim = Simulation::new(catalog(), fast_config());
    sim.place_block(&PlacedBlock::new("n", "constant").with_value("value", Value::Number(1.0)))
        .unwrap();
    sim.set_input(&port("n", "value"), Value::Bool(true)).unwrap();
    assert_eq!(candidates(&sim, "n", PortDirection::Output, "result"), KindSet::BOOL);

    sim.step();
    assert_eq!(common::output(&sim, "n", "result").value, Value::Bool(true));

    // Once wired into arithmetic, a bool no longer fits.
    sim.set_input(&port("n", "value"), Value::Number(2.0)).unwrap();
    sim.place_block(&PlacedBlock::new("add", "add")).unwrap();
    sim.connect(&port("n", "result"), &port("add", "value1")).unwrap();
    assert!(sim.set_input(&port("n", "value"), Value::Bool(false)).is_err());
    assert_eq!(candidates(&sim, "add", PortDirection::Input, "value2"), KindSet::NUMBER);
}

#[test]
fn test_build_from_plot_rejects_incompatible_wires() {
    let plot = common::builders::PlotBuilder::new()
        .constant("b", Value::Bool(true))
        .block("add", "add")
        .wire("value1", "b", "result")
        .build();
    assert!(Simulation::from_snapshot(catalog(), fast_config(), &plot).is_err());
}

// ── Properties ──

/// A non-empty set of payload kinds.
fn payload_kinds() -> impl Strategy<Value = KindSet> {
    (1u16..(1 << 8)).prop_map(|bits| KindSet::from_bits_retain(bits << 2))
}

fn pair_manager(output: KindSet, input: KindSet) -> WireManager {
    let catalog = CatalogBuilder::new()
        .with_definition(
            BlockDefinition::new("src").with_output(PortDefinition::new("out", output.kinds())),
        )
        .with_definition(
            BlockDefinition::new("dst").with_input(PortDefinition::new("in", input.kinds())),
        )
        .build()
        .unwrap();
    let mut wm = WireManager::new(Arc::new(catalog));
    wm.add_block(&PlacedBlock::new("a", "src")).unwrap();
    wm.add_block(&PlacedBlock::new("b", "dst")).unwrap();
    wm
}

proptest! {
    #[test]
    fn test_connect_is_intersection(output in payload_kinds(), input in payload_kinds()) {
        let mut wm = pair_manager(output, input);
        let from = wm.marker_for(&"a".into(), PortDirection::Output, "out").unwrap();
        let to = wm.marker_for(&"b".into(), PortDirection::Input, "in").unwrap();

        let common = output & input;
        prop_assert_eq!(wm.can_connect(from, to), !common.is_empty());
        if common.is_empty() {
            prop_assert!(wm.connect(from, to).is_err());
        } else {
            wm.connect(from, to).unwrap();
            prop_assert_eq!(wm.candidates(from), Some(common));
            prop_assert_eq!(wm.candidates(to), Some(common));
        }
    }

    #[test]
    fn test_disconnect_restores_declared(output in payload_kinds(), input in payload_kinds()) {
        prop_assume!(!(output & input).is_empty());
        let mut wm = pair_manager(output, input);
        let from = wm.marker_for(&"a".into(), PortDirection::Output, "out").unwrap();
        let to = wm.marker_for(&"b".into(), PortDirection::Input, "in").unwrap();

        wm.connect(from, to).unwrap();
        wm.disconnect(to).unwrap();
        prop_assert_eq!(wm.candidates(from), Some(output));
        prop_assert_eq!(wm.candidates(to), Some(input));
    }

    #[test]
    fn test_single_kind_ports_default_to_it(kind in prop::sample::select(vec![
        PrimitiveKind::Bool,
        PrimitiveKind::Number,
        PrimitiveKind::Key,
    ])) {
        let port = PortDefinition::new("p", [kind]);
        prop_assert_eq!(port.default_kind, kind);
        prop_assert_eq!(port.accepted_kinds.single(), Some(kind));
    }
}
