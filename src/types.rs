//! Core signal types for the block logic engine
//!
//! This module is the primitive type registry: the closed set of signal
//! kinds a wire can carry, the payload values of those kinds, and the
//! mapping from authoring-time config types onto the primitive set.
//!
//! # Main Types
//!
//! - [`PrimitiveKind`] - Closed enum of signal kinds (bool, number, vector3, ...)
//! - [`KindSet`] - Bitset of kinds, used for accepted/candidate/available sets
//! - [`Value`] - A payload tagged with its kind
//! - [`ConfigType`] - Authoring config types (`clampedNumber`, `keybool`, ...)
//!
//! `Unset` and `Wire` are sentinel kinds: they appear in kind sets and the
//! color table but never carry a payload, so [`Value`] has no variant for them.

use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CircuitError, Result};

/// The kind of signal a port carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// No value has been chosen yet
    Unset,
    /// The port is driven by a wire
    Wire,
    Bool,
    Number,
    Vector3,
    String,
    Color,
    Byte,
    #[serde(rename = "bytearray")]
    ByteArray,
    Key,
}

impl PrimitiveKind {
    /// All kinds, in registry order
    pub const ALL: [PrimitiveKind; 10] = [
        PrimitiveKind::Unset,
        PrimitiveKind::Wire,
        PrimitiveKind::Bool,
        PrimitiveKind::Number,
        PrimitiveKind::Vector3,
        PrimitiveKind::String,
        PrimitiveKind::Color,
        PrimitiveKind::Byte,
        PrimitiveKind::ByteArray,
        PrimitiveKind::Key,
    ];

    /// Name used in catalogs and snapshots
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Unset => "unset",
            PrimitiveKind::Wire => "wire",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Vector3 => "vector3",
            PrimitiveKind::String => "string",
            PrimitiveKind::Color => "color",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::ByteArray => "bytearray",
            PrimitiveKind::Key => "key",
        }
    }

    /// Whether this kind is a sentinel that never carries a payload
    pub fn is_sentinel(&self) -> bool {
        matches!(self, PrimitiveKind::Unset | PrimitiveKind::Wire)
    }

    /// The value an unconfigured input of this kind starts with
    pub fn default_value(&self) -> Option<Value> {
        match self {
            PrimitiveKind::Unset | PrimitiveKind::Wire => None,
            PrimitiveKind::Bool => Some(Value::Bool(false)),
            PrimitiveKind::Number => Some(Value::Number(0.0)),
            PrimitiveKind::Vector3 => Some(Value::Vector3(DVec3::ZERO)),
            PrimitiveKind::String => Some(Value::String(String::new())),
            PrimitiveKind::Color => Some(Value::Color(Color::WHITE)),
            PrimitiveKind::Byte => Some(Value::Byte(0)),
            PrimitiveKind::ByteArray => Some(Value::ByteArray(Vec::new())),
            PrimitiveKind::Key => Some(Value::Key("F".to_string())),
        }
    }

    /// UI color used to draw wires and markers of this kind
    pub fn display_color(&self) -> Color {
        match self {
            PrimitiveKind::Unset => Color::from_rgb8(120, 120, 120),
            PrimitiveKind::Wire => Color::from_rgb8(255, 255, 255),
            PrimitiveKind::Bool => Color::from_rgb8(255, 89, 89),
            PrimitiveKind::Number => Color::from_rgb8(85, 170, 255),
            PrimitiveKind::Vector3 => Color::from_rgb8(255, 170, 0),
            PrimitiveKind::String => Color::from_rgb8(170, 255, 127),
            PrimitiveKind::Color => Color::from_rgb8(255, 85, 255),
            PrimitiveKind::Byte => Color::from_rgb8(85, 255, 255),
            PrimitiveKind::ByteArray => Color::from_rgb8(0, 170, 170),
            PrimitiveKind::Key => Color::from_rgb8(255, 255, 127),
        }
    }

    /// UI grouping of this kind in pickers and legends
    pub fn group_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Unset | PrimitiveKind::Wire => "special",
            PrimitiveKind::Bool | PrimitiveKind::Key => "logic",
            PrimitiveKind::Number | PrimitiveKind::Vector3 => "math",
            PrimitiveKind::Byte | PrimitiveKind::ByteArray => "binary",
            PrimitiveKind::String | PrimitiveKind::Color => "misc",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PrimitiveKind {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self> {
        PrimitiveKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| CircuitError::Catalog(format!("Unknown primitive kind '{}'", s)))
    }
}

bitflags! {
    /// A set of primitive kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KindSet: u16 {
        const UNSET = 1 << 0;
        const WIRE = 1 << 1;
        const BOOL = 1 << 2;
        const NUMBER = 1 << 3;
        const VECTOR3 = 1 << 4;
        const STRING = 1 << 5;
        const COLOR = 1 << 6;
        const BYTE = 1 << 7;
        const BYTE_ARRAY = 1 << 8;
        const KEY = 1 << 9;
    }
}

impl KindSet {
    /// The kinds a generic arithmetic port accepts
    pub const ARITHMETIC: KindSet = KindSet::NUMBER
        .union(KindSet::VECTOR3)
        .union(KindSet::COLOR)
        .union(KindSet::BYTE);

    pub fn of(kind: PrimitiveKind) -> Self {
        KindSet::from_bits_retain(1 << kind as u16)
    }

    pub fn has(&self, kind: PrimitiveKind) -> bool {
        self.contains(KindSet::of(kind))
    }

    /// Iterate the kinds in registry order
    pub fn kinds(&self) -> impl Iterator<Item = PrimitiveKind> + '_ {
        PrimitiveKind::ALL.iter().copied().filter(|k| self.has(*k))
    }

    /// The only kind in the set, if it has exactly one
    pub fn single(&self) -> Option<PrimitiveKind> {
        if self.bits().count_ones() == 1 {
            self.kinds().next()
        } else {
            None
        }
    }
}

impl From<PrimitiveKind> for KindSet {
    fn from(kind: PrimitiveKind) -> Self {
        KindSet::of(kind)
    }
}

impl FromIterator<PrimitiveKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = PrimitiveKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::empty(), |acc, k| acc | KindSet::of(k))
    }
}

impl fmt::Display for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, "}}")
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }
}

/// A signal payload tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Number(f64),
    Vector3(DVec3),
    String(String),
    Color(Color),
    Byte(u8),
    #[serde(rename = "bytearray")]
    ByteArray(Vec<u8>),
    Key(String),
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Number(_) => PrimitiveKind::Number,
            Value::Vector3(_) => PrimitiveKind::Vector3,
            Value::String(_) => PrimitiveKind::String,
            Value::Color(_) => PrimitiveKind::Color,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::ByteArray(_) => PrimitiveKind::ByteArray,
            Value::Key(_) => PrimitiveKind::Key,
        }
    }

    /// False for NaN or infinite numeric components
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite(),
            Value::Vector3(v) => v.is_finite(),
            Value::Color(c) => c.is_finite(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<DVec3> {
        match self {
            Value::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) | Value::Key(v) => Some(v),
            _ => None,
        }
    }
}

/// Authoring-time config types that block catalogs declare on ports.
///
/// Several config types share a primitive kind and differ only in how the
/// value is filtered (see [`crate::logic::PortFilter`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigType {
    Bool,
    KeyBool,
    Number,
    ClampedNumber,
    MotorRotationSpeed,
    ServoMotorAngle,
    Thrust,
    Vector3,
    String,
    Color,
    Byte,
    ByteArray,
    Key,
}

impl ConfigType {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigType::Bool => "bool",
            ConfigType::KeyBool => "keybool",
            ConfigType::Number => "number",
            ConfigType::ClampedNumber => "clampedNumber",
            ConfigType::MotorRotationSpeed => "motorRotationSpeed",
            ConfigType::ServoMotorAngle => "servoMotorAngle",
            ConfigType::Thrust => "thrust",
            ConfigType::Vector3 => "vector3",
            ConfigType::String => "string",
            ConfigType::Color => "color",
            ConfigType::Byte => "byte",
            ConfigType::ByteArray => "bytearray",
            ConfigType::Key => "key",
        }
    }

    /// The primitive kind values of this config type carry
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ConfigType::Bool | ConfigType::KeyBool => PrimitiveKind::Bool,
            ConfigType::Number
            | ConfigType::ClampedNumber
            | ConfigType::MotorRotationSpeed
            | ConfigType::ServoMotorAngle
            | ConfigType::Thrust => PrimitiveKind::Number,
            ConfigType::Vector3 => PrimitiveKind::Vector3,
            ConfigType::String => PrimitiveKind::String,
            ConfigType::Color => PrimitiveKind::Color,
            ConfigType::Byte => PrimitiveKind::Byte,
            ConfigType::ByteArray => PrimitiveKind::ByteArray,
            ConfigType::Key => PrimitiveKind::Key,
        }
    }

    fn all() -> &'static [ConfigType] {
        &[
            ConfigType::Bool,
            ConfigType::KeyBool,
            ConfigType::Number,
            ConfigType::ClampedNumber,
            ConfigType::MotorRotationSpeed,
            ConfigType::ServoMotorAngle,
            ConfigType::Thrust,
            ConfigType::Vector3,
            ConfigType::String,
            ConfigType::Color,
            ConfigType::Byte,
            ConfigType::ByteArray,
            ConfigType::Key,
        ]
    }
}

impl FromStr for ConfigType {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self> {
        ConfigType::all()
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| CircuitError::UnknownConfigType(s.to_string()))
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Map an authoring config type name onto the primitive set.
pub fn kind_of(config_type: &str) -> Result<PrimitiveKind> {
    config_type.parse::<ConfigType>().map(|t| t.kind())
}

/// UI color for a primitive kind.
pub fn display_color(kind: PrimitiveKind) -> Color {
    kind.display_color()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_config_types() {
        assert_eq!(kind_of("clampedNumber").unwrap(), PrimitiveKind::Number);
        assert_eq!(kind_of("keybool").unwrap(), PrimitiveKind::Bool);
        assert_eq!(kind_of("motorRotationSpeed").unwrap(), PrimitiveKind::Number);
        assert_eq!(kind_of("bytearray").unwrap(), PrimitiveKind::ByteArray);
        assert!(matches!(
            kind_of("laserPower"),
            Err(CircuitError::UnknownConfigType(_))
        ));
    }

    #[test]
    fn test_primitive_kind_parse_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(kind.name().parse::<PrimitiveKind>().unwrap(), kind);
        }
        assert!("float".parse::<PrimitiveKind>().is_err());
    }

    #[test]
    fn test_kind_set_operations() {
        let a: KindSet = [PrimitiveKind::Number, PrimitiveKind::Vector3].into_iter().collect();
        let b: KindSet = [PrimitiveKind::Number, PrimitiveKind::Bool].into_iter().collect();

        let both = a & b;
        assert_eq!(both.single(), Some(PrimitiveKind::Number));
        assert!(a.has(PrimitiveKind::Vector3));
        assert!(!a.has(PrimitiveKind::Bool));
        assert_eq!(a.single(), None);
        assert_eq!(a.to_string(), "{number, vector3}");
    }

    #[test]
    fn test_arithmetic_set() {
        let kinds: Vec<_> = KindSet::ARITHMETIC.kinds().collect();
        assert_eq!(
            kinds,
            vec![
                PrimitiveKind::Number,
                PrimitiveKind::Vector3,
                PrimitiveKind::Color,
                PrimitiveKind::Byte
            ]
        );
    }

    #[test]
    fn test_default_values_match_kind() {
        for kind in PrimitiveKind::ALL {
            match kind.default_value() {
                Some(value) => assert_eq!(value.kind(), kind),
                None => assert!(kind.is_sentinel()),
            }
        }
    }

    #[test]
    fn test_value_finite() {
        assert!(Value::Number(1.5).is_finite());
        assert!(!Value::Number(f64::NAN).is_finite());
        assert!(!Value::Number(f64::INFINITY).is_finite());
        assert!(!Value::Vector3(DVec3::new(0.0, f64::NEG_INFINITY, 0.0)).is_finite());
        assert!(Value::String("x".into()).is_finite());
    }

    #[test]
    fn test_value_serde_shape() {
        let json = serde_json::to_string(&Value::Number(2.0)).unwrap();
        assert_eq!(json, r#"{"kind":"number","value":2.0}"#);
        let parsed: Value = serde_json::from_str(r#"{"kind":"bool","value":true}"#).unwrap();
        assert_eq!(parsed, Value::Bool(true));
        let bytes: Value = serde_json::from_str(r#"{"kind":"bytearray","value":[1,2]}"#).unwrap();
        assert_eq!(bytes.kind(), PrimitiveKind::ByteArray);
    }

    #[test]
    fn test_display_color_distinct_for_payload_kinds() {
        let colors: Vec<_> = PrimitiveKind::ALL
            .iter()
            .map(|k| display_color(*k))
            .collect();
        for (i, a) in colors.iter().enumerate() {
            for b in colors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
