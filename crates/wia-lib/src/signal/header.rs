use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Channel name. Two headers are the same channel when their names match ignoring case.
#[derive(Debug, Clone)]
pub struct Header {
    name: String,
    key: String,
}

impl Header {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.to_lowercase();
        Self { name, key }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn matches(&self, name: &str) -> bool {
        self.key == name.to_lowercase()
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Header {}

impl Hash for Header {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Header {
    fn from(value: &str) -> Self {
        Header::new(value)
    }
}

/// Physical units understood by the unit conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    Seconds,
    Milliseconds,
    Pascals,
    MmHg,
    MetersPerSecond,
    CentimetersPerSecond,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::Pascals => "Pa",
            Unit::MmHg => "mmHg",
            Unit::MetersPerSecond => "m/s",
            Unit::CentimetersPerSecond => "cm/s",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(Unit::Seconds),
            "ms" | "msec" | "milliseconds" => Ok(Unit::Milliseconds),
            "pa" | "pascal" | "pascals" => Ok(Unit::Pascals),
            "mmhg" => Ok(Unit::MmHg),
            "m/s" | "mps" => Ok(Unit::MetersPerSecond),
            "cm/s" | "cmps" => Ok(Unit::CentimetersPerSecond),
            other => Err(format!("unknown unit '{other}'")),
        }
    }
}

/// What a channel measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Time,
    Ecg,
    Pressure,
    Flow,
    Marker,
}

impl SignalKind {
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Time => "TIME",
            SignalKind::Ecg => "ECG",
            SignalKind::Pressure => "PRESSURE",
            SignalKind::Flow => "FLOW",
            SignalKind::Marker => "MARKER",
        }
    }
}

/// Tag attached to a header: its unit, its signal kind, or a free-form flag.
///
/// Free-form flags are written with a leading [`CUSTOM_FLAG_PREFIX`] so that text such as
/// `"ms"` reads back as a custom flag rather than a unit. Unprefixed text that names no unit
/// or kind still parses as custom.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    Unit(Unit),
    Kind(SignalKind),
    Filtered,
    Custom(String),
}

pub const CUSTOM_FLAG_PREFIX: char = '#';

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Unit(unit) => f.write_str(unit.symbol()),
            Flag::Kind(kind) => f.write_str(kind.label()),
            Flag::Filtered => f.write_str("FILTERED"),
            Flag::Custom(text) => write!(f, "{CUSTOM_FLAG_PREFIX}{text}"),
        }
    }
}

impl FromStr for Flag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(text) = s.strip_prefix(CUSTOM_FLAG_PREFIX) {
            return Ok(Flag::Custom(text.to_string()));
        }
        if let Ok(unit) = s.parse::<Unit>() {
            return Ok(Flag::Unit(unit));
        }
        let flag = match s.trim().to_uppercase().as_str() {
            "TIME" => Flag::Kind(SignalKind::Time),
            "ECG" => Flag::Kind(SignalKind::Ecg),
            "PRESSURE" => Flag::Kind(SignalKind::Pressure),
            "FLOW" => Flag::Kind(SignalKind::Flow),
            "MARKER" => Flag::Kind(SignalKind::Marker),
            "FILTERED" => Flag::Filtered,
            _ => Flag::Custom(s.to_string()),
        };
        Ok(flag)
    }
}

impl From<Unit> for Flag {
    fn from(unit: Unit) -> Self {
        Flag::Unit(unit)
    }
}

impl From<SignalKind> for Flag {
    fn from(kind: SignalKind) -> Self {
        Flag::Kind(kind)
    }
}
