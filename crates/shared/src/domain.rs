use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConsoleError;

/// Marker value used in layer maps to flag a fan-out column.
pub const AGGREGATE_MARKER: &str = "aggregate";

/// Opaque identifier for one output layer slot in the grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Column(pub String);

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Position of a colour entry in the catalog. Selections are recorded by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowIndex(pub usize);

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing key of a concrete layer on the composition engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerTarget {
    Index(u32),
    Key(String),
}

impl fmt::Display for LayerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerBinding {
    Aggregate,
    Concrete(LayerTarget),
}

impl LayerBinding {
    /// Numbers map to layer indices, the aggregate marker (any case) to a
    /// fan-out column, and any other string to an opaque routing key.
    pub fn from_json(value: &Value) -> Result<Self, ConsoleError> {
        match value {
            Value::Number(number) => number
                .as_u64()
                .and_then(|raw| u32::try_from(raw).ok())
                .map(|index| Self::Concrete(LayerTarget::Index(index)))
                .ok_or_else(|| {
                    ConsoleError::InvalidConfigValue(format!("layer index {number} out of range"))
                }),
            Value::String(text) if text.eq_ignore_ascii_case(AGGREGATE_MARKER) => {
                Ok(Self::Aggregate)
            }
            Value::String(text) if text.trim().is_empty() => Err(
                ConsoleError::InvalidConfigValue("empty layer target".to_string()),
            ),
            Value::String(text) => Ok(Self::Concrete(LayerTarget::Key(text.clone()))),
            other => Err(ConsoleError::InvalidConfigValue(format!(
                "unsupported layer target {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Aggregate => Value::String(AGGREGATE_MARKER.to_string()),
            Self::Concrete(LayerTarget::Index(index)) => Value::from(*index),
            Self::Concrete(LayerTarget::Key(key)) => Value::String(key.clone()),
        }
    }
}

/// Ordered column → binding table. Order is the grid order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerMap {
    entries: Vec<(Column, LayerBinding)>,
}

impl LayerMap {
    pub fn new(entries: Vec<(Column, LayerBinding)>) -> Result<Self, ConsoleError> {
        for (idx, (column, _)) in entries.iter().enumerate() {
            if entries[..idx].iter().any(|(other, _)| other == column) {
                return Err(ConsoleError::InvalidConfigValue(format!(
                    "duplicate layer column '{column}'"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Parses the wire form stored under `LAYER_MAP`: an array of
    /// `{"column": .., "target": ..}` objects, or an object whose key order
    /// is taken as grid order.
    pub fn from_json(value: &Value) -> Result<Self, ConsoleError> {
        let entries = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    let column = item
                        .get("column")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            ConsoleError::InvalidConfigValue(format!(
                                "layer entry without column: {item}"
                            ))
                        })?;
                    let target = item.get("target").ok_or_else(|| {
                        ConsoleError::InvalidConfigValue(format!(
                            "layer entry '{column}' without target"
                        ))
                    })?;
                    Ok((Column::new(column), LayerBinding::from_json(target)?))
                })
                .collect::<Result<Vec<_>, ConsoleError>>()?,
            Value::Object(map) => map
                .iter()
                .map(|(column, target)| Ok((Column::new(column), LayerBinding::from_json(target)?)))
                .collect::<Result<Vec<_>, ConsoleError>>()?,
            other => {
                return Err(ConsoleError::InvalidConfigValue(format!(
                    "layer map must be an array or object, got {other}"
                )))
            }
        };
        Self::new(entries)
    }

    pub fn to_json(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|(column, binding)| {
                    serde_json::json!({ "column": column.as_str(), "target": binding.to_json() })
                })
                .collect(),
        )
    }

    pub fn binding(&self, column: &Column) -> Option<&LayerBinding> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == column)
            .map(|(_, binding)| binding)
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.binding(column).is_some()
    }

    pub fn is_aggregate(&self, column: &Column) -> bool {
        matches!(self.binding(column), Some(LayerBinding::Aggregate))
    }

    pub fn target(&self, column: &Column) -> Option<&LayerTarget> {
        match self.binding(column)? {
            LayerBinding::Concrete(target) => Some(target),
            LayerBinding::Aggregate => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.entries.iter().map(|(column, _)| column)
    }

    pub fn concrete(&self) -> impl Iterator<Item = (&Column, &LayerTarget)> {
        self.entries.iter().filter_map(|(column, binding)| match binding {
            LayerBinding::Concrete(target) => Some((column, target)),
            LayerBinding::Aggregate => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourEntry {
    pub label: String,
    pub hex: String,
}

impl ColourEntry {
    pub fn new(label: impl Into<String>, hex: impl Into<String>) -> Result<Self, ConsoleError> {
        let label = label.into();
        let hex = normalize_hex(&hex.into())?;
        Ok(Self { label, hex })
    }
}

/// Upper-cases and validates a `#RRGGBB` colour.
pub fn normalize_hex(raw: &str) -> Result<String, ConsoleError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConsoleError::InvalidConfigValue(format!(
            "invalid colour '{raw}', expected #RRGGBB"
        )));
    }
    Ok(format!("#{}", digits.to_ascii_uppercase()))
}

/// Ordered list of colour choices; the row index is the position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColourCatalog {
    entries: Vec<ColourEntry>,
}

impl ColourCatalog {
    pub fn new(entries: Vec<ColourEntry>) -> Self {
        Self { entries }
    }

    /// Parses the wire form stored under `COLOUR_SET`: an array of
    /// `{"label": .., "hex": ..}` objects, or an object of label → hex.
    pub fn from_json(value: &Value) -> Result<Self, ConsoleError> {
        let entries = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    let label = item.get("label").and_then(Value::as_str);
                    let hex = item.get("hex").and_then(Value::as_str);
                    match (label, hex) {
                        (Some(label), Some(hex)) => ColourEntry::new(label, hex),
                        _ => Err(ConsoleError::InvalidConfigValue(format!(
                            "colour entry must carry label and hex: {item}"
                        ))),
                    }
                })
                .collect::<Result<Vec<_>, ConsoleError>>()?,
            Value::Object(map) => map
                .iter()
                .map(|(label, hex)| {
                    let hex = hex.as_str().ok_or_else(|| {
                        ConsoleError::InvalidConfigValue(format!("colour '{label}' is not a string"))
                    })?;
                    ColourEntry::new(label.as_str(), hex)
                })
                .collect::<Result<Vec<_>, ConsoleError>>()?,
            other => {
                return Err(ConsoleError::InvalidConfigValue(format!(
                    "colour set must be an array or object, got {other}"
                )))
            }
        };
        Ok(Self::new(entries))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.entries).unwrap_or(Value::Null)
    }

    pub fn get(&self, row: RowIndex) -> Option<&ColourEntry> {
        self.entries.get(row.0)
    }

    pub fn rows(&self) -> impl Iterator<Item = (RowIndex, &ColourEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (RowIndex(idx), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
