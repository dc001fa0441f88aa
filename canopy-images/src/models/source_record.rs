//! Tree inventory records and the identifiers drawn from them
//!
//! Records arrive from the upstream CSV join as JSON objects with arbitrary
//! columns. Only the taxonomy identifier and botanical name matter here;
//! every other field is carried through untouched and in its original order.

use canopy_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use super::MediaReference;

/// Keys checked (in order) for the taxonomy identifier
const IDENTIFIER_KEYS: [&str; 2] = ["eol_id", "EOL_ID"];

/// Keys checked (in order) for the botanical name
const BOTANICAL_NAME_KEYS: [&str; 2] = ["name_botanical", "botanical_name"];

/// Key the resolved media list is written under
pub const IMAGES_KEY: &str = "images";

/// Encyclopedia of Life page identifier
///
/// Always positive; `-1`, `0` and missing values mean "no lookup possible"
/// and never become an `EolId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EolId(u64);

impl EolId {
    /// Wrap a raw identifier, rejecting zero and negatives
    pub fn new(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().filter(|&v| v > 0).map(EolId)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Lenient extraction from a JSON cell
    ///
    /// Accepts integers, integral floats (`583608.0`, as spreadsheet exports
    /// produce) and numeric strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::new(i)
                } else if let Some(u) = n.as_u64() {
                    (u > 0).then_some(EolId(u))
                } else {
                    n.as_f64().and_then(Self::from_float)
                }
            }
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .and_then(Self::new)
                    .or_else(|| s.parse::<f64>().ok().and_then(Self::from_float))
            }
            _ => None,
        }
    }

    fn from_float(f: f64) -> Option<Self> {
        (f.is_finite() && f.fract() == 0.0 && f >= 1.0 && f <= i64::MAX as f64)
            .then(|| Self::new(f as i64))
            .flatten()
    }
}

impl fmt::Display for EolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tree or species observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord {
    fields: Map<String, Value>,
}

impl SourceRecord {
    /// Build a record from a parsed JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::InvalidInput(format!(
                "record must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Taxonomy identifier, if the record carries a usable one
    pub fn identifier(&self) -> Option<EolId> {
        IDENTIFIER_KEYS
            .iter()
            .find_map(|key| self.fields.get(*key))
            .and_then(EolId::from_json)
    }

    pub fn botanical_name(&self) -> Option<&str> {
        BOTANICAL_NAME_KEYS
            .iter()
            .find_map(|key| self.fields.get(*key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn images(&self) -> Option<&Value> {
        self.fields.get(IMAGES_KEY)
    }

    /// Set the resolved media list, replacing any previous one
    pub fn attach_images(&mut self, images: &[MediaReference]) {
        let list = images
            .iter()
            .filter_map(|m| serde_json::to_value(m).ok())
            .collect();
        self.fields.insert(IMAGES_KEY.to_string(), Value::Array(list));
    }
}

/// Identifier plus the botanical name of the first record that carried it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierEntry {
    pub id: EolId,
    pub botanical_name: Option<String>,
}

/// De-duplicated identifiers of a record set, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    entries: Vec<IdentifierEntry>,
}

impl IdentifierSet {
    pub fn from_records(records: &[SourceRecord]) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<IdentifierEntry> = Vec::new();

        for record in records {
            let Some(id) = record.identifier() else {
                continue;
            };

            if seen.insert(id) {
                entries.push(IdentifierEntry {
                    id,
                    botanical_name: record.botanical_name().map(str::to_string),
                });
            } else if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                // Later records may fill in a name the first one lacked
                if entry.botanical_name.is_none() {
                    entry.botanical_name = record.botanical_name().map(str::to_string);
                }
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EolId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<EolId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentifierEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for IdentifierSet {
    type Item = IdentifierEntry;
    type IntoIter = std::vec::IntoIter<IdentifierEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
