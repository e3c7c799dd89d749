use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Dimension – the closed set of semantic attributes of a BIN record
// ---------------------------------------------------------------------------

/// One semantic attribute of a BIN record, independent of the raw column
/// that encodes it in a particular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    BinPrefix,
    Bank,
    Brand,
    Type,
    Level,
    Country,
    CountryCode,
    Prepaid,
}

impl Dimension {
    /// All dimensions in declaration order.
    pub const ALL: [Dimension; 8] = [
        Dimension::BinPrefix,
        Dimension::Bank,
        Dimension::Brand,
        Dimension::Type,
        Dimension::Level,
        Dimension::Country,
        Dimension::CountryCode,
        Dimension::Prepaid,
    ];

    /// Dimensions with discrete values that get an option list and accept
    /// include sets.
    pub const CATEGORICAL: [Dimension; 6] = [
        Dimension::Bank,
        Dimension::Brand,
        Dimension::Type,
        Dimension::Level,
        Dimension::Country,
        Dimension::CountryCode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::BinPrefix => "bin_prefix",
            Dimension::Bank => "bank",
            Dimension::Brand => "brand",
            Dimension::Type => "type",
            Dimension::Level => "level",
            Dimension::Country => "country",
            Dimension::CountryCode => "country_code",
            Dimension::Prepaid => "prepaid",
        }
    }

    pub fn is_categorical(self) -> bool {
        Self::CATEGORICAL.contains(&self)
    }

    /// Multi-valued dimensions that also accept an exclude set. Brand and
    /// type are single-choice selectors and only take includes.
    pub fn supports_exclusion(self) -> bool {
        matches!(
            self,
            Dimension::Bank | Dimension::Level | Dimension::Country | Dimension::CountryCode
        )
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    /// Accepts the canonical snake_case name; `bin` is kept as an alias.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if key == "bin" {
            return Ok(Dimension::BinPrefix);
        }
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| format!("unknown dimension '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Value interpretation helpers
// ---------------------------------------------------------------------------

/// Comparison form of a cell: trimmed and lowercased.
pub fn normalize_value(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Tri-state reading of a boolean-like cell: `Some(true)`, `Some(false)` or
/// `None` when the value does not say.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RawTable – the loaded CSV, all cells kept as text
// ---------------------------------------------------------------------------

/// The loaded table. Row order is the source file order; cells stay strings
/// and are only interpreted inside the predicate that needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    column_index: BTreeMap<String, usize>,
}

impl RawTable {
    /// Build a table, rejecting duplicate header names and ragged rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut column_index = BTreeMap::new();
        for (pos, name) in headers.iter().enumerate() {
            if column_index.insert(name.clone(), pos).is_some() {
                return Err(EngineError::malformed(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(EngineError::malformed(format!(
                "row {i} has {} fields but the header has {}",
                row.len(),
                headers.len()
            )));
        }
        Ok(Self {
            headers,
            rows,
            column_index,
        })
    }

    /// Column names in header order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn row(&self, index: usize) -> &[String] {
        &self.rows[index]
    }

    /// Value at (`row`, `column`), or `None` for an unknown column.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let pos = self.column_position(column)?;
        self.rows.get(row).map(|r| r[pos].as_str())
    }

    /// Every value of one column, in row order.
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a str> + 'a {
        let pos = self.column_position(column);
        self.rows
            .iter()
            .filter_map(move |r| pos.map(|p| r[p].as_str()))
    }
}

// ---------------------------------------------------------------------------
// Mapping – Dimension → raw column
// ---------------------------------------------------------------------------

/// Resolved correspondence between dimensions and raw columns.
///
/// A raw column is referenced by at most one dimension; a dimension without
/// an entry is unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    columns: BTreeMap<Dimension, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dim: Dimension) -> Option<&str> {
        self.columns.get(&dim).map(String::as_str)
    }

    pub fn is_mapped(&self, dim: Dimension) -> bool {
        self.columns.contains_key(&dim)
    }

    /// Dimension currently claiming `column`, if any.
    pub fn owner_of(&self, column: &str) -> Option<Dimension> {
        self.columns
            .iter()
            .find(|(_, c)| c.as_str() == column)
            .map(|(d, _)| *d)
    }

    /// Map `dim` to `column` unless another dimension already claims it.
    /// Returns whether the assignment took effect.
    pub fn assign(&mut self, dim: Dimension, column: impl Into<String>) -> bool {
        let column = column.into();
        match self.owner_of(&column) {
            Some(owner) if owner != dim => false,
            _ => {
                self.columns.insert(dim, column);
                true
            }
        }
    }

    /// Mapped (dimension, column) pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &str)> {
        self.columns.iter().map(|(d, c)| (*d, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Display value of `dim` for `row`; `None` when the dimension is unmapped.
    pub fn value<'t>(&self, table: &'t RawTable, row: usize, dim: Dimension) -> Option<&'t str> {
        self.get(dim).and_then(|col| table.cell(row, col))
    }
}

/// Serialised with every dimension present, unmapped ones as `null`.
impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Dimension::ALL.len()))?;
        for dim in Dimension::ALL {
            map.serialize_entry(dim.as_str(), &self.get(dim))?;
        }
        map.end()
    }
}
