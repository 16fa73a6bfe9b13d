//! Tabular metadata: rectangular tables of typed scalar cells.
//!
//! Tables link the small integers in indices arrays to attribute sets that
//! identify entities across machines. Cells are [`Scalar`] values; scalars
//! hash and compare by bit pattern so rows can form composite map keys.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// A typed table cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Parse a CSV cell: empty -> Null, then integer, float, bool, text.
    pub fn parse_cell(cell: &str) -> Self {
        if cell.is_empty() {
            return Scalar::Null;
        }
        if let Ok(i) = cell.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = cell.parse::<f64>() {
            return Scalar::Float(f);
        }
        match cell {
            "true" | "True" => Scalar::Bool(true),
            "false" | "False" => Scalar::Bool(false),
            _ => Scalar::Text(cell.to_string()),
        }
    }

    /// Render as a CSV cell.
    pub fn to_cell(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// The integer value, if this cell holds one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            // Bit comparison: NaN keys equal themselves.
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::Int(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Text(s) => s.hash(state),
        }
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(scalar: &Scalar) -> u8 {
            match scalar {
                Scalar::Null => 0,
                Scalar::Bool(_) => 1,
                Scalar::Int(_) => 2,
                Scalar::Float(_) => 3,
                Scalar::Text(_) => 4,
            }
        }
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            // Bit ordering: total, and consistent with the bit-based Eq.
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits().cmp(&b.to_bits()),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_cell())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// A rectangular table: named columns over rows of scalar cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Create a table, validating that every row matches the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> TypeResult<Self> {
        let expected = columns.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(TypeError::RaggedTable {
                    row: i,
                    got: row.len(),
                    expected,
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> TypeResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TypeError::UnknownColumn(name.to_string()))
    }

    /// The cell at (`row`, `column`).
    pub fn cell(&self, row: usize, column: usize) -> &Scalar {
        &self.rows[row][column]
    }

    /// Replace the cell at (`row`, `column`).
    pub fn set_cell(&mut self, row: usize, column: usize, value: Scalar) {
        self.rows[row][column] = value;
    }

    /// All values of one named column, in row order.
    pub fn column(&self, name: &str) -> TypeResult<Vec<Scalar>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }
}
