//! Driver-independent result tables decoded from MySQL rows.

use crate::errors::GatewayError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view used by configuration flags. Numeric text and whole floats count.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// One result row. Column lookups ignore ASCII case, as MySQL does.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Column rendered as trimmed text; `None` when missing or NULL.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column)
            .filter(|v| !v.is_null())
            .map(|v| v.to_string().trim().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    /// Builds a table from literal values; every row must have one value per column.
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let shared: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|mut values| {
                values.resize(shared.len(), Value::Null);
                Row {
                    columns: shared.clone(),
                    values,
                }
            })
            .collect();
        Self { rows }
    }

    pub fn from_mysql_rows(rows: &[MySqlRow]) -> Result<Self, GatewayError> {
        let Some(first) = rows.first() else {
            return Ok(Self::default());
        };
        let columns: Arc<[String]> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let decoded = rows
            .iter()
            .map(|row| {
                let values = (0..columns.len())
                    .map(|idx| decode_value(row, idx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Row {
                    columns: columns.clone(),
                    values,
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;

        Ok(Self { rows: decoded })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

fn decode_error(row: &MySqlRow, idx: usize, err: impl fmt::Display) -> GatewayError {
    GatewayError::Decode {
        column: row
            .columns()
            .get(idx)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| idx.to_string()),
        message: err.to_string(),
    }
}

fn decode_value(row: &MySqlRow, idx: usize) -> Result<Value, GatewayError> {
    let raw = row.try_get_raw(idx).map_err(|e| decode_error(row, idx, e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = if type_name.contains("INT") || type_name == "BOOLEAN" {
        if type_name.contains("UNSIGNED") {
            let v: u64 = row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
            Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
        } else {
            Value::Int(row.try_get(idx).map_err(|e| decode_error(row, idx, e))?)
        }
    } else if type_name == "DECIMAL" {
        let v: Decimal = row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
        let whole = v.fract().is_zero().then(|| v.to_i64()).flatten();
        match whole {
            Some(i) => Value::Int(i),
            None => v
                .to_f64()
                .map(Value::Float)
                .unwrap_or_else(|| Value::Text(v.to_string())),
        }
    } else if type_name == "DOUBLE" {
        Value::Float(row.try_get(idx).map_err(|e| decode_error(row, idx, e))?)
    } else if type_name == "FLOAT" {
        let v: f32 = row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
        Value::Float(f64::from(v))
    } else if type_name == "DATE" {
        let v: chrono::NaiveDate = row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
        Value::Text(v.format("%Y%m%d").to_string())
    } else if type_name == "DATETIME" || type_name == "TIMESTAMP" {
        let v: chrono::NaiveDateTime =
            row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
        Value::Text(v.to_string())
    } else {
        match row.try_get::<String, _>(idx) {
            Ok(s) => Value::Text(s),
            Err(_) => {
                let bytes: Vec<u8> = row.try_get(idx).map_err(|e| decode_error(row, idx, e))?;
                Value::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_column_case() {
        let table = Table::new(
            &["codigo_produto", "EstoqueDisponivel"],
            vec![vec![Value::from("0042 "), Value::Float(12.0)]],
        );
        let row = table.first().unwrap();
        assert_eq!(row.text("CODIGO_PRODUTO").as_deref(), Some("0042"));
        assert_eq!(row.get("estoquedisponivel").and_then(Value::as_i64), Some(12));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn flag_values_coerce_to_integers() {
        assert_eq!(Value::Int(1).as_i64(), Some(1));
        assert_eq!(Value::from(" 3 ").as_i64(), Some(3));
        assert_eq!(Value::Float(2.5).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let table = Table::new(&["a", "b"], vec![vec![Value::Int(1)]]);
        assert_eq!(table.first().unwrap().get("b"), Some(&Value::Null));
        assert_eq!(table.len(), 1);
    }
}
