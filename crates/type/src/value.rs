// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Sentinel returned for integer lookups that miss.
pub const NODATA_INT: i64 = -i64::MAX;

/// Sentinel returned for real lookups that miss.
pub const NODATA_REAL: f64 = -f64::MAX;

/// Sentinel returned for text lookups that miss.
pub const NODATA_TEXT: &str = "NULL";

/// The closed set of column types an attribute table supports.
///
/// Maps 1:1 onto the SQL storage classes `INTEGER`, `REAL` and `TEXT`.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ColumnType {
	Int,
	Real,
	Text,
}

impl ColumnType {
	/// The SQL type name used when declaring a column of this type.
	pub fn sql_decl(&self) -> &'static str {
		match self {
			ColumnType::Int => "INTEGER",
			ColumnType::Real => "REAL",
			ColumnType::Text => "TEXT",
		}
	}

	/// Maps a declared SQL type back onto the closed type set.
	///
	/// Unknown declarations map to [`ColumnType::Text`], which can hold
	/// any value SQLite hands back.
	pub fn from_sql_decl(decl: &str) -> ColumnType {
		match decl.trim().to_ascii_uppercase().as_str() {
			"INTEGER" | "INT" | "BIGINT" | "SMALLINT" => {
				ColumnType::Int
			}
			"REAL" | "DOUBLE" | "FLOAT" | "NUMERIC" => {
				ColumnType::Real
			}
			_ => ColumnType::Text,
		}
	}

	/// The nodata sentinel for this type.
	pub fn nodata(&self) -> ColumnValue {
		match self {
			ColumnType::Int => ColumnValue::Int(NODATA_INT),
			ColumnType::Real => ColumnValue::Real(NODATA_REAL),
			ColumnType::Text => {
				ColumnValue::Text(NODATA_TEXT.to_string())
			}
		}
	}
}

impl Display for ColumnType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.sql_decl())
	}
}

/// A single tagged cell value passed across the table boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
	Int(i64),
	Real(f64),
	Text(String),
}

impl ColumnValue {
	pub fn column_type(&self) -> ColumnType {
		match self {
			ColumnValue::Int(_) => ColumnType::Int,
			ColumnValue::Real(_) => ColumnType::Real,
			ColumnValue::Text(_) => ColumnType::Text,
		}
	}

	/// Coerces to an integer; text that does not parse yields
	/// [`NODATA_INT`].
	pub fn as_int(&self) -> i64 {
		match self {
			ColumnValue::Int(v) => *v,
			ColumnValue::Real(v) => *v as i64,
			ColumnValue::Text(s) => parse_int(s),
		}
	}

	/// Coerces to a real; text that does not parse yields
	/// [`NODATA_REAL`].
	pub fn as_real(&self) -> f64 {
		match self {
			ColumnValue::Int(v) => *v as f64,
			ColumnValue::Real(v) => *v,
			ColumnValue::Text(s) => parse_real(s),
		}
	}

	/// Coerces to text using default formatting for numeric values.
	pub fn as_text(&self) -> String {
		match self {
			ColumnValue::Int(v) => v.to_string(),
			ColumnValue::Real(v) => v.to_string(),
			ColumnValue::Text(s) => s.clone(),
		}
	}
}

impl Display for ColumnValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ColumnValue::Int(v) => Display::fmt(v, f),
			ColumnValue::Real(v) => Display::fmt(v, f),
			ColumnValue::Text(s) => f.write_str(s),
		}
	}
}

impl From<i64> for ColumnValue {
	fn from(v: i64) -> Self {
		ColumnValue::Int(v)
	}
}

impl From<f64> for ColumnValue {
	fn from(v: f64) -> Self {
		ColumnValue::Real(v)
	}
}

impl From<String> for ColumnValue {
	fn from(v: String) -> Self {
		ColumnValue::Text(v)
	}
}

impl From<&str> for ColumnValue {
	fn from(v: &str) -> Self {
		ColumnValue::Text(v.to_string())
	}
}

/// Parses text as an integer the way C `strtol` would accept a leading
/// numeric value, degrading to [`NODATA_INT`] instead of failing.
pub fn parse_int(s: &str) -> i64 {
	let trimmed = s.trim();
	if let Ok(v) = trimmed.parse::<i64>() {
		return v;
	}
	match trimmed.parse::<f64>() {
		Ok(v) if v.is_finite() => v as i64,
		_ => NODATA_INT,
	}
}

/// Parses text as a real, degrading to [`NODATA_REAL`] on failure.
pub fn parse_real(s: &str) -> f64 {
	match s.trim().parse::<f64>() {
		Ok(v) => v,
		Err(_) => NODATA_REAL,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sql_decl_round_trip() {
		for ty in
			[ColumnType::Int, ColumnType::Real, ColumnType::Text]
		{
			assert_eq!(
				ColumnType::from_sql_decl(ty.sql_decl()),
				ty
			);
		}
	}

	#[test]
	fn test_from_sql_decl_unknown_maps_to_text() {
		assert_eq!(
			ColumnType::from_sql_decl("BLOB"),
			ColumnType::Text
		);
		assert_eq!(ColumnType::from_sql_decl(""), ColumnType::Text);
	}

	#[test]
	fn test_from_sql_decl_int_aliases() {
		assert_eq!(ColumnType::from_sql_decl("INT"), ColumnType::Int);
		assert_eq!(
			ColumnType::from_sql_decl("integer"),
			ColumnType::Int
		);
	}

	#[test]
	fn test_int_coercions() {
		assert_eq!(ColumnValue::Int(42).as_int(), 42);
		assert_eq!(ColumnValue::Real(3.9).as_int(), 3);
		assert_eq!(
			ColumnValue::Text("17".to_string()).as_int(),
			17
		);
		assert_eq!(
			ColumnValue::Text("3.7".to_string()).as_int(),
			3
		);
		assert_eq!(
			ColumnValue::Text("forest".to_string()).as_int(),
			NODATA_INT
		);
	}

	#[test]
	fn test_real_coercions() {
		assert_eq!(ColumnValue::Int(2).as_real(), 2.0);
		assert_eq!(
			ColumnValue::Text("2.5".to_string()).as_real(),
			2.5
		);
		assert_eq!(
			ColumnValue::Text("n/a".to_string()).as_real(),
			NODATA_REAL
		);
	}

	#[test]
	fn test_text_coercions() {
		assert_eq!(ColumnValue::Int(7).as_text(), "7");
		assert_eq!(ColumnValue::Real(1.5).as_text(), "1.5");
		assert_eq!(
			ColumnValue::Text("x".to_string()).as_text(),
			"x"
		);
	}

	#[test]
	fn test_nodata_sentinels() {
		assert_eq!(ColumnType::Int.nodata(), ColumnValue::Int(-i64::MAX));
		assert_eq!(
			ColumnType::Real.nodata(),
			ColumnValue::Real(-f64::MAX)
		);
		assert_eq!(
			ColumnType::Text.nodata(),
			ColumnValue::Text("NULL".to_string())
		);
	}
}
