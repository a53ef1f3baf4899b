// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use rattab_type::{
	ColumnType, NODATA_INT, NODATA_REAL, NODATA_TEXT, Result, diagnostic,
	err,
};

/// Field types of a foreign raster attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatFieldType {
	Integer,
	Real,
	String,
}

impl RatFieldType {
	pub fn column_type(&self) -> ColumnType {
		match self {
			RatFieldType::Integer => ColumnType::Int,
			RatFieldType::Real => ColumnType::Real,
			RatFieldType::String => ColumnType::Text,
		}
	}

	pub fn from_column_type(ty: ColumnType) -> Self {
		match ty {
			ColumnType::Int => RatFieldType::Integer,
			ColumnType::Real => RatFieldType::Real,
			ColumnType::Text => RatFieldType::String,
		}
	}
}

/// A readable foreign raster attribute table, consumed column chunk by
/// column chunk.
///
/// `start` is the first row of the chunk and the output slice length
/// selects the chunk size; implementations fill the whole slice.
pub trait RatSource {
	fn row_count(&self) -> i64;
	fn column_count(&self) -> usize;
	fn column_name(&self, col: usize) -> Option<String>;
	fn column_type(&self, col: usize) -> Option<RatFieldType>;

	fn read_int(
		&self,
		col: usize,
		start: i64,
		out: &mut [i64],
	) -> Result<()>;
	fn read_real(
		&self,
		col: usize,
		start: i64,
		out: &mut [f64],
	) -> Result<()>;
	fn read_text(
		&self,
		col: usize,
		start: i64,
		out: &mut [String],
	) -> Result<()>;
}

/// A writable foreign raster attribute table, filled column chunk by
/// column chunk.
pub trait RatSink {
	fn set_row_count(&mut self, rows: i64) -> Result<()>;

	/// Appends a column; columns are addressed by creation order.
	fn create_column(
		&mut self,
		name: &str,
		ty: RatFieldType,
	) -> Result<()>;

	fn write_int(
		&mut self,
		col: usize,
		start: i64,
		values: &[i64],
	) -> Result<()>;
	fn write_real(
		&mut self,
		col: usize,
		start: i64,
		values: &[f64],
	) -> Result<()>;
	fn write_text(
		&mut self,
		col: usize,
		start: i64,
		values: &[String],
	) -> Result<()>;
}

enum RatData {
	Int(Vec<i64>),
	Real(Vec<f64>),
	Text(Vec<String>),
}

struct RatColumn {
	name: String,
	data: RatData,
}

/// An owned, in-memory raster attribute table implementing both sides
/// of the bridge. Stands in for an external RAT provider in tests and
/// for callers that already hold materialized column arrays.
pub struct MemoryRat {
	columns: Vec<RatColumn>,
	rows: i64,
}

impl MemoryRat {
	pub fn new() -> Self {
		Self {
			columns: Vec::new(),
			rows: 0,
		}
	}

	pub fn push_int_column(
		&mut self,
		name: impl Into<String>,
		data: Vec<i64>,
	) {
		self.rows = self.rows.max(data.len() as i64);
		self.columns.push(RatColumn {
			name: name.into(),
			data: RatData::Int(data),
		});
	}

	pub fn push_real_column(
		&mut self,
		name: impl Into<String>,
		data: Vec<f64>,
	) {
		self.rows = self.rows.max(data.len() as i64);
		self.columns.push(RatColumn {
			name: name.into(),
			data: RatData::Real(data),
		});
	}

	pub fn push_text_column(
		&mut self,
		name: impl Into<String>,
		data: Vec<String>,
	) {
		self.rows = self.rows.max(data.len() as i64);
		self.columns.push(RatColumn {
			name: name.into(),
			data: RatData::Text(data),
		});
	}

	pub fn int_data(&self, col: usize) -> Option<&[i64]> {
		match &self.columns.get(col)?.data {
			RatData::Int(v) => Some(v),
			_ => None,
		}
	}

	pub fn real_data(&self, col: usize) -> Option<&[f64]> {
		match &self.columns.get(col)?.data {
			RatData::Real(v) => Some(v),
			_ => None,
		}
	}

	pub fn text_data(&self, col: usize) -> Option<&[String]> {
		match &self.columns.get(col)?.data {
			RatData::Text(v) => Some(v),
			_ => None,
		}
	}

	fn column(&self, col: usize) -> Result<&RatColumn> {
		match self.columns.get(col) {
			Some(column) => Ok(column),
			None => err!(diagnostic::bridge::column_out_of_range(
				col
			)),
		}
	}

	fn column_mut(&mut self, col: usize) -> Result<&mut RatColumn> {
		match self.columns.get_mut(col) {
			Some(column) => Ok(column),
			None => err!(diagnostic::bridge::column_out_of_range(
				col
			)),
		}
	}
}

impl Default for MemoryRat {
	fn default() -> Self {
		Self::new()
	}
}

fn copy_range<T: Clone>(data: &[T], start: i64, out: &mut [T]) {
	let start = start.max(0) as usize;
	for (i, slot) in out.iter_mut().enumerate() {
		if let Some(value) = data.get(start + i) {
			*slot = value.clone();
		}
	}
}

fn store_range<T: Clone>(data: &mut Vec<T>, start: i64, values: &[T]) {
	let start = start.max(0) as usize;
	let needed = start + values.len();
	if data.len() < needed {
		// the sink may be written before set_row_count; values
		// beyond the announced row count are kept
		let last = values.last().cloned();
		if let Some(fill) = last {
			data.resize(needed, fill);
		}
	}
	for (i, value) in values.iter().enumerate() {
		data[start + i] = value.clone();
	}
}

impl RatSource for MemoryRat {
	fn row_count(&self) -> i64 {
		self.rows
	}

	fn column_count(&self) -> usize {
		self.columns.len()
	}

	fn column_name(&self, col: usize) -> Option<String> {
		self.columns.get(col).map(|c| c.name.clone())
	}

	fn column_type(&self, col: usize) -> Option<RatFieldType> {
		self.columns.get(col).map(|c| match c.data {
			RatData::Int(_) => RatFieldType::Integer,
			RatData::Real(_) => RatFieldType::Real,
			RatData::Text(_) => RatFieldType::String,
		})
	}

	fn read_int(
		&self,
		col: usize,
		start: i64,
		out: &mut [i64],
	) -> Result<()> {
		match &self.column(col)?.data {
			RatData::Int(data) => {
				copy_range(data, start, out);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&self.columns[col].name,
				"integer"
			)),
		}
	}

	fn read_real(
		&self,
		col: usize,
		start: i64,
		out: &mut [f64],
	) -> Result<()> {
		match &self.column(col)?.data {
			RatData::Real(data) => {
				copy_range(data, start, out);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&self.columns[col].name,
				"real"
			)),
		}
	}

	fn read_text(
		&self,
		col: usize,
		start: i64,
		out: &mut [String],
	) -> Result<()> {
		match &self.column(col)?.data {
			RatData::Text(data) => {
				copy_range(data, start, out);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&self.columns[col].name,
				"text"
			)),
		}
	}
}

impl RatSink for MemoryRat {
	fn set_row_count(&mut self, rows: i64) -> Result<()> {
		self.rows = rows.max(0);
		let rows = self.rows as usize;
		for column in &mut self.columns {
			match &mut column.data {
				RatData::Int(v) => v.resize(rows, NODATA_INT),
				RatData::Real(v) => {
					v.resize(rows, NODATA_REAL)
				}
				RatData::Text(v) => v.resize(
					rows,
					NODATA_TEXT.to_string(),
				),
			}
		}
		Ok(())
	}

	fn create_column(
		&mut self,
		name: &str,
		ty: RatFieldType,
	) -> Result<()> {
		let rows = self.rows.max(0) as usize;
		let data = match ty {
			RatFieldType::Integer => {
				RatData::Int(vec![NODATA_INT; rows])
			}
			RatFieldType::Real => {
				RatData::Real(vec![NODATA_REAL; rows])
			}
			RatFieldType::String => RatData::Text(vec![
					NODATA_TEXT.to_string();
					rows
				]),
		};
		self.columns.push(RatColumn {
			name: name.to_string(),
			data,
		});
		Ok(())
	}

	fn write_int(
		&mut self,
		col: usize,
		start: i64,
		values: &[i64],
	) -> Result<()> {
		let column = self.column_mut(col)?;
		match &mut column.data {
			RatData::Int(data) => {
				store_range(data, start, values);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&column.name,
				"integer"
			)),
		}
	}

	fn write_real(
		&mut self,
		col: usize,
		start: i64,
		values: &[f64],
	) -> Result<()> {
		let column = self.column_mut(col)?;
		match &mut column.data {
			RatData::Real(data) => {
				store_range(data, start, values);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&column.name,
				"real"
			)),
		}
	}

	fn write_text(
		&mut self,
		col: usize,
		start: i64,
		values: &[String],
	) -> Result<()> {
		let column = self.column_mut(col)?;
		match &mut column.data {
			RatData::Text(data) => {
				store_range(data, start, values);
				Ok(())
			}
			_ => err!(diagnostic::bridge::type_mismatch(
				&column.name,
				"text"
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_field_type_mapping_round_trip() {
		for ty in [
			RatFieldType::Integer,
			RatFieldType::Real,
			RatFieldType::String,
		] {
			assert_eq!(
				RatFieldType::from_column_type(
					ty.column_type()
				),
				ty
			);
		}
	}

	#[test]
	fn test_memory_rat_chunked_reads() {
		let mut rat = MemoryRat::new();
		rat.push_int_column("class", (0..10).collect());

		let mut buf = vec![0i64; 4];
		rat.read_int(0, 6, &mut buf).unwrap();
		assert_eq!(&buf[..4], &[6, 7, 8, 9]);

		assert!(rat.read_real(0, 0, &mut [0.0]).is_err());
		assert!(rat.read_int(5, 0, &mut buf).is_err());
	}

	#[test]
	fn test_memory_rat_sink_protocol() {
		let mut rat = MemoryRat::new();
		rat.set_row_count(5).unwrap();
		rat.create_column("score", RatFieldType::Real).unwrap();
		rat.write_real(0, 2, &[1.5, 2.5]).unwrap();

		let data = rat.real_data(0).unwrap();
		assert_eq!(data.len(), 5);
		assert_eq!(data[2], 1.5);
		assert_eq!(data[3], 2.5);
		assert_eq!(data[0], rattab_type::NODATA_REAL);
	}
}
