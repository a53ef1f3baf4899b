// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::any::Any;

use rattab_type::{
	ColumnType, ColumnValue, NODATA_INT, NODATA_REAL, NODATA_TEXT,
	parse_int, parse_real,
};
use tracing::warn;

use crate::table::{AttributeTable, TableType};

/// In-memory attribute table.
///
/// Columns live in three type-segregated buckets. `positions[i]` maps
/// the global column index `i` onto the slot inside the bucket that
/// `types[i]` selects, so cell access is two indexed loads. Removing a
/// column splices one bucket and renumbers the positions of same-typed
/// columns to its right.
pub struct RamTable {
	names: Vec<String>,
	types: Vec<ColumnType>,
	positions: Vec<usize>,
	int_cols: Vec<Vec<i64>>,
	real_cols: Vec<Vec<f64>>,
	text_cols: Vec<Vec<String>>,
	rows: i64,
	band: i32,
	image_file: String,
}

impl RamTable {
	pub fn new() -> Self {
		Self {
			names: Vec::new(),
			types: Vec::new(),
			positions: Vec::new(),
			int_cols: Vec::new(),
			real_cols: Vec::new(),
			text_cols: Vec::new(),
			rows: 0,
			band: 1,
			image_file: String::new(),
		}
	}

	fn valid(&self, col: usize, row: i64) -> bool {
		col < self.names.len() && row >= 0 && row < self.rows
	}

	/// The raw data of an integer column, or `None` when `idx` is out
	/// of range or names a column of another type.
	pub fn int_column(&self, idx: usize) -> Option<&[i64]> {
		match self.types.get(idx)? {
			ColumnType::Int => Some(
				self.int_cols[self.positions[idx]].as_slice(),
			),
			_ => None,
		}
	}

	pub fn real_column(&self, idx: usize) -> Option<&[f64]> {
		match self.types.get(idx)? {
			ColumnType::Real => Some(
				self.real_cols[self.positions[idx]].as_slice(),
			),
			_ => None,
		}
	}

	pub fn text_column(&self, idx: usize) -> Option<&[String]> {
		match self.types.get(idx)? {
			ColumnType::Text => Some(
				self.text_cols[self.positions[idx]].as_slice(),
			),
			_ => None,
		}
	}

	pub fn int_column_mut(&mut self, idx: usize) -> Option<&mut [i64]> {
		match self.types.get(idx)? {
			ColumnType::Int => Some(
				self.int_cols[self.positions[idx]]
					.as_mut_slice(),
			),
			_ => None,
		}
	}

	pub fn real_column_mut(&mut self, idx: usize) -> Option<&mut [f64]> {
		match self.types.get(idx)? {
			ColumnType::Real => Some(
				self.real_cols[self.positions[idx]]
					.as_mut_slice(),
			),
			_ => None,
		}
	}

	pub fn text_column_mut(
		&mut self,
		idx: usize,
	) -> Option<&mut [String]> {
		match self.types.get(idx)? {
			ColumnType::Text => Some(
				self.text_cols[self.positions[idx]]
					.as_mut_slice(),
			),
			_ => None,
		}
	}
}

impl Default for RamTable {
	fn default() -> Self {
		Self::new()
	}
}

impl AttributeTable for RamTable {
	fn table_type(&self) -> TableType {
		TableType::Ram
	}

	fn num_cols(&self) -> usize {
		self.names.len()
	}

	fn num_rows(&self) -> i64 {
		self.rows
	}

	fn column_index(&self, name: &str) -> Option<usize> {
		self.names.iter().position(|n| n == name)
	}

	fn column_name(&self, idx: usize) -> Option<String> {
		self.names.get(idx).cloned()
	}

	fn column_type(&self, idx: usize) -> Option<ColumnType> {
		self.types.get(idx).copied()
	}

	fn add_column(&mut self, name: &str, ty: ColumnType) -> bool {
		if name.is_empty() || self.column_index(name).is_some() {
			warn!(column = name, "rejecting duplicate or empty column name");
			return false;
		}

		let rows = self.rows as usize;
		let pos = match ty {
			ColumnType::Int => {
				self.int_cols.push(vec![NODATA_INT; rows]);
				self.int_cols.len() - 1
			}
			ColumnType::Real => {
				self.real_cols.push(vec![NODATA_REAL; rows]);
				self.real_cols.len() - 1
			}
			ColumnType::Text => {
				self.text_cols.push(vec![
						NODATA_TEXT.to_string();
						rows
					]);
				self.text_cols.len() - 1
			}
		};

		self.names.push(name.to_string());
		self.types.push(ty);
		self.positions.push(pos);
		true
	}

	fn add_row(&mut self) -> bool {
		self.add_rows(1)
	}

	fn add_rows(&mut self, rows: i64) -> bool {
		if self.names.is_empty() || rows < 1 {
			return false;
		}
		let n = rows as usize;
		for col in &mut self.int_cols {
			col.extend(std::iter::repeat_n(NODATA_INT, n));
		}
		for col in &mut self.real_cols {
			col.extend(std::iter::repeat_n(NODATA_REAL, n));
		}
		for col in &mut self.text_cols {
			col.extend(std::iter::repeat_with(|| {
				NODATA_TEXT.to_string()
			})
			.take(n));
		}
		self.rows += rows;
		true
	}

	fn remove_column_at(&mut self, idx: usize) -> bool {
		if idx >= self.names.len() {
			return false;
		}

		let ty = self.types[idx];
		let pos = self.positions[idx];
		match ty {
			ColumnType::Int => {
				self.int_cols.remove(pos);
			}
			ColumnType::Real => {
				self.real_cols.remove(pos);
			}
			ColumnType::Text => {
				self.text_cols.remove(pos);
			}
		}

		self.names.remove(idx);
		self.types.remove(idx);
		self.positions.remove(idx);

		// columns of the same type to the right moved down one slot
		for i in 0..self.names.len() {
			if self.types[i] == ty && self.positions[i] > pos {
				self.positions[i] -= 1;
			}
		}
		true
	}

	fn set_column_name(&mut self, idx: usize, name: &str) {
		if idx < self.names.len() && !name.is_empty() {
			self.names[idx] = name.to_string();
		}
	}

	fn int_value(&self, col: usize, row: i64) -> i64 {
		if !self.valid(col, row) {
			return NODATA_INT;
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => self.int_cols[pos][row],
			ColumnType::Real => self.real_cols[pos][row] as i64,
			ColumnType::Text => parse_int(&self.text_cols[pos][row]),
		}
	}

	fn real_value(&self, col: usize, row: i64) -> f64 {
		if !self.valid(col, row) {
			return NODATA_REAL;
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => self.int_cols[pos][row] as f64,
			ColumnType::Real => self.real_cols[pos][row],
			ColumnType::Text => {
				parse_real(&self.text_cols[pos][row])
			}
		}
	}

	fn text_value(&self, col: usize, row: i64) -> String {
		if !self.valid(col, row) {
			return NODATA_TEXT.to_string();
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => self.int_cols[pos][row].to_string(),
			ColumnType::Real => {
				self.real_cols[pos][row].to_string()
			}
			ColumnType::Text => self.text_cols[pos][row].clone(),
		}
	}

	fn set_int(&mut self, col: usize, row: i64, value: i64) {
		if !self.valid(col, row) {
			return;
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => self.int_cols[pos][row] = value,
			ColumnType::Real => {
				self.real_cols[pos][row] = value as f64
			}
			ColumnType::Text => {
				self.text_cols[pos][row] = value.to_string()
			}
		}
	}

	fn set_real(&mut self, col: usize, row: i64, value: f64) {
		if !self.valid(col, row) {
			return;
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => {
				self.int_cols[pos][row] = value as i64
			}
			ColumnType::Real => self.real_cols[pos][row] = value,
			ColumnType::Text => {
				self.text_cols[pos][row] = value.to_string()
			}
		}
	}

	fn set_text(&mut self, col: usize, row: i64, value: &str) {
		if !self.valid(col, row) {
			return;
		}
		let (pos, row) = (self.positions[col], row as usize);
		match self.types[col] {
			ColumnType::Int => {
				self.int_cols[pos][row] = parse_int(value)
			}
			ColumnType::Real => {
				self.real_cols[pos][row] = parse_real(value)
			}
			ColumnType::Text => {
				self.text_cols[pos][row] = value.to_string()
			}
		}
	}

	fn row_index_of(&self, column: &str, value: &ColumnValue) -> i64 {
		let Some(col) = self.column_index(column) else {
			return NODATA_INT;
		};
		let pos = self.positions[col];
		let found = match self.types[col] {
			ColumnType::Int => {
				let needle = value.as_int();
				self.int_cols[pos]
					.iter()
					.position(|v| *v == needle)
			}
			ColumnType::Real => {
				let needle = value.as_real();
				self.real_cols[pos]
					.iter()
					.position(|v| *v == needle)
			}
			ColumnType::Text => {
				let needle = value.as_text();
				self.text_cols[pos]
					.iter()
					.position(|v| *v == needle)
			}
		};
		found.map(|i| i as i64).unwrap_or(NODATA_INT)
	}

	fn band(&self) -> i32 {
		self.band
	}

	fn set_band(&mut self, band: i32) {
		self.band = band.max(1);
	}

	fn image_file_name(&self) -> String {
		self.image_file.clone()
	}

	fn set_image_file_name(&mut self, name: &str) {
		self.image_file = name.to_string();
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}
