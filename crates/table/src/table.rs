// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	any::Any,
	cell::RefCell,
	io::{self, Write},
	rc::Rc,
};

use rattab_type::{ColumnType, ColumnValue, NODATA_INT, NODATA_REAL, NODATA_TEXT};
use serde::{Deserialize, Serialize};

/// Discriminates the backing store of an attribute table.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum TableType {
	Ram,
	Sqlite,
}

/// Shared-ownership handle for a table.
///
/// `Rc` is deliberate: a table instance belongs to one thread, and the
/// handle being `!Send + !Sync` turns accidental cross-thread sharing
/// into a compile error. Writers that need concurrent access open their
/// own instance against the same database file.
pub type SharedTable = Rc<RefCell<dyn AttributeTable>>;

/// A typed, dynamically extensible attribute table.
///
/// Both backends implement the same contract: columns carry one of the
/// three [`ColumnType`]s, rows are addressed by a zero-based index, and
/// ordinary misuse never fails hard. A read against a column or row
/// that does not exist returns the nodata sentinel of the requested
/// type, a write against one is silently dropped, and structural
/// operations report success with a `bool`.
pub trait AttributeTable: Any {
	fn table_type(&self) -> TableType;

	fn num_cols(&self) -> usize;
	fn num_rows(&self) -> i64;

	/// Case-sensitive exact lookup of a column position.
	fn column_index(&self, name: &str) -> Option<usize>;
	fn column_name(&self, idx: usize) -> Option<String>;
	fn column_type(&self, idx: usize) -> Option<ColumnType>;

	/// Appends a column. Rejects empty and duplicate names. Existing
	/// rows are backfilled with the nodata sentinel of `ty`.
	fn add_column(&mut self, name: &str, ty: ColumnType) -> bool;

	/// Appends one row initialized to nodata. Fails when the table
	/// has no columns.
	fn add_row(&mut self) -> bool;

	/// Appends `rows` rows initialized to nodata.
	fn add_rows(&mut self, rows: i64) -> bool;

	/// Removes the column at `idx`, closing the index gap.
	fn remove_column_at(&mut self, idx: usize) -> bool;

	fn remove_column(&mut self, name: &str) -> bool {
		match self.column_index(name) {
			Some(idx) => self.remove_column_at(idx),
			None => false,
		}
	}

	/// Renames a column. Only honored by the in-memory backend; the
	/// sqlite backend ignores the request and logs a warning.
	fn set_column_name(&mut self, idx: usize, name: &str);

	fn int_value(&self, col: usize, row: i64) -> i64;
	fn real_value(&self, col: usize, row: i64) -> f64;
	fn text_value(&self, col: usize, row: i64) -> String;

	fn set_int(&mut self, col: usize, row: i64, value: i64);
	fn set_real(&mut self, col: usize, row: i64, value: f64);
	fn set_text(&mut self, col: usize, row: i64, value: &str);

	fn int_value_by_name(&self, name: &str, row: i64) -> i64 {
		match self.column_index(name) {
			Some(col) => self.int_value(col, row),
			None => NODATA_INT,
		}
	}

	fn real_value_by_name(&self, name: &str, row: i64) -> f64 {
		match self.column_index(name) {
			Some(col) => self.real_value(col, row),
			None => NODATA_REAL,
		}
	}

	fn text_value_by_name(&self, name: &str, row: i64) -> String {
		match self.column_index(name) {
			Some(col) => self.text_value(col, row),
			None => NODATA_TEXT.to_string(),
		}
	}

	fn set_int_by_name(&mut self, name: &str, row: i64, value: i64) {
		if let Some(col) = self.column_index(name) {
			self.set_int(col, row, value);
		}
	}

	fn set_real_by_name(&mut self, name: &str, row: i64, value: f64) {
		if let Some(col) = self.column_index(name) {
			self.set_real(col, row, value);
		}
	}

	fn set_text_by_name(&mut self, name: &str, row: i64, value: &str) {
		if let Some(col) = self.column_index(name) {
			self.set_text(col, row, value);
		}
	}

	/// Reverse lookup: the index of the first row whose cell in
	/// `column` equals `value`, or [`NODATA_INT`] when absent.
	fn row_index_of(&self, column: &str, value: &ColumnValue) -> i64;

	// provenance metadata
	fn band(&self) -> i32;
	fn set_band(&mut self, band: i32);
	fn image_file_name(&self) -> String;
	fn set_image_file_name(&mut self, name: &str);

	/// Writes a human readable dump of up to `max_rows` rows.
	fn print(&self, w: &mut dyn Write, max_rows: i64) -> io::Result<()> {
		self.print_structure(w)?;
		let rows = self.num_rows().min(max_rows.max(0));
		let cols = self.num_cols();
		for row in 0..rows {
			let mut line = String::new();
			for col in 0..cols {
				if col > 0 {
					line.push('\t');
				}
				line.push_str(&self.text_value(col, row));
			}
			writeln!(w, "{}", line)?;
		}
		Ok(())
	}

	/// Writes the column layout and table metadata.
	fn print_structure(&self, w: &mut dyn Write) -> io::Result<()> {
		writeln!(
			w,
			"table '{}' (band {}): {} columns, {} rows",
			self.image_file_name(),
			self.band(),
			self.num_cols(),
			self.num_rows()
		)?;
		for col in 0..self.num_cols() {
			writeln!(
				w,
				"  {}: {}",
				self.column_name(col).unwrap_or_default(),
				self.column_type(col)
					.map(|t| t.sql_decl())
					.unwrap_or("?")
			)?;
		}
		Ok(())
	}

	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
}
