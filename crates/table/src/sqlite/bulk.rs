// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use rattab_type::{
	ColumnType, ColumnValue, NODATA_INT, NODATA_REAL, NODATA_TEXT, Result,
	diagnostic, err, error,
};
use rusqlite::{
	Rows, Statement, params_from_iter,
	types::{ToSql, ToSqlOutput},
};
use tracing::warn;

use super::{SqliteTable, value_to_int, value_to_real, value_to_text};
use crate::table::AttributeTable;

/// Adapter binding a [`ColumnValue`] as a statement parameter.
pub(crate) struct Bind<'a>(pub &'a ColumnValue);

impl ToSql for Bind<'_> {
	fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
		match self.0 {
			ColumnValue::Int(v) => Ok((*v).into()),
			ColumnValue::Real(v) => Ok((*v).into()),
			ColumnValue::Text(s) => {
				Ok(ToSqlOutput::from(s.as_str()))
			}
		}
	}
}

/// How a [`BulkSet`] writes its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkSetMode {
	/// `INSERT OR REPLACE`: rows carry their key among the columns.
	Insert,
	/// `UPDATE ... WHERE <pk> = ?`: rows are addressed explicitly.
	Update,
}

impl SqliteTable {
	/// Compiles one SELECT over `columns` for repeated streaming
	/// reads.
	///
	/// An empty `where_clause` selects every row in key order and
	/// [`BulkGet::query`] takes no parameters; otherwise the clause
	/// is appended verbatim and each `?` placeholder in it becomes a
	/// query parameter.
	pub fn prepare_bulk_get(
		&self,
		columns: &[&str],
		where_clause: &str,
	) -> Result<BulkGet<'_>> {
		let types = self.bulk_column_types(columns)?;
		let cols = quoted_list(columns);

		let where_clause = where_clause.trim();
		let sql = if where_clause.is_empty() {
			format!(
				"SELECT {} FROM \"{}\" ORDER BY \"{}\" ASC;",
				cols, self.table, self.pk
			)
		} else {
			format!(
				"SELECT {} FROM \"{}\" {};",
				cols, self.table, where_clause
			)
		};
		let params = where_clause.matches('?').count();

		let stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;
		Ok(BulkGet {
			stmt,
			sql,
			types,
			params,
		})
	}

	/// Compiles one write statement over `columns` for repeated row
	/// writes. Run inside a caller managed transaction; the table
	/// does not wrap bulk writes itself.
	pub fn prepare_bulk_set(
		&self,
		columns: &[&str],
		mode: BulkSetMode,
	) -> Result<BulkSet<'_>> {
		self.bulk_column_types(columns)?;

		let sql = match mode {
			BulkSetMode::Insert => {
				let placeholders = (1..=columns.len())
					.map(|i| format!("?{}", i))
					.collect::<Vec<_>>()
					.join(", ");
				format!(
					"INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({});",
					self.table,
					quoted_list(columns),
					placeholders
				)
			}
			BulkSetMode::Update => {
				let assignments = columns
					.iter()
					.enumerate()
					.map(|(i, c)| {
						format!("\"{}\" = ?{}", c, i + 1)
					})
					.collect::<Vec<_>>()
					.join(", ");
				format!(
					"UPDATE \"{}\" SET {} WHERE \"{}\" = ?{};",
					self.table,
					assignments,
					self.pk,
					columns.len() + 1
				)
			}
		};

		let stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;
		Ok(BulkSet {
			stmt,
			sql,
			mode,
			value_params: columns.len(),
		})
	}

	/// Like [`SqliteTable::prepare_bulk_set`], but each column is
	/// written through an SQL expression template instead of a bare
	/// placeholder, e.g. `"? * ?"` or `"\"area\" + ?"`. The `?`
	/// placeholders of all templates are numbered sequentially and
	/// bound in that order by [`BulkSet::set_row`].
	///
	/// # Panics
	///
	/// Panics when a template's placeholder count disagrees with its
	/// declared parameter types; that is a programming error, not an
	/// operational one.
	pub fn prepare_auto_bulk_set(
		&self,
		columns: &[&str],
		expressions: &[&str],
		expression_types: &[&[ColumnType]],
		mode: BulkSetMode,
	) -> Result<BulkSet<'_>> {
		assert_eq!(columns.len(), expressions.len());
		assert_eq!(columns.len(), expression_types.len());
		self.bulk_column_types(columns)?;

		let mut next = 1usize;
		let mut numbered = Vec::with_capacity(expressions.len());
		for (i, raw) in expressions.iter().enumerate() {
			let count = raw.matches('?').count();
			if count != expression_types[i].len() {
				panic!(
					"expression '{}' for column '{}' has {} placeholders but {} parameter types",
					raw,
					columns[i],
					count,
					expression_types[i].len()
				);
			}
			let parts: Vec<&str> = raw.split('?').collect();
			let mut expr = String::new();
			for (j, part) in parts.iter().enumerate() {
				expr.push_str(part);
				if j + 1 < parts.len() {
					expr.push_str(&format!(
						"?{}",
						next
					));
					next += 1;
				}
			}
			numbered.push(expr);
		}
		let total = next - 1;

		let sql = match mode {
			BulkSetMode::Insert => format!(
				"INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({});",
				self.table,
				quoted_list(columns),
				numbered.join(", ")
			),
			BulkSetMode::Update => {
				let assignments = columns
					.iter()
					.zip(numbered.iter())
					.map(|(c, e)| {
						format!("\"{}\" = {}", c, e)
					})
					.collect::<Vec<_>>()
					.join(", ");
				format!(
					"UPDATE \"{}\" SET {} WHERE \"{}\" = ?{};",
					self.table,
					assignments,
					self.pk,
					total + 1
				)
			}
		};

		let stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;
		Ok(BulkSet {
			stmt,
			sql,
			mode,
			value_params: total,
		})
	}

	/// A cursor over one column backed by a single compiled point
	/// select.
	pub fn column_reader(
		&self,
		column: &str,
	) -> Result<ColumnReader<'_>> {
		let Some(col) = self.column_index(column) else {
			err!(diagnostic::sqlite::statement_failed(
				column,
				"no such column"
			));
		};
		let sql = self.column_sql[col].select.clone();
		let stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;
		Ok(ColumnReader {
			stmt,
			ty: self.types[col],
		})
	}

	fn bulk_column_types(
		&self,
		columns: &[&str],
	) -> Result<Vec<ColumnType>> {
		let mut types = Vec::with_capacity(columns.len());
		for column in columns {
			let Some(idx) = self.column_index(column) else {
				err!(diagnostic::sqlite::statement_failed(
					column,
					"no such column"
				));
			};
			types.push(self.types[idx]);
		}
		Ok(types)
	}
}

/// A compiled streaming SELECT. Rebinding is just another call to
/// [`BulkGet::query`].
pub struct BulkGet<'conn> {
	stmt: Statement<'conn>,
	sql: String,
	types: Vec<ColumnType>,
	params: usize,
}

impl<'conn> BulkGet<'conn> {
	/// Number of `?` placeholders in the where clause.
	pub fn param_count(&self) -> usize {
		self.params
	}

	pub fn column_count(&self) -> usize {
		self.types.len()
	}

	/// Binds `params` and starts (or restarts) the scan.
	pub fn query(
		&mut self,
		params: &[ColumnValue],
	) -> Result<BulkRows<'_>> {
		let types = self.types.clone();
		let rows = self
			.stmt
			.query(params_from_iter(params.iter().map(Bind)))
			.map_err(|e| {
				error!(diagnostic::sqlite::statement_failed(
					&self.sql,
					e
				))
			})?;
		Ok(BulkRows {
			rows,
			types,
		})
	}
}

/// The live cursor of a [`BulkGet`] scan.
pub struct BulkRows<'stmt> {
	rows: Rows<'stmt>,
	types: Vec<ColumnType>,
}

impl BulkRows<'_> {
	/// Copies the current row into `out` and advances. Returns
	/// `false` when the scan is exhausted (or failed).
	pub fn fetch(&mut self, out: &mut [ColumnValue]) -> bool {
		let row = match self.rows.next() {
			Ok(Some(row)) => row,
			Ok(None) => return false,
			Err(e) => {
				warn!(error = %e, "bulk get step failed");
				return false;
			}
		};
		for (i, ty) in self.types.iter().enumerate() {
			if i >= out.len() {
				break;
			}
			let value = row
				.get::<_, rusqlite::types::Value>(i)
				.unwrap_or(rusqlite::types::Value::Null);
			out[i] = match ty {
				ColumnType::Int => {
					ColumnValue::Int(value_to_int(value))
				}
				ColumnType::Real => {
					ColumnValue::Real(value_to_real(value))
				}
				ColumnType::Text => {
					ColumnValue::Text(value_to_text(value))
				}
			};
		}
		true
	}
}

/// A compiled repeated row write.
pub struct BulkSet<'conn> {
	stmt: Statement<'conn>,
	sql: String,
	mode: BulkSetMode,
	value_params: usize,
}

impl BulkSet<'_> {
	pub fn param_count(&self) -> usize {
		self.value_params
	}

	/// Binds one row worth of values and steps the statement. In
	/// update mode `row` addresses the target row; insert mode
	/// ignores it.
	pub fn set_row(
		&mut self,
		values: &[ColumnValue],
		row: Option<i64>,
	) -> bool {
		if values.len() != self.value_params {
			warn!(
				expected = self.value_params,
				got = values.len(),
				"bulk set row has the wrong number of values"
			);
			return false;
		}
		for (i, value) in values.iter().enumerate() {
			if let Err(e) = self
				.stmt
				.raw_bind_parameter(i + 1, Bind(value))
			{
				warn!(error = %e, "bulk set bind failed");
				return false;
			}
		}
		if !self.bind_row_address(row) {
			return false;
		}
		self.step()
	}

	/// Binds one row directly from typed column buffers, avoiding a
	/// per-row value allocation. `layout[i]` names the type bucket
	/// and the slot within it feeding parameter `i + 1`; `chunk_row`
	/// indexes into the buffers.
	pub fn set_row_from_columns(
		&mut self,
		int_cols: &[&[i64]],
		real_cols: &[&[f64]],
		text_cols: &[&[String]],
		layout: &[(ColumnType, usize)],
		chunk_row: usize,
		row: Option<i64>,
	) -> bool {
		if layout.len() != self.value_params {
			warn!(
				expected = self.value_params,
				got = layout.len(),
				"bulk set layout has the wrong number of columns"
			);
			return false;
		}
		for (i, (ty, pos)) in layout.iter().enumerate() {
			let result = match ty {
				ColumnType::Int => {
					self.stmt.raw_bind_parameter(
						i + 1,
						int_cols[*pos][chunk_row],
					)
				}
				ColumnType::Real => {
					self.stmt.raw_bind_parameter(
						i + 1,
						real_cols[*pos][chunk_row],
					)
				}
				ColumnType::Text => {
					self.stmt.raw_bind_parameter(
						i + 1,
						text_cols[*pos][chunk_row]
							.as_str(),
					)
				}
			};
			if let Err(e) = result {
				warn!(error = %e, "bulk set bind failed");
				return false;
			}
		}
		if !self.bind_row_address(row) {
			return false;
		}
		self.step()
	}

	fn bind_row_address(&mut self, row: Option<i64>) -> bool {
		if self.mode != BulkSetMode::Update {
			return true;
		}
		let Some(row) = row else {
			warn!("update mode requires a row address");
			return false;
		};
		if let Err(e) = self
			.stmt
			.raw_bind_parameter(self.value_params + 1, row)
		{
			warn!(error = %e, "bulk set bind failed");
			return false;
		}
		true
	}

	fn step(&mut self) -> bool {
		match self.stmt.raw_execute() {
			Ok(_) => true,
			Err(e) => {
				warn!(error = %e, sql = %self.sql, "bulk set step failed");
				false
			}
		}
	}
}

/// Point-select cursor over a single column; see
/// [`SqliteTable::column_reader`].
pub struct ColumnReader<'conn> {
	stmt: Statement<'conn>,
	ty: ColumnType,
}

impl ColumnReader<'_> {
	pub fn column_type(&self) -> ColumnType {
		self.ty
	}

	fn fetch(&mut self, row: i64) -> Option<rusqlite::types::Value> {
		match self.stmt.query_row([row], |r| {
			r.get::<_, rusqlite::types::Value>(0)
		}) {
			Ok(value) => Some(value),
			Err(rusqlite::Error::QueryReturnedNoRows) => None,
			Err(e) => {
				warn!(error = %e, "column read failed");
				None
			}
		}
	}

	pub fn int_at(&mut self, row: i64) -> i64 {
		self.fetch(row).map(value_to_int).unwrap_or(NODATA_INT)
	}

	pub fn real_at(&mut self, row: i64) -> f64 {
		self.fetch(row).map(value_to_real).unwrap_or(NODATA_REAL)
	}

	pub fn text_at(&mut self, row: i64) -> String {
		self.fetch(row)
			.map(value_to_text)
			.unwrap_or_else(|| NODATA_TEXT.to_string())
	}
}

fn quoted_list(columns: &[&str]) -> String {
	columns.iter()
		.map(|c| format!("\"{}\"", c))
		.collect::<Vec<_>>()
		.join(", ")
}
