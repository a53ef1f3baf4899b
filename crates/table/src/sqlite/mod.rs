// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

mod bulk;
mod config;

use std::{
	any::Any,
	cell::RefCell,
	collections::BTreeMap,
	path::{Path, PathBuf},
};

pub use bulk::{BulkGet, BulkRows, BulkSet, BulkSetMode, ColumnReader};
pub use config::*;
use rattab_type::{
	ColumnType, ColumnValue, NODATA_INT, NODATA_REAL, NODATA_TEXT, Result,
	diagnostic, err, error, parse_int, parse_real,
};
use rusqlite::{Connection, ErrorCode, LoadExtensionGuard, params};
use tracing::{debug, instrument, warn};

use crate::table::{AttributeTable, TableType};

/// Outcome of [`SqliteTable::create_table`]: the table was freshly
/// created, or an existing table with the derived name was attached to
/// as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCreateStatus {
	Created,
	Read,
}

/// The three per-column statements, kept as SQL and compiled on demand
/// through the connection's prepared statement cache.
struct ColumnSql {
	update: String,
	select: String,
	lookup: String,
}

/// SQLite backed attribute table.
///
/// One instance owns one connection and is bound to one table inside
/// the database file. Rows are addressed by the value of the primary
/// key column discovered by [`SqliteTable::populate_table_admin`];
/// tables created by this type use a zero-based `rowidx` key, so the
/// row address equals the row index.
pub struct SqliteTable {
	conn: Connection,
	db_path: PathBuf,
	table: String,
	id_column: String,
	pk: String,
	names: Vec<String>,
	types: Vec<ColumnType>,
	column_sql: Vec<ColumnSql>,
	rows: i64,
	band: i32,
	image_file: String,
	read_only: bool,
	last_message: RefCell<String>,
}

impl SqliteTable {
	/// Opens (or creates) the database file named by the
	/// configuration. The connection carries no table binding yet;
	/// follow up with [`SqliteTable::create_table`] or
	/// [`SqliteTable::set_table_name`].
	#[instrument(name = "sqlite_open", skip_all, fields(path = %config.path.display()))]
	pub fn open(config: SqliteConfig) -> Result<Self> {
		let db_path = Self::resolve_db_path(&config.path);

		let conn = Connection::open_with_flags(
			&db_path,
			Self::convert_flags(&config.flags),
		)
		.map_err(|e| {
			error!(diagnostic::sqlite::open_failed(&db_path, e))
		})?;

		Self::apply_pragmas(&conn, &config);

		if let Some(ext) = &config.spatial_extension {
			if let Err(e) = Self::load_spatial_extension(&conn, ext)
			{
				warn!(
					library = %ext.library.display(),
					error = %e,
					"failed to load spatial extension"
				);
			}
		}

		debug!(path = %db_path.display(), "database opened");

		Ok(Self {
			conn,
			db_path,
			table: String::new(),
			id_column: config.id_column,
			pk: String::new(),
			names: Vec::new(),
			types: Vec::new(),
			column_sql: Vec::new(),
			rows: 0,
			band: 1,
			image_file: String::new(),
			read_only: config.flags.read_only,
			last_message: RefCell::new(String::new()),
		})
	}

	fn convert_flags(flags: &OpenFlags) -> rusqlite::OpenFlags {
		let mut rusqlite_flags = rusqlite::OpenFlags::empty();

		if flags.read_only {
			rusqlite_flags |=
				rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY;
		} else {
			if flags.read_write {
				rusqlite_flags |= rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE;
			}

			if flags.create {
				rusqlite_flags |=
					rusqlite::OpenFlags::SQLITE_OPEN_CREATE;
			}
		}

		if flags.full_mutex {
			rusqlite_flags |=
				rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX;
		}

		if flags.no_mutex {
			rusqlite_flags |=
				rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX;
		}

		if flags.shared_cache {
			rusqlite_flags |=
				rusqlite::OpenFlags::SQLITE_OPEN_SHARED_CACHE;
		}

		if flags.private_cache {
			rusqlite_flags |=
				rusqlite::OpenFlags::SQLITE_OPEN_PRIVATE_CACHE;
		}

		if flags.uri {
			rusqlite_flags |= rusqlite::OpenFlags::SQLITE_OPEN_URI;
		}

		rusqlite_flags
	}

	fn resolve_db_path(config_path: &Path) -> PathBuf {
		if config_path.extension().is_none() {
			std::fs::create_dir_all(config_path).ok();
			config_path.join("rattab.ldb")
		} else {
			if let Some(parent) = config_path.parent() {
				std::fs::create_dir_all(parent).ok();
			}
			config_path.to_path_buf()
		}
	}

	fn apply_pragmas(conn: &Connection, config: &SqliteConfig) {
		// pragma failures leave the connection usable, e.g. a
		// journal mode switch on a read-only database
		for (pragma, value) in [
			("cache_size", config.cache_size.to_string()),
			(
				"journal_mode",
				config.journal_mode.as_str().to_string(),
			),
			(
				"synchronous",
				config.synchronous_mode.as_str().to_string(),
			),
			("temp_store", config.temp_store.as_str().to_string()),
		] {
			if let Err(e) =
				conn.pragma_update(None, pragma, &value)
			{
				warn!(pragma, value, error = %e, "pragma rejected");
			}
		}
	}

	fn load_spatial_extension(
		conn: &Connection,
		ext: &SpatialExtension,
	) -> rusqlite::Result<()> {
		unsafe {
			let _guard = LoadExtensionGuard::new(conn)?;
			conn.load_extension(
				&ext.library,
				ext.entry_point.as_deref(),
			)
		}
	}

	/// Records an operational failure and, on a busy or locked
	/// database, rolls back any open transaction so the connection
	/// does not wedge.
	fn fail(&self, e: rusqlite::Error, context: &str) {
		*self.last_message.borrow_mut() = e.to_string();
		warn!(context, error = %e, table = %self.table, "sqlite operation failed");
		if matches!(
			e.sqlite_error_code(),
			Some(ErrorCode::DatabaseBusy)
				| Some(ErrorCode::DatabaseLocked)
		) {
			let _ = self.conn.execute_batch("ROLLBACK;");
		}
	}

	/// Binds this instance to the attribute table of `image_file`,
	/// creating it when absent.
	///
	/// The table name is the sanitized base name of the image file
	/// (non-alphanumeric characters become `_`, a leading digit gets
	/// an `nm_` prefix), optionally suffixed with `_<tag>`. A numeric
	/// tag doubles as the band number.
	pub fn create_table(
		&mut self,
		image_file: &str,
		tag: Option<&str>,
	) -> Result<TableCreateStatus> {
		let (name, band) = derive_table_name(image_file, tag);
		if let Some(band) = band {
			self.band = band;
		}
		self.image_file = image_file.to_string();

		let status = if self.find_table(&name) {
			TableCreateStatus::Read
		} else {
			if self.read_only {
				err!(diagnostic::sqlite::table_create_failed(
					&name,
					"database opened read-only"
				));
			}
			let sql = format!(
				"CREATE TABLE IF NOT EXISTS \"{}\" (\"{}\" INTEGER PRIMARY KEY);",
				name, self.id_column
			);
			self.conn.execute_batch(&sql).map_err(|e| {
				error!(diagnostic::sqlite::table_create_failed(&name, e))
			})?;
			TableCreateStatus::Created
		};

		self.table = name;
		self.populate_table_admin()?;

		debug!(table = %self.table, ?status, "table bound");
		Ok(status)
	}

	/// Rebuilds the column bookkeeping from the live schema:
	/// names, types, the primary key and the per-column statement
	/// SQL, plus the current row count.
	///
	/// The primary key preference order is: an explicitly declared
	/// key, then a column with a well-known row index name, then the
	/// first INTEGER column (indexed on the fly), then the implicit
	/// `rowid`.
	pub fn populate_table_admin(&mut self) -> Result<()> {
		let sql = format!("PRAGMA table_info(\"{}\");", self.table);
		let mut stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::introspection_failed(
				&self.table,
				e
			))
		})?;

		struct Info {
			name: String,
			ty: ColumnType,
			pk: i64,
		}

		let infos = stmt
			.query_map([], |row| {
				Ok(Info {
					name: row.get(1)?,
					ty: ColumnType::from_sql_decl(
						&row.get::<_, String>(2)?,
					),
					pk: row.get(5)?,
				})
			})
			.and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
			.map_err(|e| {
				error!(diagnostic::sqlite::introspection_failed(&self.table, e))
			})?;
		drop(stmt);

		if infos.is_empty() {
			err!(diagnostic::sqlite::introspection_failed(
				&self.table,
				"no such table"
			));
		}

		let pk = if let Some(info) = infos.iter().find(|i| i.pk > 0) {
			info.name.clone()
		} else if let Some(info) = infos.iter().find(|i| {
			i.name == self.id_column
				|| matches!(
					i.name.to_ascii_lowercase().as_str(),
					"rowidx" | "rowid" | "rowno" | "row"
				)
		}) {
			let name = info.name.clone();
			self.index_pk_candidate(&name);
			name
		} else if let Some(info) =
			infos.iter().find(|i| i.ty == ColumnType::Int)
		{
			let name = info.name.clone();
			self.index_pk_candidate(&name);
			name
		} else {
			"rowid".to_string()
		};

		self.names = infos.iter().map(|i| i.name.clone()).collect();
		self.types = infos.iter().map(|i| i.ty).collect();
		self.pk = pk;
		self.rebuild_column_sql();

		self.rows = self
			.conn
			.query_row(
				&format!(
					"SELECT count(*) FROM \"{}\";",
					self.table
				),
				[],
				|row| row.get(0),
			)
			.map_err(|e| {
				error!(diagnostic::sqlite::introspection_failed(&self.table, e))
			})?;

		Ok(())
	}

	fn index_pk_candidate(&self, column: &str) {
		if self.read_only {
			return;
		}
		let sql = format!(
			"CREATE INDEX IF NOT EXISTS \"{t}_{c}_idx\" ON \"{t}\" (\"{c}\");",
			t = self.table,
			c = column
		);
		if let Err(e) = self.conn.execute_batch(&sql) {
			self.fail(e, "index_pk_candidate");
		}
	}

	fn rebuild_column_sql(&mut self) {
		self.column_sql = self
			.names
			.iter()
			.map(|name| ColumnSql {
				update: format!(
					"UPDATE \"{t}\" SET \"{c}\" = ?1 WHERE \"{pk}\" = ?2;",
					t = self.table,
					c = name,
					pk = self.pk
				),
				select: format!(
					"SELECT \"{c}\" FROM \"{t}\" WHERE \"{pk}\" = ?1;",
					t = self.table,
					c = name,
					pk = self.pk
				),
				lookup: format!(
					"SELECT \"{pk}\" FROM \"{t}\" WHERE \"{c}\" = ?1;",
					t = self.table,
					c = name,
					pk = self.pk
				),
			})
			.collect();

		self.conn.set_prepared_statement_cache_capacity(
			3 * self.names.len() + 16,
		);
	}

	/// Rebinds this instance to another existing table in the same
	/// database.
	pub fn set_table_name(&mut self, name: &str) -> Result<()> {
		if !self.find_table(name) {
			err!(diagnostic::sqlite::introspection_failed(
				name,
				"no such table"
			));
		}
		self.table = name.to_string();
		self.populate_table_admin()
	}

	pub fn table_name(&self) -> &str {
		&self.table
	}

	pub fn pk_column(&self) -> &str {
		&self.pk
	}

	pub fn db_path(&self) -> &Path {
		&self.db_path
	}

	/// The message of the most recent operational failure.
	pub fn last_message(&self) -> String {
		self.last_message.borrow().clone()
	}

	/// Starts a transaction. Calling this with a transaction already
	/// open is harmless and reports success.
	pub fn begin_transaction(&self) -> bool {
		if !self.conn.is_autocommit() {
			warn!(table = %self.table, "transaction already open");
			return true;
		}
		match self.conn.execute_batch("BEGIN TRANSACTION;") {
			Ok(()) => true,
			Err(e) => {
				self.fail(e, "begin_transaction");
				false
			}
		}
	}

	/// Commits the open transaction; reports failure when none is
	/// open.
	pub fn end_transaction(&self) -> bool {
		if self.conn.is_autocommit() {
			warn!(table = %self.table, "no open transaction to commit");
			return false;
		}
		match self.conn.execute_batch("END TRANSACTION;") {
			Ok(()) => true,
			Err(e) => {
				self.fail(e, "end_transaction");
				false
			}
		}
	}

	/// Executes free-style SQL against the connection.
	pub fn sql_exec(&self, sql: &str) -> bool {
		match self.conn.execute_batch(sql) {
			Ok(()) => true,
			Err(e) => {
				self.fail(e, "sql_exec");
				false
			}
		}
	}

	pub fn find_table(&self, name: &str) -> bool {
		let count: i64 = match self.conn.query_row(
			"SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
			[name],
			|row| row.get(0),
		) {
			Ok(count) => count,
			Err(e) => {
				self.fail(e, "find_table");
				return false;
			}
		};
		count > 0
	}

	pub fn table_list(&self) -> Vec<String> {
		let mut stmt = match self.conn.prepare(
			"SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;",
		) {
			Ok(stmt) => stmt,
			Err(e) => {
				self.fail(e, "table_list");
				return Vec::new();
			}
		};
		match stmt
			.query_map([], |row| row.get(0))
			.and_then(|rows| rows.collect())
		{
			Ok(names) => names,
			Err(e) => {
				self.fail(e, "table_list");
				Vec::new()
			}
		}
	}

	/// Drops `name`, or the bound table when `name` is `None`.
	/// Dropping the bound table clears the binding.
	pub fn drop_table(&mut self, name: Option<&str>) -> bool {
		let target = name.unwrap_or(&self.table).to_string();
		if target.is_empty() {
			return false;
		}
		let sql = format!("DROP TABLE IF EXISTS \"{}\";", target);
		if let Err(e) = self.conn.execute_batch(&sql) {
			self.fail(e, "drop_table");
			return false;
		}
		if target == self.table {
			self.table.clear();
			self.pk.clear();
			self.names.clear();
			self.types.clear();
			self.column_sql.clear();
			self.rows = 0;
		}
		true
	}

	pub fn attach_database(&self, path: &Path, alias: &str) -> bool {
		let sql = format!(
			"ATTACH DATABASE '{}' AS \"{}\";",
			path.display(),
			alias
		);
		self.sql_exec(&sql)
	}

	pub fn detach_database(&self, alias: &str) -> bool {
		self.sql_exec(&format!("DETACH DATABASE \"{}\";", alias))
	}

	pub fn create_index(&self, columns: &[&str], unique: bool) -> bool {
		if columns.is_empty() || self.table.is_empty() {
			return false;
		}
		let cols = columns
			.iter()
			.map(|c| format!("\"{}\"", c))
			.collect::<Vec<_>>()
			.join(", ");
		let sql = format!(
			"CREATE {unique}INDEX IF NOT EXISTS \"{t}_{n}_idx\" ON \"{t}\" ({cols});",
			unique = if unique { "UNIQUE " } else { "" },
			t = self.table,
			n = columns.join("_"),
			cols = cols
		);
		self.sql_exec(&sql)
	}

	pub fn min_pk_value(&self) -> i64 {
		self.pk_extreme("min")
	}

	pub fn max_pk_value(&self) -> i64 {
		self.pk_extreme("max")
	}

	fn pk_extreme(&self, func: &str) -> i64 {
		let sql = format!(
			"SELECT {}(\"{}\") FROM \"{}\";",
			func, self.pk, self.table
		);
		match self.conn.query_row(&sql, [], |row| {
			row.get::<_, Option<i64>>(0)
		}) {
			Ok(Some(v)) => v,
			Ok(None) => NODATA_INT,
			Err(e) => {
				self.fail(e, "pk_extreme");
				NODATA_INT
			}
		}
	}

	/// Adds a column with an extra SQL constraint appended to the
	/// type, e.g. `UNIQUE` or `DEFAULT 0`.
	pub fn add_constrained_column(
		&mut self,
		name: &str,
		ty: ColumnType,
		constraint: &str,
	) -> bool {
		if name.is_empty()
			|| self.table.is_empty()
			|| self.column_index(name).is_some()
		{
			warn!(column = name, "rejecting duplicate or empty column name");
			return false;
		}
		if self.read_only {
			warn!(column = name, "database opened read-only");
			return false;
		}

		let mut sql = format!(
			"ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
			self.table,
			name,
			ty.sql_decl()
		);
		if !constraint.is_empty() {
			sql.push(' ');
			sql.push_str(constraint);
		}
		sql.push(';');

		if let Err(e) = self.conn.execute_batch(&sql) {
			self.fail(e, "add_constrained_column");
			return false;
		}

		self.names.push(name.to_string());
		self.types.push(ty);
		self.rebuild_column_sql();
		true
	}

	/// Fetches a set of numeric columns in one scan, keyed by the
	/// integer interpretation of the first column.
	pub fn greedy_numeric_fetch(
		&self,
		columns: &[&str],
	) -> Result<BTreeMap<i64, Vec<f64>>> {
		if columns.is_empty() {
			return Ok(BTreeMap::new());
		}
		let cols = columns
			.iter()
			.map(|c| format!("\"{}\"", c))
			.collect::<Vec<_>>()
			.join(", ");
		let sql = format!(
			"SELECT {} FROM \"{}\";",
			cols, self.table
		);

		let mut stmt = self.conn.prepare(&sql).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;
		let mut rows = stmt.query([]).map_err(|e| {
			error!(diagnostic::sqlite::statement_failed(&sql, e))
		})?;

		let mut out = BTreeMap::new();
		loop {
			let row = match rows.next() {
				Ok(Some(row)) => row,
				Ok(None) => break,
				Err(e) => err!(
					diagnostic::sqlite::statement_failed(
						&sql, e
					)
				),
			};
			let key = value_to_int(
				row.get::<_, rusqlite::types::Value>(0)
					.unwrap_or(rusqlite::types::Value::Null),
			);
			let mut values = Vec::with_capacity(columns.len() - 1);
			for i in 1..columns.len() {
				values.push(value_to_real(
					row.get::<_, rusqlite::types::Value>(i)
						.unwrap_or(rusqlite::types::Value::Null),
				));
			}
			out.insert(key, values);
		}
		Ok(out)
	}

	/// Closes the connection, optionally dropping the bound table
	/// first.
	pub fn close(mut self, drop_table: bool) -> Result<()> {
		if drop_table {
			self.drop_table(None);
		}
		self.conn.close().map_err(|(_, e)| {
			error!(diagnostic::sqlite::open_failed(&self.db_path, e))
		})
	}

	/// Closes the connection and removes the database file.
	pub fn delete_database(self) -> Result<()> {
		let path = self.db_path.clone();
		self.conn.close().map_err(|(_, e)| {
			error!(diagnostic::sqlite::delete_failed(&path, e))
		})?;
		std::fs::remove_file(&path).map_err(|e| {
			error!(diagnostic::sqlite::delete_failed(&path, e))
		})
	}

	/// Writes `value` into `column` for every row selected by a caller
	/// supplied where clause instead of a key lookup.
	pub fn set_value_where(
		&self,
		column: &str,
		where_clause: &str,
		value: &ColumnValue,
	) -> bool {
		if self.column_index(column).is_none() {
			warn!(column, table = %self.table, "no such column");
			return false;
		}
		if self.read_only {
			warn!(table = %self.table, "database opened read-only");
			return false;
		}
		let sql = format!(
			"UPDATE \"{}\" SET \"{}\" = ?1 {};",
			self.table,
			column,
			where_clause.trim()
		);
		match self.conn.execute(&sql, params![bulk::Bind(value)]) {
			Ok(_) => true,
			Err(e) => {
				self.fail(e, "set_value_where");
				false
			}
		}
	}

	pub fn int_value_where(&self, column: &str, where_clause: &str) -> i64 {
		self.fetch_where(column, where_clause)
			.map(value_to_int)
			.unwrap_or(NODATA_INT)
	}

	pub fn real_value_where(
		&self,
		column: &str,
		where_clause: &str,
	) -> f64 {
		self.fetch_where(column, where_clause)
			.map(value_to_real)
			.unwrap_or(NODATA_REAL)
	}

	pub fn text_value_where(
		&self,
		column: &str,
		where_clause: &str,
	) -> String {
		self.fetch_where(column, where_clause)
			.map(value_to_text)
			.unwrap_or_else(|| NODATA_TEXT.to_string())
	}

	/// First matching cell of `column` under the where clause.
	fn fetch_where(
		&self,
		column: &str,
		where_clause: &str,
	) -> Option<rusqlite::types::Value> {
		self.column_index(column)?;
		let sql = format!(
			"SELECT \"{}\" FROM \"{}\" {} LIMIT 1;",
			column,
			self.table,
			where_clause.trim()
		);
		let mut stmt = match self.conn.prepare(&sql) {
			Ok(stmt) => stmt,
			Err(e) => {
				self.fail(e, "fetch_where");
				return None;
			}
		};
		match stmt.query_row([], |r| {
			r.get::<_, rusqlite::types::Value>(0)
		}) {
			Ok(value) => Some(value),
			Err(rusqlite::Error::QueryReturnedNoRows) => None,
			Err(e) => {
				self.fail(e, "fetch_where");
				None
			}
		}
	}

	fn update_cell(&self, col: usize, row: i64, value: &ColumnValue) {
		let Some(sql) = self.column_sql.get(col) else {
			return;
		};
		if self.read_only {
			warn!(table = %self.table, "database opened read-only");
			return;
		}
		let mut stmt = match self.conn.prepare_cached(&sql.update) {
			Ok(stmt) => stmt,
			Err(e) => {
				self.fail(e, "update_cell");
				return;
			}
		};
		if let Err(e) = stmt.execute(params![bulk::Bind(value), row]) {
			self.fail(e, "update_cell");
		}
	}

	fn fetch_cell(
		&self,
		col: usize,
		row: i64,
	) -> Option<rusqlite::types::Value> {
		let sql = self.column_sql.get(col)?;
		let mut stmt = match self.conn.prepare_cached(&sql.select) {
			Ok(stmt) => stmt,
			Err(e) => {
				self.fail(e, "fetch_cell");
				return None;
			}
		};
		match stmt.query_row([row], |r| {
			r.get::<_, rusqlite::types::Value>(0)
		}) {
			Ok(value) => Some(value),
			Err(rusqlite::Error::QueryReturnedNoRows) => None,
			Err(e) => {
				self.fail(e, "fetch_cell");
				None
			}
		}
	}
}

impl AttributeTable for SqliteTable {
	fn table_type(&self) -> TableType {
		TableType::Sqlite
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
		self.add_constrained_column(name, ty, "")
	}

	fn add_row(&mut self) -> bool {
		self.add_rows(1)
	}

	fn add_rows(&mut self, rows: i64) -> bool {
		if rows < 1 || self.table.is_empty() {
			return false;
		}
		if self.read_only {
			warn!(table = %self.table, "database opened read-only");
			return false;
		}

		let own_tx = self.conn.is_autocommit() && rows > 1;
		if own_tx && !self.begin_transaction() {
			return false;
		}

		let sql = if self.pk == "rowid" {
			format!(
				"INSERT INTO \"{}\" DEFAULT VALUES;",
				self.table
			)
		} else {
			format!(
				"INSERT INTO \"{}\" (\"{}\") VALUES (?1);",
				self.table, self.pk
			)
		};

		for offset in 0..rows {
			let mut stmt = match self.conn.prepare_cached(&sql) {
				Ok(stmt) => stmt,
				Err(e) => {
					self.fail(e, "add_rows");
					if own_tx {
						let _ = self
							.conn
							.execute_batch("ROLLBACK;");
					}
					return false;
				}
			};
			let result = if self.pk == "rowid" {
				stmt.execute([])
			} else {
				stmt.execute(params![self.rows + offset])
			};
			if let Err(e) = result {
				// discard the rows inserted so far; a failed
				// add_rows must not commit a partial batch
				self.fail(e, "add_rows");
				if own_tx {
					let _ = self
						.conn
						.execute_batch("ROLLBACK;");
				}
				return false;
			}
		}

		if own_tx && !self.end_transaction() {
			return false;
		}
		self.rows += rows;
		true
	}

	fn remove_column_at(&mut self, idx: usize) -> bool {
		if idx >= self.names.len() {
			return false;
		}
		if self.names[idx] == self.pk {
			warn!(column = %self.names[idx], "cannot remove the primary key column");
			return false;
		}
		if self.read_only {
			warn!(table = %self.table, "database opened read-only");
			return false;
		}
		if !self.conn.is_autocommit() {
			warn!(table = %self.table, "cannot rebuild the table inside an open transaction");
			return false;
		}

		let keep: Vec<(String, ColumnType)> = self
			.names
			.iter()
			.zip(self.types.iter())
			.enumerate()
			.filter(|(i, _)| *i != idx)
			.map(|(_, (n, t))| (n.clone(), *t))
			.collect();

		let col_list = keep
			.iter()
			.map(|(n, _)| format!("\"{}\"", n))
			.collect::<Vec<_>>()
			.join(", ");
		let plain_decl = keep
			.iter()
			.map(|(n, t)| format!("\"{}\" {}", n, t.sql_decl()))
			.collect::<Vec<_>>()
			.join(", ");
		let table_decl = keep
			.iter()
			.map(|(n, t)| {
				if *n == self.pk {
					format!("\"{}\" INTEGER PRIMARY KEY", n)
				} else {
					format!("\"{}\" {}", n, t.sql_decl())
				}
			})
			.collect::<Vec<_>>()
			.join(", ");

		let sql = format!(
			"BEGIN TRANSACTION;\n\
			 CREATE TEMPORARY TABLE \"{t}_backup\" ({plain_decl});\n\
			 INSERT INTO \"{t}_backup\" SELECT {cols} FROM \"{t}\";\n\
			 DROP TABLE \"{t}\";\n\
			 CREATE TABLE \"{t}\" ({table_decl});\n\
			 INSERT INTO \"{t}\" SELECT {cols} FROM \"{t}_backup\";\n\
			 DROP TABLE \"{t}_backup\";\n\
			 END TRANSACTION;",
			t = self.table,
			plain_decl = plain_decl,
			table_decl = table_decl,
			cols = col_list
		);

		if let Err(e) = self.conn.execute_batch(&sql) {
			self.fail(e, "remove_column_at");
			let _ = self.conn.execute_batch("ROLLBACK;");
			return false;
		}

		self.populate_table_admin().is_ok()
	}

	fn set_column_name(&mut self, _idx: usize, _name: &str) {
		warn!(table = %self.table, "renaming columns is not supported on the sqlite backend");
	}

	fn int_value(&self, col: usize, row: i64) -> i64 {
		self.fetch_cell(col, row)
			.map(value_to_int)
			.unwrap_or(NODATA_INT)
	}

	fn real_value(&self, col: usize, row: i64) -> f64 {
		self.fetch_cell(col, row)
			.map(value_to_real)
			.unwrap_or(NODATA_REAL)
	}

	fn text_value(&self, col: usize, row: i64) -> String {
		self.fetch_cell(col, row)
			.map(value_to_text)
			.unwrap_or_else(|| NODATA_TEXT.to_string())
	}

	fn set_int(&mut self, col: usize, row: i64, value: i64) {
		self.update_cell(col, row, &ColumnValue::Int(value));
	}

	fn set_real(&mut self, col: usize, row: i64, value: f64) {
		self.update_cell(col, row, &ColumnValue::Real(value));
	}

	fn set_text(&mut self, col: usize, row: i64, value: &str) {
		self.update_cell(
			col,
			row,
			&ColumnValue::Text(value.to_string()),
		);
	}

	fn row_index_of(&self, column: &str, value: &ColumnValue) -> i64 {
		let Some(col) = self.column_index(column) else {
			return NODATA_INT;
		};
		let sql = &self.column_sql[col].lookup;
		let mut stmt = match self.conn.prepare_cached(sql) {
			Ok(stmt) => stmt,
			Err(e) => {
				self.fail(e, "row_index_of");
				return NODATA_INT;
			}
		};
		match stmt.query_row(params![bulk::Bind(value)], |r| {
			r.get::<_, i64>(0)
		}) {
			Ok(v) => v,
			Err(rusqlite::Error::QueryReturnedNoRows) => NODATA_INT,
			Err(e) => {
				self.fail(e, "row_index_of");
				NODATA_INT
			}
		}
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

fn sanitize(raw: &str) -> String {
	raw.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '_' {
				c
			} else {
				'_'
			}
		})
		.collect()
}

/// Derives the table name from the image file's base name plus an
/// optional tag. A numeric tag is also returned as the band number.
fn derive_table_name(
	image_file: &str,
	tag: Option<&str>,
) -> (String, Option<i32>) {
	let stem = Path::new(image_file)
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default();

	let mut name = sanitize(&stem);
	if name.is_empty() {
		name = "rat".to_string();
	}
	if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
		name.insert_str(0, "nm_");
	}

	let mut band = None;
	if let Some(tag) = tag {
		let clean = sanitize(tag);
		if !clean.is_empty() {
			band = clean.parse::<i32>().ok();
			name.push('_');
			name.push_str(&clean);
		}
	}

	(name, band)
}

fn value_to_int(value: rusqlite::types::Value) -> i64 {
	match value {
		rusqlite::types::Value::Integer(v) => v,
		rusqlite::types::Value::Real(v) => v as i64,
		rusqlite::types::Value::Text(s) => parse_int(&s),
		_ => NODATA_INT,
	}
}

fn value_to_real(value: rusqlite::types::Value) -> f64 {
	match value {
		rusqlite::types::Value::Integer(v) => v as f64,
		rusqlite::types::Value::Real(v) => v,
		rusqlite::types::Value::Text(s) => parse_real(&s),
		_ => NODATA_REAL,
	}
}

fn value_to_text(value: rusqlite::types::Value) -> String {
	match value {
		rusqlite::types::Value::Integer(v) => v.to_string(),
		rusqlite::types::Value::Real(v) => v.to_string(),
		rusqlite::types::Value::Text(s) => s,
		rusqlite::types::Value::Null => NODATA_TEXT.to_string(),
		rusqlite::types::Value::Blob(_) => NODATA_TEXT.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use rattab_testing::tempdir::temp_dir;

	use super::*;

	fn open_table(path: &Path) -> SqliteTable {
		let mut table = SqliteTable::open(SqliteConfig::new(
			path.join("test.ldb"),
		))
		.expect("open failed");
		table.create_table("/data/rasters/landcover.img", None)
			.expect("create failed");
		table
	}

	#[test]
	fn test_derive_table_name() {
		assert_eq!(
			derive_table_name("/data/landcover.img", None),
			("landcover".to_string(), None)
		);
		assert_eq!(
			derive_table_name("/data/2020-cover.img", None),
			("nm_2020_cover".to_string(), None)
		);
		assert_eq!(
			derive_table_name("/data/cover.img", Some("2")),
			("cover_2".to_string(), Some(2))
		);
		assert_eq!(
			derive_table_name("/data/cover.img", Some("hist")),
			("cover_hist".to_string(), None)
		);
	}

	#[test]
	fn test_resolve_db_path_with_directory() {
		temp_dir(|temp_path| {
			let dir_path = temp_path.join("mydb");
			let result = SqliteTable::resolve_db_path(&dir_path);
			assert_eq!(result, dir_path.join("rattab.ldb"));
			assert!(dir_path.is_dir());
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_resolve_db_path_with_file() {
		temp_dir(|temp_path| {
			let file_path = temp_path.join("custom.ldb");
			assert_eq!(
				SqliteTable::resolve_db_path(&file_path),
				file_path
			);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_create_then_read_status() {
		temp_dir(|path| {
			let db = path.join("test.ldb");
			let mut table = SqliteTable::open(SqliteConfig::new(
				&db,
			))
			.unwrap();
			assert_eq!(
				table.create_table("cover.img", None)
					.unwrap(),
				TableCreateStatus::Created
			);
			drop(table);

			let mut table = SqliteTable::open(SqliteConfig::new(
				&db,
			))
			.unwrap();
			assert_eq!(
				table.create_table("cover.img", None)
					.unwrap(),
				TableCreateStatus::Read
			);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_fresh_table_has_pk_column() {
		temp_dir(|path| {
			let table = open_table(path);
			assert_eq!(table.num_cols(), 1);
			assert_eq!(
				table.column_name(0).as_deref(),
				Some("rowidx")
			);
			assert_eq!(table.pk_column(), "rowidx");
			assert_eq!(table.num_rows(), 0);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_failed_add_rows_commits_nothing() {
		temp_dir(|path| {
			let db = path.join("test.ldb");
			let mut table =
				SqliteTable::open(SqliteConfig::new(&db))
					.unwrap();
			table.create_table("cover.img", None).unwrap();
			assert!(table.add_column("class", ColumnType::Int));
			assert!(table.add_rows(1));

			// occupy the key the second new row would claim
			assert!(table.sql_exec(
				"INSERT INTO \"cover\" (\"rowidx\") VALUES (2);"
			));

			assert!(!table.add_rows(2));
			assert_eq!(table.num_rows(), 1);

			// a fresh connection sees only row 0 and the
			// external row 2; the half inserted batch is gone
			let mut other =
				SqliteTable::open(SqliteConfig::new(&db))
					.unwrap();
			other.set_table_name("cover").unwrap();
			assert_eq!(other.num_rows(), 2);
			assert_eq!(other.int_value(0, 1), NODATA_INT);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_where_clause_point_access() {
		temp_dir(|path| {
			let mut table = open_table(path);
			assert!(table.add_column("class", ColumnType::Int));
			assert!(table.add_rows(5));
			for row in 0..5 {
				table.set_int(1, row, row * 2);
			}

			assert_eq!(
				table.int_value_where(
					"class",
					"WHERE \"rowidx\" = 3"
				),
				6
			);
			assert_eq!(
				table.int_value_where(
					"class",
					"WHERE \"rowidx\" = 99"
				),
				NODATA_INT
			);
			assert_eq!(
				table.text_value_where(
					"class",
					"WHERE \"class\" = 6"
				),
				"6"
			);

			assert!(table.set_value_where(
				"class",
				"WHERE \"rowidx\" >= 3",
				&ColumnValue::Int(-1)
			));
			assert_eq!(table.int_value(1, 2), 4);
			assert_eq!(table.int_value(1, 3), -1);
			assert_eq!(table.int_value(1, 4), -1);

			assert!(!table.set_value_where(
				"missing",
				"",
				&ColumnValue::Int(0)
			));
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_add_column_and_rows_round_trip() {
		temp_dir(|path| {
			let mut table = open_table(path);
			assert!(table.add_column("class", ColumnType::Int));
			assert!(table.add_column("area", ColumnType::Real));
			assert!(table.add_column("label", ColumnType::Text));
			assert!(!table.add_column("class", ColumnType::Int));

			assert!(table.add_rows(3));
			assert_eq!(table.num_rows(), 3);

			table.set_int(1, 0, 42);
			table.set_real(2, 1, 0.5);
			table.set_text(3, 2, "forest");

			assert_eq!(table.int_value(1, 0), 42);
			assert_eq!(table.real_value(2, 1), 0.5);
			assert_eq!(table.text_value(3, 2), "forest");
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_misses_degrade_to_nodata() {
		temp_dir(|path| {
			let mut table = open_table(path);
			table.add_column("class", ColumnType::Int);
			table.add_rows(2);

			assert_eq!(table.int_value(9, 0), NODATA_INT);
			assert_eq!(table.int_value(1, 99), NODATA_INT);
			assert_eq!(table.real_value(9, 0), NODATA_REAL);
			assert_eq!(table.text_value(1, 99), NODATA_TEXT);
			// unset cell is NULL
			assert_eq!(table.int_value(1, 0), NODATA_INT);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_row_index_of() {
		temp_dir(|path| {
			let mut table = open_table(path);
			table.add_column("class", ColumnType::Int);
			table.add_rows(3);
			table.set_int(1, 0, 10);
			table.set_int(1, 1, 20);
			table.set_int(1, 2, 30);

			assert_eq!(
				table.row_index_of(
					"class",
					&ColumnValue::Int(20)
				),
				1
			);
			assert_eq!(
				table.row_index_of(
					"class",
					&ColumnValue::Int(99)
				),
				NODATA_INT
			);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_transaction_idempotence() {
		temp_dir(|path| {
			let table = open_table(path);
			assert!(table.begin_transaction());
			// nested begin is tolerated
			assert!(table.begin_transaction());
			assert!(table.end_transaction());
			// commit without open transaction fails
			assert!(!table.end_transaction());
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_remove_column_preserves_others() {
		temp_dir(|path| {
			let mut table = open_table(path);
			table.add_column("Value", ColumnType::Real);
			table.add_column("Label", ColumnType::Text);
			table.add_rows(4);
			for row in 0..4 {
				table.set_real(1, row, row as f64 * 1.5);
				table.set_text(
					2,
					row,
					&format!("label{}", row),
				);
			}

			assert!(table.remove_column("Value"));
			assert_eq!(table.num_cols(), 2);
			assert_eq!(table.num_rows(), 4);
			assert_eq!(table.column_index("Label"), Some(1));
			for row in 0..4 {
				assert_eq!(
					table.text_value(1, row),
					format!("label{}", row)
				);
			}
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_remove_pk_column_rejected() {
		temp_dir(|path| {
			let mut table = open_table(path);
			assert!(!table.remove_column("rowidx"));
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_min_max_pk() {
		temp_dir(|path| {
			let mut table = open_table(path);
			table.add_column("class", ColumnType::Int);
			assert_eq!(table.min_pk_value(), NODATA_INT);
			table.add_rows(5);
			assert_eq!(table.min_pk_value(), 0);
			assert_eq!(table.max_pk_value(), 4);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_greedy_numeric_fetch() {
		temp_dir(|path| {
			let mut table = open_table(path);
			table.add_column("class", ColumnType::Int);
			table.add_column("area", ColumnType::Real);
			table.add_rows(3);
			for row in 0..3 {
				table.set_int(1, row, 100 + row);
				table.set_real(2, row, row as f64 + 0.25);
			}

			let map = table
				.greedy_numeric_fetch(&[
					"class", "area", "rowidx",
				])
				.unwrap();
			assert_eq!(map.len(), 3);
			assert_eq!(map[&101], vec![1.25, 1.0]);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_free_style_sql_helpers() {
		temp_dir(|path| {
			let mut table = open_table(path);
			assert!(table.find_table("landcover"));
			assert!(!table.find_table("missing"));
			assert!(table.sql_exec(
				"CREATE TABLE extra (id INTEGER PRIMARY KEY);"
			));
			assert!(table
				.table_list()
				.contains(&"extra".to_string()));
			assert!(table.drop_table(Some("extra")));
			assert!(!table.find_table("extra"));
			assert!(!table.sql_exec("NOT VALID SQL"));
			assert!(!table.last_message().is_empty());
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_attach_detach_database() {
		temp_dir(|path| {
			let table = open_table(path);
			let other = path.join("other.ldb");
			// touch a second database file
			let second = SqliteTable::open(SqliteConfig::new(
				&other,
			))
			.unwrap();
			drop(second);

			assert!(table.attach_database(&other, "aux_db"));
			assert!(table.detach_database("aux_db"));
			assert!(!table.detach_database("aux_db"));
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_populate_table_admin_foreign_table() {
		temp_dir(|path| {
			let mut table = open_table(path);
			assert!(table.sql_exec(
				"CREATE TABLE foreign_rat (cat INTEGER, score REAL, name TEXT);
				 INSERT INTO foreign_rat VALUES (7, 0.5, 'x');"
			));
			table.set_table_name("foreign_rat").unwrap();
			// first INTEGER column becomes the key
			assert_eq!(table.pk_column(), "cat");
			assert_eq!(table.num_rows(), 1);
			assert_eq!(
				table.column_type(1),
				Some(ColumnType::Real)
			);
			assert_eq!(table.int_value_by_name("cat", 7), 7);
			assert_eq!(table.text_value_by_name("name", 7), "x");
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_read_only_rejects_writes() {
		temp_dir(|path| {
			let db = path.join("ro.ldb");
			{
				let mut table = SqliteTable::open(
					SqliteConfig::new(&db),
				)
				.unwrap();
				table.create_table("cover.img", None)
					.unwrap();
				table.add_column("class", ColumnType::Int);
				table.add_rows(1);
			}

			let mut table = SqliteTable::open(
				SqliteConfig::read_only(&db),
			)
			.unwrap();
			table.set_table_name("cover").unwrap();
			assert!(!table.add_column("more", ColumnType::Int));
			assert!(!table.add_rows(1));
			table.set_int(1, 0, 5);
			assert_eq!(table.int_value(1, 0), NODATA_INT);
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_delete_database() {
		temp_dir(|path| {
			let db = path.join("gone.ldb");
			let mut table = SqliteTable::open(SqliteConfig::new(
				&db,
			))
			.unwrap();
			table.create_table("cover.img", None).unwrap();
			assert!(db.exists());
			table.delete_database().unwrap();
			assert!(!db.exists());
			Ok(())
		})
		.expect("test failed");
	}
}
