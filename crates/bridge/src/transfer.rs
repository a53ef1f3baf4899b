// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{
	cell::RefCell,
	cmp::min,
	path::{Path, PathBuf},
	rc::Rc,
};

use rattab_table::{
	AttributeTable, RamTable, SharedTable, SqliteConfig, SqliteTable,
	TableCreateStatus, TableType, sqlite::BulkSetMode,
};
use rattab_type::{ColumnType, ColumnValue, Result, diagnostic, err};
use tracing::debug;

use crate::rat::{RatFieldType, RatSink, RatSource};

/// Rows transferred per chunk between a RAT provider and a table.
pub const RAT_CHUNK_SIZE: usize = 5000;

/// Options for [`read_rat`].
#[derive(Debug, Clone)]
pub struct RatImportConfig {
	pub table_type: TableType,
	/// Database file for the sqlite backend. Defaults to the image
	/// file name with an `.ldb` extension.
	pub db_path: Option<PathBuf>,
	pub chunk_size: usize,
	/// When binding to a pre-existing table, verify that its columns
	/// match the source instead of silently attaching.
	pub strict_schema: bool,
}

impl RatImportConfig {
	pub fn new(table_type: TableType) -> Self {
		Self {
			table_type,
			db_path: None,
			chunk_size: RAT_CHUNK_SIZE,
			strict_schema: false,
		}
	}

	pub fn db_path(mut self, db_path: impl AsRef<Path>) -> Self {
		self.db_path = Some(db_path.as_ref().to_path_buf());
		self
	}

	pub fn chunk_size(mut self, chunk_size: usize) -> Self {
		self.chunk_size = chunk_size;
		self
	}

	pub fn strict_schema(mut self, strict_schema: bool) -> Self {
		self.strict_schema = strict_schema;
		self
	}
}

struct SourceColumn {
	name: String,
	ty: ColumnType,
}

fn source_schema(source: &dyn RatSource) -> Result<Vec<SourceColumn>> {
	let mut columns = Vec::with_capacity(source.column_count());
	for col in 0..source.column_count() {
		let name = source
			.column_name(col)
			.unwrap_or_else(|| format!("col_{}", col));
		let Some(ty) = source.column_type(col) else {
			err!(diagnostic::bridge::column_out_of_range(col));
		};
		columns.push(SourceColumn {
			name,
			ty: ty.column_type(),
		});
	}
	Ok(columns)
}

/// Imports a foreign raster attribute table into a fresh (or existing)
/// attribute table of the requested backend.
///
/// The table gets a synthetic zero-based row index column followed by
/// one column per source column; rows are streamed in chunks of
/// `config.chunk_size`, and on the sqlite backend every chunk is one
/// transaction.
pub fn read_rat(
	source: &dyn RatSource,
	band: i32,
	image_file: &str,
	config: &RatImportConfig,
) -> Result<SharedTable> {
	if config.chunk_size == 0 {
		err!(diagnostic::bridge::invalid_chunk_size(0));
	}
	match config.table_type {
		TableType::Ram => read_into_ram(
			source,
			band,
			image_file,
			config.chunk_size,
		),
		TableType::Sqlite => {
			read_into_sqlite(source, band, image_file, config)
		}
	}
}

fn read_into_ram(
	source: &dyn RatSource,
	band: i32,
	image_file: &str,
	chunk_size: usize,
) -> Result<SharedTable> {
	let schema = source_schema(source)?;

	let mut table = RamTable::new();
	table.set_band(band);
	table.set_image_file_name(image_file);

	if !table.add_column("rowidx", ColumnType::Int) {
		err!(diagnostic::bridge::column_create_failed("rowidx"));
	}
	for col in &schema {
		if !table.add_column(&col.name, col.ty) {
			err!(diagnostic::bridge::column_create_failed(
				&col.name
			));
		}
	}

	let rows = source.row_count().max(0);
	if rows > 0 {
		table.add_rows(rows);
	}

	if let Some(slice) = table.int_column_mut(0) {
		for (i, cell) in slice.iter_mut().enumerate() {
			*cell = i as i64;
		}
	}

	for (src, col) in schema.iter().enumerate() {
		let target = src + 1;
		match col.ty {
			ColumnType::Int => {
				let mut buf = vec![0i64; chunk_size];
				let mut start = 0i64;
				while start < rows {
					let n = min(
						chunk_size as i64,
						rows - start,
					) as usize;
					source.read_int(
						src,
						start,
						&mut buf[..n],
					)?;
					if let Some(slice) =
						table.int_column_mut(target)
					{
						let s = start as usize;
						slice[s..s + n]
							.copy_from_slice(
								&buf[..n],
							);
					}
					start += n as i64;
				}
			}
			ColumnType::Real => {
				let mut buf = vec![0f64; chunk_size];
				let mut start = 0i64;
				while start < rows {
					let n = min(
						chunk_size as i64,
						rows - start,
					) as usize;
					source.read_real(
						src,
						start,
						&mut buf[..n],
					)?;
					if let Some(slice) =
						table.real_column_mut(target)
					{
						let s = start as usize;
						slice[s..s + n]
							.copy_from_slice(
								&buf[..n],
							);
					}
					start += n as i64;
				}
			}
			ColumnType::Text => {
				let mut buf =
					vec![String::new(); chunk_size];
				let mut start = 0i64;
				while start < rows {
					let n = min(
						chunk_size as i64,
						rows - start,
					) as usize;
					source.read_text(
						src,
						start,
						&mut buf[..n],
					)?;
					if let Some(slice) =
						table.text_column_mut(target)
					{
						let s = start as usize;
						slice[s..s + n]
							.clone_from_slice(
								&buf[..n],
							);
					}
					start += n as i64;
				}
			}
		}
	}

	debug!(
		rows,
		columns = schema.len() + 1,
		"imported raster attribute table into memory"
	);
	Ok(Rc::new(RefCell::new(table)))
}

fn read_into_sqlite(
	source: &dyn RatSource,
	band: i32,
	image_file: &str,
	config: &RatImportConfig,
) -> Result<SharedTable> {
	let schema = source_schema(source)?;

	let db_path = config.db_path.clone().unwrap_or_else(|| {
		Path::new(image_file).with_extension("ldb")
	});
	let mut table = SqliteTable::open(SqliteConfig::new(db_path))?;

	let tag = (band > 1).then(|| band.to_string());
	let status = table.create_table(image_file, tag.as_deref())?;
	table.set_band(band);

	if status == TableCreateStatus::Read && config.strict_schema {
		verify_schema(&table, &schema)?;
	}
	for col in &schema {
		if table.column_index(&col.name).is_none()
			&& !table.add_column(&col.name, col.ty)
		{
			err!(diagnostic::bridge::column_create_failed(
				&col.name
			));
		}
	}

	let rows = source.row_count().max(0);
	let chunk_size = config.chunk_size;

	// slot 0 of the int bucket feeds the key column
	let mut column_names = vec![table.pk_column().to_string()];
	column_names.extend(schema.iter().map(|c| c.name.clone()));
	let column_refs: Vec<&str> =
		column_names.iter().map(String::as_str).collect();

	let mut layout = vec![(ColumnType::Int, 0usize)];
	let mut int_bufs: Vec<Vec<i64>> = vec![vec![0i64; chunk_size]];
	let mut real_bufs: Vec<Vec<f64>> = Vec::new();
	let mut text_bufs: Vec<Vec<String>> = Vec::new();
	for col in &schema {
		match col.ty {
			ColumnType::Int => {
				layout.push((
					ColumnType::Int,
					int_bufs.len(),
				));
				int_bufs.push(vec![0i64; chunk_size]);
			}
			ColumnType::Real => {
				layout.push((
					ColumnType::Real,
					real_bufs.len(),
				));
				real_bufs.push(vec![0f64; chunk_size]);
			}
			ColumnType::Text => {
				layout.push((
					ColumnType::Text,
					text_bufs.len(),
				));
				text_bufs.push(vec![
					String::new();
					chunk_size
				]);
			}
		}
	}

	let mut start = 0i64;
	while start < rows {
		let n = min(chunk_size as i64, rows - start) as usize;

		for (i, cell) in int_bufs[0][..n].iter_mut().enumerate() {
			*cell = start + i as i64;
		}
		for (src, col) in schema.iter().enumerate() {
			let (_, slot) = layout[src + 1];
			match col.ty {
				ColumnType::Int => source.read_int(
					src,
					start,
					&mut int_bufs[slot][..n],
				)?,
				ColumnType::Real => source.read_real(
					src,
					start,
					&mut real_bufs[slot][..n],
				)?,
				ColumnType::Text => source.read_text(
					src,
					start,
					&mut text_bufs[slot][..n],
				)?,
			}
		}

		if !table.begin_transaction() {
			err!(diagnostic::sqlite::statement_failed(
				"BEGIN TRANSACTION",
				table.last_message()
			));
		}
		{
			let mut set = table.prepare_bulk_set(
				&column_refs,
				BulkSetMode::Insert,
			)?;
			let int_slices: Vec<&[i64]> =
				int_bufs.iter().map(|b| &b[..n]).collect();
			let real_slices: Vec<&[f64]> =
				real_bufs.iter().map(|b| &b[..n]).collect();
			let text_slices: Vec<&[String]> =
				text_bufs.iter().map(|b| &b[..n]).collect();
			for row in 0..n {
				if !set.set_row_from_columns(
					&int_slices,
					&real_slices,
					&text_slices,
					&layout,
					row,
					None,
				) {
					err!(diagnostic::sqlite::statement_failed(
						"bulk insert",
						table.last_message()
					));
				}
			}
		}
		if !table.end_transaction() {
			err!(diagnostic::sqlite::statement_failed(
				"END TRANSACTION",
				table.last_message()
			));
		}

		start += n as i64;
	}

	table.populate_table_admin()?;

	debug!(
		rows,
		columns = schema.len() + 1,
		table = table.table_name(),
		"imported raster attribute table into sqlite"
	);
	Ok(Rc::new(RefCell::new(table)))
}

fn verify_schema(
	table: &SqliteTable,
	schema: &[SourceColumn],
) -> Result<()> {
	if table.num_cols() != schema.len() + 1 {
		err!(diagnostic::bridge::schema_mismatch(
			table.table_name(),
			format!(
				"expected {} columns, found {}",
				schema.len() + 1,
				table.num_cols()
			)
		));
	}
	for (i, col) in schema.iter().enumerate() {
		let idx = i + 1;
		let name = table.column_name(idx).unwrap_or_default();
		if name != col.name {
			err!(diagnostic::bridge::schema_mismatch(
				table.table_name(),
				format!(
					"column {} is named '{}', expected '{}'",
					idx, name, col.name
				)
			));
		}
		if table.column_type(idx) != Some(col.ty) {
			err!(diagnostic::bridge::schema_mismatch(
				table.table_name(),
				format!(
					"column '{}' has the wrong type",
					col.name
				)
			));
		}
	}
	Ok(())
}

/// Exports an attribute table into a RAT sink in chunks of
/// [`RAT_CHUNK_SIZE`] rows, skipping the synthetic key column.
pub fn write_rat(
	table: &SharedTable,
	sink: &mut dyn RatSink,
) -> Result<()> {
	write_rat_chunked(table, sink, RAT_CHUNK_SIZE)
}

pub fn write_rat_chunked(
	table: &SharedTable,
	sink: &mut dyn RatSink,
	chunk_size: usize,
) -> Result<()> {
	if chunk_size == 0 {
		err!(diagnostic::bridge::invalid_chunk_size(0));
	}

	let table = table.borrow();
	let rows = table.num_rows().max(0);
	sink.set_row_count(rows)?;

	let key_column = match table.as_any().downcast_ref::<SqliteTable>()
	{
		Some(sqlite) => sqlite.pk_column().to_string(),
		None => "rowidx".to_string(),
	};

	let mut export: Vec<(usize, String, ColumnType)> = Vec::new();
	for col in 0..table.num_cols() {
		let Some(name) = table.column_name(col) else {
			continue;
		};
		if name == key_column {
			continue;
		}
		let Some(ty) = table.column_type(col) else {
			continue;
		};
		export.push((col, name, ty));
	}

	for (_, name, ty) in &export {
		sink.create_column(
			name,
			RatFieldType::from_column_type(*ty),
		)?;
	}

	if let Some(sqlite) = table.as_any().downcast_ref::<SqliteTable>()
	{
		write_from_sqlite(sqlite, &export, rows, chunk_size, sink)
	} else if let Some(ram) =
		table.as_any().downcast_ref::<RamTable>()
	{
		write_from_ram(ram, &export, rows, chunk_size, sink)
	} else {
		write_generic(&*table, &export, rows, chunk_size, sink)
	}
}

fn write_from_sqlite(
	table: &SqliteTable,
	export: &[(usize, String, ColumnType)],
	rows: i64,
	chunk_size: usize,
	sink: &mut dyn RatSink,
) -> Result<()> {
	if export.is_empty() || rows == 0 {
		return Ok(());
	}

	let columns: Vec<&str> =
		export.iter().map(|(_, name, _)| name.as_str()).collect();
	let mut get = table.prepare_bulk_get(&columns, "")?;
	let mut cursor = get.query(&[])?;

	let mut layout = Vec::with_capacity(export.len());
	let mut int_bufs: Vec<Vec<i64>> = Vec::new();
	let mut real_bufs: Vec<Vec<f64>> = Vec::new();
	let mut text_bufs: Vec<Vec<String>> = Vec::new();
	for (_, _, ty) in export {
		match ty {
			ColumnType::Int => {
				layout.push((
					ColumnType::Int,
					int_bufs.len(),
				));
				int_bufs.push(vec![0i64; chunk_size]);
			}
			ColumnType::Real => {
				layout.push((
					ColumnType::Real,
					real_bufs.len(),
				));
				real_bufs.push(vec![0f64; chunk_size]);
			}
			ColumnType::Text => {
				layout.push((
					ColumnType::Text,
					text_bufs.len(),
				));
				text_bufs.push(vec![
					String::new();
					chunk_size
				]);
			}
		}
	}

	let mut row_buf =
		vec![ColumnValue::Int(0); export.len()];

	let mut start = 0i64;
	while start < rows {
		let n = min(chunk_size as i64, rows - start) as usize;

		for row in 0..n {
			if !cursor.fetch(&mut row_buf) {
				err!(diagnostic::sqlite::statement_failed(
					"bulk fetch",
					"scan ended before the expected row count"
				));
			}
			for (i, (ty, slot)) in layout.iter().enumerate() {
				match ty {
					ColumnType::Int => {
						int_bufs[*slot][row] =
							row_buf[i].as_int()
					}
					ColumnType::Real => {
						real_bufs[*slot][row] =
							row_buf[i].as_real()
					}
					ColumnType::Text => {
						text_bufs[*slot][row] =
							row_buf[i].as_text()
					}
				}
			}
		}

		for (sink_col, (ty, slot)) in layout.iter().enumerate() {
			match ty {
				ColumnType::Int => sink.write_int(
					sink_col,
					start,
					&int_bufs[*slot][..n],
				)?,
				ColumnType::Real => sink.write_real(
					sink_col,
					start,
					&real_bufs[*slot][..n],
				)?,
				ColumnType::Text => sink.write_text(
					sink_col,
					start,
					&text_bufs[*slot][..n],
				)?,
			}
		}

		start += n as i64;
	}
	Ok(())
}

fn write_from_ram(
	table: &RamTable,
	export: &[(usize, String, ColumnType)],
	rows: i64,
	chunk_size: usize,
	sink: &mut dyn RatSink,
) -> Result<()> {
	for (sink_col, (src, name, ty)) in export.iter().enumerate() {
		let mut start = 0i64;
		while start < rows {
			let n = min(chunk_size as i64, rows - start)
				as usize;
			let s = start as usize;
			match ty {
				ColumnType::Int => {
					let Some(data) =
						table.int_column(*src)
					else {
						err!(diagnostic::bridge::type_mismatch(name, "integer"));
					};
					sink.write_int(
						sink_col,
						start,
						&data[s..s + n],
					)?;
				}
				ColumnType::Real => {
					let Some(data) =
						table.real_column(*src)
					else {
						err!(diagnostic::bridge::type_mismatch(name, "real"));
					};
					sink.write_real(
						sink_col,
						start,
						&data[s..s + n],
					)?;
				}
				ColumnType::Text => {
					let Some(data) =
						table.text_column(*src)
					else {
						err!(diagnostic::bridge::type_mismatch(name, "text"));
					};
					sink.write_text(
						sink_col,
						start,
						&data[s..s + n],
					)?;
				}
			}
			start += n as i64;
		}
	}
	Ok(())
}

fn write_generic(
	table: &dyn AttributeTable,
	export: &[(usize, String, ColumnType)],
	rows: i64,
	chunk_size: usize,
	sink: &mut dyn RatSink,
) -> Result<()> {
	let mut int_buf = vec![0i64; chunk_size];
	let mut real_buf = vec![0f64; chunk_size];
	let mut text_buf = vec![String::new(); chunk_size];

	for (sink_col, (src, _, ty)) in export.iter().enumerate() {
		let mut start = 0i64;
		while start < rows {
			let n = min(chunk_size as i64, rows - start)
				as usize;
			match ty {
				ColumnType::Int => {
					for (i, cell) in int_buf[..n]
						.iter_mut()
						.enumerate()
					{
						*cell = table.int_value(
							*src,
							start + i as i64,
						);
					}
					sink.write_int(
						sink_col,
						start,
						&int_buf[..n],
					)?;
				}
				ColumnType::Real => {
					for (i, cell) in real_buf[..n]
						.iter_mut()
						.enumerate()
					{
						*cell = table.real_value(
							*src,
							start + i as i64,
						);
					}
					sink.write_real(
						sink_col,
						start,
						&real_buf[..n],
					)?;
				}
				ColumnType::Text => {
					for (i, cell) in text_buf[..n]
						.iter_mut()
						.enumerate()
					{
						*cell = table.text_value(
							*src,
							start + i as i64,
						);
					}
					sink.write_text(
						sink_col,
						start,
						&text_buf[..n],
					)?;
				}
			}
			start += n as i64;
		}
	}
	Ok(())
}
