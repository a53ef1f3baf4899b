// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use rattab_bridge::{
	MemoryRat, RAT_CHUNK_SIZE, RatImportConfig, RatSource, read_rat,
	write_rat, write_rat_chunked,
};
use rattab_table::{AttributeTable, TableType};
use rattab_testing::tempdir::temp_dir;

fn sample_rat(rows: i64) -> MemoryRat {
	let mut rat = MemoryRat::new();
	rat.push_int_column("class", (0..rows).map(|i| i * 3).collect());
	rat.push_real_column(
		"area",
		(0..rows).map(|i| i as f64 * 0.25).collect(),
	);
	rat.push_text_column(
		"label",
		(0..rows).map(|i| format!("lbl{}", i)).collect(),
	);
	rat
}

/// Rows straddling the chunk boundaries of a default sized import.
fn probe_rows(rows: i64) -> Vec<i64> {
	let chunk = RAT_CHUNK_SIZE as i64;
	vec![0, chunk - 1, chunk, 2 * chunk - 1, 2 * chunk, rows - 1]
}

#[test]
fn test_import_into_ram_spans_chunk_boundaries() {
	let rows = 12_345i64;
	let rat = sample_rat(rows);

	let table = read_rat(
		&rat,
		1,
		"cover.img",
		&RatImportConfig::new(TableType::Ram),
	)
	.expect("import failed");
	let table = table.borrow();

	assert_eq!(table.table_type(), TableType::Ram);
	assert_eq!(table.num_rows(), rows);
	assert_eq!(table.num_cols(), 4);
	assert_eq!(table.column_index("rowidx"), Some(0));
	assert_eq!(table.image_file_name(), "cover.img");

	for row in probe_rows(rows) {
		assert_eq!(table.int_value(0, row), row);
		assert_eq!(table.int_value(1, row), row * 3);
		assert_eq!(table.real_value(2, row), row as f64 * 0.25);
		assert_eq!(table.text_value(3, row), format!("lbl{}", row));
	}
}

#[test]
fn test_import_into_sqlite_spans_chunk_boundaries() {
	temp_dir(|path| {
		let rows = 12_345i64;
		let rat = sample_rat(rows);

		let table = read_rat(
			&rat,
			1,
			"cover.img",
			&RatImportConfig::new(TableType::Sqlite)
				.db_path(path.join("cover.ldb")),
		)
		.expect("import failed");
		let table = table.borrow();

		assert_eq!(table.table_type(), TableType::Sqlite);
		assert_eq!(table.num_rows(), rows);
		assert_eq!(table.num_cols(), 4);

		for row in probe_rows(rows) {
			assert_eq!(table.int_value(0, row), row);
			assert_eq!(table.int_value(1, row), row * 3);
			assert_eq!(
				table.real_value(2, row),
				row as f64 * 0.25
			);
			assert_eq!(
				table.text_value(3, row),
				format!("lbl{}", row)
			);
		}
		Ok(())
	})
	.expect("test failed");
}

#[test]
fn test_band_tag_suffixes_sqlite_table() {
	temp_dir(|path| {
		let rat = sample_rat(10);
		let table = read_rat(
			&rat,
			3,
			"cover.img",
			&RatImportConfig::new(TableType::Sqlite)
				.db_path(path.join("cover.ldb")),
		)
		.expect("import failed");
		let table = table.borrow();
		assert_eq!(table.band(), 3);

		let sqlite = table
			.as_any()
			.downcast_ref::<rattab_table::SqliteTable>()
			.expect("not a sqlite table");
		assert_eq!(sqlite.table_name(), "cover_3");
		Ok(())
	})
	.expect("test failed");
}

#[test]
fn test_export_from_ram_round_trips() {
	let rows = 12_345i64;
	let rat = sample_rat(rows);
	let table = read_rat(
		&rat,
		1,
		"cover.img",
		&RatImportConfig::new(TableType::Ram),
	)
	.expect("import failed");

	let mut sink = MemoryRat::new();
	write_rat(&table, &mut sink).expect("export failed");

	// the synthetic key column is not exported
	assert_eq!(sink.column_count(), 3);
	assert_eq!(sink.column_name(0).as_deref(), Some("class"));
	assert_eq!(sink.column_name(1).as_deref(), Some("area"));
	assert_eq!(sink.column_name(2).as_deref(), Some("label"));
	assert_eq!(sink.int_data(0).unwrap(), rat.int_data(0).unwrap());
	assert_eq!(sink.real_data(1).unwrap(), rat.real_data(1).unwrap());
	assert_eq!(sink.text_data(2).unwrap(), rat.text_data(2).unwrap());
}

#[test]
fn test_export_from_sqlite_round_trips() {
	temp_dir(|path| {
		let rows = 6_000i64;
		let rat = sample_rat(rows);
		let table = read_rat(
			&rat,
			1,
			"cover.img",
			&RatImportConfig::new(TableType::Sqlite)
				.db_path(path.join("cover.ldb")),
		)
		.expect("import failed");

		let mut sink = MemoryRat::new();
		write_rat(&table, &mut sink).expect("export failed");

		assert_eq!(
			sink.int_data(0).unwrap(),
			rat.int_data(0).unwrap()
		);
		assert_eq!(
			sink.real_data(1).unwrap(),
			rat.real_data(1).unwrap()
		);
		assert_eq!(
			sink.text_data(2).unwrap(),
			rat.text_data(2).unwrap()
		);
		Ok(())
	})
	.expect("test failed");
}

#[test]
fn test_small_chunk_sizes_round_trip() {
	temp_dir(|path| {
		let rows = 23i64;
		let rat = sample_rat(rows);
		let table = read_rat(
			&rat,
			1,
			"cover.img",
			&RatImportConfig::new(TableType::Sqlite)
				.db_path(path.join("cover.ldb"))
				.chunk_size(7),
		)
		.expect("import failed");

		assert_eq!(table.borrow().num_rows(), rows);

		let mut sink = MemoryRat::new();
		write_rat_chunked(&table, &mut sink, 7)
			.expect("export failed");
		assert_eq!(
			sink.int_data(0).unwrap(),
			rat.int_data(0).unwrap()
		);
		assert_eq!(
			sink.text_data(2).unwrap(),
			rat.text_data(2).unwrap()
		);
		Ok(())
	})
	.expect("test failed");
}

#[test]
fn test_zero_chunk_size_rejected() {
	let rat = sample_rat(3);
	let result = read_rat(
		&rat,
		1,
		"cover.img",
		&RatImportConfig::new(TableType::Ram).chunk_size(0),
	);
	assert!(result.is_err());

	let table = read_rat(
		&rat,
		1,
		"cover.img",
		&RatImportConfig::new(TableType::Ram),
	)
	.expect("import failed");
	let mut sink = MemoryRat::new();
	assert!(write_rat_chunked(&table, &mut sink, 0).is_err());
}

#[test]
fn test_strict_schema_rejects_mismatched_table() {
	temp_dir(|path| {
		let db_path = path.join("cover.ldb");
		let rat = sample_rat(5);
		read_rat(
			&rat,
			1,
			"cover.img",
			&RatImportConfig::new(TableType::Sqlite)
				.db_path(&db_path),
		)
		.expect("first import failed");

		let mut other = MemoryRat::new();
		other.push_int_column("klass", vec![1, 2, 3]);
		other.push_real_column("area", vec![0.1, 0.2, 0.3]);
		other.push_text_column(
			"label",
			vec!["a".into(), "b".into(), "c".into()],
		);

		let strict = RatImportConfig::new(TableType::Sqlite)
			.db_path(&db_path)
			.strict_schema(true);
		assert!(read_rat(&other, 1, "cover.img", &strict).is_err());

		// without strict checking the unknown column is appended
		let lax = RatImportConfig::new(TableType::Sqlite)
			.db_path(&db_path);
		let table = read_rat(&other, 1, "cover.img", &lax)
			.expect("lax import failed");
		let table = table.borrow();
		assert!(table.column_index("klass").is_some());
		assert_eq!(table.int_value_by_name("klass", 1), 2);
		Ok(())
	})
	.expect("test failed");
}
