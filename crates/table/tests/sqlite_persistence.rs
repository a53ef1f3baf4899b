// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use rattab_table::{
	AttributeTable, SqliteConfig, SqliteTable, TableCreateStatus,
};
use rattab_testing::tempdir::temp_dir;
use rattab_type::ColumnType;

fn seeded(db: &std::path::Path, rows: i64) -> SqliteTable {
	let mut table = SqliteTable::open(SqliteConfig::new(db))
		.expect("open failed");
	table.create_table("cover.img", None).expect("create failed");
	assert!(table.add_column("class", ColumnType::Int));
	assert!(table.add_rows(rows));
	for row in 0..rows {
		table.set_int(1, row, row * 10);
	}
	table
}

#[test]
fn test_uncommitted_writes_stay_invisible_to_other_connections() {
	temp_dir(|path| {
		let db = path.join("atomic.ldb");
		let mut writer = seeded(&db, 3);

		assert!(writer.begin_transaction());
		assert!(writer.add_rows(2));
		writer.set_int(1, 3, 30);
		writer.set_int(1, 4, 40);

		// a second connection still sees the committed snapshot
		let mut reader = SqliteTable::open(SqliteConfig::new(&db))
			.expect("reader open failed");
		reader.set_table_name("cover")
			.expect("table lookup failed");
		assert_eq!(reader.num_rows(), 3);

		assert!(writer.end_transaction());

		reader.populate_table_admin().expect("refresh failed");
		assert_eq!(reader.num_rows(), 5);
		assert_eq!(reader.int_value(1, 4), 40);
		Ok(())
	})
	.expect("test failed");
}

#[test]
fn test_table_survives_reopen() {
	temp_dir(|path| {
		let db = path.join("persist.ldb");
		{
			let table = seeded(&db, 4);
			drop(table);
		}

		let mut table = SqliteTable::open(SqliteConfig::new(&db))
			.expect("reopen failed");
		let status = table
			.create_table("cover.img", None)
			.expect("rebind failed");
		assert_eq!(status, TableCreateStatus::Read);
		assert_eq!(table.num_rows(), 4);
		assert_eq!(table.column_index("class"), Some(1));
		assert_eq!(table.int_value(1, 2), 20);
		Ok(())
	})
	.expect("test failed");
}
