// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

mod ram;
pub mod sqlite;
mod table;

pub use ram::RamTable;
pub use sqlite::{SqliteConfig, SqliteTable, TableCreateStatus};
pub use table::{AttributeTable, SharedTable, TableType};
