// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::{fmt::Display, path::Path};

use crate::diagnostic::Diagnostic;

pub fn open_failed(path: &Path, cause: impl Display) -> Diagnostic {
	Diagnostic::new(
		"SQLITE_OPEN_FAILED",
		format!("failed to open database '{}'", path.display()),
	)
	.with_label(cause.to_string())
	.with_help("check that the path is writable and the file is a valid sqlite database")
}

pub fn statement_failed(sql: &str, cause: impl Display) -> Diagnostic {
	Diagnostic::new("SQLITE_STATEMENT_FAILED", "statement failed")
		.with_label(cause.to_string())
		.with_note(format!("sql: {}", sql))
}

pub fn table_create_failed(
	table: &str,
	cause: impl Display,
) -> Diagnostic {
	Diagnostic::new(
		"SQLITE_TABLE_CREATE_FAILED",
		format!("failed to create table '{}'", table),
	)
	.with_label(cause.to_string())
}

pub fn introspection_failed(
	table: &str,
	cause: impl Display,
) -> Diagnostic {
	Diagnostic::new(
		"SQLITE_INTROSPECTION_FAILED",
		format!("failed to read the schema of table '{}'", table),
	)
	.with_label(cause.to_string())
}

pub fn delete_failed(path: &Path, cause: impl Display) -> Diagnostic {
	Diagnostic::new(
		"SQLITE_DELETE_FAILED",
		format!("failed to delete database '{}'", path.display()),
	)
	.with_label(cause.to_string())
}
