// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::diagnostic::Diagnostic;

pub fn schema_mismatch(table: &str, detail: impl Into<String>) -> Diagnostic {
	Diagnostic::new(
		"BRIDGE_SCHEMA_MISMATCH",
		format!(
			"existing table '{}' does not match the expected schema",
			table
		),
	)
	.with_label(detail.into())
	.with_help("drop the table or import without strict schema checking")
}

pub fn column_create_failed(column: &str) -> Diagnostic {
	Diagnostic::new(
		"BRIDGE_COLUMN_CREATE_FAILED",
		format!("failed to create column '{}'", column),
	)
}

pub fn column_out_of_range(col: usize) -> Diagnostic {
	Diagnostic::new(
		"BRIDGE_COLUMN_OUT_OF_RANGE",
		format!("no column at index {}", col),
	)
}

pub fn type_mismatch(column: &str, expected: &str) -> Diagnostic {
	Diagnostic::new(
		"BRIDGE_TYPE_MISMATCH",
		format!("column '{}' does not hold {} data", column, expected),
	)
}

pub fn invalid_chunk_size(chunk_size: usize) -> Diagnostic {
	Diagnostic::new(
		"BRIDGE_INVALID_CHUNK_SIZE",
		format!("chunk size must be at least 1, got {}", chunk_size),
	)
}
