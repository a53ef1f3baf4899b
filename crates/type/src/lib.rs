// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

pub mod diagnostic;
mod error;
mod r#macro;
mod value;

pub use error::Error;
pub use value::{
	ColumnType, ColumnValue, NODATA_INT, NODATA_REAL, NODATA_TEXT,
	parse_int, parse_real,
};

pub type Result<T> = std::result::Result<T, Error>;
