// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

mod rat;
mod transfer;

pub use rat::{MemoryRat, RatFieldType, RatSink, RatSource};
pub use transfer::{
	RAT_CHUNK_SIZE, RatImportConfig, read_rat, write_rat,
	write_rat_chunked,
};
