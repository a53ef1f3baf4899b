// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Configuration for a [`crate::SqliteTable`] connection.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
	pub path: PathBuf,
	pub flags: OpenFlags,
	/// Applied as `PRAGMA cache_size` at open.
	pub cache_size: i64,
	pub journal_mode: JournalMode,
	pub synchronous_mode: SynchronousMode,
	pub temp_store: TempStore,
	/// Name used for the synthetic primary key column of freshly
	/// created tables.
	pub id_column: String,
	/// Loadable extension applied to the connection at open, e.g.
	/// spatialite. Loading is best effort; a failure is logged and
	/// the connection stays usable.
	pub spatial_extension: Option<SpatialExtension>,
}

impl SqliteConfig {
	pub fn new(path: impl AsRef<Path>) -> Self {
		Self {
			path: path.as_ref().to_path_buf(),
			flags: OpenFlags::new(),
			cache_size: 70000,
			journal_mode: JournalMode::Wal,
			synchronous_mode: SynchronousMode::Normal,
			temp_store: TempStore::Memory,
			id_column: "rowidx".to_string(),
			spatial_extension: None,
		}
	}

	/// Opens an existing database without write access.
	pub fn read_only(path: impl AsRef<Path>) -> Self {
		Self::new(path).flags(OpenFlags::new()
			.read_write(false)
			.create(false)
			.read_only(true))
	}

	/// A throwaway database file with a random name in the system
	/// temp directory.
	pub fn temporary() -> Self {
		let path = std::env::temp_dir()
			.join(format!("rattab-{}.ldb", Uuid::new_v4()));
		Self::new(path)
	}

	pub fn flags(mut self, flags: OpenFlags) -> Self {
		self.flags = flags;
		self
	}

	pub fn cache_size(mut self, cache_size: i64) -> Self {
		self.cache_size = cache_size;
		self
	}

	pub fn journal_mode(mut self, journal_mode: JournalMode) -> Self {
		self.journal_mode = journal_mode;
		self
	}

	pub fn synchronous_mode(
		mut self,
		synchronous_mode: SynchronousMode,
	) -> Self {
		self.synchronous_mode = synchronous_mode;
		self
	}

	pub fn temp_store(mut self, temp_store: TempStore) -> Self {
		self.temp_store = temp_store;
		self
	}

	pub fn id_column(mut self, id_column: impl Into<String>) -> Self {
		self.id_column = id_column.into();
		self
	}

	pub fn spatial_extension(
		mut self,
		spatial_extension: SpatialExtension,
	) -> Self {
		self.spatial_extension = Some(spatial_extension);
		self
	}
}

/// A loadable sqlite extension, identified by its shared library and an
/// optional entry point symbol.
#[derive(Debug, Clone)]
pub struct SpatialExtension {
	pub library: PathBuf,
	pub entry_point: Option<String>,
}

impl SpatialExtension {
	pub fn new(library: impl AsRef<Path>) -> Self {
		Self {
			library: library.as_ref().to_path_buf(),
			entry_point: None,
		}
	}

	pub fn entry_point(
		mut self,
		entry_point: impl Into<String>,
	) -> Self {
		self.entry_point = Some(entry_point.into());
		self
	}
}

#[derive(Debug, Clone, Copy)]
pub struct OpenFlags {
	pub read_write: bool,
	pub create: bool,
	pub read_only: bool,
	pub full_mutex: bool,
	pub no_mutex: bool,
	pub shared_cache: bool,
	pub private_cache: bool,
	pub uri: bool,
}

impl OpenFlags {
	pub fn new() -> Self {
		Self {
			read_write: true,
			create: true,
			read_only: false,
			full_mutex: false,
			no_mutex: true,
			shared_cache: false,
			private_cache: false,
			uri: true,
		}
	}

	pub fn read_write(mut self, read_write: bool) -> Self {
		self.read_write = read_write;
		self
	}

	pub fn create(mut self, create: bool) -> Self {
		self.create = create;
		self
	}

	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}

	pub fn full_mutex(mut self, full_mutex: bool) -> Self {
		self.full_mutex = full_mutex;
		self
	}

	pub fn no_mutex(mut self, no_mutex: bool) -> Self {
		self.no_mutex = no_mutex;
		self
	}

	pub fn shared_cache(mut self, shared_cache: bool) -> Self {
		self.shared_cache = shared_cache;
		self
	}

	pub fn private_cache(mut self, private_cache: bool) -> Self {
		self.private_cache = private_cache;
		self
	}

	pub fn uri(mut self, uri: bool) -> Self {
		self.uri = uri;
		self
	}
}

impl Default for OpenFlags {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
	Delete,
	Truncate,
	Persist,
	Memory,
	Wal,
	Off,
}

impl JournalMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			JournalMode::Delete => "DELETE",
			JournalMode::Truncate => "TRUNCATE",
			JournalMode::Persist => "PERSIST",
			JournalMode::Memory => "MEMORY",
			JournalMode::Wal => "WAL",
			JournalMode::Off => "OFF",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousMode {
	Off,
	Normal,
	Full,
	Extra,
}

impl SynchronousMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			SynchronousMode::Off => "OFF",
			SynchronousMode::Normal => "NORMAL",
			SynchronousMode::Full => "FULL",
			SynchronousMode::Extra => "EXTRA",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempStore {
	Default,
	File,
	Memory,
}

impl TempStore {
	pub fn as_str(&self) -> &'static str {
		match self {
			TempStore::Default => "DEFAULT",
			TempStore::File => "FILE",
			TempStore::Memory => "MEMORY",
		}
	}
}
