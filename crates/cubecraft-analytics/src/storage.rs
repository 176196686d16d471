// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key/value storage behind the identity store.
//!
//! Two scopes are used: a durable store that survives restarts (the anonymous
//! id) and a session-scoped store that lives as long as the visit (session id
//! and start time). Both are the same [`KeyValueStore`] trait so that tests and
//! embedders can swap either one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	#[error("storage I/O error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("corrupt storage file {path}: {source}")]
	Corrupt {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

/// String key/value storage. Every operation may fail.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
	fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
	fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// In-process store. Used for the session scope and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		let entries = self.entries.lock();
		Ok(entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut entries = self.entries.lock();
		entries.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		let mut entries = self.entries.lock();
		entries.remove(key);
		Ok(())
	}
}

/// JSON file store for the durable scope.
///
/// The file is re-read on every access so several instances over the same path
/// observe each other's writes. Writes go to a sibling temp file which is then
/// renamed over the target.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Mutex<()>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			write_lock: Mutex::new(()),
		}
	}

	/// `$XDG_DATA_HOME/cubecraft-analytics/identity.json`, if a data dir exists.
	pub fn default_path() -> Option<PathBuf> {
		dirs::data_dir().map(|dir| dir.join("cubecraft-analytics").join("identity.json"))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(&self) -> Result<HashMap<String, String>, StorageError> {
		let contents = match fs::read_to_string(&self.path) {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
			Err(source) => {
				return Err(StorageError::Io {
					path: self.path.clone(),
					source,
				})
			}
		};

		if contents.trim().is_empty() {
			return Ok(HashMap::new());
		}

		serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
			path: self.path.clone(),
			source,
		})
	}

	fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
		let io_err = |source| StorageError::Io {
			path: self.path.clone(),
			source,
		};

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).map_err(io_err)?;
		}

		let json = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Corrupt {
			path: self.path.clone(),
			source,
		})?;

		let tmp = self.path.with_extension("json.tmp");
		fs::write(&tmp, json).map_err(io_err)?;
		fs::rename(&tmp, &self.path).map_err(io_err)?;

		debug!(path = %self.path.display(), keys = entries.len(), "persisted analytics identity");
		Ok(())
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.load()?.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock();
		let mut entries = self.load()?;
		entries.insert(key.to_string(), value.to_string());
		self.persist(&entries)
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock();
		let mut entries = self.load()?;
		if entries.remove(key).is_some() {
			self.persist(&entries)?;
		}
		Ok(())
	}
}
