//! Board snapshots stored on disk.
//!
//! A snapshot holds all records of one group as they were fetched from the
//! data store. Snapshots live in the `boards` directory of a
//! [`BoardSource`] and are written as json or yaml.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deadline::{ClassRank, DeadlineType};
use crate::group::OrderedGroup;
use crate::record::{GroupKey, OrderedRecord, RecordId};
use crate::scheduler::SchedulerOptions;
use crate::store::MemoryStore;

/// An enum of errors which can occur while turning a snapshot into records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
	/// A record names a class rank and a deadline type which disagree.
	#[error("record `{id}` has class rank {class_rank} but deadline type `{deadline_type}`")]
	ConflictingClass {
		/// The offending record.
		id: RecordId,

		/// The given class rank.
		class_rank: ClassRank,

		/// The given deadline type.
		deadline_type: DeadlineType,
	},

	/// A record id occurs more than once.
	#[error("record `{0}` occurs more than once")]
	DuplicateId(RecordId),
}

/// This struct represents the source directory used by `precedence`. It
/// holds the [snapshots](`BoardSnapshot`) of all boards.
///
/// The current structure looks something like this:
///
/// ```text
/// root/
/// + boards/
///   + plant-1.yaml
///   + column-todo.json
///   ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSource {
	/// The absolute root source path.
	root: PathBuf,

	/// The absolute path to the `boards` directory.
	boards: PathBuf,
}

impl BoardSource {
	/// Creates a instance from a `root` directory. Both `root` and
	/// `root/boards` must exist and are resolved by calling
	/// [`std::path::Path::canonicalize`].
	///
	/// # Errors
	///
	/// If any of the directories is missing an error will be returned.
	pub fn from_root(root: PathBuf) -> Result<Self> {
		/// Tries to canonicalize/resolve a path.
		/// Bubbles up any error encountered and add some context to it.
		macro_rules! try_canonicalize {
			($var:ident) => {
				$var.canonicalize().wrap_err_with(|| {
					format!(
						"Failed to resolve precedence's {} directory (path: {})",
						stringify!($var),
						$var.display()
					)
				})?
			};
		}

		// Renames the `root` variable for better error messages
		let source = root;
		let source = try_canonicalize!(source);

		let boards = source.join("boards");
		let boards = try_canonicalize!(boards);

		Ok(Self {
			root: source,
			boards,
		})
	}

	/// Returns the absolute path for the `root` directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Returns the absolute path to the `root/boards` directory.
	pub fn boards(&self) -> &Path {
		&self.boards
	}

	/// Tries to resolve a board name to the path of its snapshot. The name
	/// must be given without any file extension attached (e.g. `plant-1`
	/// instead of `plant-1.yaml`) and is matched case-insensitively.
	///
	/// # Errors
	///
	/// Errors if no board matching the name was found.
	/// Errors if multiple boards matching the name were found.
	pub fn find_board_path(&self, name: &str) -> std::io::Result<PathBuf> {
		let name = name.to_lowercase();

		let mut matching_board_paths = walkdir::WalkDir::new(&self.boards)
			.max_depth(1)
			.into_iter()
			.filter_map(|dent| {
				let dent = dent.ok()?;
				let dent_name = dent.file_name().to_string_lossy();

				if let Some(dot_idx) = dent_name.rfind('.') {
					(name == dent_name[..dot_idx].to_lowercase())
						.then(move || dent.path().to_path_buf())
				} else {
					None
				}
			})
			.collect::<Vec<_>>();

		if matching_board_paths.len() > 1 {
			Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("Found more than one board with the name `{}`", name),
			))
		} else if let Some(board_path) = matching_board_paths.pop() {
			Ok(board_path)
		} else {
			Err(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Found no board with the name `{}`", name),
			))
		}
	}

	/// Finds and loads the snapshot of the board `name`.
	///
	/// # Errors
	///
	/// See [`BoardSource::find_board_path`] and [`BoardSnapshot::from_file`].
	pub fn load_board(&self, name: &str) -> Result<BoardSnapshot> {
		let path = self.find_board_path(name)?;
		log::debug!("Loading board `{}` from {}", name, path.display());

		BoardSnapshot::from_file(path)
	}
}

/// A record as written in a snapshot file.
///
/// Jobs can either give their class rank directly or the deadline type it is
/// derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotRecord {
	/// Id of the record.
	pub id: RecordId,

	/// Stored priority of the record.
	pub priority: f64,

	/// Class rank of the record.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub class_rank: Option<ClassRank>,

	/// Deadline type of the record.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub deadline_type: Option<DeadlineType>,
}

impl SnapshotRecord {
	/// Returns the effective class rank of the record.
	///
	/// # Errors
	///
	/// Errors if class rank and deadline type disagree.
	pub fn class_rank(&self) -> Result<Option<ClassRank>, SnapshotError> {
		match (self.class_rank, self.deadline_type) {
			(Some(class_rank), Some(deadline_type)) if class_rank != deadline_type.class_rank() => {
				Err(SnapshotError::ConflictingClass {
					id: self.id.clone(),
					class_rank,
					deadline_type,
				})
			}
			(Some(class_rank), _) => Ok(Some(class_rank)),
			(None, deadline_type) => Ok(deadline_type.map(DeadlineType::class_rank)),
		}
	}
}

/// All records of one group as fetched from the data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardSnapshot {
	/// The group all records belong to.
	pub group: GroupKey,

	/// Scheduler tunables for this board.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub options: Option<SchedulerOptions>,

	/// The records in any order.
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub records: Vec<SnapshotRecord>,
}

impl BoardSnapshot {
	/// Tries to load a snapshot from the file located at `path`.
	///
	/// This function will try to guess the correct deserializer by the file
	/// extension of `path`
	///
	/// # Errors
	///
	/// An error is returned if the file does not exist or could not be read.
	/// An error is returned if the file extension is unknown or missing.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();

		/// Inner function is used to reduce monomorphizes as path here is a
		/// concrete type and no generic one.
		fn from_file_inner(path: &Path) -> Result<BoardSnapshot> {
			// Allowed in case no feature is present.
			#[allow(unused_variables)]
			let file = File::open(path)?;

			let extension = path.extension().ok_or_else(|| {
				std::io::Error::new(
					std::io::ErrorKind::InvalidData,
					"Failed to get file extension for board snapshot",
				)
			})?;

			#[cfg(feature = "snapshot-json")]
			{
				if extension.eq_ignore_ascii_case("json") {
					return BoardSnapshot::from_json_file(file);
				}
			}

			#[cfg(feature = "snapshot-yaml")]
			{
				if extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml") {
					return BoardSnapshot::from_yaml_file(file);
				}
			}

			Err(eyre!(
				"Found unsupported file extension for board snapshot (extension: {:?}, supported: {:?})",
				extension,
				SUPPORTED_EXTENSIONS
			))
		}

		from_file_inner(path).wrap_err(format!(
			"Failed to process board snapshot at path `{}`",
			path.display()
		))
	}

	/// Tries to load a snapshot from a json file.
	#[cfg(feature = "snapshot-json")]
	fn from_json_file(file: File) -> Result<Self> {
		serde_json::from_reader(&file).map_err(|err| {
			color_eyre::Report::msg(err).wrap_err("Failed to parse board snapshot from json content.")
		})
	}

	/// Tries to load a snapshot from a yaml file.
	#[cfg(feature = "snapshot-yaml")]
	fn from_yaml_file(file: File) -> Result<Self> {
		serde_yaml::from_reader(file).map_err(|err| {
			color_eyre::Report::msg(err).wrap_err("Failed to parse board snapshot from yaml content.")
		})
	}

	/// Returns the scheduler tunables, falling back to the defaults.
	pub fn options(&self) -> SchedulerOptions {
		self.options.unwrap_or_default()
	}

	/// Converts the records of the snapshot. The result is sorted ascending
	/// by priority.
	///
	/// # Errors
	///
	/// Errors if a record id occurs twice or a record has conflicting class
	/// information.
	pub fn ordered_records(&self) -> Result<Vec<OrderedRecord>, SnapshotError> {
		let mut seen = HashSet::new();

		let mut records = self
			.records
			.iter()
			.map(|record| {
				if !seen.insert(&record.id) {
					return Err(SnapshotError::DuplicateId(record.id.clone()));
				}

				Ok(OrderedRecord {
					id: record.id.clone(),
					priority: record.priority,
					class_rank: record.class_rank()?,
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		crate::record::sort_by_priority(&mut records);

		Ok(records)
	}

	/// Converts the snapshot into an [`OrderedGroup`].
	///
	/// # Errors
	///
	/// See [`BoardSnapshot::ordered_records`].
	pub fn to_group(&self) -> Result<OrderedGroup> {
		let records = self.ordered_records()?;

		Ok(OrderedGroup::from_records(self.group.clone(), records)?)
	}

	/// Converts the snapshot into a [`MemoryStore`] holding its group.
	///
	/// # Errors
	///
	/// See [`BoardSnapshot::ordered_records`].
	pub fn to_store(&self) -> Result<MemoryStore> {
		Ok(MemoryStore::with_group(
			self.group.clone(),
			self.ordered_records()?,
		))
	}
}

cfg_if::cfg_if! {
	if #[cfg(all(feature = "snapshot-json", feature = "snapshot-yaml"))] {
		/// File extensions snapshots can be loaded from.
		pub const SUPPORTED_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];
	} else if #[cfg(feature = "snapshot-json")] {
		/// File extensions snapshots can be loaded from.
		pub const SUPPORTED_EXTENSIONS: &[&str] = &["json"];
	} else if #[cfg(feature = "snapshot-yaml")] {
		/// File extensions snapshots can be loaded from.
		pub const SUPPORTED_EXTENSIONS: &[&str] = &["yaml", "yml"];
	} else {
		/// File extensions snapshots can be loaded from.
		pub const SUPPORTED_EXTENSIONS: &[&str] = &[];
	}
}
