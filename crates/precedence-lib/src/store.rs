//! The data store collaborator.
//!
//! The assigner only reads the immediate neighbours of a gap and writes one
//! value. Two actors inserting into the same gap at the same time can
//! compute the same priority. A [`PriorityStore`] guards against this with a
//! revision per group: every write bumps it and
//! [`PriorityStore::compare_and_swap`] refuses writes based on an outdated
//! [`GroupSnapshot`].

use std::collections::HashMap;

use thiserror::Error;

use crate::normalize::ReorderBatch;
use crate::record::{self, GroupKey, OrderedRecord, RecordId};

/// An enum of errors a [`PriorityStore`] can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	/// The group changed since the snapshot the write is based on was taken.
	#[error("group `{group}` changed (expected revision {expected}, found {actual})")]
	Conflict {
		/// The group written to.
		group: GroupKey,

		/// Revision the write was based on.
		expected: u64,

		/// Current revision of the group.
		actual: u64,
	},

	/// The record is not part of the group.
	#[error("record `{id}` not found in group `{group}`")]
	UnknownRecord {
		/// The group searched.
		group: GroupKey,

		/// The missing record.
		id: RecordId,
	},

	/// Any failure of the underlying storage.
	#[error("storage failure: {0}")]
	Backend(String),
}

/// The records of one group together with the revision they were read at.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct GroupSnapshot {
	/// Revision of the group at read time.
	pub revision: u64,

	/// The records sorted ascending by priority.
	pub records: Vec<OrderedRecord>,
}

/// A relational store exposing rows with an id and a numeric priority.
pub trait PriorityStore {
	/// Reads all records of `group` ascending by priority. The record with
	/// id `exclude` is left out of the result.
	///
	/// # Errors
	///
	/// Errors if the store could not be read.
	fn snapshot(
		&self,
		group: &GroupKey,
		exclude: Option<&RecordId>,
	) -> Result<GroupSnapshot, StoreError>;

	/// Inserts or replaces `record` in `group` if the revision of the group
	/// still equals `expected_revision`.
	///
	/// # Errors
	///
	/// Errors with [`StoreError::Conflict`] if the group changed in between.
	fn compare_and_swap(
		&mut self,
		group: &GroupKey,
		expected_revision: u64,
		record: OrderedRecord,
	) -> Result<(), StoreError>;

	/// Removes a record from `group`. The other records keep their
	/// priorities.
	///
	/// # Errors
	///
	/// Errors if the store could not be written.
	fn remove(
		&mut self,
		group: &GroupKey,
		id: &RecordId,
	) -> Result<Option<OrderedRecord>, StoreError>;

	/// Writes every update of `batch` as the new priority of its record.
	/// Each row is written on its own; nothing is rolled back.
	///
	/// Returns the rows which failed.
	fn write_order(
		&mut self,
		group: &GroupKey,
		batch: &ReorderBatch,
	) -> Vec<(RecordId, StoreError)>;
}

/// The state of a single group inside a [`MemoryStore`].
#[derive(Default, Debug, Clone, PartialEq)]
struct StoredGroup {
	/// Bumped on every write.
	revision: u64,

	/// The records sorted ascending by priority.
	records: Vec<OrderedRecord>,
}

impl StoredGroup {
	/// Returns the index of the record with `id`.
	fn position(&self, id: &RecordId) -> Option<usize> {
		self.records.iter().position(|record| &record.id == id)
	}

	/// Marks the group as changed and restores the sort order.
	fn touch(&mut self) {
		self.revision += 1;
		record::sort_by_priority(&mut self.records);
	}
}

/// A [`PriorityStore`] keeping all groups in memory.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct MemoryStore {
	/// All groups by their key.
	groups: HashMap<GroupKey, StoredGroup>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store holding `records` for `group`.
	pub fn with_group(group: GroupKey, records: Vec<OrderedRecord>) -> Self {
		let mut store = Self::new();
		store.load(group, records);
		store
	}

	/// Replaces all records of `group`.
	pub fn load(&mut self, group: GroupKey, records: Vec<OrderedRecord>) {
		let stored = self.groups.entry(group).or_default();
		stored.records = records;
		stored.touch();
	}

	/// Returns the records of `group` ascending by priority.
	pub fn records(&self, group: &GroupKey) -> &[OrderedRecord] {
		self.groups
			.get(group)
			.map(|stored| stored.records.as_slice())
			.unwrap_or_default()
	}

	/// Returns the current revision of `group`.
	pub fn revision(&self, group: &GroupKey) -> u64 {
		self.groups
			.get(group)
			.map(|stored| stored.revision)
			.unwrap_or_default()
	}
}

impl PriorityStore for MemoryStore {
	fn snapshot(
		&self,
		group: &GroupKey,
		exclude: Option<&RecordId>,
	) -> Result<GroupSnapshot, StoreError> {
		let Some(stored) = self.groups.get(group) else {
			return Ok(GroupSnapshot::default());
		};

		let records = stored
			.records
			.iter()
			.filter(|record| Some(&record.id) != exclude)
			.cloned()
			.collect();

		Ok(GroupSnapshot {
			revision: stored.revision,
			records,
		})
	}

	fn compare_and_swap(
		&mut self,
		group: &GroupKey,
		expected_revision: u64,
		record: OrderedRecord,
	) -> Result<(), StoreError> {
		let stored = self.groups.entry(group.clone()).or_default();

		if stored.revision != expected_revision {
			return Err(StoreError::Conflict {
				group: group.clone(),
				expected: expected_revision,
				actual: stored.revision,
			});
		}

		match stored.position(&record.id) {
			Some(idx) => stored.records[idx] = record,
			None => stored.records.push(record),
		}
		stored.touch();

		Ok(())
	}

	fn remove(
		&mut self,
		group: &GroupKey,
		id: &RecordId,
	) -> Result<Option<OrderedRecord>, StoreError> {
		let Some(stored) = self.groups.get_mut(group) else {
			return Ok(None);
		};

		let removed = stored.position(id).map(|idx| stored.records.remove(idx));
		if removed.is_some() {
			stored.touch();
		}

		Ok(removed)
	}

	fn write_order(
		&mut self,
		group: &GroupKey,
		batch: &ReorderBatch,
	) -> Vec<(RecordId, StoreError)> {
		let stored = self.groups.entry(group.clone()).or_default();
		let mut failed = Vec::new();

		for update in batch {
			match stored.position(&update.id) {
				Some(idx) => stored.records[idx].priority = f64::from(update.order),
				None => failed.push((
					update.id.clone(),
					StoreError::UnknownRecord {
						group: group.clone(),
						id: update.id.clone(),
					},
				)),
			}
		}

		if failed.len() < batch.len() {
			stored.touch();
		}

		failed
	}
}
