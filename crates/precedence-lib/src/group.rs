//! An in-memory ordered group of records.
//!
//! [`OrderedGroup`] applies the results of the [assigner](`crate::assign`)
//! and the [normalizer](`crate::normalize`) to a snapshot of one group. It is
//! what a board works on between fetching siblings and persisting changes.

use std::collections::HashSet;

use thiserror::Error;

use crate::assign::{self, AssignError};
use crate::deadline::ClassRank;
use crate::normalize::{self, ReorderBatch};
use crate::record::{self, GroupKey, OrderedRecord, RecordId};

/// An enum of errors which can occur while changing an [`OrderedGroup`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupError {
	/// A record with the id is already part of the group.
	#[error("record `{0}` is already part of the group")]
	DuplicateId(RecordId),

	/// No record with the id is part of the group.
	#[error("record `{0}` is not part of the group")]
	UnknownId(RecordId),

	/// No priority could be computed.
	#[error("failed to compute priority")]
	Assign(#[from] AssignError),
}

/// All records of one [`GroupKey`], kept sorted ascending by priority.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedGroup {
	/// The partition of this group.
	key: GroupKey,

	/// The records sorted ascending by priority.
	records: Vec<OrderedRecord>,
}

impl OrderedGroup {
	/// Creates an empty group.
	pub const fn new(key: GroupKey) -> Self {
		Self {
			key,
			records: Vec::new(),
		}
	}

	/// Creates a group from already stored records. The records are sorted
	/// by priority; records sharing a priority keep their given order.
	///
	/// # Errors
	///
	/// Errors if an id occurs more than once.
	pub fn from_records(
		key: GroupKey,
		mut records: Vec<OrderedRecord>,
	) -> Result<Self, GroupError> {
		{
			let mut seen = HashSet::new();
			if let Some(duplicate) = records.iter().find(|record| !seen.insert(&record.id)) {
				return Err(GroupError::DuplicateId(duplicate.id.clone()));
			}
		}

		record::sort_by_priority(&mut records);

		Ok(Self { key, records })
	}

	/// Returns the partition key of the group.
	pub const fn key(&self) -> &GroupKey {
		&self.key
	}

	/// Returns all records ascending by priority.
	pub fn records(&self) -> &[OrderedRecord] {
		&self.records
	}

	/// Returns all ids ascending by priority.
	pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
		self.records.iter().map(|record| &record.id)
	}

	/// Returns the record with the given id.
	pub fn get(&self, id: &str) -> Option<&OrderedRecord> {
		self.records.iter().find(|record| record.id.as_str() == id)
	}

	/// Returns the position of the record with the given id.
	pub fn position(&self, id: &str) -> Option<usize> {
		self.records
			.iter()
			.position(|record| record.id.as_str() == id)
	}

	/// Returns the count of records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns `true` if the group has no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Returns all records except the one with the given id. This is the
	/// sibling list used when recomputing the priority of `id`.
	pub fn siblings_excluding(&self, id: &str) -> Vec<OrderedRecord> {
		self.records
			.iter()
			.filter(|record| record.id.as_str() != id)
			.cloned()
			.collect()
	}

	/// Adds a new record placed by its class rank and returns its priority.
	///
	/// # Errors
	///
	/// Errors if the id is already part of the group or no priority is left
	/// at the insertion point.
	pub fn insert<I: Into<RecordId>>(
		&mut self,
		id: I,
		class_rank: Option<ClassRank>,
	) -> Result<f64, GroupError> {
		let id = id.into();
		self.ensure_absent(&id)?;

		let index = assign::insertion_index(&self.records, class_rank);
		self.place(id, class_rank, index)
	}

	/// Adds a new record in front of the record currently at `index` and
	/// returns its priority. An `index` past the end appends.
	///
	/// # Errors
	///
	/// Errors if the id is already part of the group or no priority is left
	/// at `index`.
	pub fn insert_at<I: Into<RecordId>>(
		&mut self,
		id: I,
		class_rank: Option<ClassRank>,
		index: usize,
	) -> Result<f64, GroupError> {
		let id = id.into();
		self.ensure_absent(&id)?;

		self.place(id, class_rank, index)
	}

	/// Changes the class rank of a record and re-inserts it accordingly.
	/// Returns the new priority.
	///
	/// # Errors
	///
	/// Errors if the record is unknown or no priority is left at the new
	/// insertion point. The group is left unchanged on error.
	pub fn reclassify(
		&mut self,
		id: &str,
		class_rank: Option<ClassRank>,
	) -> Result<f64, GroupError> {
		let (position, record) = self.take(id)?;

		let index = assign::insertion_index(&self.records, class_rank);
		self.place(record.id.clone(), class_rank, index)
			.map_err(|err| self.restore(position, record, err))
	}

	/// Moves a record so it ends up at `index` of the group and returns its
	/// new priority. The class rank of the record is kept.
	///
	/// # Errors
	///
	/// Errors if the record is unknown or no priority is left at `index`. The
	/// group is left unchanged on error.
	pub fn move_to(&mut self, id: &str, index: usize) -> Result<f64, GroupError> {
		let (position, record) = self.take(id)?;

		if position == index.min(self.records.len()) {
			// Dropped on its own spot
			self.records.insert(position, record.clone());
			return Ok(record.priority);
		}

		self.place(record.id.clone(), record.class_rank, index)
			.map_err(|err| self.restore(position, record, err))
	}

	/// Removes a record. The remaining records keep their priorities.
	pub fn remove(&mut self, id: &str) -> Option<OrderedRecord> {
		self.position(id).map(|idx| self.records.remove(idx))
	}

	/// Renumbers the group to `1..=n` and returns the changed records.
	pub fn rebalance(&mut self) -> ReorderBatch {
		let batch = normalize::rebalance(&self.records);
		self.apply(&batch);
		batch
	}

	/// Applies the order values of `batch` as priorities. Ids which are not
	/// part of the group are ignored.
	pub fn apply(&mut self, batch: &ReorderBatch) {
		for update in batch {
			if let Some(record) = self
				.records
				.iter_mut()
				.find(|record| record.id == update.id)
			{
				record.priority = f64::from(update.order);
			}
		}

		record::sort_by_priority(&mut self.records);
	}

	/// Errors if `id` is already part of the group.
	fn ensure_absent(&self, id: &RecordId) -> Result<(), GroupError> {
		if self.get(id.as_str()).is_some() {
			Err(GroupError::DuplicateId(id.clone()))
		} else {
			Ok(())
		}
	}

	/// Removes the record with `id` and returns it with its former position.
	fn take(&mut self, id: &str) -> Result<(usize, OrderedRecord), GroupError> {
		let position = self
			.position(id)
			.ok_or_else(|| GroupError::UnknownId(RecordId::from(id)))?;

		Ok((position, self.records.remove(position)))
	}

	/// Puts a taken record back and passes the error on.
	fn restore(&mut self, position: usize, record: OrderedRecord, err: GroupError) -> GroupError {
		self.records.insert(position, record);
		err
	}

	/// Computes the priority at `index` and inserts the record there.
	fn place(
		&mut self,
		id: RecordId,
		class_rank: Option<ClassRank>,
		index: usize,
	) -> Result<f64, GroupError> {
		let index = index.min(self.records.len());
		let priority = assign::try_priority_at(&self.records, index)?;

		log::debug!("Placing `{id}` at index {index} of `{}` with priority {priority}", self.key);

		self.records.insert(
			index,
			OrderedRecord {
				id,
				priority,
				class_rank,
			},
		);

		Ok(priority)
	}
}
