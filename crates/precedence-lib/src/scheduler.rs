//! Places, moves and reorders records against a [`PriorityStore`].
//!
//! Every operation reads the current siblings, runs the pure
//! [assigner](`crate::assign`) or [normalizer](`crate::normalize`) on them
//! and writes the result back. Single record writes use
//! [`PriorityStore::compare_and_swap`] and are retried when another actor
//! changed the group in between. When the precision between two neighbours
//! is used up, the group is rebalanced once and the placement retried.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assign::{self, AssignError};
use crate::deadline::ClassRank;
use crate::normalize::{self, ReorderBatch, ReorderItem};
use crate::record::{GroupKey, OrderedRecord, RecordId};
use crate::store::{PriorityStore, StoreError};

/// An enum of errors which can occur while scheduling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
	/// No priority could be computed.
	#[error("failed to compute priority")]
	Assign(#[from] AssignError),

	/// The store failed.
	#[error("store failure")]
	Store(#[from] StoreError),

	/// The group kept changing while trying to write.
	#[error("gave up placing `{id}` after {attempts} conflicting attempt(s)")]
	RetriesExhausted {
		/// The record which could not be placed.
		id: RecordId,

		/// Count of attempts made.
		attempts: usize,
	},

	/// A record to place is already part of the group.
	#[error("record `{id}` is already part of group `{group}`")]
	AlreadyPlaced {
		/// The group placed into.
		group: GroupKey,

		/// The existing record.
		id: RecordId,
	},

	/// A reordered list does not hold every record of the group exactly
	/// once. Nothing was written.
	#[error(
		"reordered list of group `{group}` misses {} and repeats {} record(s)",
		.missing.len(),
		.duplicated.len()
	)]
	IncompleteReorder {
		/// The reordered group.
		group: GroupKey,

		/// Records of the group absent from the list.
		missing: Vec<RecordId>,

		/// Ids listed more than once or not part of the group.
		duplicated: Vec<RecordId>,
	},

	/// Some rows of a reorder batch could not be written. The other rows
	/// were written and are not rolled back.
	#[error("{} of {} reordered row(s) failed to persist", .failed.len(), .failed.len() + .applied)]
	PartialBatch {
		/// The failed rows together with the reason.
		failed: Vec<(RecordId, StoreError)>,

		/// Count of rows written successfully.
		applied: usize,
	},
}

/// Tunables of the [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerOptions {
	/// How often a placement is retried after a conflicting write.
	pub max_retries: usize,

	/// Smallest gap between neighbouring priorities before an explicit
	/// rebalance renumbers the group.
	pub min_gap: f64,
}

impl Default for SchedulerOptions {
	fn default() -> Self {
		Self {
			max_retries: 3,
			min_gap: normalize::DEFAULT_MIN_GAP,
		}
	}
}

/// Where a record is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
	/// Behind all siblings of the same or a better class.
	ByClass(Option<ClassRank>),

	/// In front of the sibling at the index. The class rank is stored with
	/// the record.
	At(usize, Option<ClassRank>),
}

impl Placement {
	/// Returns the class rank stored with the placed record.
	const fn class_rank(self) -> Option<ClassRank> {
		match self {
			Self::ByClass(class_rank) | Self::At(_, class_rank) => class_rank,
		}
	}

	/// Returns the index in `siblings` to insert at.
	fn index(self, siblings: &[OrderedRecord]) -> usize {
		match self {
			Self::ByClass(class_rank) => assign::insertion_index(siblings, class_rank),
			Self::At(index, _) => index.min(siblings.len()),
		}
	}
}

/// Runs the ordering operations against a store.
#[derive(Debug)]
pub struct Scheduler<S> {
	/// The backing store.
	store: S,

	/// Tunables.
	options: SchedulerOptions,
}

impl<S: PriorityStore> Scheduler<S> {
	/// Creates a new scheduler.
	pub const fn new(store: S, options: SchedulerOptions) -> Self {
		Self { store, options }
	}

	/// Returns the backing store.
	pub const fn store(&self) -> &S {
		&self.store
	}

	/// Returns the backing store mutably.
	pub fn store_mut(&mut self) -> &mut S {
		&mut self.store
	}

	/// Consumes self and returns the backing store.
	pub fn into_inner(self) -> S {
		self.store
	}

	/// Returns the tunables.
	pub const fn options(&self) -> &SchedulerOptions {
		&self.options
	}

	/// Places a new record in `group` according to its class rank and
	/// returns its priority.
	///
	/// # Errors
	///
	/// Errors with [`ScheduleError::AlreadyPlaced`] if `id` is part of
	/// `group` already; use [`Scheduler::reclassify`] or
	/// [`Scheduler::move_to`] for those. Errors if the store fails, the group
	/// keeps changing or no priority can be found even after rebalancing.
	pub fn place(
		&mut self,
		group: &GroupKey,
		id: RecordId,
		class_rank: Option<ClassRank>,
	) -> Result<f64, ScheduleError> {
		self.ensure_absent(group, &id)?;

		self.place_with(group, id, Placement::ByClass(class_rank))
	}

	/// Places a record in front of the sibling currently at `index` of
	/// `group`, ignoring class ranks. An index past the end appends. Returns
	/// the priority of the record.
	///
	/// # Errors
	///
	/// See [`Scheduler::place`].
	pub fn place_at(
		&mut self,
		group: &GroupKey,
		id: RecordId,
		index: usize,
		class_rank: Option<ClassRank>,
	) -> Result<f64, ScheduleError> {
		self.ensure_absent(group, &id)?;

		self.place_with(group, id, Placement::At(index, class_rank))
	}

	/// Changes the class rank of an existing record and re-inserts it
	/// accordingly. Returns the new priority.
	///
	/// # Errors
	///
	/// Errors with [`StoreError::UnknownRecord`] if the record is not part of
	/// `group`. See [`Scheduler::place`] for other errors.
	pub fn reclassify(
		&mut self,
		group: &GroupKey,
		id: RecordId,
		class_rank: Option<ClassRank>,
	) -> Result<f64, ScheduleError> {
		self.existing(group, &id)?;

		self.place_with(group, id, Placement::ByClass(class_rank))
	}

	/// Moves an existing record so it ends up at `index` of `group` and
	/// returns its new priority. The class rank of the record is kept.
	///
	/// # Errors
	///
	/// Errors with [`StoreError::UnknownRecord`] if the record is not part of
	/// `group`. See [`Scheduler::place`] for other errors.
	pub fn move_to(
		&mut self,
		group: &GroupKey,
		id: RecordId,
		index: usize,
	) -> Result<f64, ScheduleError> {
		let record = self.existing(group, &id)?;

		self.place_with(group, id, Placement::At(index, record.class_rank))
	}

	/// Removes a record from `group`. No other record is renumbered.
	///
	/// # Errors
	///
	/// Errors if the store fails.
	pub fn remove(
		&mut self,
		group: &GroupKey,
		id: &RecordId,
	) -> Result<Option<OrderedRecord>, ScheduleError> {
		Ok(self.store.remove(group, id)?)
	}

	/// Persists a drag and drop result: `ordered` is the complete list of
	/// ids in their new order. Only rows whose value changed are written.
	///
	/// # Errors
	///
	/// Errors with [`ScheduleError::IncompleteReorder`] without writing
	/// anything if `ordered` misses a record of the group, repeats an id or
	/// names an unknown one.
	/// Errors with [`ScheduleError::PartialBatch`] if any row failed; the
	/// other rows stay written.
	pub fn apply_reorder(
		&mut self,
		group: &GroupKey,
		ordered: &[RecordId],
	) -> Result<ReorderBatch, ScheduleError> {
		let snapshot = self.store.snapshot(group, None)?;

		let known: HashSet<&RecordId> = snapshot.records.iter().map(|record| &record.id).collect();
		let mut seen = HashSet::new();
		let duplicated: Vec<RecordId> = ordered
			.iter()
			.filter(|id| !seen.insert(*id) || !known.contains(id))
			.cloned()
			.collect();
		let missing: Vec<RecordId> = snapshot
			.records
			.iter()
			.filter(|record| !seen.contains(&record.id))
			.map(|record| record.id.clone())
			.collect();

		if !missing.is_empty() || !duplicated.is_empty() {
			return Err(ScheduleError::IncompleteReorder {
				group: group.clone(),
				missing,
				duplicated,
			});
		}

		let items = ordered.iter().map(|id| {
			let current = snapshot
				.records
				.iter()
				.find(|record| &record.id == id)
				.map(|record| record.priority);

			ReorderItem::new(id.clone(), current)
		});

		let batch = normalize::normalize(items);
		self.write_batch(group, batch)
	}

	/// Renumbers `group` to `1..=n` if two neighbours are closer than
	/// [`SchedulerOptions::min_gap`] or `force` is set. Returns the written
	/// rows.
	///
	/// # Errors
	///
	/// Errors with [`ScheduleError::PartialBatch`] if any row failed.
	pub fn rebalance(
		&mut self,
		group: &GroupKey,
		force: bool,
	) -> Result<ReorderBatch, ScheduleError> {
		let snapshot = self.store.snapshot(group, None)?;

		if !force && !normalize::needs_rebalance(&snapshot.records, self.options.min_gap) {
			log::debug!("Group `{group}` needs no rebalance");
			return Ok(ReorderBatch::default());
		}

		let batch = normalize::rebalance(&snapshot.records);
		log::info!("Rebalancing {} record(s) of group `{group}`", batch.len());

		self.write_batch(group, batch)
	}

	/// Errors if `id` is part of `group`.
	fn ensure_absent(&self, group: &GroupKey, id: &RecordId) -> Result<(), ScheduleError> {
		let snapshot = self.store.snapshot(group, None)?;

		if snapshot.records.iter().any(|record| &record.id == id) {
			Err(ScheduleError::AlreadyPlaced {
				group: group.clone(),
				id: id.clone(),
			})
		} else {
			Ok(())
		}
	}

	/// Reads the record `id` of `group`.
	fn existing(&self, group: &GroupKey, id: &RecordId) -> Result<OrderedRecord, ScheduleError> {
		self.store
			.snapshot(group, None)?
			.records
			.into_iter()
			.find(|record| &record.id == id)
			.ok_or_else(|| {
				StoreError::UnknownRecord {
					group: group.clone(),
					id: id.clone(),
				}
				.into()
			})
	}

	/// Writes `batch` and turns failed rows into an error.
	fn write_batch(
		&mut self,
		group: &GroupKey,
		batch: ReorderBatch,
	) -> Result<ReorderBatch, ScheduleError> {
		if batch.is_empty() {
			return Ok(batch);
		}

		let failed = self.store.write_order(group, &batch);

		if failed.is_empty() {
			Ok(batch)
		} else {
			log::warn!(
				"{} of {} row(s) of group `{group}` failed to persist",
				failed.len(),
				batch.len()
			);

			Err(ScheduleError::PartialBatch {
				applied: batch.len() - failed.len(),
				failed,
			})
		}
	}

	/// Reads the siblings of `id`, computes its priority and writes it.
	fn place_with(
		&mut self,
		group: &GroupKey,
		id: RecordId,
		placement: Placement,
	) -> Result<f64, ScheduleError> {
		let mut rebalanced = false;
		let mut attempts = 0;

		while attempts <= self.options.max_retries {
			let snapshot = self.store.snapshot(group, Some(&id))?;

			let repair = match assign::check_siblings(&snapshot.records) {
				Ok(()) => None,
				Err(err @ (AssignError::Duplicate { .. } | AssignError::Unsorted { .. })) => {
					Some(err)
				}
				Err(err) => return Err(err.into()),
			};

			if let Some(err) = repair {
				if rebalanced {
					return Err(err.into());
				}

				log::warn!("Repairing group `{group}` before placing `{id}`: {err}");
				self.rebalance_group(group)?;
				rebalanced = true;
				continue;
			}

			let index = placement.index(&snapshot.records);

			let priority = match assign::try_priority_at(&snapshot.records, index) {
				Ok(priority) => priority,
				Err(err @ AssignError::Exhausted { .. }) if !rebalanced => {
					log::warn!("Rebalancing group `{group}` before placing `{id}`: {err}");
					self.rebalance_group(group)?;
					rebalanced = true;
					continue;
				}
				Err(err) => return Err(err.into()),
			};

			let record = OrderedRecord {
				id: id.clone(),
				priority,
				class_rank: placement.class_rank(),
			};

			match self.store.compare_and_swap(group, snapshot.revision, record) {
				Ok(()) => {
					log::debug!("Placed `{id}` in group `{group}` with priority {priority}");
					return Ok(priority);
				}
				Err(err @ StoreError::Conflict { .. }) => {
					attempts += 1;
					log::warn!("Placing `{id}` conflicted (attempt {attempts}): {err}");
				}
				Err(err) => return Err(err.into()),
			}
		}

		Err(ScheduleError::RetriesExhausted { id, attempts })
	}

	/// Renumbers all records of `group`, including a record being moved, so
	/// no stored priority collides with the new values even if the move
	/// itself is never written.
	fn rebalance_group(&mut self, group: &GroupKey) -> Result<(), ScheduleError> {
		let snapshot = self.store.snapshot(group, None)?;
		let batch = normalize::rebalance(&snapshot.records);
		self.write_batch(group, batch).map(|_| ())
	}
}
