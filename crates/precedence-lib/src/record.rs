//! Records which take part in a priority ordered collection and the keys
//! partitioning them.

use std::borrow::Borrow;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::deadline::ClassRank;

/// Opaque unique identifier of an ordered record (a job, an operation, a
/// kanban card, a procedure step).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
	/// Creates a new id.
	pub fn new<S: Into<String>>(id: S) -> Self {
		Self(id.into())
	}

	/// Returns the id as string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for RecordId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for RecordId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl AsRef<str> for RecordId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for RecordId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// The partition an ordering is scoped to. Priorities of records in
/// different groups are never compared to each other.
///
/// Jobs are grouped by company, location and due date, operations by the
/// make method they belong to and kanban cards by their column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
	/// Placeholder used for jobs which have no due date.
	pub const NO_DUE_DATE: &'static str = "none";

	/// Creates a group key from an already composed raw value.
	pub fn new<S: Into<String>>(raw: S) -> Self {
		Self(raw.into())
	}

	/// Group of all jobs of a company location sharing the same due date.
	/// Jobs without due date share one group per location.
	pub fn jobs(company: &str, location: &str, due_date: Option<NaiveDate>) -> Self {
		let due_date = due_date
			.map(|date| date.format("%Y-%m-%d").to_string())
			.unwrap_or_else(|| String::from(Self::NO_DUE_DATE));

		Self(format!("jobs/{company}/{location}/{due_date}"))
	}

	/// Group of all operations of a job make method.
	pub fn operations(make_method: &str) -> Self {
		Self(format!("operations/{make_method}"))
	}

	/// Group of all cards in a kanban column.
	pub fn column(column: &str) -> Self {
		Self(format!("column/{column}"))
	}

	/// Returns the raw value of the key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for GroupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A record of an ordered group as seen by the priority assigner.
///
/// The slice of records handed to the assigner is always expected to be
/// sorted ascending by [`OrderedRecord::priority`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedRecord {
	/// Unique id of the record.
	pub id: RecordId,

	/// Sole sort key of the record within its group.
	pub priority: f64,

	/// Coarse urgency class of the record. Only jobs carry one.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub class_rank: Option<ClassRank>,
}

impl OrderedRecord {
	/// Creates a record without class rank.
	pub fn new<I: Into<RecordId>>(id: I, priority: f64) -> Self {
		Self {
			id: id.into(),
			priority,
			class_rank: None,
		}
	}

	/// Sets the class rank of the record.
	pub fn with_class_rank(mut self, class_rank: ClassRank) -> Self {
		self.class_rank = Some(class_rank);
		self
	}
}

/// The records of a group the assigner positions a new record against.
pub type Sibling = OrderedRecord;

/// Sorts `records` ascending by priority. Records with equal priority keep
/// their relative order.
pub fn sort_by_priority(records: &mut [OrderedRecord]) {
	records.sort_by(|a, b| a.priority.total_cmp(&b.priority));
}
