//! Fractional priority assignment.
//!
//! A new or moved record gets a single priority which lies strictly between
//! the priorities of its future neighbours. No other record of the group is
//! touched, so inserting never requires renumbering the group.
//!
//! For jobs the insertion point is derived from the [class
//! rank](`crate::deadline::ClassRank`) of the record: it is placed after all
//! siblings of the same or a more urgent class, but before the first sibling
//! of a less urgent class. Sorting the group purely by priority therefore
//! still yields the class ordering.
//!
//! All functions expect `siblings` to be sorted ascending by priority and to
//! not contain the record being positioned. This is a precondition and not
//! checked by [`assign_priority`] or [`priority_at`]; use [`check_siblings`]
//! or the `try_` variants when the input can not be trusted.

use thiserror::Error;

use crate::deadline::ClassRank;
use crate::record::OrderedRecord;

/// Priority of the first record in an empty group.
pub const INITIAL_PRIORITY: f64 = 0.0;

/// Priority used when prepending in front of a non-positive first sibling.
pub const PREPEND_PRIORITY: f64 = -1.0;

/// Distance from the last sibling when appending.
pub const APPEND_STEP: f64 = 1.0;

/// An enum of errors which can occur while computing a priority with the
/// checked functions of this module.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AssignError {
	/// No floating point value exists strictly between the neighbours. This
	/// happens after many insertions into the same gap; the group needs to be
	/// [rebalanced](`crate::normalize::rebalance`).
	#[error("no priority left between {before:?} and {after:?}")]
	Exhausted {
		/// Priority of the record in front of the insertion point.
		before: Option<f64>,

		/// Priority of the record behind the insertion point.
		after: Option<f64>,
	},

	/// A sibling carries a NaN or infinite priority.
	#[error("sibling at index {index} has non-finite priority `{priority}`")]
	NonFinite {
		/// Index of the offending sibling.
		index: usize,

		/// The offending priority.
		priority: f64,
	},

	/// The siblings are not sorted ascending by priority.
	#[error("siblings are not sorted: `{previous}` is followed by `{current}` at index {index}")]
	Unsorted {
		/// Index of the first sibling out of order.
		index: usize,

		/// Priority of the sibling in front.
		previous: f64,

		/// Priority of the sibling at `index`.
		current: f64,
	},

	/// Two siblings share the same priority.
	#[error("siblings at index {index} and {} share priority `{priority}`", .index + 1)]
	Duplicate {
		/// Index of the first of the two siblings.
		index: usize,

		/// The shared priority.
		priority: f64,
	},
}

/// Returns the index in `siblings` the new record has to be inserted at.
///
/// This is the index of the first sibling with a strictly greater class rank
/// than `class_rank`, or `siblings.len()` if there is none. Records without a
/// class rank always append; siblings without a class rank never cause an
/// earlier insertion.
pub fn insertion_index(siblings: &[OrderedRecord], class_rank: Option<ClassRank>) -> usize {
	let Some(class_rank) = class_rank else {
		return siblings.len();
	};

	siblings
		.iter()
		.position(|sibling| sibling.class_rank.map_or(false, |rank| rank > class_rank))
		.unwrap_or(siblings.len())
}

/// Computes the priority for a record inserted in front of `siblings[index]`.
///
/// An `index` past the end appends. The result is:
///
/// - [`INITIAL_PRIORITY`] for an empty group.
/// - `first / 2` when prepending in front of a positive first priority,
///   otherwise [`PREPEND_PRIORITY`], or `first - 1` if `first` is not
///   greater than [`PREPEND_PRIORITY`].
/// - `last + 1` when appending.
/// - The midpoint of both neighbours otherwise.
pub fn priority_at(siblings: &[OrderedRecord], index: usize) -> f64 {
	let (before, after) = neighbours(siblings, index);

	let priority = match (before, after) {
		(None, None) => INITIAL_PRIORITY,
		(None, Some(first)) => prepend(first),
		(Some(last), None) => last + APPEND_STEP,
		(Some(before), Some(after)) => (before + after) / 2.0,
	};

	log::trace!(
		"Priority at index {index} of {} siblings (before: {before:?}, after: {after:?}): {priority}",
		siblings.len()
	);

	priority
}

/// Computes the priority of a new record with the given `class_rank`.
///
/// Combines [`insertion_index`] and [`priority_at`].
pub fn assign_priority(siblings: &[OrderedRecord], class_rank: Option<ClassRank>) -> f64 {
	priority_at(siblings, insertion_index(siblings, class_rank))
}

/// Same as [`priority_at`] but verifies that the result is strictly between
/// its neighbours.
///
/// # Errors
///
/// Errors with [`AssignError::NonFinite`] if a neighbour priority is NaN or
/// infinite.
/// Errors with [`AssignError::Exhausted`] if the floating point precision
/// between the neighbours is used up.
pub fn try_priority_at(siblings: &[OrderedRecord], index: usize) -> Result<f64, AssignError> {
	let index = index.min(siblings.len());

	for idx in [index.checked_sub(1), Some(index)].into_iter().flatten() {
		if let Some(sibling) = siblings.get(idx) {
			if !sibling.priority.is_finite() {
				return Err(AssignError::NonFinite {
					index: idx,
					priority: sibling.priority,
				});
			}
		}
	}

	let (before, after) = neighbours(siblings, index);
	let priority = priority_at(siblings, index);

	let fits = priority.is_finite()
		&& before.map_or(true, |before| before < priority)
		&& after.map_or(true, |after| priority < after);

	if fits {
		Ok(priority)
	} else {
		Err(AssignError::Exhausted { before, after })
	}
}

/// Same as [`assign_priority`] but verifies the result like
/// [`try_priority_at`].
///
/// # Errors
///
/// See [`try_priority_at`].
pub fn try_assign_priority(
	siblings: &[OrderedRecord],
	class_rank: Option<ClassRank>,
) -> Result<f64, AssignError> {
	try_priority_at(siblings, insertion_index(siblings, class_rank))
}

/// Verifies that `siblings` satisfy the precondition of this module: all
/// priorities are finite and strictly ascending.
///
/// # Errors
///
/// Returns the first violation found.
pub fn check_siblings(siblings: &[OrderedRecord]) -> Result<(), AssignError> {
	if let Some((index, sibling)) = siblings
		.iter()
		.enumerate()
		.find(|(_, sibling)| !sibling.priority.is_finite())
	{
		return Err(AssignError::NonFinite {
			index,
			priority: sibling.priority,
		});
	}

	for (idx, pair) in siblings.windows(2).enumerate() {
		let (previous, current) = (pair[0].priority, pair[1].priority);

		if previous == current {
			return Err(AssignError::Duplicate {
				index: idx,
				priority: previous,
			});
		}

		if previous > current {
			return Err(AssignError::Unsorted {
				index: idx + 1,
				previous,
				current,
			});
		}
	}

	Ok(())
}

/// Returns the priorities of the siblings in front of and behind `index`.
fn neighbours(siblings: &[OrderedRecord], index: usize) -> (Option<f64>, Option<f64>) {
	let index = index.min(siblings.len());

	let before = index
		.checked_sub(1)
		.and_then(|idx| siblings.get(idx))
		.map(|sibling| sibling.priority);
	let after = siblings.get(index).map(|sibling| sibling.priority);

	(before, after)
}

/// Priority strictly below `first`.
fn prepend(first: f64) -> f64 {
	if first > 0.0 {
		first / 2.0
	} else if first > PREPEND_PRIORITY {
		PREPEND_PRIORITY
	} else {
		// `-1` would collide with or sort behind the first sibling
		first - APPEND_STEP
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::deadline::DeadlineType;

	fn rank(rank: u8) -> Option<ClassRank> {
		Some(ClassRank::new(rank))
	}

	fn record(id: &str, priority: f64, class_rank: Option<ClassRank>) -> OrderedRecord {
		OrderedRecord {
			id: id.into(),
			priority,
			class_rank,
		}
	}

	#[test]
	fn empty_group() {
		crate::tests::setup_test_env();

		assert_eq!(assign_priority(&[], None), 0.0);
		assert_eq!(assign_priority(&[], rank(0)), 0.0);
		assert_eq!(try_assign_priority(&[], rank(3)), Ok(0.0));
	}

	#[test]
	fn asap_before_hard_deadlines() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, rank(1)), record("b", 1.0, rank(1))];

		assert_eq!(insertion_index(&siblings, rank(0)), 0);
		assert_eq!(assign_priority(&siblings, rank(0)), -1.0);
	}

	#[test]
	fn append_without_class() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, None), record("b", 1.0, None)];

		assert_eq!(assign_priority(&siblings, None), 2.0);
		assert_eq!(assign_priority(&siblings, rank(0)), 2.0);
	}

	#[test]
	fn append_same_class() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, rank(1)), record("b", 1.0, rank(1))];

		assert_eq!(assign_priority(&siblings, rank(1)), 2.0);
		assert_eq!(assign_priority(&siblings, rank(3)), 2.0);
	}

	#[test]
	fn between_classes() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, rank(1)), record("c", 2.0, rank(3))];

		assert_eq!(insertion_index(&siblings, rank(2)), 1);
		assert_eq!(assign_priority(&siblings, rank(2)), 1.0);
	}

	#[test]
	fn new_record_without_class_appends() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, rank(1)), record("c", 2.0, rank(3))];

		assert_eq!(insertion_index(&siblings, None), 2);
		assert_eq!(assign_priority(&siblings, None), 3.0);
	}

	#[test]
	fn siblings_without_class_never_trigger_early_insertion() {
		crate::tests::setup_test_env();

		let siblings = [
			record("a", 0.0, None),
			record("b", 1.0, rank(3)),
			record("c", 2.0, None),
		];

		assert_eq!(insertion_index(&siblings, rank(0)), 1);
		assert_eq!(assign_priority(&siblings, rank(0)), 0.5);
	}

	#[test]
	fn prepend_halves_positive_first() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 3.0, rank(2))];

		assert_eq!(assign_priority(&siblings, rank(1)), 1.5);
	}

	#[test]
	fn prepend_stays_below_negative_first() {
		crate::tests::setup_test_env();

		assert_eq!(priority_at(&[record("a", -0.5, None)], 0), -1.0);
		assert_eq!(priority_at(&[record("a", -1.0, None)], 0), -2.0);
		assert_eq!(priority_at(&[record("a", -4.25, None)], 0), -5.25);
	}

	#[test]
	fn positional_insert() {
		crate::tests::setup_test_env();

		let siblings = [
			record("a", -1.0, None),
			record("b", 0.0, None),
			record("c", 4.0, None),
		];

		assert_eq!(priority_at(&siblings, 0), -2.0);
		assert_eq!(priority_at(&siblings, 1), -0.5);
		assert_eq!(priority_at(&siblings, 2), 2.0);
		assert_eq!(priority_at(&siblings, 3), 5.0);
		// Past the end appends
		assert_eq!(priority_at(&siblings, 42), 5.0);
	}

	#[test]
	fn midpoint_is_strictly_between() {
		crate::tests::setup_test_env();

		let pairs = [(0.0, 1.0), (-3.5, -3.25), (1e-12, 2e-12), (10.0, 1e9)];

		for (before, after) in pairs {
			let siblings = [record("a", before, None), record("b", after, None)];
			let priority = priority_at(&siblings, 1);

			assert!(before < priority && priority < after, "{before} < {priority} < {after}");
		}
	}

	#[test]
	fn repeated_prepend_of_asap_jobs() {
		crate::tests::setup_test_env();

		let asap = DeadlineType::Asap.class_rank();
		let mut siblings = vec![record("hard", 1.0, rank(1))];

		for idx in 0..5 {
			let priority = assign_priority(&siblings, Some(asap));
			siblings.insert(
				insertion_index(&siblings, Some(asap)),
				record(&format!("asap-{idx}"), priority, Some(asap)),
			);
		}

		// Every new ASAP job goes behind the older ones but in front of the
		// hard deadline job.
		let ids: Vec<_> = siblings.iter().map(|s| s.id.as_str()).collect();
		assert_eq!(ids, ["asap-0", "asap-1", "asap-2", "asap-3", "asap-4", "hard"]);
		assert_eq!(check_siblings(&siblings), Ok(()));
	}

	#[test]
	fn exhausted_gap_is_detected() {
		crate::tests::setup_test_env();

		let before = 1.0_f64;
		let after = f64::from_bits(before.to_bits() + 1);
		let siblings = [record("a", before, None), record("b", after, None)];

		assert_eq!(
			try_priority_at(&siblings, 1),
			Err(AssignError::Exhausted {
				before: Some(before),
				after: Some(after),
			})
		);
	}

	#[test]
	fn repeated_midpoint_eventually_exhausts() {
		crate::tests::setup_test_env();

		let mut siblings = vec![record("a", 0.0, None), record("b", 1.0, None)];
		let mut inserted = 0;

		let err = loop {
			match try_priority_at(&siblings, 1) {
				Ok(priority) => {
					siblings.insert(1, record(&format!("n{inserted}"), priority, None));
					inserted += 1;
				}
				Err(err) => break err,
			}
		};

		assert!(matches!(err, AssignError::Exhausted { .. }));
		// Halving towards zero lasts for more than a thousand insertions
		assert!(inserted > 1000, "{inserted}");
		assert_eq!(check_siblings(&siblings), Ok(()));
	}

	#[test]
	fn append_past_precision_is_detected() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 1e17, None)];

		assert_eq!(
			try_priority_at(&siblings, 1),
			Err(AssignError::Exhausted {
				before: Some(1e17),
				after: None,
			})
		);
	}

	#[test]
	fn non_finite_neighbour() {
		crate::tests::setup_test_env();

		let siblings = [record("a", 0.0, None), record("b", f64::INFINITY, None)];

		assert_eq!(
			try_priority_at(&siblings, 1),
			Err(AssignError::NonFinite {
				index: 1,
				priority: f64::INFINITY,
			})
		);
		assert_eq!(try_priority_at(&siblings, 0), Ok(-1.0));
	}

	#[test]
	fn check_sibling_order() {
		crate::tests::setup_test_env();

		let sorted = [record("a", -1.0, None), record("b", 0.5, None)];
		let unsorted = [record("a", 2.0, None), record("b", 1.0, None)];
		let duplicate = [
			record("a", 0.0, None),
			record("b", 1.0, None),
			record("c", 1.0, None),
		];

		assert_eq!(check_siblings(&sorted), Ok(()));
		assert_eq!(
			check_siblings(&unsorted),
			Err(AssignError::Unsorted {
				index: 1,
				previous: 2.0,
				current: 1.0,
			})
		);
		assert_eq!(
			check_siblings(&duplicate),
			Err(AssignError::Duplicate {
				index: 1,
				priority: 1.0,
			})
		);
	}
}
