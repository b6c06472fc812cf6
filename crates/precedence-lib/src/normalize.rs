//! Dense renumbering of fully reordered lists.
//!
//! After a drag and drop the whole visible list is known in its new order.
//! Each item is assigned its position starting at `1` and only the items
//! whose stored value differs are reported, so the caller persists as few
//! rows as possible. This policy is used for operations, materials,
//! procedure steps and kanban cards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::{OrderedRecord, RecordId};

/// Smallest gap between two neighbouring priorities before a group is
/// considered worth [rebalancing](`rebalance`).
pub const DEFAULT_MIN_GAP: f64 = 1e-9;

/// An item of a reordered list together with its currently stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderItem {
	/// Id of the item.
	pub id: RecordId,

	/// Currently stored order value. `None` if the item has none yet.
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub current: Option<f64>,
}

impl ReorderItem {
	/// Creates a new item.
	pub fn new<I: Into<RecordId>>(id: I, current: Option<f64>) -> Self {
		Self {
			id: id.into(),
			current,
		}
	}
}

impl From<&OrderedRecord> for ReorderItem {
	fn from(value: &OrderedRecord) -> Self {
		Self {
			id: value.id.clone(),
			current: Some(value.priority),
		}
	}
}

/// A single changed order value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
	/// Id of the item.
	pub id: RecordId,

	/// The new order value.
	pub order: u32,
}

/// The set of updates produced by [`normalize`].
///
/// Updates are kept in list order.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderBatch {
	/// The changed items.
	updates: Vec<OrderUpdate>,
}

impl ReorderBatch {
	/// Returns `true` if nothing has to be persisted.
	pub fn is_empty(&self) -> bool {
		self.updates.is_empty()
	}

	/// Returns the count of updates.
	pub fn len(&self) -> usize {
		self.updates.len()
	}

	/// Returns all updates in list order.
	pub fn iter(&self) -> impl Iterator<Item = &OrderUpdate> {
		self.updates.iter()
	}

	/// Returns the new order value for `id` if it changed.
	pub fn get(&self, id: &str) -> Option<u32> {
		self.updates
			.iter()
			.find(|update| update.id.as_str() == id)
			.map(|update| update.order)
	}

	/// Returns the updates as mapping from id to new order value.
	pub fn to_map(&self) -> HashMap<RecordId, u32> {
		self.updates
			.iter()
			.map(|update| (update.id.clone(), update.order))
			.collect()
	}
}

impl IntoIterator for ReorderBatch {
	type Item = OrderUpdate;
	type IntoIter = std::vec::IntoIter<OrderUpdate>;

	fn into_iter(self) -> Self::IntoIter {
		self.updates.into_iter()
	}
}

impl<'a> IntoIterator for &'a ReorderBatch {
	type Item = &'a OrderUpdate;
	type IntoIter = std::slice::Iter<'a, OrderUpdate>;

	fn into_iter(self) -> Self::IntoIter {
		self.updates.iter()
	}
}

/// Assigns every item its one-based position and returns the items whose
/// stored value differs from it.
///
/// Calling it again on the result applied yields an empty batch.
pub fn normalize<I>(items: I) -> ReorderBatch
where
	I: IntoIterator<Item = ReorderItem>,
{
	let updates: Vec<_> = items
		.into_iter()
		.zip(1u32..)
		.filter(|(item, order)| item.current != Some(f64::from(*order)))
		.map(|(item, order)| OrderUpdate { id: item.id, order })
		.collect();

	log::trace!("Normalized list with {} changed item(s)", updates.len());

	ReorderBatch { updates }
}

/// Renumbers a fractional group to `1..=n` in its current order to reclaim
/// spacing between priorities.
///
/// `siblings` must be sorted ascending by priority.
pub fn rebalance(siblings: &[OrderedRecord]) -> ReorderBatch {
	normalize(siblings.iter().map(ReorderItem::from))
}

/// Checks if any two neighbouring priorities are closer than `min_gap`.
///
/// `siblings` must be sorted ascending by priority. Non-finite priorities
/// always count as too close.
pub fn needs_rebalance(siblings: &[OrderedRecord], min_gap: f64) -> bool {
	siblings.iter().any(|sibling| !sibling.priority.is_finite())
		|| siblings
			.windows(2)
			.any(|pair| !(pair[1].priority - pair[0].priority >= min_gap))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn items(values: &[(&str, Option<f64>)]) -> Vec<ReorderItem> {
		values
			.iter()
			.map(|(id, current)| ReorderItem::new(*id, *current))
			.collect()
	}

	fn apply(items: &mut [ReorderItem], batch: &ReorderBatch) {
		for item in items.iter_mut() {
			if let Some(order) = batch.get(item.id.as_str()) {
				item.current = Some(f64::from(order));
			}
		}
	}

	#[test]
	fn reversed_list_changes_all() {
		crate::tests::setup_test_env();

		let batch = normalize(items(&[
			("x", Some(3.0)),
			("y", Some(1.0)),
			("z", Some(2.0)),
		]));

		let map = batch.to_map();
		assert_eq!(map.len(), 3);
		assert_eq!(map[&RecordId::from("x")], 1);
		assert_eq!(map[&RecordId::from("y")], 2);
		assert_eq!(map[&RecordId::from("z")], 3);
	}

	#[test]
	fn unchanged_items_are_skipped() {
		crate::tests::setup_test_env();

		let batch = normalize(items(&[
			("x", Some(1.0)),
			("y", Some(3.0)),
			("z", Some(2.0)),
		]));

		assert_eq!(
			batch.iter().collect::<Vec<_>>(),
			[
				&OrderUpdate {
					id: "y".into(),
					order: 2
				},
				&OrderUpdate {
					id: "z".into(),
					order: 3
				},
			]
		);
		assert_eq!(batch.get("x"), None);
	}

	#[test]
	fn items_without_value_are_always_written() {
		crate::tests::setup_test_env();

		let batch = normalize(items(&[("a", Some(1.0)), ("b", None)]));

		assert_eq!(batch.len(), 1);
		assert_eq!(batch.get("b"), Some(2));
	}

	#[test]
	fn fractional_values_are_replaced() {
		crate::tests::setup_test_env();

		let batch = normalize(items(&[("a", Some(1.0)), ("b", Some(1.5)), ("c", Some(3.0))]));

		assert_eq!(batch.get("b"), Some(2));
		assert_eq!(batch.len(), 1);
	}

	#[test]
	fn normalize_is_idempotent() {
		crate::tests::setup_test_env();

		let mut list = items(&[
			("op-4", Some(4.0)),
			("op-1", Some(1.0)),
			("op-3", Some(3.0)),
			("op-2", Some(2.0)),
			("op-5", None),
		]);

		let first = normalize(list.clone());
		assert!(!first.is_empty());

		apply(&mut list, &first);

		assert_eq!(normalize(list), ReorderBatch::default());
	}

	#[test]
	fn empty_list() {
		crate::tests::setup_test_env();

		assert!(normalize(Vec::new()).is_empty());
		assert!(rebalance(&[]).is_empty());
	}

	#[test]
	fn rebalance_fractional_group() {
		crate::tests::setup_test_env();

		let siblings = [
			OrderedRecord::new("a", -1.0),
			OrderedRecord::new("b", 0.0),
			OrderedRecord::new("c", 0.5),
			OrderedRecord::new("d", 3.0),
		];

		let batch = rebalance(&siblings);

		assert_eq!(batch.get("a"), Some(1));
		assert_eq!(batch.get("b"), Some(2));
		assert_eq!(batch.get("c"), Some(3));
		assert_eq!(batch.get("d"), None);
	}

	#[test]
	fn rebalance_detection() {
		crate::tests::setup_test_env();

		let spaced = [OrderedRecord::new("a", 0.0), OrderedRecord::new("b", 1.0)];
		let tight = [
			OrderedRecord::new("a", 0.0),
			OrderedRecord::new("b", 1e-12),
		];
		let duplicate = [OrderedRecord::new("a", 1.0), OrderedRecord::new("b", 1.0)];
		let broken = [OrderedRecord::new("a", f64::NAN)];

		assert!(!needs_rebalance(&spaced, DEFAULT_MIN_GAP));
		assert!(needs_rebalance(&tight, DEFAULT_MIN_GAP));
		assert!(needs_rebalance(&duplicate, DEFAULT_MIN_GAP));
		assert!(needs_rebalance(&broken, DEFAULT_MIN_GAP));
		assert!(!needs_rebalance(&[], DEFAULT_MIN_GAP));
	}

	#[test]
	#[cfg(feature = "snapshot-json")]
	fn batch_serializes_as_list() {
		crate::tests::setup_test_env();

		let batch = normalize(items(&[("a", Some(2.0)), ("b", Some(2.0))]));

		assert_eq!(
			serde_json::to_string(&batch).expect("serializable"),
			r#"[{"id":"a","order":1}]"#
		);
	}
}
