use pretty_assertions::assert_eq;
use precedence_lib::assign::{assign_priority, check_siblings, insertion_index};
use precedence_lib::normalize::{normalize, ReorderItem};
use precedence_lib::{ClassRank, DeadlineType, GroupKey, OrderedGroup, OrderedRecord, RecordId};

fn job(id: &str, priority: f64, rank: Option<u8>) -> OrderedRecord {
	OrderedRecord {
		id: id.into(),
		priority,
		class_rank: rank.map(ClassRank::new),
	}
}

#[test]
fn asap_job_goes_in_front_of_hard_deadlines() {
	let siblings = [job("a", 0.0, Some(1)), job("b", 1.0, Some(1))];

	assert_eq!(assign_priority(&siblings, Some(ClassRank::new(0))), -1.0);
}

#[test]
fn job_without_better_class_is_appended() {
	let siblings = [job("a", 0.0, None), job("b", 1.0, None)];

	assert_eq!(assign_priority(&siblings, None), 2.0);
	assert_eq!(assign_priority(&siblings, Some(ClassRank::new(1))), 2.0);
}

#[test]
fn job_is_inserted_between_classes() {
	let siblings = [job("a", 0.0, Some(1)), job("c", 2.0, Some(3))];

	assert_eq!(assign_priority(&siblings, Some(ClassRank::new(2))), 1.0);
}

#[test]
fn reordered_operations_only_report_changes() {
	// All three move
	let batch = normalize(vec![
		ReorderItem::new("x", Some(3.0)),
		ReorderItem::new("y", Some(1.0)),
		ReorderItem::new("z", Some(2.0)),
	]);
	let map = batch.to_map();

	assert_eq!(map.len(), 3);
	assert_eq!(map[&RecordId::from("x")], 1);
	assert_eq!(map[&RecordId::from("y")], 2);
	assert_eq!(map[&RecordId::from("z")], 3);

	// `y` already sits at 2
	let batch = normalize(vec![
		ReorderItem::new("x", Some(3.0)),
		ReorderItem::new("y", Some(2.0)),
		ReorderItem::new("z", Some(1.0)),
	]);

	assert_eq!(batch.len(), 2);
	assert_eq!(batch.get("x"), Some(1));
	assert_eq!(batch.get("y"), None);
	assert_eq!(batch.get("z"), Some(3));
}

/// Deterministic pseudo random numbers.
struct Lcg(u64);

impl Lcg {
	fn next(&mut self, bound: u64) -> u64 {
		self.0 = self
			.0
			.wrapping_mul(6364136223846793005)
			.wrapping_add(1442695040888963407);
		(self.0 >> 33) % bound
	}
}

#[test]
fn priority_order_matches_class_then_insertion_order() {
	let mut rng = Lcg(0x5eed);
	let mut group = OrderedGroup::new(GroupKey::jobs("acme", "plant-1", None));
	let mut expected: Vec<(String, Option<ClassRank>)> = Vec::new();

	for idx in 0..200 {
		let id = format!("job-{idx}");
		let class_rank = match rng.next(5) {
			4 => None,
			rank => Some(DeadlineType::ALL[rank as usize].class_rank()),
		};

		let before_index = insertion_index(group.records(), class_rank);
		let priority = group.insert(id.as_str(), class_rank).unwrap();

		// The value lies strictly between its neighbours
		let records = group.records();
		if before_index > 0 {
			assert!(records[before_index - 1].priority < priority);
		}
		if let Some(after) = records.get(before_index + 1) {
			assert!(priority < after.priority);
		}

		let position = match class_rank {
			Some(rank) => expected
				.iter()
				.position(|(_, r)| r.map_or(false, |r| r > rank))
				.unwrap_or(expected.len()),
			None => expected.len(),
		};
		expected.insert(position, (id, class_rank));

		let actual: Vec<_> = group.ids().map(RecordId::to_string).collect();
		let wanted: Vec<_> = expected.iter().map(|(id, _)| id.clone()).collect();
		assert_eq!(actual, wanted, "after inserting job-{idx}");
		assert_eq!(check_siblings(group.records()), Ok(()));
	}
}

#[test]
fn drag_and_drop_then_normalize() {
	let mut group = OrderedGroup::new(GroupKey::column("in-progress"));
	for id in ["a", "b", "c", "d", "e"] {
		group.insert(id, None).unwrap();
	}

	group.move_to("e", 0).unwrap();
	group.move_to("b", 3).unwrap();

	let order: Vec<_> = group.ids().map(RecordId::to_string).collect();
	assert_eq!(order, ["e", "a", "c", "b", "d"]);

	let batch = group.rebalance();
	assert_eq!(batch.len(), 5);

	let order_after: Vec<_> = group.ids().map(RecordId::to_string).collect();
	assert_eq!(order_after, order);
	assert!(group.rebalance().is_empty());
}
