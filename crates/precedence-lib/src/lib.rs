#![allow(dead_code, rustdoc::private_intra_doc_links)]
#![deny(
	deprecated_in_future,
	exported_private_dependencies,
	future_incompatible,
	missing_copy_implementations,
	rustdoc::missing_crate_level_docs,
	rustdoc::broken_intra_doc_links,
	missing_docs,
	clippy::missing_docs_in_private_items,
	missing_debug_implementations,
	rust_2018_compatibility,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unsafe_code,
	unstable_features,
	unused_import_braces,
	unused_qualifications,

	// clippy attributes
	clippy::missing_const_for_fn,
	clippy::redundant_pub_crate,
)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_alias))]

//! This is the library powering `precedence`, which keeps jobs, operations
//! and kanban cards in a stable order without renumbering whole tables.
//!
//! Two numbering policies are provided:
//!
//! - [Fractional insertion](`assign`): a single record gets a priority
//!   strictly between its new neighbours, ordered first by its
//!   [deadline class](`deadline::DeadlineType`).
//! - [Dense renumbering](`normalize`): a fully reordered list gets the values
//!   `1..=n` and only changed rows are reported.
//!
//! Both are pure functions over records already fetched from a data store.
//! The [`scheduler`] module wires them to a [store](`store::PriorityStore`)
//! with optimistic concurrency.

pub mod assign;
pub mod deadline;
pub mod group;
pub mod normalize;
pub mod record;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use assign::{assign_priority, insertion_index, priority_at};
pub use deadline::{ClassRank, DeadlineType};
pub use group::OrderedGroup;
pub use normalize::{normalize, rebalance, ReorderBatch, ReorderItem};
pub use record::{GroupKey, OrderedRecord, RecordId};

#[cfg(test)]
mod tests {
	use std::sync::Once;

	static SETUP_GATE: Once = Once::new();

	pub(crate) fn setup_test_env() {
		SETUP_GATE.call_once(|| {
			let _ = env_logger::Builder::from_env(
				env_logger::Env::default().default_filter_or(log::Level::Debug.as_str()),
			)
			.is_test(true)
			.try_init();

			let _ = color_eyre::install();
		})
	}
}
