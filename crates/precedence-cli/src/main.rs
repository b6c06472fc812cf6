//! precedence - Stable ordering for jobs, operations and kanban cards
//!
//! ## Why?
//!
//! Production boards are reordered all day long: a rush order jumps the queue,
//! a card is dragged two columns down, a routing gets a new operation in the
//! middle. Renumbering the whole table for every such change is slow and
//! races with everyone else editing the same board. `precedence` computes the
//! smallest possible change instead.
//!
//! Features:
//!
//! - Places a record between its neighbours with a fractional priority,
//!   ordered by its deadline type
//! - Renumbers a dragged list to `1..=n` and reports only the rows which changed
//! - Respaces boards whose priorities got too close together
//! - Works on board snapshots written as json or yaml
//!
//! ## Usage
//!
//! ### Commands
//!
//! To place a record, use the `place` subcommand:
//!
//! ```sh
//! # place job `J-1042` with a hard deadline on board `plant-1`
//! precedence place --board plant-1 --id J-1042 --deadline "Hard Deadline"
//!
//! # persist a drag and drop
//! precedence --source /srv/boards reorder --board todo card-3 card-1 card-2
//! ```
//!
//! Adding the `-h`/`--help` flag to a given subcommand, will print usage instructions.
//!
//! ### Source Folder
//!
//! The source folder contains a `boards` folder with one snapshot per board.
//!
//! `precedence` searches for the source folder in the following order:
//!
//! 1. CLI argument given with `-s`/`--source`
//! 2. Environment variable `PRECEDENCE_SOURCE`
//! 3. Current working directory of the shell
//!
//! Example board snapshot (`boards/plant-1.yaml`):
//!
//! ```yaml
//! group: "jobs/acme/plant-1/2024-06-01"
//!
//! options:
//!   max_retries: 5
//!
//! records:
//!   - id: "J-1040"
//!     priority: 0
//!     deadline_type: "ASAP"
//!   - id: "J-1041"
//!     priority: 1
//!     class_rank: 3
//! ```

#![allow(rustdoc::private_intra_doc_links)]
#![deny(
	dead_code,
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
	clippy::use_self
)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_alias))]

mod opt;
mod util;

use std::fs::{File, OpenOptions};
use std::path::Path;

use clap::{CommandFactory, Parser};
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use precedence_lib::deadline::ClassRank;
use precedence_lib::normalize::ReorderBatch;
use precedence_lib::record::{GroupKey, RecordId};
use precedence_lib::scheduler::{ScheduleError, Scheduler};
use precedence_lib::snapshot::{BoardSnapshot, BoardSource};
use serde::Serialize;

/// Name of this binary.
const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

/// Name of the environment variable which defines the default source path for
/// `precedence`.
pub const PRECEDENCE_SOURCE_ENVVAR: &str = "PRECEDENCE_SOURCE";

/// Name of the environment variable which defines the default board for
/// `precedence`.
pub const PRECEDENCE_BOARD_ENVVAR: &str = "PRECEDENCE_BOARD";

/// Entry point for `precedence`.
fn main() -> Result<()> {
	color_eyre::install()?;

	let opts = opt::Opts::parse();

	let log_level = if opts.shared.quiet {
		log::Level::Error
	} else {
		match opts.shared.verbose {
			// Default if no value for `verbose` is given
			0 => log::Level::Warn,
			1 => log::Level::Info,
			2 => log::Level::Debug,
			_ => log::Level::Trace,
		}
	};

	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
		.init();

	log::debug!("Parsed Opts:\n{:#?}", opts);

	handle_commands(opts)
}

/// Gets the parsed command line arguments and evaluates them.
fn handle_commands(opts: opt::Opts) -> Result<()> {
	let opt::Opts { shared, command } = opts;

	match command {
		opt::Command::Place(c) => handle_command_place(shared, c),
		opt::Command::Reorder(c) => handle_command_reorder(shared, c),
		opt::Command::Rebalance(c) => handle_command_rebalance(shared, c),
		opt::Command::Show(c) => handle_command_show(shared, c),
		opt::Command::Man(c) => handle_command_man(shared, c),
		opt::Command::Completions(c) => handle_command_completions(shared, c),
	}
}

/// Reads the snapshot of the board with the given name.
fn load_board(shared: &opt::Shared, board: &opt::BoardShared) -> Result<BoardSnapshot> {
	let source = BoardSource::from_root(shared.source.clone())?;

	log::debug!("Source: {}", source.root().display());

	let snapshot = source.load_board(&board.board)?;

	log::debug!("Board snapshot:\n{:#?}", snapshot);

	Ok(snapshot)
}

/// Result of the `place` command.
#[derive(Debug, Serialize)]
struct Placed<'a> {
	/// Group the record was placed in.
	group: &'a GroupKey,

	/// The placed record.
	id: &'a RecordId,

	/// The new priority of the record.
	priority: f64,
}

/// Handles the writting of command results to output files/formats.
fn handle_output<T: Serialize>(
	opt::OutputShared {
		json_output,
		yaml_output,
	}: opt::OutputShared,
	value: &T,
) {
	/// Creates a new file. Fails if the file exists.
	fn create_file(path: &Path) -> std::io::Result<File> {
		OpenOptions::new().create_new(true).write(true).open(path)
	}

	'json: {
		if let Some(json_path) = json_output {
			let mut file = match create_file(&json_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("Failed to create json output file: {err}");
					break 'json;
				}
			};

			if let Err(err) = serde_json::to_writer_pretty(&mut file, value) {
				log::error!("Failed to write result to json output file: {err}");
				break 'json;
			}
		}
	}

	'yaml: {
		if let Some(yaml_path) = yaml_output {
			let mut file = match create_file(&yaml_path) {
				Ok(file) => file,
				Err(err) => {
					log::error!("Failed to create yaml output file: {err}");
					break 'yaml;
				}
			};

			if let Err(err) = serde_yaml::to_writer(&mut file, value) {
				log::error!("Failed to write result to yaml output file: {err}");
				break 'yaml;
			}
		}
	}
}

/// Handles the `place` command processing.
fn handle_command_place(
	shared: opt::Shared,
	opt::Place {
		board,
		id,
		deadline,
		class_rank,
		at,
		output,
	}: opt::Place,
) -> Result<()> {
	let snapshot = load_board(&shared, &board)?;
	let group = snapshot.group.clone();
	let id = RecordId::from(id);

	let class_rank = deadline
		.map(ClassRank::from)
		.or_else(|| class_rank.map(ClassRank::new));

	let mut scheduler = Scheduler::new(snapshot.to_store()?, snapshot.options());

	let existing = scheduler
		.store()
		.records(&group)
		.iter()
		.find(|record| record.id == id)
		.map(|record| record.class_rank);

	let priority = match (existing, at) {
		(Some(_), Some(index)) => scheduler.move_to(&group, id.clone(), index),
		(Some(current), None) => {
			scheduler.reclassify(&group, id.clone(), class_rank.or(current))
		}
		(None, Some(index)) => scheduler.place_at(&group, id.clone(), index, class_rank),
		(None, None) => scheduler.place(&group, id.clone(), class_rank),
	}
	.wrap_err_with(|| format!("Failed to place `{id}` on board `{}`", board.board))?;

	log::info!("Placed `{id}` with priority {priority}");

	util::print_group(&group, scheduler.store().records(&group), Some(id.as_str()));

	handle_output(
		output,
		&Placed {
			group: &group,
			id: &id,
			priority,
		},
	);

	Ok(())
}

/// Renumbers all records of `snapshot` into the order of `ids`.
///
/// Fails without any change if `ids` does not list every record of the board
/// exactly once.
fn reorder_board(snapshot: &BoardSnapshot, ids: &[RecordId]) -> Result<ReorderBatch> {
	let mut scheduler = Scheduler::new(snapshot.to_store()?, snapshot.options());

	scheduler
		.apply_reorder(&snapshot.group, ids)
		.map_err(|err| {
			if let ScheduleError::IncompleteReorder { missing, duplicated, .. } = &err {
				let details = format!(
					"All ids of the board must be given exactly once (missing: {}; repeated or \
					 unknown: {})",
					join_ids(missing),
					join_ids(duplicated)
				);

				color_eyre::Report::new(err).wrap_err(details)
			} else {
				color_eyre::Report::new(err)
			}
		})
}

/// Joins `ids` for display.
fn join_ids(ids: &[RecordId]) -> String {
	if ids.is_empty() {
		return String::from("-");
	}

	ids.iter().map(RecordId::as_str).collect::<Vec<_>>().join(", ")
}

/// Handles the `reorder` command processing.
fn handle_command_reorder(
	shared: opt::Shared,
	opt::Reorder { board, ids, output }: opt::Reorder,
) -> Result<()> {
	let snapshot = load_board(&shared, &board)?;
	let ids: Vec<RecordId> = ids.into_iter().map(RecordId::from).collect();

	let batch = reorder_board(&snapshot, &ids)
		.wrap_err_with(|| format!("Failed to reorder board `{}`", board.board))?;

	util::print_batch(&snapshot.group, &batch);

	handle_output(output, &batch);

	Ok(())
}

/// Handles the `rebalance` command processing.
fn handle_command_rebalance(
	shared: opt::Shared,
	opt::Rebalance {
		board,
		min_gap,
		force,
		output,
	}: opt::Rebalance,
) -> Result<()> {
	let snapshot = load_board(&shared, &board)?;
	let group = snapshot.group.clone();

	let mut options = snapshot.options();
	if let Some(min_gap) = min_gap {
		if !(min_gap.is_finite() && min_gap >= 0.0) {
			return Err(eyre!("Minimal gap must be finite and not negative (got {min_gap})"));
		}

		options.min_gap = min_gap;
	}

	let mut scheduler = Scheduler::new(snapshot.to_store()?, options);
	let batch = scheduler
		.rebalance(&group, force)
		.wrap_err_with(|| format!("Failed to rebalance board `{}`", board.board))?;

	util::print_batch(&group, &batch);

	handle_output(output, &batch);

	Ok(())
}

/// Handles the `show` command processing.
fn handle_command_show(shared: opt::Shared, opt::Show { board }: opt::Show) -> Result<()> {
	let group = load_board(&shared, &board)?.to_group()?;

	util::print_group(group.key(), group.records(), None);

	Ok(())
}

/// Handles the `man` command processing.
fn handle_command_man(_: opt::Shared, opt::Man { output }: opt::Man) -> Result<()> {
	let output = output.join(format!("{}.1", BINARY_NAME));

	let man = clap_mangen::Man::new(opt::Opts::command());
	let mut buffer: Vec<u8> = Default::default();
	man.render(&mut buffer)?;

	std::fs::write(&output, buffer)
		.wrap_err_with(|| format!("Failed to write man page to `{}`", output.display()))?;

	Ok(())
}

/// Handles the `completions` command processing.
fn handle_command_completions(
	_: opt::Shared,
	opt::Completions { shell, output }: opt::Completions,
) -> Result<()> {
	clap_complete::generate_to(shell, &mut opt::Opts::command(), BINARY_NAME, output)?;

	Ok(())
}
