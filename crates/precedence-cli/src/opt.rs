//! All code related to command line argument parsing.

// We allow missing documentation for this module, as any documentation put on
// the cli struct will appear in the help message which, in most cases, is not
// what we want.
#![allow(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use precedence_lib::deadline::DeadlineType;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Opts {
	#[command(flatten)]
	pub shared: Shared,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Args)]
pub struct Shared {
	/// The source directory where the board snapshots are located.
	///
	/// It must contain a `boards` directory.
	#[arg(short, long, env = super::PRECEDENCE_SOURCE_ENVVAR, default_value = ".")]
	pub source: PathBuf,

	/// Runs with specified level of verbosity which affects the log level.
	///
	/// The level can be set by repeating the flag `n` times (e.g. `-vv` for 2).
	/// Levels:
	///     1 - `Info`;
	///     2 - `Debug`;
	///     3 - `Trace`.
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Only prints errors. Takes precedence over `--verbose`.
	#[arg(short, long)]
	pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	Place(Place),
	Reorder(Reorder),
	Rebalance(Rebalance),
	Show(Show),
	Man(Man),
	Completions(Completions),
}

#[derive(Debug, Args)]
pub struct BoardShared {
	/// Name of the board.
	///
	/// The name should be the file name of the snapshot without an extension
	/// (e.g. `boards/plant-1.yaml` should be given as `plant-1`).
	#[arg(short, long, env = super::PRECEDENCE_BOARD_ENVVAR)]
	pub board: String,
}

#[derive(Debug, Args)]
pub struct OutputShared {
	/// Writes the result as json to the given file.
	///
	/// The file must not exist yet.
	#[arg(long)]
	pub json_output: Option<PathBuf>,

	/// Writes the result as yaml to the given file.
	///
	/// The file must not exist yet.
	#[arg(long)]
	pub yaml_output: Option<PathBuf>,
}

/// Computes the priority of a record and places it on a board.
///
/// A record which already is on the board is moved.
#[derive(Debug, Parser)]
pub struct Place {
	#[command(flatten)]
	pub board: BoardShared,

	/// Id of the record to place.
	#[arg(short, long)]
	pub id: String,

	/// Deadline type of the record (`ASAP`, `Hard Deadline`, `Soft Deadline`
	/// or `No Deadline`).
	#[arg(short, long, conflicts_with = "class_rank")]
	pub deadline: Option<DeadlineType>,

	/// Class rank of the record. Lower ranks sort first.
	#[arg(short, long)]
	pub class_rank: Option<u8>,

	/// Places the record in front of the record currently at this index,
	/// ignoring class ranks.
	#[arg(short, long)]
	pub at: Option<usize>,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Renumbers a board after a drag and drop.
///
/// Prints only the records whose order value changed.
#[derive(Debug, Parser)]
pub struct Reorder {
	#[command(flatten)]
	pub board: BoardShared,

	/// All record ids in their new order.
	#[arg(required = true)]
	pub ids: Vec<String>,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Respaces a board to `1..=n` when priorities got too close.
#[derive(Debug, Parser)]
pub struct Rebalance {
	#[command(flatten)]
	pub board: BoardShared,

	/// Smallest allowed gap between two neighbouring priorities.
	///
	/// Overrides the value of the board snapshot.
	#[arg(short, long)]
	pub min_gap: Option<f64>,

	/// Rebalances even if no gap is too small.
	#[arg(short, long)]
	pub force: bool,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Prints all records of a board in their order.
#[derive(Debug, Parser)]
pub struct Show {
	#[command(flatten)]
	pub board: BoardShared,
}

/// Generates the man page.
#[derive(Debug, Parser)]
pub struct Man {
	/// Directory the man page is written to.
	#[arg(short, long, default_value = ".")]
	pub output: PathBuf,
}

/// Generates shell completions.
#[derive(Debug, Parser)]
pub struct Completions {
	/// Shell to generate the completions for.
	#[arg(long)]
	pub shell: clap_complete::Shell,

	/// Directory the completions are written to.
	#[arg(short, long, default_value = ".")]
	pub output: PathBuf,
}
