//! Deadline classification of jobs and the class rank derived from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer encoding of a coarse scheduling urgency category. A lower value
/// means more urgent.
#[derive(
	Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClassRank(u8);

impl ClassRank {
	/// Creates a new instance with the given `rank`.
	pub const fn new(rank: u8) -> Self {
		Self(rank)
	}

	/// Returns the numeric rank.
	pub const fn get(self) -> u8 {
		self.0
	}
}

impl fmt::Display for ClassRank {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<DeadlineType> for ClassRank {
	fn from(value: DeadlineType) -> Self {
		value.class_rank()
	}
}

/// Deadline classification of a job.
///
/// The serialized form uses the labels stored by the host application
/// (e.g. `"Hard Deadline"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeadlineType {
	/// Must be worked on as soon as possible.
	#[serde(rename = "ASAP")]
	Asap,

	/// Due date must be met.
	#[serde(rename = "Hard Deadline")]
	HardDeadline,

	/// Due date should be met.
	#[serde(rename = "Soft Deadline")]
	SoftDeadline,

	/// No deadline at all.
	#[serde(rename = "No Deadline")]
	NoDeadline,
}

impl DeadlineType {
	/// All deadline types ordered from most to least urgent.
	pub const ALL: [Self; 4] = [
		Self::Asap,
		Self::HardDeadline,
		Self::SoftDeadline,
		Self::NoDeadline,
	];

	/// Returns the class rank used to partition the priorities of a group.
	pub const fn class_rank(self) -> ClassRank {
		match self {
			Self::Asap => ClassRank(0),
			Self::HardDeadline => ClassRank(1),
			Self::SoftDeadline => ClassRank(2),
			Self::NoDeadline => ClassRank(3),
		}
	}

	/// Returns the label stored for this deadline type.
	pub const fn label(self) -> &'static str {
		match self {
			Self::Asap => "ASAP",
			Self::HardDeadline => "Hard Deadline",
			Self::SoftDeadline => "Soft Deadline",
			Self::NoDeadline => "No Deadline",
		}
	}
}

impl Default for DeadlineType {
	fn default() -> Self {
		Self::NoDeadline
	}
}

impl fmt::Display for DeadlineType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// Error returned when a string does not name a [`DeadlineType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown deadline type `{0}`")]
pub struct ParseDeadlineTypeError(String);

impl FromStr for DeadlineType {
	type Err = ParseDeadlineTypeError;

	/// Accepts the stored labels case-insensitively. Spaces, `-` and `_` are
	/// treated the same, so `hard-deadline` parses as well.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized: String = s
			.trim()
			.chars()
			.filter(|c| !matches!(c, ' ' | '-' | '_'))
			.map(|c| c.to_ascii_lowercase())
			.collect();

		match normalized.as_str() {
			"asap" => Ok(Self::Asap),
			"harddeadline" | "hard" => Ok(Self::HardDeadline),
			"softdeadline" | "soft" => Ok(Self::SoftDeadline),
			"nodeadline" | "none" => Ok(Self::NoDeadline),
			_ => Err(ParseDeadlineTypeError(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn class_rank_order() {
		crate::tests::setup_test_env();

		let ranks: Vec<_> = DeadlineType::ALL
			.iter()
			.map(|d| d.class_rank().get())
			.collect();

		assert_eq!(ranks, [0, 1, 2, 3]);
		assert!(DeadlineType::Asap.class_rank() < DeadlineType::NoDeadline.class_rank());
	}

	#[test]
	fn parse_labels() {
		crate::tests::setup_test_env();

		for deadline in DeadlineType::ALL {
			assert_eq!(deadline.label().parse::<DeadlineType>(), Ok(deadline));
		}

		assert_eq!("hard-deadline".parse(), Ok(DeadlineType::HardDeadline));
		assert_eq!("SOFT_DEADLINE".parse(), Ok(DeadlineType::SoftDeadline));
		assert_eq!(
			"tomorrow".parse::<DeadlineType>(),
			Err(ParseDeadlineTypeError(String::from("tomorrow")))
		);
	}

	#[test]
	#[cfg(feature = "snapshot-json")]
	fn serde_uses_stored_labels() {
		crate::tests::setup_test_env();

		let json = serde_json::to_string(&DeadlineType::HardDeadline).expect("serializable");
		assert_eq!(json, r#""Hard Deadline""#);

		let parsed: DeadlineType = serde_json::from_str(r#""ASAP""#).expect("deserializable");
		assert_eq!(parsed, DeadlineType::Asap);
	}
}
