//! Various utility functions.

use console::{style, Style};
use log::Level;
use precedence_lib::deadline::{ClassRank, DeadlineType};
use precedence_lib::normalize::ReorderBatch;
use precedence_lib::record::{GroupKey, OrderedRecord};
use unicode_width::UnicodeWidthStr;

/// Outputs the given message `s`.
///
/// If `print` is `false` all messages will be logged with the `log` create,
/// otherwise `stdout` is used.
///
/// # NOTE
/// This will also clear the output.
fn output_and_clear(print: bool, s: &mut String, level: Level) {
	if !s.is_empty() {
		if print {
			println!("{}", s);
		} else {
			log::log!(level, "{}", s);
		}

		s.clear();
	}
}

/// Pads `s` with spaces until it spans `width` terminal columns.
fn pad(s: &str, width: usize) -> String {
	let fill = width.saturating_sub(s.width());
	format!("{s}{}", " ".repeat(fill))
}

/// Returns the widest terminal width of all `values`.
fn column_width<'a, I: IntoIterator<Item = &'a str>>(header: &str, values: I) -> usize {
	values
		.into_iter()
		.map(UnicodeWidthStr::width)
		.fold(header.width(), usize::max)
}

/// Describes a class rank, naming its deadline type where one matches.
fn describe_class(class_rank: Option<ClassRank>) -> String {
	match class_rank {
		Some(class_rank) => DeadlineType::ALL
			.into_iter()
			.find(|deadline| deadline.class_rank() == class_rank)
			.map_or_else(
				|| class_rank.to_string(),
				|deadline| format!("{class_rank} ({deadline})"),
			),
		None => String::from("-"),
	}
}

/// Prints all `records` of `group` as a table in their order.
///
/// `highlight` marks a single row, e.g. the record just placed.
pub fn print_group(group: &GroupKey, records: &[OrderedRecord], highlight: Option<&str>) {
	let mut out = format!("Group: {}", style(group).bold());

	if records.is_empty() {
		out.push_str(&format!("\n\t{}", style("(empty)").dim()));
		output_and_clear(true, &mut out, Level::Info);
		return;
	}

	let id_width = column_width("Id", records.iter().map(|record| record.id.as_str()));
	let priorities: Vec<String> = records
		.iter()
		.map(|record| record.priority.to_string())
		.collect();
	let priority_width = column_width("Priority", priorities.iter().map(String::as_str));

	out.push_str(&format!(
		"\n\t{}  {}  {}  {}",
		style(pad("#", 4)).dim(),
		style(pad("Id", id_width)).dim(),
		style(pad("Priority", priority_width)).dim(),
		style("Class").dim(),
	));

	for (idx, (record, priority)) in records.iter().zip(&priorities).enumerate() {
		let row_style = if highlight == Some(record.id.as_str()) {
			Style::new().green().bold()
		} else {
			Style::new()
		};

		out.push_str(&format!(
			"\n\t{}  {}  {}  {}",
			style(pad(&idx.to_string(), 4)).dim(),
			row_style.apply_to(pad(record.id.as_str(), id_width)),
			row_style.apply_to(pad(priority, priority_width)),
			style(describe_class(record.class_rank)).bright().black(),
		));
	}

	output_and_clear(true, &mut out, Level::Info);
}

/// Prints the rows of `batch` which have to be persisted.
pub fn print_batch(group: &GroupKey, batch: &ReorderBatch) {
	let mut out = String::new();

	if batch.is_empty() {
		out.push_str(&format!(
			"Group {}: {}",
			style(group).bold(),
			style("nothing to persist").green()
		));
		output_and_clear(true, &mut out, Level::Info);
		return;
	}

	let id_width = column_width("Id", batch.iter().map(|update| update.id.as_str()));

	out.push_str(&format!(
		"Group {}: {} row(s) to persist",
		style(group).bold(),
		style(batch.len()).yellow()
	));

	for update in batch {
		out.push_str(&format!(
			"\n\t{} => {}",
			pad(update.id.as_str(), id_width),
			style(update.order).cyan()
		));
	}

	output_and_clear(true, &mut out, Level::Info);
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn pad_uses_display_width() {
		assert_eq!(pad("ab", 4), "ab  ");
		assert_eq!(pad("工单", 6), "工单  ");
		assert_eq!(pad("toolong", 2), "toolong");
	}

	#[test]
	fn class_descriptions() {
		assert_eq!(describe_class(None), "-");
		assert_eq!(
			describe_class(Some(ClassRank::new(0))),
			format!("0 ({})", DeadlineType::Asap)
		);
		assert_eq!(describe_class(Some(ClassRank::new(7))), "7");
	}
}
