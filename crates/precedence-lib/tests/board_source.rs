use std::path::PathBuf;

use color_eyre::Result;
use pretty_assertions::assert_eq;
use precedence_lib::snapshot::BoardSource;
use precedence_lib::{DeadlineType, GroupKey};

/// Creates a fresh source directory with a `boards` subdirectory.
fn source_dir(name: &str) -> PathBuf {
	let root = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
	let _ = std::fs::remove_dir_all(&root);
	std::fs::create_dir_all(root.join("boards")).expect("Failed to create source directory");
	root
}

#[test]
fn load_board_by_name() -> Result<()> {
	let root = source_dir("load_board_by_name");
	std::fs::write(
		root.join("boards").join("Plant-1.yaml"),
		r#"
group: jobs/acme/plant-1/none
records:
  - id: job-1
    priority: 1
    deadline_type: Soft Deadline
  - id: job-2
    priority: 0
    deadline_type: ASAP
"#,
	)?;

	let source = BoardSource::from_root(root)?;
	let snapshot = source.load_board("plant-1")?;
	let mut group = snapshot.to_group()?;

	let ids: Vec<_> = group.ids().map(ToString::to_string).collect();
	assert_eq!(ids, ["job-2", "job-1"]);

	let priority = group.insert("job-3", Some(DeadlineType::HardDeadline.class_rank()))?;
	assert_eq!(priority, 0.5);

	Ok(())
}

#[test]
fn json_board() -> Result<()> {
	let root = source_dir("json_board");
	std::fs::write(
		root.join("boards").join("todo.json"),
		r#"{"group":"column/todo","records":[{"id":"card-1","priority":1.0}]}"#,
	)?;

	let source = BoardSource::from_root(root)?;
	let store = source.load_board("todo")?.to_store()?;

	assert_eq!(store.records(&GroupKey::column("todo")).len(), 1);

	Ok(())
}

#[test]
fn missing_and_ambiguous_boards() -> Result<()> {
	let root = source_dir("missing_and_ambiguous_boards");
	std::fs::write(root.join("boards").join("twin.json"), "{}")?;
	std::fs::write(root.join("boards").join("twin.yaml"), "{}")?;
	std::fs::write(root.join("boards").join("notes.txt"), "hello")?;

	let source = BoardSource::from_root(root)?;

	assert_eq!(
		source.find_board_path("nope").unwrap_err().kind(),
		std::io::ErrorKind::NotFound
	);
	assert_eq!(
		source.find_board_path("twin").unwrap_err().kind(),
		std::io::ErrorKind::InvalidData
	);
	assert!(source.load_board("notes").is_err());

	Ok(())
}

#[test]
fn source_without_boards_directory() {
	let root = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("source_without_boards");
	let _ = std::fs::remove_dir_all(&root);
	std::fs::create_dir_all(&root).expect("Failed to create source directory");

	assert!(BoardSource::from_root(root).is_err());
}
