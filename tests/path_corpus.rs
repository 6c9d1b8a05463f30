use datatest_stable::Utf8Path;
use mapflat::PathCommand;
use mapflat::densify::densify;
use mapflat::path::{serialize, to_absolute};

/// Each fixture holds raw path data, optionally followed by a `---` line
/// and the expected absolute serialization.
fn test_path_file(path: &Utf8Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let (raw, expected) = match source.split_once("\n---\n") {
        Some((raw, expected)) => (raw.trim(), Some(expected.trim())),
        None => (source.trim(), None),
    };

    let parsed = to_absolute(raw);
    let text = serialize(&parsed);

    if let Some(expected) = expected {
        assert_eq!(text, expected, "absolute form of {path}");
    }

    // Absolute output parses back to itself.
    let reparsed = to_absolute(&text);
    assert_eq!(reparsed, parsed, "reparse of {path}");
    assert_eq!(serialize(&reparsed), text, "reserialization of {path}");

    // Densified output is straight segments ending where the input ends.
    let dense = densify(&parsed, 2.0);
    assert!(
        dense.commands().iter().all(|c| matches!(
            c,
            PathCommand::MoveTo(_) | PathCommand::LineTo(_) | PathCommand::Close
        )),
        "densified {path} still has curves"
    );
    let last = |p: &mapflat::Path| p.commands().iter().rev().find_map(|c| c.end_point());
    match (last(&parsed), last(&dense)) {
        (Some(a), Some(b)) => assert!((a - b).length() < 1e-9, "{path}: {a} vs {b}"),
        (a, b) => assert_eq!(a, b, "{path}"),
    }

    Ok(())
}

datatest_stable::harness! {
    { test = test_path_file, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/paths"), pattern = r"\.txt$" },
}
