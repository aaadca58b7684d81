use stitchfe::io::{PatternError, load_pattern, save_pattern};
use stitchfe::pattern::{Palette, PaletteEntry, Pattern, PatternStore, STITCHED_CODE};
use stitchfe::project::Project;

fn palette() -> Palette {
    let entry = |id: &str, code: &str, rgb: [u8; 3], symbol: &str| PaletteEntry {
        id: id.to_string(),
        code: code.to_string(),
        name: format!("DMC {}", code),
        rgb,
        symbol: symbol.to_string(),
    };
    Palette::new(vec![
        entry("1", "310", [0, 0, 0], "#"),
        entry("2", "321", [199, 43, 59], "o"),
        entry("3", "B5200", [255, 255, 255], "."),
    ])
}

fn merged(store: &PatternStore) -> Vec<Option<String>> {
    store.merged_grid().into_iter().map(|c| c.map(str::to_string)).collect()
}

#[test]
fn export_then_load_preserves_merged_view() {
    let pattern = Pattern::decode(5, 3, palette(), "2-1,3-2:5-3:1-1,1-2,1-3,2-1").unwrap();
    let mut store = PatternStore::new(pattern);
    store.stitch_cells(&[(0, 0), (1, 0), (4, 2)]);
    store.stitch_cells(&[(2, 1)]);
    store.stitch_cells(&[(3, 1)]);
    store.undo();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.json");
    save_pattern(&store, &path).unwrap();

    let reloaded = PatternStore::new(load_pattern(&path).unwrap());
    assert_eq!(merged(&reloaded), merged(&store));
    assert_eq!(reloaded.merged_cell_at(2, 1), Some(STITCHED_CODE));
    assert_eq!(reloaded.merged_cell_at(3, 1), Some("B5200"));
    assert!(reloaded.changes().is_empty());
}

#[test]
fn sparse_chart_round_trips_absent_cells() {
    let cells = vec![(0, 0, "310".to_string()), (2, 1, "321".to_string())];
    let store = PatternStore::new(Pattern::from_cells(3, 2, palette(), cells));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.json");
    save_pattern(&store, &path).unwrap();
    let reloaded = PatternStore::new(load_pattern(&path).unwrap());

    assert_eq!(reloaded.merged_cell_at(0, 0), Some("310"));
    assert_eq!(reloaded.merged_cell_at(2, 1), Some("321"));
    assert_eq!(reloaded.info().stitchable_cells, 2);
}

#[test]
fn project_save_clears_dirty_flag() {
    let mut project = Project::from_pattern(Pattern::filled(4, 4, palette(), "321"), None);
    project.paint_cell(1, 1);
    assert!(project.is_dirty);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.json");
    project.save_to(&path).unwrap();
    assert!(!project.is_dirty);

    let reopened = Project::open(&path).unwrap();
    assert_eq!(reopened.name, "saved.json");
    assert_eq!(reopened.color_ledger().stitched_count(), 1);
    assert_eq!(reopened.color_ledger().count_of("321"), 15);
}

#[test]
fn missing_and_corrupt_files_report_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = load_pattern(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, PatternError::Io(_)));

    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, "{ not json").unwrap();
    assert!(matches!(load_pattern(&corrupt).unwrap_err(), PatternError::Json(_)));

    let short = dir.path().join("short.json");
    std::fs::write(
        &short,
        r#"{"properties":{"width":2,"height":2},"colors":[],"stitches":"2-1"}"#,
    )
    .unwrap();
    assert!(matches!(load_pattern(&short).unwrap_err(), PatternError::Format(_)));
}
