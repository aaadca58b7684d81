use egui::{Pos2, Rect, Vec2};
use stitchfe::canvas::{Camera, CameraLimits};
use stitchfe::components::tools::{InteractionController, PointerInput, TileAction};
use stitchfe::pattern::{Palette, PaletteEntry, Pattern, STITCHED_CODE};
use stitchfe::project::Project;

fn palette() -> Palette {
    Palette::new(vec![
        PaletteEntry {
            id: "1".to_string(),
            code: "A".to_string(),
            name: "Alpha".to_string(),
            rgb: [10, 120, 200],
            symbol: "a".to_string(),
        },
        PaletteEntry {
            id: "2".to_string(),
            code: "B".to_string(),
            name: "Beta".to_string(),
            rgb: [240, 200, 10],
            symbol: "b".to_string(),
        },
    ])
}

fn camera_for(project: &Project) -> Camera {
    let store = project.store();
    let mut camera = Camera::new(store.cols(), store.rows(), CameraLimits::default());
    camera.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)));
    camera
}

#[test]
fn fill_skips_stitched_centre() {
    let mut project = Project::from_pattern(Pattern::filled(3, 3, palette(), "A"), None);
    let mut controller = InteractionController::default();
    let mut status: Vec<String> = Vec::new();

    controller.toggle_paint();
    controller.on_tile_click(1, 1, &mut project, &mut status);
    controller.toggle_bucket();
    assert_eq!(
        controller.on_tile_click(0, 0, &mut project, &mut status),
        TileAction::Painted(8)
    );
    assert_eq!(project.color_ledger().count_of("A"), 0);

    // One undo restores the whole fill, the earlier paint stays.
    controller.undo(&mut project, &mut status);
    assert_eq!(project.color_ledger().count_of("A"), 8);
    assert_eq!(project.store().merged_cell_at(1, 1), Some(STITCHED_CODE));
}

#[test]
fn fill_stops_at_other_colors() {
    let pattern = Pattern::decode(4, 2, palette(), "2-1,2-2:1-2,3-1").unwrap();
    let mut project = Project::from_pattern(pattern, None);
    let mut controller = InteractionController::default();
    let mut status: Vec<String> = Vec::new();
    controller.toggle_bucket();

    assert_eq!(
        controller.on_tile_click(0, 0, &mut project, &mut status),
        TileAction::Painted(5)
    );
    assert_eq!(project.store().merged_cell_at(1, 1), Some(STITCHED_CODE));
    assert_eq!(project.store().merged_cell_at(0, 1), Some("B"));
    assert_eq!(project.store().merged_cell_at(2, 0), Some("B"));
    let ledger = project.color_ledger();
    assert_eq!(ledger.total(), 8);
}

#[test]
fn pointer_session_paints_pans_and_zooms() {
    let mut project = Project::from_pattern(Pattern::filled(40, 30, palette(), "B"), None);
    let mut camera = camera_for(&project);
    let mut controller = InteractionController::default();
    let mut status: Vec<String> = Vec::new();
    controller.toggle_paint();

    let centre = camera.cell_center_screen(5, 7);
    controller.handle_input(PointerInput::Down(centre), &mut camera, &mut project, &mut status);
    controller.handle_input(PointerInput::Up(centre), &mut camera, &mut project, &mut status);
    assert_eq!(project.store().merged_cell_at(5, 7), Some(STITCHED_CODE));

    // A drag pans and never paints.
    let start = camera.cell_center_screen(10, 10);
    let pan_before = camera.pan_offset();
    controller.handle_input(PointerInput::Down(start), &mut camera, &mut project, &mut status);
    controller.handle_input(PointerInput::Move(start + Vec2::new(40.0, 0.0)), &mut camera, &mut project, &mut status);
    controller.handle_input(PointerInput::Up(start + Vec2::new(60.0, 0.0)), &mut camera, &mut project, &mut status);
    assert_eq!(camera.pan_offset() - pan_before, Vec2::new(60.0, 0.0));
    assert_eq!(project.store().changes().len(), 1);

    for _ in 0..50 {
        let zoom_in = PointerInput::Zoom { pos: Pos2::new(400.0, 300.0), factor: 2.0 };
        controller.handle_input(zoom_in, &mut camera, &mut project, &mut status);
        assert!(camera.zoom() <= camera.max_zoom());
    }
    for _ in 0..50 {
        let zoom_out = PointerInput::Zoom { pos: Pos2::new(10.0, 10.0), factor: 0.5 };
        controller.handle_input(zoom_out, &mut camera, &mut project, &mut status);
        assert!(camera.zoom() >= camera.min_zoom());
    }
}

#[test]
fn ledger_always_sums_to_cell_count() {
    let pattern = Pattern::decode(4, 2, palette(), "2-1,2-2:1-2,3-1").unwrap();
    let mut project = Project::from_pattern(pattern, None);
    project.stitch_cells(&[(0, 0), (3, 0), (3, 1)]);
    assert_eq!(project.color_ledger().total(), 8);
    project.undo();
    assert_eq!(project.color_ledger().total(), 8);
    project.reset();
    assert_eq!(project.color_ledger().total(), 8);
}
