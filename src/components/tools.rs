use eframe::egui;
use egui::Pos2;

use crate::canvas::{Camera, DragEnd};
use crate::components::fill::{DEFAULT_FILL_CONFIRM_THRESHOLD, PendingFill, flood_fill};
use crate::pattern::is_fill_blocking;
use crate::project::Project;
use crate::raster::VisualMode;

// ============================================================================
// STATUS SINK
// ============================================================================

/// Receives one line of user-facing status text per operation.
pub trait StatusSink {
    fn report_status(&mut self, text: &str);
}

/// Keeps only the latest message (status bar).
impl StatusSink for String {
    fn report_status(&mut self, text: &str) {
        self.clear();
        self.push_str(text);
    }
}

/// Keeps every message (tests, CLI).
impl StatusSink for Vec<String> {
    fn report_status(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

fn painted_message(n: usize) -> String {
    if n == 1 {
        "1 stitch painted".to_string()
    } else {
        format!("{} stitches painted", n)
    }
}

// ============================================================================
// TOOL MODE + INPUT
// ============================================================================

/// Edit tool.  Highlight is not a mode; it filters whichever mode is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    None,
    Paint,
    Bucket,
}

impl ToolMode {
    pub fn label(&self) -> &'static str {
        match self {
            ToolMode::None => "Inspect",
            ToolMode::Paint => "Paint",
            ToolMode::Bucket => "Bucket fill",
        }
    }
}

/// Pointer, wheel and touch input in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
    Down(Pos2),
    Move(Pos2),
    Up(Pos2),
    /// Wheel or trackpad zoom about `pos`.
    Zoom { pos: Pos2, factor: f32 },
    TouchStart { id: u64, pos: Pos2 },
    TouchMove { id: u64, pos: Pos2 },
    TouchEnd { id: u64, pos: Pos2 },
    /// Pointer left the window; abandon any gesture.
    Cancel,
}

/// What a tile click did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TileAction {
    /// Outside the grid or an absent cell.
    Ignored,
    /// Tile info reported, nothing changed.
    Inspected,
    /// Blocked by the highlight filter.
    Filtered,
    Selected(String),
    Painted(usize),
    /// A fill above the threshold is waiting for confirmation.
    FillPending(usize),
}

// ============================================================================
// INTERACTION CONTROLLER
// ============================================================================

pub struct InteractionController {
    pub mode: ToolMode,
    highlight_active: bool,
    highlighted_code: Option<String>,
    pub high_contrast: bool,
    pending_fill: Option<PendingFill>,
    fill_confirm_threshold: usize,
    mouse_down: bool,
    /// Active touch points, in arrival order.
    touches: Vec<(u64, Pos2)>,
    /// Set once the current touch gesture has had two fingers down.
    multi_touch: bool,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(DEFAULT_FILL_CONFIRM_THRESHOLD)
    }
}

impl InteractionController {
    pub fn new(fill_confirm_threshold: usize) -> Self {
        Self {
            mode: ToolMode::None,
            highlight_active: false,
            highlighted_code: None,
            high_contrast: false,
            pending_fill: None,
            fill_confirm_threshold,
            mouse_down: false,
            touches: Vec::new(),
            multi_touch: false,
        }
    }

    pub fn set_fill_confirm_threshold(&mut self, threshold: usize) {
        self.fill_confirm_threshold = threshold;
    }

    pub fn fill_confirm_threshold(&self) -> usize {
        self.fill_confirm_threshold
    }

    pub fn highlight_active(&self) -> bool {
        self.highlight_active
    }

    pub fn highlighted_code(&self) -> Option<&str> {
        self.highlighted_code.as_deref()
    }

    pub fn pending_fill(&self) -> Option<&PendingFill> {
        self.pending_fill.as_ref()
    }

    pub fn toggle_paint(&mut self) {
        self.mode = if self.mode == ToolMode::Paint {
            ToolMode::None
        } else {
            ToolMode::Paint
        };
    }

    pub fn toggle_bucket(&mut self) {
        self.mode = if self.mode == ToolMode::Bucket {
            ToolMode::None
        } else {
            ToolMode::Bucket
        };
    }

    pub fn toggle_highlight(&mut self) {
        self.highlight_active = !self.highlight_active;
    }

    pub fn toggle_contrast(&mut self) {
        self.high_contrast = !self.high_contrast;
    }

    /// Drop per-chart state after a new pattern is loaded.
    pub fn on_pattern_loaded(&mut self, status: &mut dyn StatusSink) {
        self.highlighted_code = None;
        self.pending_fill = None;
        self.mouse_down = false;
        self.touches.clear();
        self.multi_touch = false;
        status.report_status("Loaded pattern");
    }

    pub fn visual_mode(&self, show_symbols: bool) -> VisualMode {
        VisualMode {
            highlighted: if self.highlight_active {
                self.highlighted_code.clone()
            } else {
                None
            },
            high_contrast: self.high_contrast,
            show_symbols,
        }
    }

    /// Make `code` the highlighted color and switch highlighting on.
    pub fn select_color(&mut self, code: &str, project: &Project, status: &mut dyn StatusSink) {
        let name = project.store().palette().describe(code).name;
        self.highlighted_code = Some(code.to_string());
        self.highlight_active = true;
        status.report_status(&format!("Selected color: {} - {}", code, name));
    }

    pub fn undo(&mut self, project: &mut Project, status: &mut dyn StatusSink) -> bool {
        if project.undo() == 0 {
            return false;
        }
        status.report_status("Change undone");
        true
    }

    /// Apply the active tool to cell (x, y).
    pub fn on_tile_click(
        &mut self,
        x: u32,
        y: u32,
        project: &mut Project,
        status: &mut dyn StatusSink,
    ) -> TileAction {
        let Some(code) = project.store().merged_cell_at(x, y).map(str::to_string) else {
            return TileAction::Ignored;
        };
        let name = project.store().palette().describe(&code).name.to_string();
        status.report_status(&format!(
            "Tile (X: {}, Y: {}) - Code: {} - {}",
            x + 1,
            y + 1,
            code,
            name
        ));

        if self.highlight_active {
            if self.mode == ToolMode::None {
                self.select_color(&code, project, status);
                return TileAction::Selected(code);
            }
            if self.highlighted_code.as_deref().is_some_and(|h| h != code) {
                return TileAction::Filtered;
            }
        }

        match self.mode {
            ToolMode::None => TileAction::Inspected,
            ToolMode::Paint => {
                let n = project.paint_cell(x, y);
                if n > 0 {
                    status.report_status(&painted_message(n));
                }
                TileAction::Painted(n)
            }
            ToolMode::Bucket => self.bucket_fill(x, y, &code, project, status),
        }
    }

    fn bucket_fill(
        &mut self,
        x: u32,
        y: u32,
        code: &str,
        project: &mut Project,
        status: &mut dyn StatusSink,
    ) -> TileAction {
        if is_fill_blocking(code) {
            return TileAction::Painted(0);
        }
        let cells = flood_fill(project.store(), (x, y), code);
        let pending = PendingFill {
            seed: (x, y),
            target_code: code.to_string(),
            cells,
        };
        if pending.needs_confirmation(self.fill_confirm_threshold) {
            let n = pending.len();
            crate::log_info!("Fill of {} cells from ({}, {}) awaiting confirmation", n, x, y);
            self.pending_fill = Some(pending);
            return TileAction::FillPending(n);
        }
        let n = project.stitch_cells(&pending.cells);
        if n > 0 {
            status.report_status(&painted_message(n));
        }
        TileAction::Painted(n)
    }

    /// Commit or discard the pending fill.  Returns the cells stitched.
    pub fn confirm_pending_fill(
        &mut self,
        accept: bool,
        project: &mut Project,
        status: &mut dyn StatusSink,
    ) -> usize {
        let Some(pending) = self.pending_fill.take() else { return 0 };
        if !accept {
            crate::log_info!("Declined fill of {} cells", pending.len());
            return 0;
        }
        let n = project.stitch_cells(&pending.cells);
        crate::log_info!("Confirmed fill of {} cells", n);
        if n > 0 {
            status.report_status(&painted_message(n));
        }
        n
    }

    /// Feed one input event.  Returns true when a repaint is needed.
    pub fn handle_input(
        &mut self,
        input: PointerInput,
        camera: &mut Camera,
        project: &mut Project,
        status: &mut dyn StatusSink,
    ) -> bool {
        match input {
            // Mouse events are emulated from touches on most platforms.
            PointerInput::Down(pos) => {
                if !self.touches.is_empty() {
                    return false;
                }
                self.mouse_down = true;
                camera.begin_drag(pos);
                false
            }
            PointerInput::Move(pos) => {
                if !self.touches.is_empty() || !self.mouse_down {
                    return false;
                }
                camera.continue_drag(pos)
            }
            PointerInput::Up(pos) => {
                if !self.touches.is_empty() || !self.mouse_down {
                    return false;
                }
                self.mouse_down = false;
                self.finish_drag(camera.end_drag(pos), camera, project, status)
            }
            PointerInput::Zoom { pos, factor } => {
                camera.zoom_around_screen_point(factor, pos);
                true
            }
            PointerInput::TouchStart { id, pos } => {
                self.touches.retain(|(t, _)| *t != id);
                self.touches.push((id, pos));
                match self.touches.len() {
                    1 => {
                        self.multi_touch = false;
                        camera.begin_drag(pos);
                    }
                    2 => {
                        self.multi_touch = true;
                        camera.begin_pinch(self.touches[0].1, self.touches[1].1);
                    }
                    _ => {}
                }
                false
            }
            PointerInput::TouchMove { id, pos } => {
                let Some(slot) = self.touches.iter_mut().find(|(t, _)| *t == id) else {
                    return false;
                };
                slot.1 = pos;
                if camera.is_pinching() && self.touches.len() >= 2 {
                    camera.update_pinch(self.touches[0].1, self.touches[1].1)
                } else if self.touches.len() == 1 {
                    camera.continue_drag(pos)
                } else {
                    false
                }
            }
            PointerInput::TouchEnd { id, pos } => {
                let before = self.touches.len();
                self.touches.retain(|(t, _)| *t != id);
                if self.touches.len() == before {
                    return false;
                }
                match self.touches.len() {
                    0 => {
                        camera.end_pinch();
                        let ended = camera.end_drag(pos);
                        let multi = std::mem::take(&mut self.multi_touch);
                        if multi {
                            return ended.is_some();
                        }
                        self.finish_drag(ended, camera, project, status)
                    }
                    1 => {
                        // Back to one finger: keep panning, never click.
                        camera.end_pinch();
                        camera.begin_drag(self.touches[0].1);
                        false
                    }
                    _ => {
                        if camera.is_pinching() {
                            camera.begin_pinch(self.touches[0].1, self.touches[1].1);
                        }
                        false
                    }
                }
            }
            PointerInput::Cancel => {
                self.mouse_down = false;
                self.touches.clear();
                self.multi_touch = false;
                camera.cancel_drag();
                camera.end_pinch();
                false
            }
        }
    }

    fn finish_drag(
        &mut self,
        ended: Option<DragEnd>,
        camera: &Camera,
        project: &mut Project,
        status: &mut dyn StatusSink,
    ) -> bool {
        match ended {
            Some(DragEnd::Click(pos)) => {
                if let Some((x, y)) = camera.screen_to_cell(pos) {
                    self.on_tile_click(x, y, project, status);
                }
                true
            }
            Some(DragEnd::Pan) => true,
            None => false,
        }
    }

    // ========================================================================
    // TOOLBAR
    // ========================================================================

    pub fn show_toolbar(
        &mut self,
        ui: &mut egui::Ui,
        project: &mut Project,
        camera: &mut Camera,
        status: &mut dyn StatusSink,
    ) {
        ui.horizontal(|ui| {
            if ui.selectable_label(self.mode == ToolMode::Paint, "✏ Paint").clicked() {
                self.toggle_paint();
            }
            if ui.selectable_label(self.mode == ToolMode::Bucket, "🪣 Bucket").clicked() {
                self.toggle_bucket();
            }
            let hl_label = match self.highlighted_code() {
                Some(code) => format!("🔦 Highlight ({})", code),
                None => "🔦 Highlight".to_string(),
            };
            if ui.selectable_label(self.highlight_active, hl_label).clicked() {
                self.toggle_highlight();
            }
            if ui.selectable_label(self.high_contrast, "◐ Contrast").clicked() {
                self.toggle_contrast();
            }

            ui.separator();

            if ui
                .add_enabled(project.can_undo(), egui::Button::new("↶ Undo"))
                .clicked()
            {
                self.undo(project, status);
            }

            ui.separator();

            if ui.button("−").on_hover_text("Zoom out").clicked() {
                camera.zoom_out();
            }
            ui.label(format!("{:.0}%", camera.zoom() * 100.0));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                camera.zoom_in();
            }
            if ui.button("Fit").on_hover_text("Fit chart to window").clicked() {
                camera.reset_to_fit();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CameraLimits;
    use crate::pattern::tests::{entry, two_color_palette};
    use crate::pattern::{Palette, Pattern, STITCHED_CODE};
    use egui::{Rect, Vec2};

    fn r1_project(cols: u32, rows: u32) -> Project {
        let palette = Palette::new(vec![entry("1", "R1", [200, 0, 0], "R")]);
        Project::from_pattern(Pattern::filled(cols, rows, palette, "R1"), None)
    }

    /// 10x10 chart at 20px tiles in a 200x200 viewport: one cell per 20px.
    fn camera_10() -> Camera {
        let mut cam = Camera::new(10, 10, CameraLimits::default());
        cam.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::splat(200.0)));
        cam
    }

    fn click(
        ctl: &mut InteractionController,
        cam: &mut Camera,
        project: &mut Project,
        status: &mut Vec<String>,
        at: Pos2,
    ) {
        ctl.handle_input(PointerInput::Down(at), cam, project, status);
        ctl.handle_input(PointerInput::Up(at), cam, project, status);
    }

    #[test]
    fn bucket_fill_whole_chart_then_undo() {
        let mut project = r1_project(10, 10);
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_bucket();

        assert_eq!(ctl.on_tile_click(0, 0, &mut project, &mut status), TileAction::Painted(100));
        assert_eq!(project.color_ledger().count_of("R1"), 0);
        assert_eq!(project.color_ledger().count_of(STITCHED_CODE), 100);
        assert_eq!(status.last().map(String::as_str), Some("100 stitches painted"));

        assert!(ctl.undo(&mut project, &mut status));
        assert_eq!(project.color_ledger().count_of("R1"), 100);
        assert_eq!(project.color_ledger().count_of(STITCHED_CODE), 0);
        assert_eq!(status.last().map(String::as_str), Some("Change undone"));
        assert!(!ctl.undo(&mut project, &mut status));
    }

    #[test]
    fn large_fill_waits_for_confirmation() {
        let mut project = r1_project(11, 10);
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_bucket();

        assert_eq!(ctl.on_tile_click(3, 3, &mut project, &mut status), TileAction::FillPending(110));
        assert!(project.store().changes().is_empty());
        assert_eq!(ctl.confirm_pending_fill(false, &mut project, &mut status), 0);
        assert!(ctl.pending_fill().is_none());
        assert!(project.store().changes().is_empty());

        ctl.on_tile_click(3, 3, &mut project, &mut status);
        assert_eq!(ctl.confirm_pending_fill(true, &mut project, &mut status), 110);
        assert_eq!(project.store().changes().current_id(), 1);
    }

    #[test]
    fn raised_threshold_fills_without_asking() {
        let mut project = r1_project(11, 10);
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.set_fill_confirm_threshold(110);
        assert_eq!(ctl.fill_confirm_threshold(), 110);
        ctl.toggle_bucket();

        assert_eq!(ctl.on_tile_click(3, 3, &mut project, &mut status), TileAction::Painted(110));
        assert!(ctl.pending_fill().is_none());
        assert_eq!(status.last().map(String::as_str), Some("110 stitches painted"));
    }

    #[test]
    fn paint_reports_single_stitch() {
        let mut project = r1_project(3, 3);
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_paint();
        assert_eq!(ctl.on_tile_click(1, 2, &mut project, &mut status), TileAction::Painted(1));
        assert_eq!(status, vec!["Tile (X: 2, Y: 3) - Code: R1 - Floss R1", "1 stitch painted"]);
        assert_eq!(ctl.on_tile_click(1, 2, &mut project, &mut status), TileAction::Painted(0));
    }

    #[test]
    fn highlight_filters_paint_to_selected_color() {
        let pattern = Pattern::decode(2, 1, two_color_palette(), "1-1,1-2").unwrap();
        let mut project = Project::from_pattern(pattern, None);
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();

        ctl.toggle_highlight();
        assert_eq!(
            ctl.on_tile_click(0, 0, &mut project, &mut status),
            TileAction::Selected("310".to_string())
        );
        assert_eq!(status.last().map(String::as_str), Some("Selected color: 310 - Floss 310"));
        assert_eq!(ctl.visual_mode(true).highlighted.as_deref(), Some("310"));

        ctl.toggle_paint();
        assert_eq!(ctl.on_tile_click(1, 0, &mut project, &mut status), TileAction::Filtered);
        assert_eq!(ctl.on_tile_click(0, 0, &mut project, &mut status), TileAction::Painted(1));

        ctl.toggle_highlight();
        assert_eq!(ctl.visual_mode(true).highlighted, None);
        assert_eq!(ctl.on_tile_click(1, 0, &mut project, &mut status), TileAction::Painted(1));
    }

    #[test]
    fn paint_and_bucket_exclude_each_other() {
        let mut ctl = InteractionController::default();
        ctl.toggle_highlight();
        ctl.toggle_paint();
        ctl.toggle_bucket();
        assert_eq!(ctl.mode, ToolMode::Bucket);
        assert!(ctl.highlight_active());
        ctl.toggle_bucket();
        assert_eq!(ctl.mode, ToolMode::None);
        assert!(ctl.highlight_active());
    }

    #[test]
    fn click_paints_but_drag_does_not() {
        let mut project = r1_project(10, 10);
        let mut cam = camera_10();
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_paint();

        click(&mut ctl, &mut cam, &mut project, &mut status, Pos2::new(10.0, 10.0));
        assert_eq!(project.store().merged_cell_at(0, 0), Some(STITCHED_CODE));

        ctl.handle_input(PointerInput::Down(Pos2::new(30.0, 10.0)), &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::Up(Pos2::new(35.0, 10.0)), &mut cam, &mut project, &mut status);
        assert_eq!(project.store().changes().len(), 1);
    }

    #[test]
    fn clicks_outside_grid_are_ignored() {
        let mut project = r1_project(10, 10);
        let mut cam = camera_10();
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_paint();
        cam.pan_by(Vec2::new(100.0, 0.0));
        click(&mut ctl, &mut cam, &mut project, &mut status, Pos2::new(50.0, 10.0));
        assert!(status.is_empty());
        assert!(project.store().changes().is_empty());
    }

    #[test]
    fn wheel_zoom_reaches_camera() {
        let mut project = r1_project(10, 10);
        let mut cam = camera_10();
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        let zoom = PointerInput::Zoom { pos: Pos2::new(100.0, 100.0), factor: 1.5 };
        assert!(ctl.handle_input(zoom, &mut cam, &mut project, &mut status));
        assert!((cam.zoom() - 1.5).abs() < 1e-5);
    }

    #[test]
    fn single_tap_clicks_and_emulated_mouse_is_ignored() {
        let mut project = r1_project(10, 10);
        let mut cam = camera_10();
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_paint();
        let at = Pos2::new(50.0, 50.0);

        ctl.handle_input(PointerInput::TouchStart { id: 1, pos: at }, &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::Down(at), &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::TouchEnd { id: 1, pos: at }, &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::Up(at), &mut cam, &mut project, &mut status);

        assert_eq!(project.store().changes().len(), 1);
        assert_eq!(project.store().merged_cell_at(2, 2), Some(STITCHED_CODE));
    }

    #[test]
    fn two_finger_gesture_never_clicks() {
        let mut project = r1_project(10, 10);
        let mut cam = camera_10();
        let mut ctl = InteractionController::default();
        let mut status = Vec::new();
        ctl.toggle_paint();
        let a = Pos2::new(50.0, 50.0);
        let b = Pos2::new(100.0, 50.0);

        ctl.handle_input(PointerInput::TouchStart { id: 1, pos: a }, &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::TouchStart { id: 2, pos: b }, &mut cam, &mut project, &mut status);
        assert!(cam.is_pinching());
        let b2 = Pos2::new(150.0, 50.0);
        assert!(ctl.handle_input(PointerInput::TouchMove { id: 2, pos: b2 }, &mut cam, &mut project, &mut status));
        assert!((cam.zoom() - 2.0).abs() < 1e-4);
        ctl.handle_input(PointerInput::TouchEnd { id: 2, pos: b2 }, &mut cam, &mut project, &mut status);
        ctl.handle_input(PointerInput::TouchEnd { id: 1, pos: a }, &mut cam, &mut project, &mut status);

        assert!(project.store().changes().is_empty());
        assert!(!cam.is_pinching());
    }
}
