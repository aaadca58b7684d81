use eframe::egui;
use egui::{Color32, Pos2, Rect, Stroke, Vec2};

use crate::components::path::PlannedPath;
use crate::components::tools::{InteractionController, PointerInput, StatusSink};
use crate::glyphs::GlyphCache;
use crate::project::Project;
use crate::settings::AppSettings;

// ============================================================================
// CAMERA LIMITS
// ============================================================================

/// Size bounds shared by the raster and the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraLimits {
    /// Longest raster edge in pixels.
    pub max_raster_edge: u32,
    pub min_tile_px: u32,
    pub max_tile_px: u32,
    /// Upper bound on one cell's on-screen size.
    pub max_cell_screen_px: f32,
    /// Pointer travel (screen px) still treated as a click.
    pub click_slop_px: f32,
}

impl Default for CameraLimits {
    fn default() -> Self {
        Self {
            max_raster_edge: 4096,
            min_tile_px: 4,
            max_tile_px: 20,
            max_cell_screen_px: 64.0,
            click_slop_px: 3.0,
        }
    }
}

impl CameraLimits {
    /// Raster pixels per cell.  The minimum wins over the edge cap, so very
    /// large charts produce a raster wider than `max_raster_edge`; the canvas
    /// reports when that raster no longer fits a GPU texture.
    pub fn tile_size(&self, cols: u32, rows: u32) -> u32 {
        let longest = cols.max(rows).max(1);
        (self.max_raster_edge / longest)
            .min(self.max_tile_px)
            .max(self.min_tile_px)
            .max(1)
    }
}

/// Half-open cell rectangle: `min_x..max_x` by `min_y..max_y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl CellRect {
    pub fn full(cols: u32, rows: u32) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: cols,
            max_y: rows,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    pub fn contains_rect(&self, other: &CellRect) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

// ============================================================================
// CAMERA — zoom + pan over the chart raster
// ============================================================================

/// How a pointer press ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragEnd {
    /// Released without leaving the slop radius.
    Click(Pos2),
    Pan,
}

#[derive(Clone, Copy, Debug)]
struct DragState {
    press: Pos2,
    last: Pos2,
    panning: bool,
}

#[derive(Clone, Copy, Debug)]
struct PinchState {
    start_distance: f32,
    start_zoom: f32,
    /// World point that was under the midpoint when the pinch began.
    anchor_world: Pos2,
}

/// Maps between screen space, world space (raster pixels) and cells.
///
/// `screen = viewport.center + pan + (world - world_size / 2) * zoom`
#[derive(Clone, Debug)]
pub struct Camera {
    zoom: f32,
    pan_offset: Vec2,
    viewport: Rect,
    cols: u32,
    rows: u32,
    tile: u32,
    limits: CameraLimits,
    min_zoom: f32,
    max_zoom: f32,
    drag: Option<DragState>,
    pinch: Option<PinchState>,
}

impl Camera {
    pub fn new(cols: u32, rows: u32, limits: CameraLimits) -> Self {
        let mut camera = Self {
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::ZERO),
            cols,
            rows,
            tile: limits.tile_size(cols, rows),
            limits,
            min_zoom: 1.0,
            max_zoom: 1.0,
            drag: None,
            pinch: None,
        };
        camera.update_zoom_range();
        camera
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn min_zoom(&self) -> f32 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> f32 {
        self.max_zoom
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.pan_offset
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn tile_size(&self) -> u32 {
        self.tile
    }

    pub fn limits(&self) -> CameraLimits {
        self.limits
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    /// Raster size in world pixels.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            (self.cols * self.tile) as f32,
            (self.rows * self.tile) as f32,
        )
    }

    fn has_viewport(&self) -> bool {
        self.viewport.width() > 0.0 && self.viewport.height() > 0.0
    }

    fn update_zoom_range(&mut self) {
        let world = self.world_size();
        let fit = if self.has_viewport() && world.x > 0.0 && world.y > 0.0 {
            (self.viewport.width() / world.x).min(self.viewport.height() / world.y)
        } else {
            1.0
        };
        self.min_zoom = fit;
        self.max_zoom = (self.limits.max_cell_screen_px / self.tile as f32).max(fit);
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Track the on-screen canvas rect.  The first real viewport fits the
    /// whole chart.
    pub fn set_viewport(&mut self, rect: Rect) {
        if rect == self.viewport {
            return;
        }
        let first = !self.has_viewport();
        self.viewport = rect;
        self.update_zoom_range();
        if first && self.has_viewport() {
            self.reset_to_fit();
        }
    }

    pub fn set_limits(&mut self, limits: CameraLimits) {
        if limits == self.limits {
            return;
        }
        self.limits = limits;
        self.tile = limits.tile_size(self.cols, self.rows);
        self.update_zoom_range();
    }

    pub fn image_rect(&self) -> Rect {
        Rect::from_center_size(
            self.viewport.center() + self.pan_offset,
            self.world_size() * self.zoom,
        )
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        let half = self.world_size() / 2.0;
        let rel = (screen - self.viewport.center() - self.pan_offset) / self.zoom;
        Pos2::new(rel.x + half.x, rel.y + half.y)
    }

    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        let half = self.world_size() / 2.0;
        self.viewport.center() + self.pan_offset + (world.to_vec2() - half) * self.zoom
    }

    pub fn world_to_cell(&self, world: Pos2) -> Option<(u32, u32)> {
        if !(world.x >= 0.0 && world.y >= 0.0) {
            return None;
        }
        let x = (world.x / self.tile as f32).floor() as u32;
        let y = (world.y / self.tile as f32).floor() as u32;
        (x < self.cols && y < self.rows).then_some((x, y))
    }

    pub fn screen_to_cell(&self, screen: Pos2) -> Option<(u32, u32)> {
        self.world_to_cell(self.screen_to_world(screen))
    }

    /// Screen position of the centre of cell (x, y).
    pub fn cell_center_screen(&self, x: u32, y: u32) -> Pos2 {
        let t = self.tile as f32;
        self.world_to_screen(Pos2::new((x as f32 + 0.5) * t, (y as f32 + 0.5) * t))
    }

    /// On-screen size of one cell.
    pub fn cell_screen_px(&self) -> f32 {
        self.tile as f32 * self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom while keeping a screen-space point fixed (e.g. under the cursor).
    pub fn zoom_around_screen_point(&mut self, zoom_factor: f32, anchor: Pos2) {
        let world = self.screen_to_world(anchor);
        self.set_zoom(self.zoom * zoom_factor);
        self.pin_world_to_screen(world, anchor);
    }

    /// Adjust pan so `world` lands on `screen` at the current zoom.
    fn pin_world_to_screen(&mut self, world: Pos2, screen: Pos2) {
        let half = self.world_size() / 2.0;
        self.pan_offset = screen - self.viewport.center() - (world.to_vec2() - half) * self.zoom;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan_offset += delta;
    }

    pub fn zoom_in(&mut self) {
        self.zoom_around_screen_point(1.2, self.viewport.center());
    }

    pub fn zoom_out(&mut self) {
        self.zoom_around_screen_point(1.0 / 1.2, self.viewport.center());
    }

    pub fn reset_to_fit(&mut self) {
        self.zoom = self.min_zoom;
        self.pan_offset = Vec2::ZERO;
    }

    // ---- drag (pan vs click) ------------------------------------------------

    pub fn begin_drag(&mut self, pos: Pos2) {
        self.drag = Some(DragState {
            press: pos,
            last: pos,
            panning: false,
        });
    }

    /// Returns true when the camera moved.
    pub fn continue_drag(&mut self, pos: Pos2) -> bool {
        let slop = self.limits.click_slop_px;
        let Some(drag) = self.drag.as_mut() else { return false };
        if !drag.panning && (pos - drag.press).length() > slop {
            drag.panning = true;
        }
        if !drag.panning {
            return false;
        }
        let delta = pos - drag.last;
        drag.last = pos;
        self.pan_offset += delta;
        delta != Vec2::ZERO
    }

    pub fn end_drag(&mut self, pos: Pos2) -> Option<DragEnd> {
        let drag = self.drag.take()?;
        if !drag.panning && (pos - drag.press).length() <= self.limits.click_slop_px {
            return Some(DragEnd::Click(pos));
        }
        self.pan_offset += pos - drag.last;
        Some(DragEnd::Pan)
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    // ---- pinch --------------------------------------------------------------

    pub fn begin_pinch(&mut self, a: Pos2, b: Pos2) {
        self.drag = None;
        let mid = a.lerp(b, 0.5);
        self.pinch = Some(PinchState {
            start_distance: a.distance(b).max(1.0),
            start_zoom: self.zoom,
            anchor_world: self.screen_to_world(mid),
        });
    }

    pub fn update_pinch(&mut self, a: Pos2, b: Pos2) -> bool {
        let Some(pinch) = self.pinch else { return false };
        let distance = a.distance(b).max(1.0);
        self.set_zoom(pinch.start_zoom * distance / pinch.start_distance);
        self.pin_world_to_screen(pinch.anchor_world, a.lerp(b, 0.5));
        true
    }

    pub fn end_pinch(&mut self) {
        self.pinch = None;
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// Cells intersecting the viewport, or `None` when nothing is on screen.
    pub fn visible_cells(&self) -> Option<CellRect> {
        let visible = self.image_rect().intersect(self.viewport);
        if visible.width() <= 0.0 || visible.height() <= 0.0 {
            return None;
        }
        let t = self.tile as f32;
        let min = self.screen_to_world(visible.min);
        let max = self.screen_to_world(visible.max);
        let rect = CellRect {
            min_x: ((min.x / t).floor().max(0.0) as u32).min(self.cols),
            min_y: ((min.y / t).floor().max(0.0) as u32).min(self.rows),
            max_x: ((max.x / t).ceil().max(0.0) as u32).min(self.cols),
            max_y: ((max.y / t).ceil().max(0.0) as u32).min(self.rows),
        };
        (!rect.is_empty()).then_some(rect)
    }
}

// ============================================================================
// RENDER SCHEDULER
// ============================================================================

/// Coalesces repaint requests: any number of `request` calls between two
/// frames produce a single repaint.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: bool,
}

impl RenderScheduler {
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending request, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn flush(&mut self, ctx: &egui::Context) {
        if self.take() {
            ctx.request_repaint();
        }
    }
}

// ============================================================================
// CANVAS WIDGET
// ============================================================================

/// Paper behind and around the chart.
pub const CANVAS_BACKGROUND: Color32 = Color32::from_gray(230);

pub struct Canvas {
    pub camera: Camera,
    pub scheduler: RenderScheduler,
    pub last_canvas_rect: Option<Rect>,
    /// Set once the user was told the raster cannot be drawn.
    oversize_reported: bool,
}

impl Canvas {
    pub fn new(cols: u32, rows: u32, limits: CameraLimits) -> Self {
        Self {
            camera: Camera::new(cols, rows, limits),
            scheduler: RenderScheduler::default(),
            last_canvas_rect: None,
            oversize_reported: false,
        }
    }

    /// Lay out the canvas, feed this frame's pointer events to the
    /// controller, then composite the raster and the path overlay.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        project: &mut Project,
        controller: &mut InteractionController,
        glyphs: &mut GlyphCache,
        settings: &AppSettings,
        path: Option<&PlannedPath>,
        interactive: bool,
        status: &mut dyn StatusSink,
    ) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        self.last_canvas_rect = Some(canvas_rect);
        self.camera.set_limits(settings.camera_limits());
        self.camera.set_viewport(canvas_rect);

        if interactive {
            let inputs = collect_pointer_inputs(ui, canvas_rect, settings.scroll_sensitivity);
            for input in inputs {
                if controller.handle_input(input, &mut self.camera, project, status) {
                    self.scheduler.request();
                }
            }
        } else {
            self.camera.cancel_drag();
            self.camera.end_pinch();
        }

        let mode = controller.visual_mode(settings.show_symbols);
        let coverage = if settings.visible_only_raster {
            self.camera.visible_cells()
        } else {
            None
        };
        let tile = self.camera.tile_size();
        if project.refresh_raster(&mode, glyphs, tile, coverage) {
            self.scheduler.request();
        }

        painter.rect_filled(canvas_rect, 0.0, CANVAS_BACKGROUND);
        if project.raster_mut().composite(ui.ctx(), &painter, &self.camera) {
            self.oversize_reported = false;
        } else {
            let max_side = ui.ctx().input(|i| i.max_texture_side);
            if let Some((w, h)) = project.raster().oversize(max_side) {
                let message = oversize_message(w, h, max_side);
                painter.text(
                    canvas_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    &message,
                    egui::FontId::proportional(16.0),
                    ui.visuals().error_fg_color,
                );
                if !self.oversize_reported {
                    status.report_status(&message);
                    self.oversize_reported = true;
                }
            }
        }

        if let Some(path) = path {
            draw_path_overlay(&painter, &self.camera, path);
        }

        if let Some(pos) = response.hover_pos()
            && let Some((x, y)) = self.camera.screen_to_cell(pos)
        {
            let cell = Rect::from_center_size(
                self.camera.cell_center_screen(x, y),
                Vec2::splat(self.camera.cell_screen_px()),
            );
            painter.rect_stroke(cell, 0.0, Stroke::new(1.5, Color32::from_rgb(66, 133, 244)));
        }

        self.scheduler.flush(ui.ctx());
    }
}

fn oversize_message(width: u32, height: u32, max_side: usize) -> String {
    format!(
        "Chart is too large to display: {}x{} px raster exceeds the GPU limit of {} px",
        width, height, max_side
    )
}

/// Translate this frame's raw egui events into controller inputs.
/// Presses, wheel and touch starts only count when they land on the canvas
/// layer; moves and releases are always forwarded so drags can leave it.
fn collect_pointer_inputs(ui: &egui::Ui, canvas_rect: Rect, scroll_sensitivity: f32) -> Vec<PointerInput> {
    let ctx = ui.ctx();
    let layer = ui.layer_id();
    let on_canvas =
        |pos: Pos2| canvas_rect.contains(pos) && ctx.layer_id_at(pos).is_none_or(|l| l == layer);

    let (hover, events) = ui.input(|i| (i.pointer.hover_pos(), i.events.clone()));
    let mut out = Vec::new();
    for event in &events {
        match event {
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                ..
            } => {
                if *pressed {
                    if on_canvas(*pos) {
                        out.push(PointerInput::Down(*pos));
                    }
                } else {
                    out.push(PointerInput::Up(*pos));
                }
            }
            egui::Event::PointerMoved(pos) => out.push(PointerInput::Move(*pos)),
            egui::Event::Scroll(delta) => {
                if let Some(pos) = hover
                    && on_canvas(pos)
                    && delta.y.abs() > 0.1
                {
                    let factor = (1.0 + delta.y * 0.005 * scroll_sensitivity).clamp(0.5, 2.0);
                    out.push(PointerInput::Zoom { pos, factor });
                }
            }
            egui::Event::Zoom(factor) => {
                if let Some(pos) = hover
                    && on_canvas(pos)
                {
                    out.push(PointerInput::Zoom { pos, factor: *factor });
                }
            }
            egui::Event::Touch { id, phase, pos, .. } => {
                let id = id.0;
                match phase {
                    egui::TouchPhase::Start => {
                        if on_canvas(*pos) {
                            out.push(PointerInput::TouchStart { id, pos: *pos });
                        }
                    }
                    egui::TouchPhase::Move => out.push(PointerInput::TouchMove { id, pos: *pos }),
                    egui::TouchPhase::End | egui::TouchPhase::Cancel => {
                        out.push(PointerInput::TouchEnd { id, pos: *pos })
                    }
                }
            }
            egui::Event::PointerGone => out.push(PointerInput::Cancel),
            _ => {}
        }
    }
    out
}

/// Lines between consecutive clusters; long hops in red.
fn draw_path_overlay(painter: &egui::Painter, camera: &Camera, path: &PlannedPath) {
    let width = (camera.cell_screen_px() * 0.15).clamp(1.0, 4.0);
    let normal = Stroke::new(width, Color32::from_rgb(30, 110, 230));
    let long = Stroke::new(width, Color32::from_rgb(220, 40, 40));

    for seg in &path.segments {
        let a = camera.cell_center_screen(seg.from_cell.0, seg.from_cell.1);
        let b = camera.cell_center_screen(seg.to_cell.0, seg.to_cell.1);
        painter.line_segment([a, b], if seg.long_hop { long } else { normal });
    }
    if let Some((x, y)) = path.start_cell() {
        painter.circle_filled(camera.cell_center_screen(x, y), width * 2.0, normal.color);
    }
}
