use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use uuid::Uuid;

use crate::components::fill::PendingFill;
use crate::project::Project;
use crate::raster::render_preview;

/// Longest edge of the preview image.
pub const DEFAULT_PREVIEW_BOX: u32 = 320;

// ============================================================================
// FILL CONFIRMATION
// ============================================================================

/// Modal asking whether a large fill should be committed.
/// Returns `Some(true)` on confirm, `Some(false)` on cancel, `None` while open.
pub fn show_fill_confirm(ctx: &egui::Context, pending: &PendingFill) -> Option<bool> {
    // Keyboard: Enter = Fill, Esc = Cancel
    if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter)) {
        return Some(true);
    }
    if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape)) {
        return Some(false);
    }

    let mut result = None;
    egui::Window::new("Confirm fill")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.set_min_width(280.0);
            ui.label(format!(
                "This will mark {} cells of {} as stitched.",
                pending.len(),
                pending.target_code
            ));
            ui.label("Continue?");
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("Fill").clicked() {
                    result = Some(true);
                }
                if ui.button("Cancel").clicked() {
                    result = Some(false);
                }
            });
        });
    result
}

// ============================================================================
// ERROR WINDOW
// ============================================================================

#[derive(Default)]
pub struct ErrorDialog {
    title: String,
    message: Option<String>,
}

impl ErrorDialog {
    pub fn open(&mut self, title: &str, message: impl Into<String>) {
        self.title = title.to_string();
        self.message = Some(message.into());
    }

    pub fn is_open(&self) -> bool {
        self.message.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        let Some(message) = self.message.as_deref() else { return };
        let mut close = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape));

        egui::Window::new(self.title.as_str())
            .id(egui::Id::new("error_dialog_internal"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(300.0);
                ui.colored_label(ui.visuals().error_fg_color, message);
                ui.add_space(6.0);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });

        if close {
            self.message = None;
        }
    }
}

// ============================================================================
// PREVIEW WINDOW
// ============================================================================

/// Thumbnail of the merged chart.  Re-rendered only when the project or its
/// change log moves.
pub struct PreviewWindow {
    pub open: bool,
    pub box_px: u32,
    texture: Option<TextureHandle>,
    /// (project id, change id, change count) the texture was built for.
    built_for: Option<(Uuid, u64, usize)>,
}

impl Default for PreviewWindow {
    fn default() -> Self {
        Self {
            open: false,
            box_px: DEFAULT_PREVIEW_BOX,
            texture: None,
            built_for: None,
        }
    }
}

impl PreviewWindow {
    fn key(project: &Project) -> (Uuid, u64, usize) {
        let changes = project.store().changes();
        (project.id, changes.current_id(), changes.len())
    }

    pub fn show(&mut self, ctx: &egui::Context, project: &Project) {
        if !self.open {
            return;
        }
        let key = Self::key(project);
        if self.built_for != Some(key) || self.texture.is_none() {
            let image = render_preview(project.store(), self.box_px);
            let size = [image.width() as usize, image.height() as usize];
            let color_image = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
            self.texture = Some(ctx.load_texture("chart_preview", color_image, TextureOptions::NEAREST));
            self.built_for = Some(key);
        }

        let mut open = self.open;
        egui::Window::new("Preview")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                if let Some(texture) = &self.texture {
                    ui.add(egui::Image::from_texture(egui::load::SizedTexture::from_handle(texture)));
                }
                let ledger = project.color_ledger();
                ui.label(format!("{:.1}% complete", ledger.completion_percent()));
            });
        self.open = open;
    }
}
