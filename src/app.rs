use std::path::{Path, PathBuf};

use eframe::egui;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::canvas::Canvas;
use crate::components::colors::FlossPanel;
use crate::components::dialogs::{ErrorDialog, PreviewWindow, show_fill_confirm};
use crate::components::path::{PlannedPath, StartStrategy, plan_path};
use crate::components::tools::{InteractionController, StatusSink};
use crate::glyphs::GlyphCache;
use crate::io::{FileHandler, default_export_name};
use crate::project::Project;
use crate::settings::AppSettings;

/// Start choices offered in the Path menu.  `Point` is filled in with the
/// cell under the viewport centre when planning.
const PATH_STARTS: [StartStrategy; 4] = [
    StartStrategy::TopLeft,
    StartStrategy::Center,
    StartStrategy::Point(0, 0),
    StartStrategy::Random,
];

pub struct StitchApp {
    settings: AppSettings,
    project: Option<Project>,
    canvas: Option<Canvas>,
    controller: InteractionController,
    glyphs: GlyphCache,
    file_handler: FileHandler,
    floss_panel: FlossPanel,
    error_dialog: ErrorDialog,
    preview: PreviewWindow,
    status: String,

    // -- Path planning --
    path: Option<PlannedPath>,
    /// (change id, change count) the path was planned against.
    path_built_for: Option<(u64, usize)>,
    path_start: StartStrategy,
    rng: StdRng,
}

impl StitchApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup_files: Vec<PathBuf>) -> Self {
        let settings = AppSettings::load();
        let controller = InteractionController::new(settings.fill_confirm_threshold);
        let mut app = Self {
            settings,
            project: None,
            canvas: None,
            controller,
            glyphs: GlyphCache::with_system_font(),
            file_handler: FileHandler::new(),
            floss_panel: FlossPanel::default(),
            error_dialog: ErrorDialog::default(),
            preview: PreviewWindow::default(),
            status: "Open a pattern to begin".to_string(),
            path: None,
            path_built_for: None,
            path_start: StartStrategy::TopLeft,
            rng: StdRng::from_entropy(),
        };

        if let Some(first) = startup_files.first() {
            app.open_path(first);
        } else if let Some(first) = app.file_handler.next_in_playlist(&app.settings.pattern_playlist) {
            let first = first.to_path_buf();
            app.open_path(&first);
        }
        app
    }

    // ========================================================================
    // FILE HANDLING
    // ========================================================================

    /// Load `path` as the active project.  On failure the current project
    /// stays open and an error window is shown.
    fn open_path(&mut self, path: &Path) {
        match Project::open(path) {
            Ok(project) => {
                let limits = self.settings.camera_limits();
                self.canvas = Some(Canvas::new(project.store().cols(), project.store().rows(), limits));
                self.project = Some(project);
                self.path = None;
                self.path_built_for = None;
                self.controller.on_pattern_loaded(&mut self.status);
            }
            Err(e) => {
                crate::log_err!("Failed to open {}: {}", path.display(), e);
                self.error_dialog.open("Could not open pattern", e.to_string());
            }
        }
    }

    fn handle_open_file(&mut self) {
        if let Some(path) = self.file_handler.pick_open_path() {
            self.open_path(&path);
        }
    }

    fn handle_next_pattern(&mut self) {
        match self.file_handler.next_in_playlist(&self.settings.pattern_playlist) {
            Some(path) => {
                let path = path.to_path_buf();
                self.open_path(&path);
            }
            None => self.status.report_status("No pattern playlist configured"),
        }
    }

    fn handle_export(&mut self) {
        let Some(project) = self.project.as_mut() else { return };
        let Some(path) = self.file_handler.pick_save_path(&default_export_name(&project.name)) else {
            return;
        };
        match project.save_to(&path) {
            Ok(()) => self.status.report_status(&format!("Exported to {}", path.display())),
            Err(e) => {
                crate::log_err!("Export to {} failed: {}", path.display(), e);
                self.error_dialog.open("Could not export pattern", e.to_string());
            }
        }
    }

    fn handle_reset(&mut self) {
        if let Some(project) = self.project.as_mut() {
            project.reset();
            self.status.report_status("All changes reset");
        }
    }

    // ========================================================================
    // PATH PLANNING
    // ========================================================================

    fn plan_highlighted_path(&mut self) {
        let Some(project) = self.project.as_ref() else { return };
        let Some(code) = self.controller.highlighted_code().map(str::to_string) else {
            self.status.report_status("Select a color to plan a path");
            return;
        };
        let strategy = match self.path_start {
            StartStrategy::Point(..) => {
                let centre = self
                    .canvas
                    .as_ref()
                    .and_then(|c| c.camera.screen_to_cell(c.camera.viewport().center()));
                match centre {
                    Some((x, y)) => StartStrategy::Point(x, y),
                    None => StartStrategy::Center,
                }
            }
            other => other,
        };
        self.path = plan_path(project.store(), &code, strategy, self.settings.path_threshold, &mut self.rng);
        let changes = project.store().changes();
        self.path_built_for = Some((changes.current_id(), changes.len()));
        match &self.path {
            Some(path) => self.status.report_status(&format!(
                "Path for {}: {} clusters, {} long hops",
                code,
                path.clusters.len(),
                path.long_hops()
            )),
            None => self.status.report_status(&format!("No cells of {} left", code)),
        }
    }

    /// Drop the planned path once the chart has changed under it.
    fn expire_stale_path(&mut self) {
        let Some(project) = self.project.as_ref() else { return };
        let changes = project.store().changes();
        if self.path.is_some() && self.path_built_for != Some((changes.current_id(), changes.len())) {
            self.path = None;
            self.path_built_for = None;
        }
    }

    // ========================================================================
    // KEYBOARD
    // ========================================================================

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let ctrl = |key| ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, key));
        let plain = |key| ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, key));

        if ctrl(egui::Key::O) {
            self.handle_open_file();
        }
        if ctrl(egui::Key::S) {
            self.handle_export();
        }
        let Some(project) = self.project.as_mut() else { return };
        if ctrl(egui::Key::Z) {
            self.controller.undo(project, &mut self.status);
        }
        if plain(egui::Key::P) {
            self.controller.toggle_paint();
        }
        if plain(egui::Key::B) {
            self.controller.toggle_bucket();
        }
        if plain(egui::Key::H) {
            self.controller.toggle_highlight();
        }
        if plain(egui::Key::C) {
            self.controller.toggle_contrast();
        }
        if let Some(canvas) = self.canvas.as_mut() {
            if plain(egui::Key::PlusEquals) {
                canvas.camera.zoom_in();
            }
            if plain(egui::Key::Minus) {
                canvas.camera.zoom_out();
            }
            if plain(egui::Key::Num0) {
                canvas.camera.reset_to_fit();
            }
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open…").clicked() {
                        self.handle_open_file();
                        ui.close_menu();
                    }
                    if ui.button("Next pattern").clicked() {
                        self.handle_next_pattern();
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_project = self.project.is_some();
                    if ui.add_enabled(has_project, egui::Button::new("Export…")).clicked() {
                        self.handle_export();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_project, egui::Button::new("Reset all changes")).clicked() {
                        self.handle_reset();
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    let mut changed = ui.checkbox(&mut self.settings.show_symbols, "Symbols").changed();
                    changed |= ui
                        .checkbox(&mut self.settings.visible_only_raster, "Render visible cells only")
                        .changed();
                    ui.horizontal(|ui| {
                        ui.label("Confirm fills over");
                        let threshold = ui.add(
                            egui::DragValue::new(&mut self.settings.fill_confirm_threshold)
                                .clamp_range(1..=100_000)
                                .suffix(" cells"),
                        );
                        if threshold.changed() {
                            self.controller
                                .set_fill_confirm_threshold(self.settings.fill_confirm_threshold);
                            changed = true;
                        }
                    });
                    if changed {
                        self.settings.save();
                    }
                    ui.separator();
                    ui.checkbox(&mut self.preview.open, "Preview window");
                });

                ui.menu_button("Path", |ui| {
                    for start in PATH_STARTS {
                        let selected = std::mem::discriminant(&self.path_start) == std::mem::discriminant(&start);
                        if ui.selectable_label(selected, format!("Start: {}", start.label())).clicked() {
                            self.path_start = start;
                        }
                    }
                    ui.separator();
                    if ui.button("Plan path for highlighted color").clicked() {
                        self.plan_highlighted_path();
                        ui.close_menu();
                    }
                    if ui.add_enabled(self.path.is_some(), egui::Button::new("Clear path")).clicked() {
                        self.path = None;
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(project) = &self.project {
                        let info = project.store().info();
                        ui.label(format!(
                            "{} · {:.1}% · {}",
                            info.dimensions(),
                            info.completion_percent,
                            self.controller.mode.label()
                        ));
                    }
                    if let Some(canvas) = &self.canvas {
                        ui.label(format!("{:.0}%", canvas.camera.zoom() * 100.0));
                    }
                });
            });
        });
    }
}

impl eframe::App for StitchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Dynamic window title: "StitchFE - <name>[*]" ---
        let title = match &self.project {
            Some(project) => format!("StitchFE - {}", project.display_title()),
            None => "StitchFE".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        // --- Dropped files: open the first one ---
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.into_iter().find_map(|f| f.path) {
            self.open_path(&path);
        }

        let modal_open = self.controller.pending_fill().is_some() || self.error_dialog.is_open();
        if !modal_open {
            self.handle_shortcuts(ctx);
        }

        self.show_menu_bar(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            match (self.project.as_mut(), self.canvas.as_mut()) {
                (Some(project), Some(canvas)) => {
                    self.controller
                        .show_toolbar(ui, project, &mut canvas.camera, &mut self.status);
                }
                _ => {
                    ui.label("No pattern loaded");
                }
            }
        });

        self.show_status_bar(ctx);

        if let Some(project) = &self.project {
            egui::SidePanel::right("legend_panel")
                .default_width(260.0)
                .show(ctx, |ui| {
                    if let Some(code) = self.floss_panel.show(ui, project, self.controller.highlighted_code()) {
                        self.controller.select_color(&code, project, &mut self.status);
                    }
                });
        }

        self.expire_stale_path();

        egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: crate::canvas::CANVAS_BACKGROUND,
                ..Default::default()
            })
            .show(ctx, |ui| {
                if let (Some(project), Some(canvas)) = (self.project.as_mut(), self.canvas.as_mut()) {
                    canvas.show(
                        ui,
                        project,
                        &mut self.controller,
                        &mut self.glyphs,
                        &self.settings,
                        self.path.as_ref(),
                        !modal_open,
                        &mut self.status,
                    );
                } else {
                    ui.centered_and_justified(|ui| {
                        ui.label("File → Open… or drop a pattern file here");
                    });
                }
            });

        // --- Modal windows ---
        if let Some(pending) = self.controller.pending_fill()
            && let Some(accept) = show_fill_confirm(ctx, pending)
            && let Some(project) = self.project.as_mut()
        {
            self.controller.confirm_pending_fill(accept, project, &mut self.status);
        }
        self.error_dialog.show(ctx);
        if let Some(project) = &self.project {
            self.preview.show(ctx, project);
        }
    }
}
