use eframe::egui;
use egui::{Color32, Stroke, Vec2};

use crate::ledger::{LedgerEntry, physical_size_cm};
use crate::project::Project;

const SWATCH_SIZE: f32 = 18.0;

// ============================================================================
// Legend sort order
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LegendSort {
    /// Most-used first (ledger order).
    #[default]
    Count,
    Code,
    Name,
}

impl LegendSort {
    pub fn label(&self) -> &'static str {
        match self {
            LegendSort::Count => "Count",
            LegendSort::Code => "Code",
            LegendSort::Name => "Name",
        }
    }

    pub fn all() -> &'static [LegendSort] {
        &[LegendSort::Count, LegendSort::Code, LegendSort::Name]
    }
}

// ============================================================================
// FlossPanel — legend and floss usage
// ============================================================================

#[derive(Default)]
pub struct FlossPanel {
    pub filter: String,
    pub sort: LegendSort,
}

impl FlossPanel {
    /// Rows the legend lists, after filter and sort.  The stitched pseudo
    /// color and blank cells never appear.
    pub fn visible_rows<'a>(&self, entries: impl Iterator<Item = &'a LedgerEntry>) -> Vec<&'a LedgerEntry> {
        let needle = self.filter.trim().to_lowercase();
        let mut rows: Vec<&LedgerEntry> = entries
            .filter(|e| !e.is_stitched() && !e.is_empty())
            .filter(|e| {
                needle.is_empty()
                    || e.code.to_lowercase().contains(&needle)
                    || e.name.to_lowercase().contains(&needle)
            })
            .collect();
        match self.sort {
            LegendSort::Count => {}
            LegendSort::Code => rows.sort_by(|a, b| a.code.cmp(&b.code)),
            LegendSort::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        rows
    }

    /// Draw the legend.  Returns the code of a clicked row.
    pub fn show(&mut self, ui: &mut egui::Ui, project: &Project, highlighted: Option<&str>) -> Option<String> {
        let ledger = project.color_ledger();
        let store = project.store();
        let mut clicked = None;

        ui.heading("Floss");
        ui.add(
            egui::ProgressBar::new(ledger.completion_percent() / 100.0)
                .text(format!(
                    "{} / {} stitched ({:.1}%)",
                    ledger.stitched_count(),
                    ledger.stitchable_count(),
                    ledger.completion_percent()
                )),
        );
        let (w_cm, h_cm) = physical_size_cm(store.cols(), store.rows());
        ui.label(format!(
            "{} x {} stitches · {:.1} x {:.1} cm on 14-count Aida",
            store.cols(),
            store.rows(),
            w_cm,
            h_cm
        ));
        ui.separator();

        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.filter).hint_text("Filter").desired_width(110.0));
            egui::ComboBox::from_id_source("legend_sort_combo")
                .width(70.0)
                .selected_text(self.sort.label())
                .show_ui(ui, |ui| {
                    for sort in LegendSort::all() {
                        ui.selectable_value(&mut self.sort, *sort, sort.label());
                    }
                });
        });

        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            egui::Grid::new("legend_grid")
                .num_columns(4)
                .striped(true)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    for entry in self.visible_rows(ledger.entries().iter()) {
                        draw_swatch(ui, entry);
                        let selected = highlighted == Some(entry.code.as_str());
                        if ui.selectable_label(selected, entry.code.as_str()).clicked() {
                            clicked = Some(entry.code.clone());
                        }
                        ui.label(entry.name.as_str());
                        ui.label(entry.count.to_string());
                        ui.end_row();
                    }
                });
        });

        clicked
    }
}

fn draw_swatch(ui: &mut egui::Ui, entry: &LedgerEntry) {
    let (rect, _) = ui.allocate_exact_size(Vec2::splat(SWATCH_SIZE), egui::Sense::hover());
    let [r, g, b] = entry.rgb;
    let fill = Color32::from_rgb(r, g, b);
    let painter = ui.painter();
    painter.rect_filled(rect, 2.0, fill);
    painter.rect_stroke(rect, 2.0, Stroke::new(1.0, Color32::from_gray(90)));
    let text = if crate::pattern::prefers_black_text(entry.rgb) {
        Color32::BLACK
    } else {
        Color32::WHITE
    };
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        &entry.symbol,
        egui::FontId::monospace(12.0),
        text,
    );
}
