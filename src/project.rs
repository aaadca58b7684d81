use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::canvas::CellRect;
use crate::glyphs::GlyphCache;
use crate::io::{self, PatternError};
use crate::ledger::ColorLedger;
use crate::pattern::{PLACEHOLDER_INFO, Pattern, PatternStore, STITCHED_INFO, is_fill_blocking};
use crate::raster::{RasterCache, VisualMode};

/// Single open chart.
///
/// Every edit goes through here so the raster is invalidated and the
/// ledger rebuilt in the same call.
pub struct Project {
    pub id: Uuid,
    store: PatternStore,
    raster: RasterCache,
    ledger: ColorLedger,
    /// `None` for charts that did not come from a file.
    pub path: Option<PathBuf>,
    /// Display name (file name or "Untitled")
    pub name: String,
    pub is_dirty: bool,
}

impl Project {
    pub fn from_pattern(pattern: Pattern, path: Option<PathBuf>) -> Self {
        let store = PatternStore::new(pattern);
        let ledger = ColorLedger::rebuild(&store);
        let name = path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());
        Self {
            id: Uuid::new_v4(),
            store,
            raster: RasterCache::new(),
            ledger,
            path,
            name,
            is_dirty: false,
        }
    }

    pub fn open(path: &Path) -> Result<Self, PatternError> {
        let pattern = io::load_pattern(path)?;
        Ok(Self::from_pattern(pattern, Some(path.to_path_buf())))
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn color_ledger(&self) -> &ColorLedger {
        &self.ledger
    }

    pub fn raster(&self) -> &RasterCache {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut RasterCache {
        &mut self.raster
    }

    fn after_edit(&mut self) {
        self.raster.invalidate();
        self.ledger = ColorLedger::rebuild(&self.store);
        self.is_dirty = true;
    }

    /// Stitch the listed cells as one undoable action.  Blank, absent and
    /// already-stitched cells are skipped.  Returns the number stitched.
    pub fn stitch_cells(&mut self, cells: &[(u32, u32)]) -> usize {
        let targets: Vec<(u32, u32)> = cells
            .iter()
            .copied()
            .filter(|&(x, y)| {
                self.store
                    .merged_cell_at(x, y)
                    .is_some_and(|code| !is_fill_blocking(code))
            })
            .collect();
        if self.store.stitch_cells(&targets).is_none() {
            return 0;
        }
        self.after_edit();
        targets.len()
    }

    pub fn paint_cell(&mut self, x: u32, y: u32) -> usize {
        self.stitch_cells(&[(x, y)])
    }

    /// Undo the last action; returns the number of cells restored.
    pub fn undo(&mut self) -> usize {
        if !self.store.can_undo() {
            self.store.undo();
            return 0;
        }
        let restored = self.store.undo();
        self.after_edit();
        crate::log_info!("Undid {} cell(s) in {}", restored, self.name);
        restored
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    /// Drop every stitch recorded this session.
    pub fn reset(&mut self) {
        if self.store.changes().is_empty() {
            return;
        }
        self.store.reset();
        self.after_edit();
        crate::log_info!("Reset all changes in {}", self.name);
    }

    /// Rebuild the raster if the data, mode, tile size or coverage demand it.
    /// Returns true when a rebuild happened.
    pub fn refresh_raster(
        &mut self,
        mode: &VisualMode,
        glyphs: &mut GlyphCache,
        tile: u32,
        visible: Option<CellRect>,
    ) -> bool {
        if !self.raster.needs_rebuild(mode, tile, visible) {
            return false;
        }
        if mode.show_symbols {
            let palette_symbols = self.store.palette().entries().iter().map(|e| e.symbol.as_str());
            let reserved = [STITCHED_INFO.symbol, PLACEHOLDER_INFO.symbol];
            glyphs.prepare(palette_symbols.chain(reserved), tile);
        }
        self.raster.rebuild(&self.store, mode, glyphs, tile, visible);
        true
    }

    pub fn save_to(&mut self, path: &Path) -> Result<(), PatternError> {
        io::save_pattern(&self.store, path)?;
        self.is_dirty = false;
        Ok(())
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::tests::{entry, two_color_palette};
    use crate::pattern::{Palette, STITCHED_CODE};

    fn project() -> Project {
        Project::from_pattern(Pattern::filled(3, 3, two_color_palette(), "310"), None)
    }

    #[test]
    fn edits_refresh_ledger_and_raster() {
        let mut p = project();
        let mut glyphs = GlyphCache::empty();
        let mode = VisualMode::default();
        assert!(p.refresh_raster(&mode, &mut glyphs, 4, None));
        assert!(!p.refresh_raster(&mode, &mut glyphs, 4, None));

        assert_eq!(p.paint_cell(1, 1), 1);
        assert!(p.raster().is_dirty());
        assert_eq!(p.color_ledger().stitched_count(), 1);
        assert!(p.is_dirty);
        assert_eq!(p.display_title(), "Untitled*");
        assert!(p.refresh_raster(&mode, &mut glyphs, 4, None));
    }

    #[test]
    fn painting_a_stitched_cell_is_noop() {
        let mut p = project();
        p.paint_cell(0, 0);
        assert_eq!(p.paint_cell(0, 0), 0);
        assert_eq!(p.store().changes().len(), 1);
    }

    #[test]
    fn blank_cells_cannot_be_stitched() {
        let palette = Palette::new(vec![entry("1", "310", [0, 0, 0], "#"), entry("0", "empty", [255; 3], " ")]);
        let pattern = Pattern::decode(2, 1, palette, "1-1,1-0").unwrap();
        let mut p = Project::from_pattern(pattern, Some(PathBuf::from("dir/chart.json")));
        assert_eq!(p.name, "chart.json");
        assert_eq!(p.paint_cell(1, 0), 0);
        assert_eq!(p.stitch_cells(&[(0, 0), (1, 0)]), 1);
        assert_eq!(p.store().merged_cell_at(1, 0), Some("empty"));
    }

    #[test]
    fn undo_and_reset() {
        let mut p = project();
        p.stitch_cells(&[(0, 0), (1, 0), (2, 0)]);
        p.paint_cell(0, 2);
        assert_eq!(p.undo(), 1);
        assert_eq!(p.color_ledger().stitched_count(), 3);
        p.reset();
        assert_eq!(p.color_ledger().stitched_count(), 0);
        assert_eq!(p.store().merged_cell_at(0, 0), Some("310"));
        assert_eq!(p.undo(), 0);
        assert_ne!(p.store().merged_cell_at(0, 0), Some(STITCHED_CODE));
    }
}
