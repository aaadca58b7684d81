use std::collections::HashMap;

use crate::components::history::{Change, ChangeLog};
use crate::io::PatternError;

/// Color code written over a cell once it has been stitched.
pub const STITCHED_CODE: &str = "stitched";
/// Palette id used for stitched cells when the palette has no entry for them.
pub const STITCHED_ID: &str = "stitched";
/// Palette id written for cells that are absent from the base grid.
pub const ABSENT_ID: &str = "0";

/// Codes that mark deliberately blank background cells.
pub const EMPTY_CODES: [&str; 2] = ["0", "empty"];

pub fn is_empty_code(code: &str) -> bool {
    EMPTY_CODES.contains(&code)
}

/// Stitched and blank cells can never be painted or filled.
pub fn is_fill_blocking(code: &str) -> bool {
    code == STITCHED_CODE || is_empty_code(code)
}

/// Perceptual luminance threshold: `true` means a black glyph reads better.
pub fn prefers_black_text(rgb: [u8; 3]) -> bool {
    let [r, g, b] = rgb;
    r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114 > 186.0
}

// ============================================================================
// PALETTE
// ============================================================================

/// One floss color from the pattern file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub id: String,
    pub code: String,
    pub name: String,
    pub rgb: [u8; 3],
    pub symbol: String,
}

impl PaletteEntry {
    /// The synthetic entry used for completed cells.
    pub fn stitched() -> Self {
        Self {
            id: STITCHED_ID.to_string(),
            code: STITCHED_CODE.to_string(),
            name: STITCHED_INFO.name.to_string(),
            rgb: STITCHED_INFO.rgb,
            symbol: STITCHED_INFO.symbol.to_string(),
        }
    }
}

/// Borrowed display attributes of a color code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorInfo<'a> {
    pub name: &'a str,
    pub rgb: [u8; 3],
    pub symbol: &'a str,
}

pub const STITCHED_INFO: ColorInfo<'static> = ColorInfo {
    name: "STITCHED",
    rgb: [0, 255, 0],
    symbol: "×",
};

/// Shown for codes the palette does not know about.
pub const PLACEHOLDER_INFO: ColorInfo<'static> = ColorInfo {
    name: "Unknown",
    rgb: [128, 128, 128],
    symbol: "?",
};

#[derive(Clone, Debug, Default)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    by_id: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_code = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            // First entry wins on duplicates, matching a linear palette scan.
            by_id.entry(entry.id.clone()).or_insert(idx);
            by_code.entry(entry.code.clone()).or_insert(idx);
        }
        Self {
            entries,
            by_id,
            by_code,
        }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn by_id(&self, id: &str) -> Option<&PaletteEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    pub fn by_code(&self, code: &str) -> Option<&PaletteEntry> {
        self.by_code.get(code).map(|&i| &self.entries[i])
    }

    /// Display attributes for `code`, falling back to the stitched tint or
    /// the gray placeholder.
    pub fn describe<'a>(&'a self, code: &str) -> ColorInfo<'a> {
        if let Some(entry) = self.by_code(code) {
            return ColorInfo {
                name: &entry.name,
                rgb: entry.rgb,
                symbol: &entry.symbol,
            };
        }
        if code == STITCHED_CODE {
            STITCHED_INFO
        } else {
            PLACEHOLDER_INFO
        }
    }

    /// Palette id used when encoding `code`.  Unknown codes are written
    /// verbatim because the decoder keeps unresolved ids as their own code.
    pub fn id_for_code<'a>(&'a self, code: &'a str) -> &'a str {
        match self.by_code(code) {
            Some(entry) => &entry.id,
            None if code == STITCHED_CODE => STITCHED_ID,
            None => code,
        }
    }
}

// ============================================================================
// BASE PATTERN
// ============================================================================

/// The immutable chart as loaded from disk.
#[derive(Clone, Debug)]
pub struct Pattern {
    cols: u32,
    rows: u32,
    /// Row-major; `None` marks a cell absent from the chart.
    cells: Vec<Option<String>>,
    palette: Palette,
}

impl Pattern {
    /// Decode the run-length stitch string.
    ///
    /// Rows are separated by `:`, runs within a row by `,`, and each run is
    /// `<count>-<colorId>`.  Ids missing from the palette are kept as raw
    /// codes and drawn with the placeholder color.
    pub fn decode(
        width: u32,
        height: u32,
        palette: Palette,
        encoded: &str,
    ) -> Result<Self, PatternError> {
        if width == 0 || height == 0 {
            return Err(PatternError::Format(format!(
                "pattern dimensions must be non-zero (got {}x{})",
                width, height
            )));
        }

        let rows: Vec<&str> = encoded.split(':').collect();
        if rows.len() != height as usize {
            return Err(PatternError::Format(format!(
                "expected {} rows, found {}",
                height,
                rows.len()
            )));
        }

        let total = (width as usize).checked_mul(height as usize).ok_or_else(|| {
            PatternError::Format(format!("pattern dimensions {}x{} are too large", width, height))
        })?;
        // Declared sizes are untrusted; let the checked runs grow the grid.
        let mut cells = Vec::with_capacity(total.min(encoded.len()));
        let mut unknown_ids: Vec<String> = Vec::new();

        for (row_idx, row) in rows.iter().enumerate() {
            let mut row_len: u64 = 0;
            for token in row.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                let (count_str, id) = token.split_once('-').ok_or_else(|| {
                    PatternError::Format(format!("row {}: malformed run '{}'", row_idx, token))
                })?;
                let count: u32 = count_str.trim().parse().map_err(|_| {
                    PatternError::Format(format!("row {}: bad run length in '{}'", row_idx, token))
                })?;
                row_len += count as u64;
                if row_len > width as u64 {
                    return Err(PatternError::Format(format!(
                        "row {} is wider than the declared width {}",
                        row_idx, width
                    )));
                }

                let id = id.trim();
                let code = match palette.by_id(id) {
                    Some(entry) => entry.code.clone(),
                    None => {
                        if !unknown_ids.iter().any(|u| u == id) {
                            unknown_ids.push(id.to_string());
                        }
                        id.to_string()
                    }
                };
                for _ in 0..count {
                    cells.push(Some(code.clone()));
                }
            }
            if row_len != width as u64 {
                return Err(PatternError::Format(format!(
                    "row {} has {} cells, expected {}",
                    row_idx, row_len, width
                )));
            }
        }

        for id in &unknown_ids {
            if id != STITCHED_ID && !is_empty_code(id) {
                crate::log_warn!("Pattern references unknown color id '{}'", id);
            }
        }

        Ok(Self {
            cols: width,
            rows: height,
            cells,
            palette,
        })
    }

    /// Build a (possibly sparse) pattern from explicit cells.  Cells outside
    /// the grid are dropped.
    pub fn from_cells<I>(cols: u32, rows: u32, palette: Palette, cells: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32, String)>,
    {
        let mut grid = vec![None; cols as usize * rows as usize];
        for (x, y, code) in cells {
            if x < cols && y < rows {
                grid[y as usize * cols as usize + x as usize] = Some(code);
            }
        }
        Self {
            cols,
            rows,
            cells: grid,
            palette,
        }
    }

    /// A dense pattern where every cell uses `code`.
    pub fn filled(cols: u32, rows: u32, palette: Palette, code: &str) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Some(code.to_string()); cols as usize * rows as usize],
            palette,
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.cols && y < self.rows
    }

    pub fn cell_at(&self, x: u32, y: u32) -> Option<&str> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.cells[y as usize * self.cols as usize + x as usize].as_deref()
    }

    /// Number of cells present in the chart.
    pub fn cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub(crate) fn cells(&self) -> &[Option<String>] {
        &self.cells
    }
}

/// Run-length encode a row-major grid of codes.
pub fn encode_grid(cols: u32, rows: u32, palette: &Palette, grid: &[Option<&str>]) -> String {
    let mut out = String::new();
    for y in 0..rows as usize {
        if y > 0 {
            out.push(':');
        }
        let row = &grid[y * cols as usize..(y + 1) * cols as usize];
        let mut first_run = true;
        let mut run: Option<(&str, u32)> = None;
        for cell in row {
            let id = match cell {
                Some(code) => palette.id_for_code(code),
                None => ABSENT_ID,
            };
            run = match run {
                Some((current, n)) if current == id => Some((current, n + 1)),
                Some((current, n)) => {
                    push_run(&mut out, &mut first_run, n, current);
                    Some((id, 1))
                }
                None => Some((id, 1)),
            };
        }
        if let Some((current, n)) = run {
            push_run(&mut out, &mut first_run, n, current);
        }
    }
    out
}

fn push_run(out: &mut String, first: &mut bool, count: u32, id: &str) {
    if !*first {
        out.push(',');
    }
    *first = false;
    out.push_str(&count.to_string());
    out.push('-');
    out.push_str(id);
}

// ============================================================================
// PATTERN STORE — base grid + change overlay
// ============================================================================

/// Summary numbers for the status bar and exports.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternInfo {
    pub cols: u32,
    pub rows: u32,
    pub total_cells: usize,
    pub stitched_cells: usize,
    pub stitchable_cells: usize,
    pub unique_colors: usize,
    pub completion_percent: f32,
    pub change_count: usize,
}

impl PatternInfo {
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.cols, self.rows)
    }
}

pub struct PatternStore {
    base: Pattern,
    changes: ChangeLog,
}

impl PatternStore {
    pub fn new(base: Pattern) -> Self {
        Self {
            base,
            changes: ChangeLog::new(),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.base
    }

    pub fn palette(&self) -> &Palette {
        self.base.palette()
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn cols(&self) -> u32 {
        self.base.cols()
    }

    pub fn rows(&self) -> u32 {
        self.base.rows()
    }

    /// Open a new undoable action and return its id.
    pub fn begin_action(&mut self) -> u64 {
        self.changes.begin_action()
    }

    /// Record one cell edit under the current action id.
    pub fn record_change(&mut self, x: u32, y: u32, new_code: &str, original_code: &str) -> u64 {
        self.changes.record(x, y, new_code, original_code)
    }

    /// Stitch every listed cell as a single undoable action.  Cells that are
    /// absent, out of range or already stitched are skipped; nothing is
    /// recorded (and no id consumed) when no cell qualifies.
    pub fn stitch_cells(&mut self, cells: &[(u32, u32)]) -> Option<u64> {
        let targets: Vec<(u32, u32, String)> = cells
            .iter()
            .filter_map(|&(x, y)| {
                let code = self.merged_cell_at(x, y)?;
                (code != STITCHED_CODE).then(|| (x, y, code.to_string()))
            })
            .collect();
        if targets.is_empty() {
            return None;
        }
        let id = self.begin_action();
        for (x, y, original) in &targets {
            self.record_change(*x, *y, STITCHED_CODE, original);
        }
        Some(id)
    }

    /// Undo the most recent action.  Returns the number of cells restored.
    pub fn undo(&mut self) -> usize {
        self.changes.undo_last().len()
    }

    pub fn can_undo(&self) -> bool {
        self.changes.can_undo()
    }

    /// Drop every recorded change.
    pub fn reset(&mut self) {
        self.changes.clear();
    }

    pub fn merged_cell_at(&self, x: u32, y: u32) -> Option<&str> {
        let base = self.base.cell_at(x, y)?;
        match self.changes.get(x, y) {
            Some(change) => Some(change.new_code.as_str()),
            None => Some(base),
        }
    }

    /// Base grid with the change overlay applied, row-major.
    pub fn merged_grid(&self) -> Vec<Option<&str>> {
        let cols = self.cols() as usize;
        let mut grid: Vec<Option<&str>> = self.base.cells().iter().map(|c| c.as_deref()).collect();
        for Change { x, y, new_code, .. } in self.changes.iter() {
            let idx = *y as usize * cols + *x as usize;
            if let Some(slot) = grid.get_mut(idx)
                && slot.is_some()
            {
                *slot = Some(new_code.as_str());
            }
        }
        grid
    }

    /// Run-length encoding of the merged view.
    pub fn export_encoded(&self) -> String {
        encode_grid(self.cols(), self.rows(), self.palette(), &self.merged_grid())
    }

    /// Palette to write next to `export_encoded`; gains a stitched entry when
    /// stitched cells exist and the palette has none.
    pub fn export_palette(&self) -> Vec<PaletteEntry> {
        let mut entries = self.palette().entries().to_vec();
        let has_stitched = self.merged_grid().iter().any(|c| *c == Some(STITCHED_CODE));
        if has_stitched && self.palette().by_code(STITCHED_CODE).is_none() {
            entries.push(PaletteEntry::stitched());
        }
        entries
    }

    pub fn info(&self) -> PatternInfo {
        let grid = self.merged_grid();
        let mut total = 0usize;
        let mut stitched = 0usize;
        let mut stitchable = 0usize;
        let mut unique: Vec<&str> = Vec::new();
        for code in grid.iter().flatten() {
            total += 1;
            if *code == STITCHED_CODE {
                stitched += 1;
            }
            if !is_empty_code(code) {
                stitchable += 1;
            }
            if !unique.contains(code) {
                unique.push(code);
            }
        }
        let completion_percent = if stitchable == 0 {
            0.0
        } else {
            stitched as f32 * 100.0 / stitchable as f32
        };
        PatternInfo {
            cols: self.cols(),
            rows: self.rows(),
            total_cells: total,
            stitched_cells: stitched,
            stitchable_cells: stitchable,
            unique_colors: unique.len(),
            completion_percent,
            change_count: self.changes.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(id: &str, code: &str, rgb: [u8; 3], symbol: &str) -> PaletteEntry {
        PaletteEntry {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("Floss {}", code),
            rgb,
            symbol: symbol.to_string(),
        }
    }

    pub(crate) fn two_color_palette() -> Palette {
        Palette::new(vec![
            entry("1", "310", [0, 0, 0], "#"),
            entry("2", "B5200", [255, 255, 255], "o"),
        ])
    }

    #[test]
    fn decode_rejects_oversized_declared_width() {
        let err = Pattern::decode(4_000_000_000, 2, two_color_palette(), "1-1:1-1").unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));

        let rows = vec!["1-1"; 200_000].join(":");
        let err = Pattern::decode(4_000_000_000, 200_000, Palette::new(vec![]), &rows).unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
    }

    #[test]
    fn decode_expands_runs_row_major() {
        let p = Pattern::decode(3, 2, two_color_palette(), "2-1,1-2:3-2").unwrap();
        assert_eq!(p.cell_at(0, 0), Some("310"));
        assert_eq!(p.cell_at(1, 0), Some("310"));
        assert_eq!(p.cell_at(2, 0), Some("B5200"));
        assert_eq!(p.cell_at(0, 1), Some("B5200"));
        assert_eq!(p.cell_count(), 6);
    }

    #[test]
    fn decode_rejects_short_row() {
        let err = Pattern::decode(3, 2, two_color_palette(), "2-1:3-2").unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
    }

    #[test]
    fn decode_rejects_wrong_row_count() {
        let err = Pattern::decode(3, 3, two_color_palette(), "3-1:3-2").unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
    }

    #[test]
    fn decode_rejects_garbage_count() {
        let err = Pattern::decode(3, 1, two_color_palette(), "x-1,1-2").unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
    }

    #[test]
    fn unknown_id_degrades_to_placeholder() {
        let p = Pattern::decode(2, 1, two_color_palette(), "1-1,1-99").unwrap();
        assert_eq!(p.cell_at(1, 0), Some("99"));
        assert_eq!(p.palette().describe("99"), PLACEHOLDER_INFO);
    }

    #[test]
    fn blank_tokens_are_skipped() {
        let p = Pattern::decode(2, 2, two_color_palette(), "2-1:,2-2,").unwrap();
        assert_eq!(p.cell_at(1, 1), Some("B5200"));
    }

    #[test]
    fn merged_view_overrides_base() {
        let mut store = PatternStore::new(Pattern::filled(2, 2, two_color_palette(), "310"));
        store.stitch_cells(&[(1, 1)]);
        assert_eq!(store.merged_cell_at(1, 1), Some(STITCHED_CODE));
        assert_eq!(store.merged_cell_at(0, 1), Some("310"));
        assert_eq!(store.pattern().cell_at(1, 1), Some("310"));
        assert_eq!(store.merged_cell_at(2, 0), None);
    }

    #[test]
    fn merged_cell_absent_in_sparse_pattern() {
        let p = Pattern::from_cells(2, 2, two_color_palette(), vec![(0, 0, "310".to_string())]);
        let mut store = PatternStore::new(p);
        assert_eq!(store.merged_cell_at(1, 0), None);
        assert_eq!(store.stitch_cells(&[(1, 0)]), None);
        assert!(!store.can_undo());
    }

    #[test]
    fn undo_restores_whole_action() {
        let mut store = PatternStore::new(Pattern::filled(3, 1, two_color_palette(), "310"));
        store.stitch_cells(&[(0, 0)]);
        store.stitch_cells(&[(1, 0), (2, 0)]);
        assert_eq!(store.undo(), 2);
        assert_eq!(store.merged_cell_at(1, 0), Some("310"));
        assert_eq!(store.merged_cell_at(0, 0), Some(STITCHED_CODE));
        assert_eq!(store.undo(), 1);
        assert_eq!(store.undo(), 0);
    }

    #[test]
    fn export_round_trips_merged_view() {
        let base = Pattern::decode(4, 2, two_color_palette(), "2-1,2-2:1-2,3-1").unwrap();
        let mut store = PatternStore::new(base);
        store.stitch_cells(&[(0, 0), (3, 1)]);

        let encoded = store.export_encoded();
        let palette = Palette::new(store.export_palette());
        let reloaded = Pattern::decode(4, 2, palette, &encoded).unwrap();
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(reloaded.cell_at(x, y), store.merged_cell_at(x, y));
            }
        }
    }

    #[test]
    fn encode_writes_absent_cells_as_zero() {
        let p = Pattern::from_cells(3, 1, two_color_palette(), vec![(1, 0, "310".to_string())]);
        let store = PatternStore::new(p);
        assert_eq!(store.export_encoded(), "1-0,1-1,1-0");
    }

    #[test]
    fn info_reports_completion() {
        let mut store = PatternStore::new(Pattern::filled(2, 2, two_color_palette(), "310"));
        store.stitch_cells(&[(0, 0)]);
        let info = store.info();
        assert_eq!(info.total_cells, 4);
        assert_eq!(info.stitched_cells, 1);
        assert_eq!(info.unique_colors, 2);
        assert!((info.completion_percent - 25.0).abs() < f32::EPSILON);
        assert_eq!(info.dimensions(), "2x2");
    }

    #[test]
    fn contrast_threshold() {
        assert!(prefers_black_text([255, 255, 255]));
        assert!(!prefers_black_text([0, 255, 0]));
        assert!(!prefers_black_text([0, 0, 0]));
    }
}
