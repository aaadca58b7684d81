//! Per-color usage counts for the legend and floss-usage table.
//!
//! The ledger is always rebuilt from the merged view after a load, edit or
//! undo.  It is never patched incrementally, so counts cannot drift.

use std::collections::HashMap;

use crate::pattern::{PatternStore, STITCHED_CODE, STITCHED_INFO, is_empty_code};

/// Centimetres per stitch on 14-count Aida (5.4 stitches per cm).
pub const AIDA_14_CM_PER_STITCH: f32 = 0.185;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub code: String,
    pub name: String,
    pub rgb: [u8; 3],
    pub symbol: String,
    pub count: usize,
}

impl LedgerEntry {
    pub fn is_stitched(&self) -> bool {
        self.code == STITCHED_CODE
    }

    pub fn is_empty(&self) -> bool {
        is_empty_code(&self.code)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorLedger {
    entries: Vec<LedgerEntry>,
}

impl ColorLedger {
    pub fn rebuild(store: &PatternStore) -> Self {
        let palette = store.palette();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for code in store.merged_grid().into_iter().flatten() {
            *counts.entry(code).or_insert(0) += 1;
        }
        counts.entry(STITCHED_CODE).or_insert(0);

        let mut entries: Vec<LedgerEntry> = counts
            .into_iter()
            .map(|(code, count)| {
                let info = if code == STITCHED_CODE {
                    STITCHED_INFO
                } else {
                    palette.describe(code)
                };
                LedgerEntry {
                    code: code.to_string(),
                    name: info.name.to_string(),
                    rgb: info.rgb,
                    symbol: info.symbol.to_string(),
                    count,
                }
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
        Self { entries }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn count_of(&self, code: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map_or(0, |e| e.count)
    }

    pub fn stitched_count(&self) -> usize {
        self.count_of(STITCHED_CODE)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Everything that is or will be stitched (blank cells excluded).
    pub fn stitchable_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_empty())
            .map(|e| e.count)
            .sum()
    }

    pub fn completion_percent(&self) -> f32 {
        let total = self.stitchable_count();
        if total == 0 {
            return 0.0;
        }
        self.stitched_count() as f32 * 100.0 / total as f32
    }

    /// Entries worth offering as selectable colors: present and not blank.
    pub fn selectable(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| e.count > 0 && !e.is_empty())
    }
}

/// Finished size of a `cols` x `rows` chart on 14-count Aida, in centimetres.
pub fn physical_size_cm(cols: u32, rows: u32) -> (f32, f32) {
    (
        cols as f32 * AIDA_14_CM_PER_STITCH,
        rows as f32 * AIDA_14_CM_PER_STITCH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::tests::{entry, two_color_palette};
    use crate::pattern::{Palette, Pattern};

    #[test]
    fn synthetic_stitched_entry_always_present() {
        let store = PatternStore::new(Pattern::filled(2, 2, two_color_palette(), "310"));
        let ledger = ColorLedger::rebuild(&store);
        assert_eq!(ledger.count_of("310"), 4);
        assert!(ledger.entries().iter().any(|e| e.is_stitched() && e.count == 0));
    }

    #[test]
    fn counts_sum_to_merged_cells() {
        let base = Pattern::decode(4, 2, two_color_palette(), "3-1,1-2:2-2,2-1").unwrap();
        let mut store = PatternStore::new(base);
        store.stitch_cells(&[(0, 0), (2, 1)]);
        let ledger = ColorLedger::rebuild(&store);
        assert_eq!(ledger.total(), 8);
        assert_eq!(ledger.stitched_count(), 2);
        assert_eq!(ledger.count_of("310"), 3);
    }

    #[test]
    fn sorted_by_count_then_code() {
        let base = Pattern::decode(3, 1, two_color_palette(), "2-2,1-1").unwrap();
        let ledger = ColorLedger::rebuild(&PatternStore::new(base));
        let codes: Vec<&str> = ledger.entries().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["B5200", "310", "stitched"]);
    }

    #[test]
    fn blank_cells_excluded_from_progress() {
        let palette = Palette::new(vec![
            entry("1", "310", [0, 0, 0], "#"),
            entry("0", "empty", [255, 255, 255], " "),
        ]);
        let base = Pattern::decode(4, 1, palette, "2-1,2-0").unwrap();
        let mut store = PatternStore::new(base);
        store.stitch_cells(&[(0, 0)]);
        let ledger = ColorLedger::rebuild(&store);
        assert_eq!(ledger.stitchable_count(), 2);
        assert!((ledger.completion_percent() - 50.0).abs() < f32::EPSILON);
        assert!(ledger.selectable().all(|e| e.code != "empty"));
    }

    #[test]
    fn aida_size() {
        let (w, h) = physical_size_cm(100, 50);
        assert!((w - 18.5).abs() < 1e-4);
        assert!((h - 9.25).abs() < 1e-4);
    }
}
