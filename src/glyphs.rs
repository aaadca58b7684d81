//! Chart symbol rasterization.
//!
//! Symbols are rendered once per (symbol, tile size) into a tile-sized
//! coverage mask, then stamped into the raster by `raster::rebuild`.  When no
//! system font can be found the cache stays empty and cells are drawn
//! without symbols.

use std::collections::HashMap;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};

/// Symbols are skipped below this tile size; they would be unreadable.
pub const MIN_SYMBOL_TILE_PX: u32 = 8;

/// Single-channel coverage for one symbol, `size` x `size`, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphMask {
    pub size: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.coverage[(y * self.size + x) as usize]
    }
}

#[derive(Default)]
pub struct GlyphCache {
    font: Option<FontArc>,
    masks: HashMap<(String, u32), GlyphMask>,
}

impl GlyphCache {
    /// A cache with no font; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            masks: HashMap::new(),
        }
    }

    /// Load the platform's default sans-serif face.
    pub fn with_system_font() -> Self {
        match load_sans_serif() {
            Some(font) => Self::from_font(font),
            None => {
                crate::log_warn!("No system sans-serif font found; chart symbols disabled");
                Self::empty()
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Rasterize any of `symbols` not yet cached at `tile` px.
    pub fn prepare<'a, I>(&mut self, symbols: I, tile: u32)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(font) = &self.font else { return };
        if tile < MIN_SYMBOL_TILE_PX {
            return;
        }
        for symbol in symbols {
            if symbol.trim().is_empty() {
                continue;
            }
            let key = (symbol.to_string(), tile);
            if self.masks.contains_key(&key) {
                continue;
            }
            let mask = rasterize_symbol(font, symbol, tile);
            self.masks.insert(key, mask);
        }
    }

    pub fn mask(&self, symbol: &str, tile: u32) -> Option<&GlyphMask> {
        self.masks.get(&(symbol.to_string(), tile))
    }

    pub fn clear(&mut self) {
        self.masks.clear();
    }
}

fn rasterize_symbol(font: &FontArc, symbol: &str, tile: u32) -> GlyphMask {
    let mut coverage = vec![0u8; (tile * tile) as usize];
    let scale = PxScale::from(tile as f32 * 0.8);
    let scaled = font.as_scaled(scale);

    let width: f32 = symbol
        .chars()
        .map(|c| scaled.h_advance(scaled.glyph_id(c)))
        .sum();
    let height = scaled.ascent() - scaled.descent();
    let origin_x = (tile as f32 - width) / 2.0;
    let baseline = (tile as f32 - height) / 2.0 + scaled.ascent();

    let mut pen_x = origin_x;
    for c in symbol.chars() {
        let id = scaled.glyph_id(c);
        let glyph = id.with_scale_and_position(scale, point(pen_x, baseline));
        pen_x += scaled.h_advance(id);
        let Some(outlined) = font.outline_glyph(glyph) else { continue };
        let bounds = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let x = px as i32 + bounds.min.x as i32;
            let y = py as i32 + bounds.min.y as i32;
            if x < 0 || y < 0 || x >= tile as i32 || y >= tile as i32 {
                return;
            }
            let idx = (y as u32 * tile + x as u32) as usize;
            let v = (cov.clamp(0.0, 1.0) * 255.0).round() as u8;
            coverage[idx] = coverage[idx].max(v);
        });
    }

    GlyphMask {
        size: tile,
        coverage,
    }
}

fn load_sans_serif() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let font = handle.load().ok()?;
    let bytes = font.copy_font_data()?;
    FontArc::try_from_vec((*bytes).clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_never_hits() {
        let mut cache = GlyphCache::empty();
        cache.prepare(["#", "o"], 16);
        assert!(!cache.has_font());
        assert!(cache.mask("#", 16).is_none());
    }

    #[test]
    fn mask_indexing_is_row_major() {
        let mask = GlyphMask {
            size: 2,
            coverage: vec![0, 1, 2, 3],
        };
        assert_eq!(mask.at(1, 0), 1);
        assert_eq!(mask.at(0, 1), 2);
    }
}
