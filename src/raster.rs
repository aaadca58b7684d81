//! Off-screen raster of the whole chart.
//!
//! Rebuilt only when the data or the visual mode changes; every frame in
//! between just re-draws the cached texture through the camera.

use std::collections::HashMap;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, TextureOptions};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{Camera, CellRect};
use crate::glyphs::{GlyphCache, MIN_SYMBOL_TILE_PX};
use crate::pattern::{
    ColorInfo, PatternStore, STITCHED_CODE, STITCHED_INFO, is_empty_code, prefers_black_text,
};

pub const PAPER: [u8; 3] = [255, 255, 255];
const GRID_LIGHT: [u8; 3] = [205, 205, 205];
const GRID_DARK: [u8; 3] = [90, 90, 90];
const GRID_CENTER: [u8; 3] = [214, 48, 49];
const GLYPH_BLACK: [u8; 3] = [0, 0, 0];
const GLYPH_WHITE: [u8; 3] = [255, 255, 255];
const GLYPH_SILVER: [u8; 3] = [192, 192, 192];
/// Opacity of colors that are not the highlighted one.
const DIMMED_ALPHA: f32 = 0.25;
/// Major gridline spacing, in cells.
pub const MAJOR_GRID: u32 = 10;

// ============================================================================
// VISUAL MODE + CELL STYLE
// ============================================================================

/// Everything besides the data that changes how cells are drawn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisualMode {
    /// Set only while highlight mode is on and a color has been chosen.
    pub highlighted: Option<String>,
    pub high_contrast: bool,
    pub show_symbols: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellStyle {
    pub fill: [u8; 3],
    /// `None` means no symbol is drawn.
    pub glyph: Option<[u8; 3]>,
}

fn contrast_glyph(fill: [u8; 3]) -> [u8; 3] {
    if prefers_black_text(fill) {
        GLYPH_BLACK
    } else {
        GLYPH_WHITE
    }
}

fn over_paper(rgb: [u8; 3], alpha: f32) -> [u8; 3] {
    rgb.map(|c| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8)
}

/// Fill and glyph colors for one cell.  First matching rule wins:
/// highlighted color, dimmed non-highlighted color, high contrast, stitched,
/// plain.  Blank and absent cells are bare paper.
pub fn cell_style(code: Option<&str>, info: ColorInfo<'_>, mode: &VisualMode) -> CellStyle {
    let Some(code) = code.filter(|c| !is_empty_code(c)) else {
        return CellStyle {
            fill: PAPER,
            glyph: None,
        };
    };
    let stitched = code == STITCHED_CODE;
    let rgb = if stitched { STITCHED_INFO.rgb } else { info.rgb };

    if let Some(highlighted) = &mode.highlighted {
        if code == highlighted {
            return CellStyle {
                fill: rgb,
                glyph: Some(contrast_glyph(rgb)),
            };
        }
        if !stitched {
            let glyph = if prefers_black_text(rgb) {
                GLYPH_SILVER
            } else {
                GLYPH_WHITE
            };
            return CellStyle {
                fill: over_paper(rgb, DIMMED_ALPHA),
                glyph: Some(glyph),
            };
        }
    } else if mode.high_contrast && !stitched {
        return CellStyle {
            fill: PAPER,
            glyph: Some(GLYPH_BLACK),
        };
    }

    CellStyle {
        fill: rgb,
        glyph: Some(contrast_glyph(rgb)),
    }
}

// ============================================================================
// RASTER CACHE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    Full,
    /// Only these cells were drawn; the rest is blank paper.
    Partial(CellRect),
}

#[derive(Default)]
pub struct RasterCache {
    image: Option<RgbaImage>,
    dirty: bool,
    built_mode: Option<VisualMode>,
    built_tile: u32,
    coverage: Option<Coverage>,
    /// Bumped on every rebuild; the texture is re-uploaded when it lags.
    generation: u64,
    uploaded_generation: u64,
    texture: Option<egui::TextureHandle>,
    warned_oversize: bool,
}

/// Per-code drawing recipe, resolved once per rebuild.
struct CodeRecipe<'a> {
    style: CellStyle,
    symbol: &'a str,
}

impl RasterCache {
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn coverage(&self) -> Option<Coverage> {
        self.coverage
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `visible` is the on-screen cell rect when only visible cells should be
    /// drawn, `None` for a full rebuild.
    pub fn needs_rebuild(&self, mode: &VisualMode, tile: u32, visible: Option<CellRect>) -> bool {
        if self.dirty || self.image.is_none() || self.built_tile != tile {
            return true;
        }
        if self.built_mode.as_ref() != Some(mode) {
            return true;
        }
        match (self.coverage, visible) {
            (Some(Coverage::Full), _) => false,
            (Some(Coverage::Partial(done)), Some(wanted)) => !done.contains_rect(&wanted),
            (Some(Coverage::Partial(_)), None) | (None, _) => true,
        }
    }

    /// Re-rasterize the merged view.  Symbols must already be prepared in
    /// `glyphs` for `tile`.
    pub fn rebuild(
        &mut self,
        store: &PatternStore,
        mode: &VisualMode,
        glyphs: &GlyphCache,
        tile: u32,
        visible: Option<CellRect>,
    ) {
        let cols = store.cols();
        let rows = store.rows();
        if cols == 0 || rows == 0 || tile == 0 {
            return;
        }
        let coverage = match visible {
            Some(rect) => Coverage::Partial(pad_rect(rect, cols, rows)),
            None => Coverage::Full,
        };

        let grid = store.merged_grid();
        let palette = store.palette();
        let mut recipes: HashMap<&str, CodeRecipe<'_>> = HashMap::new();
        for code in grid.iter().flatten() {
            recipes.entry(code).or_insert_with(|| {
                let info = palette.describe(code);
                CodeRecipe {
                    style: cell_style(Some(code), info, mode),
                    symbol: info.symbol,
                }
            });
        }
        let draw_symbols = mode.show_symbols && tile >= MIN_SYMBOL_TILE_PX;

        let width = (cols * tile) as usize;
        let band_bytes = width * tile as usize * 4;
        let mut buf = vec![255u8; band_bytes * rows as usize];

        buf.par_chunks_mut(band_bytes)
            .enumerate()
            .for_each(|(y, band)| {
                let y = y as u32;
                for x in 0..cols {
                    let covered = match coverage {
                        Coverage::Full => true,
                        Coverage::Partial(rect) => rect.contains(x, y),
                    };
                    if !covered {
                        continue;
                    }
                    let code = grid[(y * cols + x) as usize];
                    let (style, symbol) = match code.and_then(|c| recipes.get(c)) {
                        Some(r) => (r.style, r.symbol),
                        None => (
                            CellStyle {
                                fill: PAPER,
                                glyph: None,
                            },
                            "",
                        ),
                    };
                    let mask = match style.glyph {
                        Some(_) if draw_symbols => glyphs.mask(symbol, tile),
                        _ => None,
                    };
                    for py in 0..tile {
                        let row = &mut band[(py as usize * width) * 4..((py as usize + 1) * width) * 4];
                        for px in 0..tile {
                            let mut rgb = style.fill;
                            if let (Some(mask), Some(glyph)) = (mask, style.glyph) {
                                let a = mask.at(px, py);
                                if a > 0 {
                                    rgb = blend(rgb, glyph, a);
                                }
                            }
                            if let Some(line) = gridline(x, y, px, py, tile, cols, rows) {
                                rgb = line;
                            }
                            let o = ((x * tile + px) as usize) * 4;
                            row[o..o + 3].copy_from_slice(&rgb);
                            row[o + 3] = 255;
                        }
                    }
                }
            });

        let Some(image) = RgbaImage::from_raw(cols * tile, rows * tile, buf) else {
            crate::log_err!("Raster buffer size mismatch for {}x{} @ {}px", cols, rows, tile);
            return;
        };
        self.image = Some(image);
        self.dirty = false;
        self.built_mode = Some(mode.clone());
        self.built_tile = tile;
        self.coverage = Some(coverage);
        self.generation += 1;
    }

    /// Raster dimensions when they exceed the GPU's `max_side`.
    pub fn oversize(&self, max_side: usize) -> Option<(u32, u32)> {
        let image = self.image.as_ref()?;
        let (w, h) = image.dimensions();
        (w as usize > max_side || h as usize > max_side).then_some((w, h))
    }

    /// Draw the cached raster at the camera's image rect, uploading it to
    /// the GPU only when it was rebuilt since the last upload.  Returns
    /// `false` when nothing could be drawn.
    pub fn composite(&mut self, ctx: &egui::Context, painter: &egui::Painter, camera: &Camera) -> bool {
        let max_side = ctx.input(|i| i.max_texture_side);
        if let Some((w, h)) = self.oversize(max_side) {
            if !self.warned_oversize {
                crate::log_warn!("Chart raster {}x{} exceeds the GPU texture limit {}", w, h, max_side);
                self.warned_oversize = true;
            }
            return false;
        }
        self.warned_oversize = false;
        let Some(image) = &self.image else { return false };
        let size = [image.width() as usize, image.height() as usize];

        if self.texture.is_none() || self.uploaded_generation != self.generation {
            let color_image = ColorImage::from_rgba_unmultiplied(size, image.as_raw());
            match &mut self.texture {
                Some(tex) => tex.set(color_image, TextureOptions::NEAREST),
                None => {
                    self.texture =
                        Some(ctx.load_texture("stitchfe-chart", color_image, TextureOptions::NEAREST));
                }
            }
            self.uploaded_generation = self.generation;
        }

        let Some(tex) = &self.texture else { return false };
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        painter.image(tex.id(), camera.image_rect(), uv, Color32::WHITE);
        true
    }
}

/// Grow a partial-coverage rect by half its size on each side so small pans
/// stay inside it.
fn pad_rect(rect: CellRect, cols: u32, rows: u32) -> CellRect {
    let pad_x = (rect.max_x - rect.min_x).div_ceil(2);
    let pad_y = (rect.max_y - rect.min_y).div_ceil(2);
    CellRect {
        min_x: rect.min_x.saturating_sub(pad_x),
        min_y: rect.min_y.saturating_sub(pad_y),
        max_x: (rect.max_x + pad_x).min(cols),
        max_y: (rect.max_y + pad_y).min(rows),
    }
}

fn blend(base: [u8; 3], top: [u8; 3], alpha: u8) -> [u8; 3] {
    let a = alpha as u32;
    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = ((top[i] as u32 * a + base[i] as u32 * (255 - a) + 127) / 255) as u8;
    }
    out
}

/// Gridline color at pixel (px, py) of cell (x, y), if any.  Lines sit on
/// each cell's top/left edge; the last row and column also get a closing
/// border.
fn gridline(x: u32, y: u32, px: u32, py: u32, tile: u32, cols: u32, rows: u32) -> Option<[u8; 3]> {
    let on_left = px == 0;
    let on_top = py == 0;
    let on_right = px == tile - 1 && x == cols - 1;
    let on_bottom = py == tile - 1 && y == rows - 1;
    if !(on_left || on_top || on_right || on_bottom) {
        return None;
    }
    if tile < 3 {
        // Too small for lines at every cell; keep majors only.
        let major = (on_left && x % MAJOR_GRID == 0) || (on_top && y % MAJOR_GRID == 0);
        return (major || on_right || on_bottom).then_some(GRID_DARK);
    }
    if (on_left && x == cols / 2) || (on_top && y == rows / 2) {
        return Some(GRID_CENTER);
    }
    if (on_left && x % MAJOR_GRID == 0) || (on_top && y % MAJOR_GRID == 0) || on_right || on_bottom {
        return Some(GRID_DARK);
    }
    Some(GRID_LIGHT)
}

// ============================================================================
// PREVIEW
// ============================================================================

/// Small true-color thumbnail fitting in `box_px`: stitched cells tinted,
/// blanks white, gray lines every ten cells and around the border.
pub fn render_preview(store: &PatternStore, box_px: u32) -> RgbaImage {
    let cols = store.cols();
    let rows = store.rows();
    let scale = (box_px / cols.max(rows).max(1)).max(1);
    let grid = store.merged_grid();
    let palette = store.palette();
    let line = Rgba([160, 160, 160, 255]);

    RgbaImage::from_fn(cols * scale, rows * scale, |px, py| {
        let (x, y) = (px / scale, py / scale);
        let on_major = (px % scale == 0 && x % MAJOR_GRID == 0)
            || (py % scale == 0 && y % MAJOR_GRID == 0);
        let on_border = px == cols * scale - 1 || py == rows * scale - 1;
        if on_major || on_border {
            return line;
        }
        let rgb = match grid[(y * cols + x) as usize] {
            Some(code) if code == STITCHED_CODE => STITCHED_INFO.rgb,
            Some(code) if !is_empty_code(code) => palette.describe(code).rgb,
            _ => PAPER,
        };
        Rgba([rgb[0], rgb[1], rgb[2], 255])
    })
}
