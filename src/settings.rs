use std::path::PathBuf;

use crate::canvas::CameraLimits;

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Multiplier applied to mouse-wheel zoom steps
    pub scroll_sensitivity: f32,
    /// Bucket fills larger than this ask for confirmation
    pub fill_confirm_threshold: usize,
    /// Pointer travel (screen px) below which a press/release is a click
    pub click_slop_px: f32,
    /// Longest raster edge in pixels
    pub max_raster_edge: u32,
    pub min_tile_px: u32,
    pub max_tile_px: u32,
    /// Upper bound on one cell's on-screen size
    pub max_cell_screen_px: f32,
    pub show_symbols: bool,
    /// Rasterize only the cells on screen (large charts)
    pub visible_only_raster: bool,
    /// Path hops longer than this (in cells) are flagged and re-routed
    pub path_threshold: f32,
    /// Pattern files cycled by "Next pattern"
    pub pattern_playlist: Vec<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            scroll_sensitivity: 1.0,
            fill_confirm_threshold: crate::components::fill::DEFAULT_FILL_CONFIRM_THRESHOLD,
            click_slop_px: 3.0,
            max_raster_edge: 4096,
            min_tile_px: 4,
            max_tile_px: 20,
            max_cell_screen_px: 64.0,
            show_symbols: true,
            visible_only_raster: false,
            path_threshold: 10.0,
            pattern_playlist: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/stitchfe/stitchfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\StitchFE\stitchfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/StitchFE/stitchfe_settings.cfg
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("stitchfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stitchfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("StitchFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stitchfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("StitchFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stitchfe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("stitchfe_settings.cfg")))
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config()) {
            crate::log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config(&content)
    }

    pub fn to_config(&self) -> String {
        let playlist: Vec<String> = self
            .pattern_playlist
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        format!(
            "scroll_sensitivity={}\n\
             fill_confirm_threshold={}\n\
             click_slop_px={}\n\
             max_raster_edge={}\n\
             min_tile_px={}\n\
             max_tile_px={}\n\
             max_cell_screen_px={}\n\
             show_symbols={}\n\
             visible_only_raster={}\n\
             path_threshold={}\n\
             pattern_playlist={}\n",
            self.scroll_sensitivity,
            self.fill_confirm_threshold,
            self.click_slop_px,
            self.max_raster_edge,
            self.min_tile_px,
            self.max_tile_px,
            self.max_cell_screen_px,
            self.show_symbols,
            self.visible_only_raster,
            self.path_threshold,
            playlist.join(";"),
        )
    }

    /// Parse `key=value` lines; unknown keys and bad values keep defaults.
    pub fn from_config(content: &str) -> Self {
        let mut s = Self::default();
        let d = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "scroll_sensitivity" => {
                    s.scroll_sensitivity = val
                        .parse()
                        .ok()
                        .filter(|v: &f32| *v > 0.0)
                        .unwrap_or(d.scroll_sensitivity);
                }
                "fill_confirm_threshold" => {
                    s.fill_confirm_threshold = val.parse().unwrap_or(d.fill_confirm_threshold);
                }
                "click_slop_px" => {
                    s.click_slop_px = val
                        .parse()
                        .ok()
                        .filter(|v: &f32| *v >= 0.0)
                        .unwrap_or(d.click_slop_px);
                }
                "max_raster_edge" => {
                    s.max_raster_edge = val
                        .parse()
                        .ok()
                        .filter(|v: &u32| *v > 0)
                        .unwrap_or(d.max_raster_edge);
                }
                "min_tile_px" => {
                    s.min_tile_px = val
                        .parse()
                        .ok()
                        .filter(|v: &u32| *v > 0)
                        .unwrap_or(d.min_tile_px);
                }
                "max_tile_px" => {
                    s.max_tile_px = val
                        .parse()
                        .ok()
                        .filter(|v: &u32| *v > 0)
                        .unwrap_or(d.max_tile_px);
                }
                "max_cell_screen_px" => {
                    s.max_cell_screen_px = val
                        .parse()
                        .ok()
                        .filter(|v: &f32| *v > 0.0)
                        .unwrap_or(d.max_cell_screen_px);
                }
                "show_symbols" => s.show_symbols = val == "true",
                "visible_only_raster" => s.visible_only_raster = val == "true",
                "path_threshold" => {
                    s.path_threshold = val.parse().unwrap_or(d.path_threshold);
                }
                "pattern_playlist" => {
                    s.pattern_playlist = val
                        .split(';')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect();
                }
                _ => {}
            }
        }
        s
    }

    pub fn camera_limits(&self) -> CameraLimits {
        CameraLimits {
            max_raster_edge: self.max_raster_edge,
            min_tile_px: self.min_tile_px,
            max_tile_px: self.max_tile_px,
            max_cell_screen_px: self.max_cell_screen_px,
            click_slop_px: self.click_slop_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trip() {
        let mut s = AppSettings::default();
        s.fill_confirm_threshold = 250;
        s.show_symbols = false;
        s.pattern_playlist = vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")];
        assert_eq!(AppSettings::from_config(&s.to_config()), s);
    }

    #[test]
    fn corrupt_values_fall_back() {
        let s = AppSettings::from_config("max_tile_px=banana\nclick_slop_px=-2\nnot a line\nmin_tile_px=0");
        let d = AppSettings::default();
        assert_eq!(s.max_tile_px, d.max_tile_px);
        assert_eq!(s.click_slop_px, d.click_slop_px);
        assert_eq!(s.min_tile_px, d.min_tile_px);
    }

    #[test]
    fn empty_playlist_entries_dropped() {
        let s = AppSettings::from_config("pattern_playlist= a.json ;;b.json;");
        assert_eq!(s.pattern_playlist, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }
}
