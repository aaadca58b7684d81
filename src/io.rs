use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rfd::FileDialog;
use serde::{Deserialize, Serialize};

use crate::pattern::{Palette, PaletteEntry, Pattern, PatternStore};

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for pattern file operations
#[derive(Debug)]
pub enum PatternError {
    Io(std::io::Error),
    Json(String),
    /// The file parsed but its contents are inconsistent.
    Format(String),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Io(e) => write!(f, "I/O error: {}", e),
            PatternError::Json(e) => write!(f, "Invalid pattern file: {}", e),
            PatternError::Format(e) => write!(f, "Invalid pattern data: {}", e),
        }
    }
}

impl std::error::Error for PatternError {}

impl From<std::io::Error> for PatternError {
    fn from(e: std::io::Error) -> Self {
        PatternError::Io(e)
    }
}

impl From<serde_json::Error> for PatternError {
    fn from(e: serde_json::Error) -> Self {
        PatternError::Json(e.to_string())
    }
}

// ============================================================================
// PATTERN FILE FORMAT (JSON)
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct PatternProperties {
    pub width: u32,
    pub height: u32,
}

/// Palette ids show up both as JSON strings and as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ColorRecordIn {
    id: RawId,
    #[serde(rename = "dmcCode")]
    dmc_code: String,
    #[serde(rename = "dmcName", default)]
    dmc_name: String,
    #[serde(rename = "R", default)]
    r: u8,
    #[serde(rename = "G", default)]
    g: u8,
    #[serde(rename = "B", default)]
    b: u8,
    #[serde(default)]
    symbol: String,
}

#[derive(Serialize)]
struct ColorRecordOut<'a> {
    id: &'a str,
    #[serde(rename = "dmcCode")]
    dmc_code: &'a str,
    #[serde(rename = "dmcName")]
    dmc_name: &'a str,
    #[serde(rename = "R")]
    r: u8,
    #[serde(rename = "G")]
    g: u8,
    #[serde(rename = "B")]
    b: u8,
    symbol: &'a str,
}

#[derive(Deserialize)]
struct PatternFileIn {
    properties: PatternProperties,
    colors: Vec<ColorRecordIn>,
    stitches: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExportMetadata {
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
    #[serde(rename = "changesApplied")]
    pub changes_applied: usize,
    /// Completion percentage with one decimal, e.g. `"42.0"`.
    pub completion: String,
}

#[derive(Serialize)]
struct PatternFileOut<'a> {
    properties: PatternProperties,
    colors: Vec<ColorRecordOut<'a>>,
    stitches: String,
    metadata: ExportMetadata,
}

/// Parse and validate a pattern from raw JSON bytes.
pub fn load_from_bytes(bytes: &[u8]) -> Result<Pattern, PatternError> {
    let file: PatternFileIn = serde_json::from_slice(bytes)?;
    let entries = file
        .colors
        .into_iter()
        .map(|c| PaletteEntry {
            id: c.id.into_string(),
            code: c.dmc_code,
            name: c.dmc_name,
            rgb: [c.r, c.g, c.b],
            symbol: c.symbol,
        })
        .collect();
    Pattern::decode(
        file.properties.width,
        file.properties.height,
        Palette::new(entries),
        &file.stitches,
    )
}

/// Load a pattern file from disk.
pub fn load_pattern(path: &Path) -> Result<Pattern, PatternError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let pattern = load_from_bytes(&bytes)?;
    crate::log_info!(
        "Loaded pattern {} ({}x{}, {} colors)",
        path.display(),
        pattern.cols(),
        pattern.rows(),
        pattern.palette().entries().len()
    );
    Ok(pattern)
}

/// Serialize the merged view of `store` as a pattern file.
pub fn export_to_string(store: &PatternStore) -> Result<String, PatternError> {
    let palette = store.export_palette();
    let info = store.info();
    let out = PatternFileOut {
        properties: PatternProperties {
            width: store.cols(),
            height: store.rows(),
        },
        colors: palette
            .iter()
            .map(|e| ColorRecordOut {
                id: &e.id,
                dmc_code: &e.code,
                dmc_name: &e.name,
                r: e.rgb[0],
                g: e.rgb[1],
                b: e.rgb[2],
                symbol: &e.symbol,
            })
            .collect(),
        stitches: store.export_encoded(),
        metadata: ExportMetadata {
            exported_at: crate::logger::now_iso8601(),
            changes_applied: info.change_count,
            completion: format!("{:.1}", info.completion_percent),
        },
    };
    Ok(serde_json::to_string(&out)?)
}

/// Write the merged view of `store` to `path`.
pub fn save_pattern(store: &PatternStore, path: &Path) -> Result<(), PatternError> {
    let json = export_to_string(store)?;
    let mut writer = BufWriter::new(File::create(path)?);
    std::io::Write::write_all(&mut writer, json.as_bytes())?;
    std::io::Write::flush(&mut writer)?;
    crate::log_info!("Exported pattern to {}", path.display());
    Ok(())
}

/// Default export file stem: `<name>_<unix seconds>.json`.
pub fn default_export_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "out".to_string());
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}_{}.json", stem, secs)
}

// ============================================================================
// FILE DIALOGS + PLAYLIST
// ============================================================================

pub struct FileHandler {
    /// Index into the configured playlist of the last pattern opened from it.
    playlist_index: Option<usize>,
    pub last_dir: Option<PathBuf>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self {
            playlist_index: None,
            last_dir: None,
        }
    }

    pub fn pick_open_path(&mut self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new().add_filter("Pattern", &["json"]);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.last_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }

    pub fn pick_save_path(&mut self, suggested_name: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("Pattern", &["json"])
            .set_file_name(suggested_name);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.save_file()?;
        self.last_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }

    /// Next entry of `playlist`, wrapping around.
    pub fn next_in_playlist<'a>(&mut self, playlist: &'a [PathBuf]) -> Option<&'a Path> {
        if playlist.is_empty() {
            return None;
        }
        let next = match self.playlist_index {
            Some(i) => (i + 1) % playlist.len(),
            None => 0,
        };
        self.playlist_index = Some(next);
        Some(playlist[next].as_path())
    }
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "properties": {"width": 3, "height": 2},
        "colors": [
            {"id": 1, "dmcCode": "310", "dmcName": "Black", "R": 0, "G": 0, "B": 0, "symbol": "X"},
            {"id": "2", "dmcCode": "321", "dmcName": "Red", "R": 199, "G": 43, "B": 59, "symbol": "O"}
        ],
        "stitches": "2-1,1-2:3-2"
    }"#;

    #[test]
    fn numeric_and_string_ids_both_resolve() {
        let p = load_from_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(p.cell_at(0, 0), Some("310"));
        assert_eq!(p.cell_at(2, 0), Some("321"));
        assert_eq!(p.palette().by_code("321").map(|e| e.rgb), Some([199, 43, 59]));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = load_from_bytes(b"{\"properties\": 3}").unwrap_err();
        assert!(matches!(err, PatternError::Json(_)));
    }

    #[test]
    fn inconsistent_counts_are_a_format_error() {
        let bad = SAMPLE.replace("\"width\": 3", "\"width\": 4");
        let err = load_from_bytes(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, PatternError::Format(_)));
        assert!(err.to_string().starts_with("Invalid pattern data"));
    }

    #[test]
    fn export_includes_metadata_and_stitched_palette() {
        let mut store = PatternStore::new(load_from_bytes(SAMPLE.as_bytes()).unwrap());
        store.stitch_cells(&[(0, 0), (1, 0)]);
        let json = export_to_string(&store).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stitches"], "2-stitched,1-2:3-2");
        assert_eq!(value["metadata"]["changesApplied"], 2);
        assert_eq!(value["metadata"]["completion"], "33.3");
        let stamp = value["metadata"]["exportedAt"].as_str().unwrap();
        assert_eq!(stamp.len(), "2023-11-14T22:13:20.042Z".len());
        assert_eq!(&stamp[10..11], "T");
        assert!(stamp.ends_with('Z'));
        assert!(value["colors"].as_array().unwrap().iter().any(|c| c["dmcCode"] == "stitched"));
    }

    #[test]
    fn playlist_wraps() {
        let list = vec![PathBuf::from("a.json"), PathBuf::from("b.json")];
        let mut handler = FileHandler::new();
        assert_eq!(handler.next_in_playlist(&list), Some(Path::new("a.json")));
        assert_eq!(handler.next_in_playlist(&list), Some(Path::new("b.json")));
        assert_eq!(handler.next_in_playlist(&list), Some(Path::new("a.json")));
        assert_eq!(handler.next_in_playlist(&[]), None);
    }

    #[test]
    fn export_name_uses_stem() {
        assert!(default_export_name("cubs.json").starts_with("cubs_"));
        assert!(default_export_name("").starts_with("out_"));
    }
}
