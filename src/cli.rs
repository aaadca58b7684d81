// ============================================================================
// StitchFE CLI — headless chart inspection and export
// ============================================================================
//
// Usage examples:
//   stitchfe --input chart.json --info
//   stitchfe -i chart.json --export copy.json --preview thumb.png --box 480
//   stitchfe -i "charts/*.json" --preview previews/
//   stitchfe -i chart.json --plan 310 --start center
//
// No window is opened in CLI mode. Everything runs synchronously on the
// current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::components::path::{DEFAULT_PATH_THRESHOLD, StartStrategy, plan_path};
use crate::components::dialogs::DEFAULT_PREVIEW_BOX;
use crate::io::{load_pattern, save_pattern};
use crate::ledger::{ColorLedger, physical_size_cm};
use crate::pattern::PatternStore;
use crate::raster::render_preview;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StitchFE headless chart tool.
#[derive(Parser, Debug)]
#[command(
    name = "stitchfe",
    about = "StitchFE headless cross-stitch chart tool",
    long_about = "Inspect, re-export and preview cross-stitch chart files without\n\
                  opening the GUI.\n\n\
                  Example:\n  \
                  stitchfe --input chart.json --info\n  \
                  stitchfe -i \"charts/*.json\" --preview previews/ --box 480"
)]
pub struct CliArgs {
    /// Input chart file(s). Glob patterns accepted (e.g. "charts/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Print dimensions, completion and per-color counts.
    #[arg(long)]
    pub info: bool,

    /// Re-export the chart (merged view plus metadata) as JSON.
    /// With several inputs this is a directory receiving `<stem>.json`.
    #[arg(long, value_name = "FILE.json")]
    pub export: Option<PathBuf>,

    /// Write a PNG thumbnail of the chart.
    /// With several inputs this is a directory receiving `<stem>.png`.
    #[arg(long, value_name = "FILE.png")]
    pub preview: Option<PathBuf>,

    /// Longest edge of the preview in pixels.
    #[arg(long = "box", default_value_t = DEFAULT_PREVIEW_BOX, value_name = "N")]
    pub box_px: u32,

    /// Print a stitching order for the clusters of this color code.
    #[arg(long, value_name = "CODE")]
    pub plan: Option<String>,

    /// Start of the planned order: top-left, center or random.
    #[arg(long, default_value = "top-left", value_name = "WHERE")]
    pub start: String,

    /// Hops longer than this many cells are flagged.
    #[arg(long, default_value_t = DEFAULT_PATH_THRESHOLD)]
    pub threshold: f32,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let start = match parse_start(&args.start) {
        Some(s) => s,
        None => {
            eprintln!("error: unknown --start '{}' (use top-left, center or random).", args.start);
            return ExitCode::FAILURE;
        }
    };

    let total = inputs.len();
    let multi = total > 1;
    for dir in [&args.export, &args.preview].into_iter().flatten() {
        if multi && let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let mut any_failure = false;
    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        match run_one(input_path, &args, start, multi) {
            Ok(report) => {
                for line in report {
                    println!("{}", line);
                }
                if args.verbose {
                    println!("  ({:.0}ms)", file_start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                crate::log_err!("CLI failed on {}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(input: &Path, args: &CliArgs, start: StartStrategy, multi: bool) -> Result<Vec<String>, String> {
    let pattern = load_pattern(input).map_err(|e| format!("load failed: {}", e))?;
    let store = PatternStore::new(pattern);
    let mut report = Vec::new();

    if args.info {
        report.extend(info_report(&store));
    }

    if let Some(code) = &args.plan {
        let mut rng = StdRng::from_entropy();
        match plan_path(&store, code, start, args.threshold, &mut rng) {
            Some(path) => {
                report.push(format!(
                    "  path for {}: {} clusters, {:.1} cells travelled, {} long hops",
                    code,
                    path.clusters.len(),
                    path.total_distance(),
                    path.long_hops()
                ));
                for seg in &path.segments {
                    report.push(format!(
                        "    ({}, {}) -> ({}, {})  {:.1}{}",
                        seg.from_cell.0 + 1,
                        seg.from_cell.1 + 1,
                        seg.to_cell.0 + 1,
                        seg.to_cell.1 + 1,
                        seg.distance,
                        if seg.long_hop { "  [long]" } else { "" }
                    ));
                }
            }
            None => report.push(format!("  no cells of {} to plan", code)),
        }
    }

    if let Some(target) = &args.export {
        let out = build_output_path(input, target, multi, "json")
            .ok_or_else(|| "cannot determine export path".to_string())?;
        save_pattern(&store, &out).map_err(|e| format!("export failed: {}", e))?;
        report.push(format!("  → {}", out.display()));
    }

    if let Some(target) = &args.preview {
        let out = build_output_path(input, target, multi, "png")
            .ok_or_else(|| "cannot determine preview path".to_string())?;
        render_preview(&store, args.box_px.max(1))
            .save(&out)
            .map_err(|e| format!("preview failed: {}", e))?;
        crate::log_info!("Wrote preview {}", out.display());
        report.push(format!("  → {}", out.display()));
    }

    Ok(report)
}

// ============================================================================
// Helpers
// ============================================================================

/// Summary lines printed by `--info`.
pub fn info_report(store: &PatternStore) -> Vec<String> {
    let info = store.info();
    let ledger = ColorLedger::rebuild(store);
    let (w_cm, h_cm) = physical_size_cm(info.cols, info.rows);
    let mut lines = vec![
        format!(
            "  {} stitches, {} colors, {:.1} x {:.1} cm on 14-count Aida",
            info.dimensions(),
            info.unique_colors,
            w_cm,
            h_cm
        ),
        format!(
            "  {} / {} stitched ({:.1}%)",
            info.stitched_cells, info.stitchable_cells, info.completion_percent
        ),
    ];
    for entry in ledger.selectable() {
        lines.push(format!("    {:<8} {:<24} {:>6}", entry.code, entry.name, entry.count));
    }
    lines
}

fn parse_start(arg: &str) -> Option<StartStrategy> {
    match arg.to_lowercase().as_str() {
        "top-left" | "topleft" | "tl" => Some(StartStrategy::TopLeft),
        "center" | "centre" => Some(StartStrategy::Center),
        "random" => Some(StartStrategy::Random),
        _ => None,
    }
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Output path for one input.  A single input writes to `target` as given;
/// several inputs treat `target` as a directory of `<stem>.<ext>` files.
fn build_output_path(input: &Path, target: &Path, multi: bool, ext: &str) -> Option<PathBuf> {
    if !multi {
        return Some(target.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    Some(target.join(format!("{}.{}", stem, ext)))
}
