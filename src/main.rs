// GUI-subsystem binary: no console window is ever allocated by Windows.
// CLI mode (--input/-i flag present) attaches to the launching terminal and
// reopens its console output so println!/eprintln! reach it.
#![windows_subsystem = "windows"]

use eframe::egui;
use stitchfe::app::StitchApp;
use stitchfe::{cli, logger};

/// NUL-terminated UTF-16 for Win32 `*W` calls.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn wide_nul(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Attach to the launching terminal and point stdout/stderr at its console
/// buffer.  The inherited std handles are invalid under the GUI subsystem,
/// so attaching alone leaves `println!` writing nowhere.  CLI mode never
/// reads stdin, so `CONIN$` is left alone.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
        fn SetStdHandle(nStdHandle: u32, hHandle: isize) -> i32;
        fn CreateFileW(
            lpFileName: *const u16,
            dwDesiredAccess: u32,
            dwShareMode: u32,
            lpSecurityAttributes: *const std::ffi::c_void,
            dwCreationDisposition: u32,
            dwFlagsAndAttributes: u32,
            hTemplateFile: isize,
        ) -> isize;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const FILE_SHARE_READ_WRITE: u32 = 0x0000_0003;
    const OPEN_EXISTING: u32 = 3;
    const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5; // -11
    const STD_ERROR_HANDLE: u32 = 0xFFFF_FFF4; // -12
    const INVALID_HANDLE_VALUE: isize = -1;

    let conout = wide_nul("CONOUT$");
    unsafe {
        if AttachConsole(ATTACH_PARENT_PROCESS) == 0 {
            return;
        }
        let handle = CreateFileW(
            conout.as_ptr(),
            GENERIC_WRITE,
            FILE_SHARE_READ_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            0,
        );
        if handle != INVALID_HANDLE_VALUE {
            SetStdHandle(STD_OUTPUT_HANDLE, handle);
            SetStdHandle(STD_ERROR_HANDLE, handle);
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        attach_parent_console();
    }

    // Initialize session log (overwrites previous session log)
    logger::init();

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------
    // Plain arguments are pattern files to open at startup.
    let startup_files: Vec<std::path::PathBuf> = std::env::args()
        .skip(1)
        .filter(|a| !a.starts_with('-'))
        .map(std::path::PathBuf::from)
        .collect();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("StitchFE")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "StitchFE",
        options,
        Box::new(|cc| Box::new(StitchApp::new(cc, startup_files))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_nul_terminates_console_name() {
        let wide = wide_nul("CONOUT$");
        assert_eq!(wide.len(), 8);
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(String::from_utf16_lossy(&wide[..7]), "CONOUT$");
    }
}
