//! Vector06C emulator binary.
//!
//! Headless driver: boots the machine from `settings.json`, runs the
//! requested number of frames through the request dispatcher, optionally
//! dumps the registers as JSON, and flushes dirty floppy images back to
//! disk on exit.

use std::path::PathBuf;
use std::process;

use emu_vector06c::config::{load_settings, Settings};
use emu_vector06c::debug_data;
use emu_vector06c::{Hardware, HardwareHandle, Reply, Request};

const DEFAULT_SETTINGS_PATH: &str = "settings.json";

struct CliArgs {
    settings_path: PathBuf,
    /// The path came from the command line (a missing file is then fatal).
    explicit: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
        explicit: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--settingsPath" => {
                i += 1;
                match args.get(i) {
                    Some(path) => {
                        cli.settings_path = PathBuf::from(path);
                        cli.explicit = true;
                    }
                    None => {
                        eprintln!("--settingsPath requires a path");
                        process::exit(1);
                    }
                }
            }
            "--help" | "-h" => {
                eprintln!("Usage: emu-vector06c [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!(
                    "  --settingsPath <file>  Settings file [default: {DEFAULT_SETTINGS_PATH}]"
                );
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_settings_or_exit(cli: &CliArgs) -> Settings {
    if cli.settings_path.exists() {
        match load_settings(&cli.settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if cli.explicit {
        eprintln!("settings file {} not found", cli.settings_path.display());
        process::exit(1);
    } else {
        eprintln!("no {DEFAULT_SETTINGS_PATH} found, using defaults");
        Settings::default()
    }
}

fn expect_ok(reply: &Reply, what: &str) {
    if let Reply::Error(e) = reply {
        eprintln!("{what}: {e}");
        process::exit(1);
    }
}

fn main() {
    let cli = parse_args();
    let settings = load_settings_or_exit(&cli);

    let handle = HardwareHandle::start(Hardware::new());

    if let Some(ref rom_path) = settings.rom_path {
        let data = match std::fs::read(rom_path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("failed to read ROM {}: {e}", rom_path.display());
                process::exit(1);
            }
        };
        expect_ok(&handle.request(Request::LoadRom { data }), "ROM load");
        eprintln!("ROM loaded: {}", rom_path.display());

        match debug_data::load_for_rom(rom_path) {
            Ok(Some(data)) => {
                expect_ok(
                    &handle.request(Request::SetDebugData { data }),
                    "debug data",
                );
                eprintln!("debug data loaded");
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    }

    let fdd_paths: Vec<PathBuf> = settings
        .fdd_paths
        .iter()
        .take(kr1818wg93::DRIVES_MAX)
        .cloned()
        .collect();
    for (drive, path) in fdd_paths.iter().enumerate() {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("failed to read disk image {}: {e}", path.display());
                process::exit(1);
            }
        };
        expect_ok(
            &handle.request(Request::LoadFdd { drive, data }),
            "disk mount",
        );
        eprintln!("disk mounted in drive {drive}: {}", path.display());
    }

    for _ in 0..settings.frames {
        match handle.request(Request::ExecuteFrame) {
            Reply::Bool(true) => {
                eprintln!("break hit, stopping");
                break;
            }
            Reply::Bool(false) => {}
            Reply::Error(e) => {
                eprintln!("frame execution: {e}");
                process::exit(1);
            }
            _ => {}
        }
    }

    if settings.dump_regs {
        if let Reply::Regs(regs) = handle.request(Request::GetRegs) {
            println!(
                "{}",
                serde_json::to_string_pretty(&regs).unwrap_or_default()
            );
        }
    }

    // Flush dirty floppies back to their files.
    for (drive, path) in fdd_paths.iter().enumerate() {
        if let Reply::Fdd(Some(fdd)) = handle.request(Request::EjectFdd { drive }) {
            if fdd.dirty {
                match std::fs::write(path, &fdd.data) {
                    Ok(()) => eprintln!("disk {drive} written back to {}", path.display()),
                    Err(e) => eprintln!("failed to write {}: {e}", path.display()),
                }
            }
        }
    }
}
