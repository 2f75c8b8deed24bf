//! Emulator settings.
//!
//! Loaded from a JSON file (default `settings.json`):
//!
//! ```json
//! {
//!     "romPath": "boot/boots.rom",
//!     "fddPaths": ["disks/games.fdd"],
//!     "frames": 300,
//!     "dumpRegs": true
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Settings for a headless run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Boot ROM; the machine runs the empty store when absent.
    pub rom_path: Option<PathBuf>,
    /// Disk images mounted into drives 0..3 in order.
    pub fdd_paths: Vec<PathBuf>,
    /// Frames to run before exiting.
    pub frames: u32,
    /// Print a register snapshot as JSON on exit.
    pub dump_regs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rom_path: None,
            fdd_paths: Vec::new(),
            frames: 50,
            dump_regs: true,
        }
    }
}

/// Load settings from a JSON file.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<Settings, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("bad settings {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let settings: Settings = serde_json::from_str(r#"{ "frames": 10 }"#).unwrap();
        assert_eq!(settings.frames, 10);
        assert!(settings.rom_path.is_none());
        assert!(settings.dump_regs);
    }

    #[test]
    fn full_settings_parse() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "romPath": "boot/boots.rom",
                "fddPaths": ["a.fdd", "b.fdd"],
                "frames": 300,
                "dumpRegs": false
            }"#,
        )
        .unwrap();
        assert_eq!(settings.rom_path.unwrap(), PathBuf::from("boot/boots.rom"));
        assert_eq!(settings.fdd_paths.len(), 2);
        assert_eq!(settings.frames, 300);
        assert!(!settings.dump_regs);
    }
}
