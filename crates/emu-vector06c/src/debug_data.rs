//! Debug-data files.
//!
//! A ROM `foo.rom` may ship a `foo.json` next to it with symbol
//! information for the disassembler:
//!
//! ```json
//! {
//!     "labels":   { "entry": "0x0100", "also_entry": "0x0100" },
//!     "consts":   { "SCREEN": "0x8000" },
//!     "comments": { "0x0103": "wait for vblank" }
//! }
//! ```
//!
//! Addresses are `"0xHHHH"` string literals. Multiple labels may share an
//! address; operand substitution in the disassembler only fires when the
//! name is unique.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Raw file shape.
#[derive(Debug, Default, Deserialize)]
struct DebugDataFile {
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    consts: BTreeMap<String, String>,
    #[serde(default)]
    comments: BTreeMap<String, String>,
}

/// Parsed debug data, keyed by address.
#[derive(Debug, Default, Clone)]
pub struct DebugData {
    pub labels: BTreeMap<u16, Vec<String>>,
    pub consts: BTreeMap<u16, Vec<String>>,
    pub comments: BTreeMap<u16, String>,
}

/// Parse a `"0xHHHH"` address literal.
fn parse_addr(text: &str) -> Result<u16, String> {
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| format!("address literal {text:?} must start with 0x"))?;
    u16::from_str_radix(hex, 16).map_err(|e| format!("bad address literal {text:?}: {e}"))
}

/// Parse debug-data JSON.
///
/// # Errors
///
/// Fails on malformed JSON or malformed address literals.
pub fn parse_debug_data(json: &str) -> Result<DebugData, String> {
    let file: DebugDataFile =
        serde_json::from_str(json).map_err(|e| format!("bad debug data: {e}"))?;

    let mut data = DebugData::default();
    for (name, addr_text) in file.labels {
        let addr = parse_addr(&addr_text)?;
        data.labels.entry(addr).or_default().push(name);
    }
    for (name, addr_text) in file.consts {
        let addr = parse_addr(&addr_text)?;
        data.consts.entry(addr).or_default().push(name);
    }
    for (addr_text, comment) in file.comments {
        let addr = parse_addr(&addr_text)?;
        data.comments.insert(addr, comment);
    }
    Ok(data)
}

/// Load the debug data next to a ROM, if the sibling `.json` exists.
///
/// # Errors
///
/// A missing file is `Ok(None)`; an unreadable or malformed one is an
/// error.
pub fn load_for_rom(rom_path: &Path) -> Result<Option<DebugData>, String> {
    let json_path = rom_path.with_extension("json");
    if !json_path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&json_path)
        .map_err(|e| format!("failed to read {}: {e}", json_path.display()))?;
    parse_debug_data(&text).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_sections() {
        let data = parse_debug_data(
            r#"{
                "labels": { "entry": "0x0100", "also": "0x0100" },
                "consts": { "SCREEN": "0x8000" },
                "comments": { "0x0103": "wait here" }
            }"#,
        )
        .unwrap();

        let mut at_entry = data.labels.get(&0x0100).unwrap().clone();
        at_entry.sort();
        assert_eq!(at_entry, vec!["also".to_string(), "entry".to_string()]);
        assert_eq!(data.consts.get(&0x8000).unwrap(), &vec!["SCREEN".to_string()]);
        assert_eq!(data.comments.get(&0x0103).unwrap(), "wait here");
    }

    #[test]
    fn missing_sections_default_empty() {
        let data = parse_debug_data("{}").unwrap();
        assert!(data.labels.is_empty());
        assert!(data.consts.is_empty());
        assert!(data.comments.is_empty());
    }

    #[test]
    fn bad_json_and_bad_addresses_error() {
        assert!(parse_debug_data("not json").is_err());
        assert!(parse_debug_data(r#"{ "labels": { "x": "256" } }"#).is_err());
        assert!(parse_debug_data(r#"{ "labels": { "x": "0xGGGG" } }"#).is_err());
    }
}
