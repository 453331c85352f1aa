// Uopgen
// Copyright (C) 2025 The Uopgen Authors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Jump-table generation for a computed-goto dispatch loop
//!
//! Consumes a flat opcode-name to number mapping and renders either the
//! 256-entry label-address table, with every unmapped slot pointing at its
//! own numbered placeholder label, or the case-label block that routes
//! those placeholders to the shared unknown-opcode handler.

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Default output path for the jump table
pub const DEFAULT_TARGETS_OUTPUT: &str = "opcode_targets.h";
/// Default output path for the unknown-opcode case block
pub const DEFAULT_UNKNOWNS_OUTPUT: &str = "unknown_opcodes.h";

/// Errors from loading or validating an opcode map
#[derive(Error, Debug)]
pub enum TargetsError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid opcode map '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("opcode {opcode} for '{name}' is out of range")]
    OpcodeRange { name: String, opcode: u64 },
    #[error("opcode {opcode} assigned to both '{first}' and '{second}'")]
    DuplicateOpcode { opcode: u8, first: String, second: String },
}

/// Opcode-name to number mapping, every opcode below 256 and unique
#[derive(Debug, Clone, Default)]
pub struct OpcodeMap {
    entries: BTreeMap<String, u8>,
}

impl OpcodeMap {
    /// Parse a map from a JSON object of `{"NAME": number}` pairs
    pub fn from_json_str(json: &str, path: &str) -> Result<Self, TargetsError> {
        let raw: BTreeMap<String, u64> = serde_json::from_str(json).map_err(|source| TargetsError::Parse {
            path: path.to_string(),
            source,
        })?;
        let mut entries = BTreeMap::new();
        let mut owners: BTreeMap<u8, String> = BTreeMap::new();
        for (name, opcode) in raw {
            if opcode > u8::MAX as u64 {
                return Err(TargetsError::OpcodeRange { name, opcode });
            }
            let opcode = opcode as u8;
            if let Some(first) = owners.get(&opcode) {
                return Err(TargetsError::DuplicateOpcode {
                    opcode,
                    first: first.clone(),
                    second: name,
                });
            }
            owners.insert(opcode, name.clone());
            entries.insert(name, opcode);
        }
        Ok(Self { entries })
    }

    /// Load a map from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TargetsError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let json = std::fs::read_to_string(path).map_err(|source| TargetsError::Io {
            path: name.clone(),
            source,
        })?;
        Self::from_json_str(&json, &name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Known opcodes in name order
    pub fn entries(&self) -> impl Iterator<Item = (&str, u8)> {
        self.entries.iter().map(|(name, &opcode)| (name.as_str(), opcode))
    }

    /// Resolve an opcode number back to its name
    pub fn name_of(&self, opcode: u8) -> Option<&str> {
        self.entries
            .iter()
            .find(|&(_, &op)| op == opcode)
            .map(|(name, _)| name.as_str())
    }
}

/// Render the 256-entry label-address table
pub fn write_targets(map: &OpcodeMap) -> String {
    let mut targets: Vec<String> = (0..256).map(|i| format!("_unknown_opcode_{}", i)).collect();
    for (name, opcode) in map.entries() {
        targets[opcode as usize] = format!("TARGET_{}", name);
    }
    let mut out = String::from("static void *opcode_targets[256] = {\n");
    let rows: Vec<String> = targets.iter().map(|label| format!("    &&{}", label)).collect();
    out.push_str(&rows.join(",\n"));
    out.push_str("\n};\n");
    out
}

/// Render the case labels routing every unmapped opcode to the shared handler
pub fn write_unknowns(map: &OpcodeMap) -> String {
    let mut known = [false; 256];
    for (_, opcode) in map.entries() {
        known[opcode as usize] = true;
    }
    let mut out = String::new();
    for (i, _) in known.iter().enumerate().filter(|(_, known)| !**known) {
        out.push_str(&format!("    UNKNOWN_OPCODE({i}):\n"));
        out.push_str(&format!("        oparg = {i};\n"));
        out.push_str("        goto _unknown_opcode;\n");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_map() -> OpcodeMap {
        OpcodeMap::from_json_str(r#"{"LOAD_FAST": 0, "STORE_FAST": 1, "RETURN_VALUE": 83}"#, "opmap.json").unwrap()
    }

    #[test]
    fn test_targets_table_shape() {
        let table = write_targets(&sample_map());
        assert!(table.starts_with("static void *opcode_targets[256] = {\n"));
        assert!(table.contains("    &&TARGET_LOAD_FAST,\n"));
        assert!(table.contains("    &&TARGET_RETURN_VALUE,\n"));
        assert!(table.contains("    &&_unknown_opcode_2,\n"));
        // The last entry carries no trailing comma.
        assert!(table.ends_with("    &&_unknown_opcode_255\n};\n"));
        assert_eq!(table.lines().count(), 258);
    }

    #[test]
    fn test_every_unmapped_opcode_gets_a_distinct_label() {
        let block = write_unknowns(&sample_map());
        assert_eq!(block.matches("UNKNOWN_OPCODE(").count(), 253);
        assert!(!block.contains("UNKNOWN_OPCODE(0):"));
        assert!(!block.contains("UNKNOWN_OPCODE(83):"));
        assert!(block.contains("    UNKNOWN_OPCODE(2):\n        oparg = 2;\n        goto _unknown_opcode;\n"));
        let opargs: HashSet<&str> = block
            .lines()
            .map(str::trim_start)
            .filter(|line| line.starts_with("oparg = "))
            .collect();
        assert_eq!(opargs.len(), 253);
    }

    #[test]
    fn test_full_map_leaves_no_unknowns() {
        let pairs: Vec<String> = (0..256).map(|i| format!("\"OP_{}\": {}", i, i)).collect();
        let map = OpcodeMap::from_json_str(&format!("{{{}}}", pairs.join(", ")), "opmap.json").unwrap();
        assert_eq!(map.len(), 256);
        assert!(!write_targets(&map).contains("_unknown_opcode_"));
        assert_eq!(write_unknowns(&map), "\n");
    }

    #[test]
    fn test_name_of_reverses_the_mapping() {
        let map = sample_map();
        assert_eq!(map.name_of(83), Some("RETURN_VALUE"));
        assert_eq!(map.name_of(84), None);
    }

    #[test]
    fn test_rejects_out_of_range_opcode() {
        let err = OpcodeMap::from_json_str(r#"{"BIG": 256}"#, "opmap.json").unwrap_err();
        assert!(matches!(err, TargetsError::OpcodeRange { opcode: 256, .. }));
    }

    #[test]
    fn test_rejects_duplicate_opcode() {
        let err = OpcodeMap::from_json_str(r#"{"A": 7, "B": 7}"#, "opmap.json").unwrap_err();
        match err {
            TargetsError::DuplicateOpcode { opcode, first, second } => {
                assert_eq!(opcode, 7);
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = OpcodeMap::from_json_str("not json", "opmap.json").unwrap_err();
        assert!(err.to_string().contains("invalid opcode map 'opmap.json'"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = OpcodeMap::load("/nonexistent/opmap.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/opmap.json"));
    }
}
