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

//! End-to-end pipeline tests: source text through analysis, verification,
//! and header generation.

use uopgen_core::metadata::write_metadata;
use uopgen_core::targets::{write_targets, write_unknowns, OpcodeMap};
use uopgen_core::trace;
use uopgen_core::{analyze_files, analyze_source, verify, EscapePolicy};

const DEFS: &str = "\
pure op(_LOAD_FAST, (-- value)) {
    value = GETLOCAL(oparg);
    Py_INCREF(value);
}

op(_BINARY_OP, (lhs, rhs -- res)) {
    res = PyNumber_Add(lhs, rhs);
    Py_DECREF(lhs);
    Py_DECREF(rhs);
    ERROR_IF(res == NULL, error);
}

op(_CALL_HELPER, (callable, args[oparg] -- res)) {
    if (tstate) {
        Py_DECREF(callable);
        res = PyObject_SetAttr(callable, args, NULL);
    }
}

op(_JUMP_HELPER, (cond -- )) {
    if (flag) {
        res = PyObject_IsTrue(cond);
        goto error;
    }
}

op(_STORE_ATTR, (v, owner -- )) {
    SYNC_SP();
    err = PyObject_SetAttr(owner, name, v);
    ERROR_IF(err, error);
}

op(_GUARD_TYPE, (version/2, owner -- owner)) {
    DEOPT_IF(owner != version);
}
";

fn analyzed() -> uopgen_core::Analysis {
    analyze_source(DEFS, "defs.c", &EscapePolicy::new()).unwrap()
}

#[test]
fn test_all_definitions_are_collected() {
    let analysis = analyzed();
    assert_eq!(analysis.len(), 6);
    for name in ["_LOAD_FAST", "_BINARY_OP", "_CALL_HELPER", "_JUMP_HELPER", "_STORE_ATTR", "_GUARD_TYPE"] {
        assert!(analysis.contains(name), "missing {name}");
    }
}

#[test]
fn test_verification_reports_exactly_the_unsafe_regions() {
    let analysis = analyzed();
    let found = verify(&analysis, &EscapePolicy::new()).unwrap();
    let rendered: Vec<String> = found.iter().map(|d| d.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "DECREF in escaping call to 'PyObject_SetAttr' in '_CALL_HELPER' at defs.c:15".to_string(),
            "`goto` in escaping call to 'PyObject_IsTrue' in '_JUMP_HELPER' at defs.c:23".to_string(),
        ]
    );
}

#[test]
fn test_sync_marker_suppresses_diagnostics_downstream() {
    // _STORE_ATTR calls the same escaping function as _CALL_HELPER but
    // flushes the stack pointer first; it must stay silent.
    let found = verify(&analyzed(), &EscapePolicy::new()).unwrap();
    assert!(found.iter().all(|d| !d.to_string().contains("_STORE_ATTR")));
}

#[test]
fn test_metadata_header_covers_the_analysis() {
    let analysis = analyzed();
    let header = write_metadata(&analysis, &["defs.c".to_string()]);

    assert!(header.contains("// This file is generated by uopgen metadata"));
    assert!(header.contains("#ifndef Py_CORE_UOP_METADATA_H"));
    assert!(header.contains("[_LOAD_FAST] = HAS_ARG_FLAG | HAS_PURE_FLAG,"));
    assert!(header.contains("[_BINARY_OP] = HAS_ERROR_FLAG | HAS_ESCAPES_FLAG,"));
    assert!(header.contains("[_GUARD_TYPE] = HAS_DEOPT_FLAG,"));
    assert!(header.contains("[_LOAD_FAST] = { 0, 2, 1, { _LOAD_FAST_r01, _LOAD_FAST_r12, _LOAD_FAST_r23, 0 } },"));
    assert!(header.contains("[_BINARY_OP] = \"_BINARY_OP\","));
    assert!(header.contains("case _CALL_HELPER:"));
    assert!(header.contains("return 1 + oparg;"));
    assert!(header.contains("case _BINARY_OP:"));
    assert!(header.contains("return 2;"));
}

#[test]
fn test_analyze_files_merges_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let split = DEFS.find("op(_JUMP_HELPER").unwrap();
    let first = dir.path().join("first.c");
    let second = dir.path().join("second.c");
    std::fs::write(&first, &DEFS[..split]).unwrap();
    std::fs::write(&second, &DEFS[split..]).unwrap();

    let policy = EscapePolicy::new();
    let analysis = analyze_files(&[&first, &second], &policy).unwrap();
    assert_eq!(analysis.len(), 6);

    let found = verify(&analysis, &policy).unwrap();
    assert_eq!(found.len(), 2);
    assert!(found[0].to_string().contains("first.c"));
    assert!(found[1].to_string().contains("second.c"));
}

#[test]
fn test_missing_input_file_is_fatal() {
    let err = analyze_files(&["/nonexistent/defs.c"], &EscapePolicy::new()).unwrap_err();
    assert!(err.user_message().contains("/nonexistent/defs.c"));
}

#[test]
fn test_jump_table_artifacts_from_one_map() {
    let map = OpcodeMap::from_json_str(r#"{"LOAD_FAST": 0, "RETURN_VALUE": 83}"#, "opmap.json").unwrap();
    let table = write_targets(&map);
    let unknowns = write_unknowns(&map);
    assert!(table.contains("&&TARGET_LOAD_FAST"));
    assert!(table.contains("&&_unknown_opcode_84"));
    assert_eq!(unknowns.matches("UNKNOWN_OPCODE(").count(), 254);
}

#[test]
fn test_trace_rendering_resolves_opcodes_through_the_map() {
    let map = OpcodeMap::from_json_str(r#"{"LOAD_FAST": 100}"#, "opmap.json").unwrap();
    let log = trace::parse_str("# pid: 1\n\n1.0 2\n1.5 8 100\n2.0 3\n2.5 1\n").unwrap();
    let out = trace::render_chronological(&log, Some(&map));
    assert!(out.contains("LOAD_FAST (100)"));
    let summary = trace::summarize(&log, Some(&map));
    assert_eq!(summary.opcodes["LOAD_FAST"].count, 1);
}
