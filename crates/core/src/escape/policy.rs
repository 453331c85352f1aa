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

//! Escape-classification policy
//!
//! Which calls may transfer control to arbitrary code is a property of the
//! interpreter's naming conventions, not of this analyzer, so the whole rule
//! set lives in one swappable structure: a hand-maintained allow-list plus a
//! handful of naming conventions. The defaults encode the project
//! conventions; tests and embedders can substitute their own.

use std::collections::HashSet;

/// Functions known not to transfer control to arbitrary code:
/// reference-count micro-ops, field accessors, type predicates, stack-ref
/// plumbing. Hand-maintained; extend it when the interpreter grows a new
/// trusted primitive.
const NON_ESCAPING_FUNCTIONS: &[&str] = &[
    "Py_INCREF",
    "_PyManagedDictPointer_IsValues",
    "_PyObject_GetManagedDict",
    "_PyObject_ManagedDictPointer",
    "_PyObject_InlineValues",
    "_PyDictValues_AddToInsertionOrder",
    "Py_DECREF",
    "Py_XDECREF",
    "_Py_DECREF_SPECIALIZED",
    "DECREF_INPUTS_AND_REUSE_FLOAT",
    "PyUnicode_Append",
    "_PyLong_IsZero",
    "Py_ARRAY_LENGTH",
    "Py_Unicode_GET_LENGTH",
    "PyUnicode_READ_CHAR",
    "_Py_SINGLETON",
    "PyUnicode_GET_LENGTH",
    "_PyLong_IsCompact",
    "_PyLong_IsNonNegativeCompact",
    "_PyLong_CompactValue",
    "_PyLong_DigitCount",
    "_Py_NewRef",
    "_Py_IsImmortal",
    "PyLong_FromLong",
    "_Py_STR",
    "_PyLong_Add",
    "_PyLong_Multiply",
    "_PyLong_Subtract",
    "Py_NewRef",
    "_PyList_ITEMS",
    "_PyTuple_ITEMS",
    "_Py_atomic_load_uintptr_relaxed",
    "_PyFrame_GetCode",
    "_PyThreadState_HasStackSpace",
    "_PyUnicode_Equal",
    "_PyFrame_SetStackPointer",
    "_PyType_HasFeature",
    "PyUnicode_Concat",
    "PySlice_New",
    "_Py_LeaveRecursiveCallPy",
    "maybe_lltrace_resume_frame",
    "_PyUnicode_JoinArray",
    "_PyEval_FrameClearAndPop",
    "_PyFrame_StackPush",
    "PyCell_New",
    "PyFloat_AS_DOUBLE",
    "_PyFrame_PushUnchecked",
    "Py_FatalError",
    "assert",
    "Py_Is",
    "Py_IsTrue",
    "Py_IsNone",
    "Py_IsFalse",
    "_PyFrame_GetStackPointer",
    "_PyCode_CODE",
    "PyCFunction_GET_FLAGS",
    "_PyErr_Occurred",
    "_Py_LeaveRecursiveCallTstate",
    "_Py_EnterRecursiveCallTstateUnchecked",
    "PyStackRef_FromPyObjectSteal",
    "PyStackRef_AsPyObjectBorrow",
    "PyStackRef_AsPyObjectSteal",
    "PyStackRef_CLOSE",
    "PyStackRef_DUP",
    "PyStackRef_CLEAR",
    "PyStackRef_IsNull",
    "PyStackRef_TYPE",
    "PyStackRef_False",
    "PyStackRef_True",
    "PyStackRef_None",
    "PyStackRef_Is",
    "PyStackRef_FromPyObjectNew",
    "PyStackRef_AsPyObjectNew",
    "PyStackRef_FromPyObjectImmortal",
    "STACKREFS_TO_PYOBJECTS",
    "STACKREFS_TO_PYOBJECTS_CLEANUP",
    "CONVERSION_FAILED",
];

/// Identifiers that flush the in-memory stack state to its authoritative form
const SYNC_MARKERS: &[&str] = &["SYNC_SP", "DECREF_INPUTS"];

/// Markers that exit the handler's straight-line flow
const FLOW_CONTROL: &[&str] = &["ESCAPING_CALL", "ERROR_IF", "DEOPT_IF"];

/// Reference-release family
const DECREFS: &[&str] = &["Py_DECREF", "Py_XDECREF", "Py_CLEAR", "DECREF_INPUTS"];

/// Classification rules for call identifiers and verifier marker sets
#[derive(Debug, Clone)]
pub struct EscapePolicy {
    /// Allow-list of known non-escaping functions
    pub non_escaping: HashSet<String>,
    /// Stack-synchronization markers
    pub sync_markers: HashSet<String>,
    /// Flow-control marker identifiers
    pub flow_control: HashSet<String>,
    /// Reference-release identifiers
    pub decrefs: HashSet<String>,
    /// Project prefix stripped by the macro-name convention
    pub macro_prefix: String,
    /// Substring marking getter-convention names
    pub getter_marker: String,
    /// Suffixes marking type-check-convention names
    pub check_suffixes: Vec<String>,
    /// Substring marking counter-helper names
    pub counter_marker: String,
}

impl Default for EscapePolicy {
    fn default() -> Self {
        fn owned(names: &[&str]) -> HashSet<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            non_escaping: owned(NON_ESCAPING_FUNCTIONS),
            sync_markers: owned(SYNC_MARKERS),
            flow_control: owned(FLOW_CONTROL),
            decrefs: owned(DECREFS),
            macro_prefix: "Py".to_string(),
            getter_marker: "GET".to_string(),
            check_suffixes: vec!["Check".to_string(), "CheckExact".to_string()],
            counter_marker: "backoff_counter".to_string(),
        }
    }
}

impl EscapePolicy {
    /// Create the default project policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the macro-naming convention: strip one leading underscore, then
    /// a leading project prefix; all-uppercase remainders are macros, not
    /// function calls with side effects.
    pub fn is_macro_name(&self, name: &str) -> bool {
        let name = name.strip_prefix('_').unwrap_or(name);
        let name = name.strip_prefix(self.macro_prefix.as_str()).unwrap_or(name);
        name == name.to_uppercase()
    }

    /// Check whether a called identifier is known not to escape
    pub fn is_non_escaping(&self, name: &str) -> bool {
        self.non_escaping.contains(name)
            || self.is_macro_name(name)
            || name.contains(self.getter_marker.as_str())
            || self.check_suffixes.iter().any(|suffix| name.ends_with(suffix))
            || name.contains(self.counter_marker.as_str())
    }

    /// Check whether a called identifier may escape
    pub fn is_escaping(&self, name: &str) -> bool {
        !self.is_non_escaping(name)
    }

    /// Check for a stack-synchronization marker
    pub fn is_sync_marker(&self, name: &str) -> bool {
        self.sync_markers.contains(name)
    }

    /// Check for a flow-control marker
    pub fn is_flow_control(&self, name: &str) -> bool {
        self.flow_control.contains(name)
    }

    /// Check for a reference-release identifier
    pub fn is_decref(&self, name: &str) -> bool {
        self.decrefs.contains(name)
    }
}
