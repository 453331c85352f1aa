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

//! Uop metadata header generation
//!
//! Renders the analysis into fixed-size C lookup tables keyed by uop id:
//! execution flags, replication counts, register-caching rows, the
//! uncached-variant reverse map, the 4x4 spill/reload transition table,
//! name strings, and the popped-count dispatcher. Table sizes come from
//! `pycore_uop_ids.h`; a uop participates only if it is viable, not
//! restricted to tier 1, and not a super-instruction.

pub mod writer;

pub use writer::HeaderWriter;

use crate::analysis::{Analysis, Properties, Uop, SPILL_OR_RELOAD};
use crate::stack::{cache_depths, popped_count, variant_name, CachingInfo};

/// Default output path for the generated header
pub const DEFAULT_OUTPUT: &str = "pycore_uop_metadata.h";

const HEADER_GUARD: &str = "Py_CORE_UOP_METADATA_H";

/// Whether a uop gets entries in the per-uop tables
pub fn participates(uop: &Uop) -> bool {
    uop.is_viable() && uop.properties.tier != Some(1) && !uop.is_super()
}

/// Render a property set as an execution-flags expression
pub fn cflags(properties: &Properties) -> String {
    let mut flags = Vec::new();
    if properties.uses_oparg {
        flags.push("HAS_ARG_FLAG");
    }
    if properties.jumps {
        flags.push("HAS_JUMP_FLAG");
    }
    if properties.deopts {
        flags.push("HAS_DEOPT_FLAG");
    }
    if properties.errors {
        flags.push("HAS_ERROR_FLAG");
    }
    if properties.escapes {
        flags.push("HAS_ESCAPES_FLAG");
    }
    if properties.side_exits {
        flags.push("HAS_EXIT_FLAG");
    }
    if properties.pure_uop {
        flags.push("HAS_PURE_FLAG");
    }
    if flags.is_empty() {
        "0".to_string()
    } else {
        flags.join(" | ")
    }
}

/// Render the complete metadata header for an analysis
pub fn write_metadata(analysis: &Analysis, inputs: &[String]) -> String {
    let mut out = HeaderWriter::new();
    out.banner("uopgen metadata", inputs);
    out.open_guard(HEADER_GUARD);
    out.emit("#include <stdint.h>\n");
    out.emit("#include \"pycore_uop_ids.h\"\n");
    emit_names_and_flags(analysis, &mut out);
    out.close_guard(HEADER_GUARD);
    out.finish()
}

fn emit_names_and_flags(analysis: &Analysis, out: &mut HeaderWriter) {
    out.emit("extern const uint16_t _PyUop_Flags[MAX_UOP_ID+1];\n");
    out.emit("extern const uint8_t _PyUop_Replication[MAX_UOP_ID+1];\n");
    out.emit("extern const char * const _PyOpcode_uop_name[MAX_UOP_REGS_ID+1];\n\n");
    out.emit("extern int _PyUop_num_popped(int opcode, int oparg);\n\n");
    out.emit("typedef struct _pyuop_info {\n");
    out.emit("int8_t min_input; int8_t max_input;\n");
    out.emit("int8_t delta; uint16_t opcodes[4];\n");
    out.emit("} _PyUopCachingInfo;\n");
    out.emit("extern const _PyUopCachingInfo _PyUop_Caching[MAX_UOP_ID+1];\n\n");
    out.emit("extern const uint16_t _PyUop_SpillsAndReloads[4][4];\n");
    out.emit("extern const uint16_t _PyUop_Uncached[MAX_UOP_REGS_ID+1];\n\n");
    out.emit("#ifdef NEED_OPCODE_METADATA\n");

    out.emit("const uint16_t _PyUop_Flags[MAX_UOP_ID+1] = {\n");
    for uop in analysis.uops() {
        if !participates(uop) {
            continue;
        }
        out.emit(&format!("[{}] = {},\n", uop.name, cflags(&uop.properties)));
    }
    out.emit("};\n\n");

    out.emit("const uint8_t _PyUop_Replication[MAX_UOP_ID+1] = {\n");
    for uop in analysis.uops() {
        if !participates(uop) || uop.properties.replicated == 0 {
            continue;
        }
        out.emit(&format!("[{}] = {},\n", uop.name, uop.properties.replicated));
    }
    out.emit("};\n\n");

    out.emit("const _PyUopCachingInfo _PyUop_Caching[MAX_UOP_ID+1] = {\n");
    for uop in analysis.uops() {
        if !participates(uop) {
            continue;
        }
        if let Some(info) = CachingInfo::build(&uop.name, &cache_depths(uop)) {
            out.emit(&format!("[{}] = {},\n", uop.name, info.to_c()));
        }
    }
    out.emit("};\n\n");

    out.emit("const uint16_t _PyUop_Uncached[MAX_UOP_REGS_ID+1] = {\n");
    for uop in analysis.uops() {
        if !participates(uop) {
            continue;
        }
        for (inputs, outputs) in cache_depths(uop) {
            out.emit(&format!("[{}] = {},\n", variant_name(&uop.name, inputs, outputs), uop.name));
        }
    }
    out.emit("};\n\n");

    out.emit("const uint16_t _PyUop_SpillsAndReloads[4][4] = {\n");
    for i in 0..4u8 {
        for j in 0..4u8 {
            if i != j {
                out.emit(&format!("[{}][{}] = {},\n", i, j, variant_name(SPILL_OR_RELOAD, i, j)));
            }
        }
    }
    out.emit("};\n\n");

    out.emit("const char *const _PyOpcode_uop_name[MAX_UOP_REGS_ID+1] = {\n");
    for uop in analysis.sorted_by_name() {
        if !participates(uop) {
            continue;
        }
        out.emit(&format!("[{}] = \"{}\",\n", uop.name, uop.name));
        for (inputs, outputs) in cache_depths(uop) {
            let variant = variant_name(&uop.name, inputs, outputs);
            out.emit(&format!("[{}] = \"{}\",\n", variant, variant));
        }
    }
    out.emit("};\n");

    out.emit("int _PyUop_num_popped(int opcode, int oparg)\n{\n");
    out.emit("switch(opcode) {\n");
    for uop in analysis.uops() {
        if !participates(uop) {
            continue;
        }
        out.emit(&format!("case {}:\n", uop.name));
        out.emit(&format!("    return {};\n", popped_count(uop)));
    }
    out.emit("default:\n");
    out.emit("    return -1;\n");
    out.emit("}\n");
    out.emit("}\n\n");
    out.emit("#endif // NEED_OPCODE_METADATA\n\n");
}
