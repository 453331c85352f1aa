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

//! Buffered writer for generated C headers
//!
//! Tracks brace depth line by line and indents four spaces per level.
//! Brace counting is textual: emitted lines must not carry braces inside
//! string literals. Preprocessor lines stay flush left, and the guard and
//! banner scaffolding bypasses depth tracking entirely.

/// Accumulates generated header text with automatic indentation
#[derive(Debug, Default)]
pub struct HeaderWriter {
    out: String,
    depth: usize,
}

impl HeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one or more newline-terminated lines, tracking brace depth
    pub fn emit(&mut self, text: &str) {
        for line in text.split_inclusive('\n') {
            self.emit_line(line.strip_suffix('\n').unwrap_or(line));
        }
    }

    /// Emit text verbatim, outside depth tracking
    pub fn emit_raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// The generated-file banner naming the tool and its inputs
    pub fn banner(&mut self, tool: &str, inputs: &[String]) {
        self.emit_raw(&format!(
            "// This file is generated by {}\n// from:\n//   {}\n// Do not edit!\n\n",
            tool,
            inputs.join(", ")
        ));
    }

    /// Open an inclusion guard with a C++ linkage block
    pub fn open_guard(&mut self, guard: &str) {
        self.emit_raw(&format!(
            "#ifndef {guard}\n#define {guard}\n#ifdef __cplusplus\nextern \"C\" {{\n#endif\n\n"
        ));
    }

    /// Close the guard opened by [`Self::open_guard`]
    pub fn close_guard(&mut self, guard: &str) {
        self.emit_raw(&format!("\n#ifdef __cplusplus\n}}\n#endif\n#endif /* !{guard} */\n"));
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn emit_line(&mut self, line: &str) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            self.out.push('\n');
            return;
        }
        if trimmed.starts_with('#') {
            self.out.push_str(trimmed);
            self.out.push('\n');
            return;
        }
        let leading_close = trimmed.starts_with('}');
        if leading_close {
            self.depth = self.depth.saturating_sub(1);
        }
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(line);
        self.out.push('\n');
        let opens = line.matches('{').count();
        let closes = line.matches('}').count();
        self.depth += opens;
        self.depth = self.depth.saturating_sub(closes - usize::from(leading_close));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indents_table_entries() {
        let mut out = HeaderWriter::new();
        out.emit("const int table[] = {\n");
        out.emit("[A] = 1,\n");
        out.emit("};\n");
        assert_eq!(out.finish(), "const int table[] = {\n    [A] = 1,\n};\n");
    }

    #[test]
    fn test_nested_blocks_indent_stepwise() {
        let mut out = HeaderWriter::new();
        out.emit("int f(int x)\n{\n");
        out.emit("switch(x) {\n");
        out.emit("case A:\n");
        out.emit("    return 1;\n");
        out.emit("}\n");
        out.emit("}\n");
        assert_eq!(
            out.finish(),
            "int f(int x)\n{\n    switch(x) {\n        case A:\n            return 1;\n    }\n}\n"
        );
    }

    #[test]
    fn test_balanced_braces_on_one_line_keep_depth() {
        let mut out = HeaderWriter::new();
        out.emit("const t rows[] = {\n");
        out.emit("[A] = { 1, 2, { 0, 0 } },\n");
        out.emit("};\n");
        out.emit("int after;\n");
        assert!(out.finish().ends_with("int after;\n"));
    }

    #[test]
    fn test_preprocessor_lines_stay_flush_left() {
        let mut out = HeaderWriter::new();
        out.emit("const int table[] = {\n");
        out.emit("#ifdef EXTRA\n");
        out.emit("[A] = 1,\n");
        out.emit("#endif\n");
        out.emit("};\n");
        let text = out.finish();
        assert!(text.contains("\n#ifdef EXTRA\n"));
        assert!(text.contains("\n#endif\n"));
    }

    #[test]
    fn test_guard_scaffolding_is_untracked() {
        let mut out = HeaderWriter::new();
        out.open_guard("Py_TEST_H");
        out.emit("int x;\n");
        out.close_guard("Py_TEST_H");
        let text = out.finish();
        assert!(text.starts_with("#ifndef Py_TEST_H\n#define Py_TEST_H\n"));
        assert!(text.contains("extern \"C\" {\n#endif\n\nint x;\n"));
        assert!(text.ends_with("#endif /* !Py_TEST_H */\n"));
    }

    #[test]
    fn test_banner_names_tool_and_inputs() {
        let mut out = HeaderWriter::new();
        out.banner("uopgen metadata", &["a.c".to_string(), "b.c".to_string()]);
        let text = out.finish();
        assert!(text.starts_with("// This file is generated by uopgen metadata\n"));
        assert!(text.contains("//   a.c, b.c\n"));
        assert!(text.contains("// Do not edit!\n"));
    }
}
