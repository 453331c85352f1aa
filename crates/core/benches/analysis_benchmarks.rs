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

//! Analysis pipeline benchmarks
//!
//! Measures the tokenizer, the definition parser, the escaping-call
//! verifier, and header generation over a synthetic batch of definitions.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use uopgen_core::lexer::tokenize;
use uopgen_core::metadata::write_metadata;
use uopgen_core::{analyze_source, verify, EscapePolicy};

const UOP_COUNT: usize = 64;

fn build_source(count: usize) -> String {
    let mut src = String::new();
    for i in 0..count {
        src.push_str(&format!(
            r#"op(_BENCH_OP_{i:03}, (left, right -- result)) {{
    if (overflow) {{
        Py_DECREF(left);
        result = PyNumber_Add(left, right);
    }}
    ERROR_IF(result == NULL, error);
}}

"#
        ));
    }
    src
}

fn bench_definition_analysis(c: &mut Criterion) {
    let src = build_source(UOP_COUNT);
    let policy = EscapePolicy::new();

    let mut group = c.benchmark_group("definition_analysis");
    group.throughput(Throughput::Elements(UOP_COUNT as u64));
    group.bench_function("lex", |b| b.iter(|| tokenize(black_box(&src), "bench.c").unwrap()));
    group.bench_function("parse", |b| b.iter(|| analyze_source(black_box(&src), "bench.c", &policy).unwrap()));
    group.finish();
}

fn bench_verification(c: &mut Criterion) {
    let src = build_source(UOP_COUNT);
    let policy = EscapePolicy::new();
    let analysis = analyze_source(&src, "bench.c", &policy).unwrap();
    let inputs = vec!["bench.c".to_string()];

    let mut group = c.benchmark_group("verification");
    group.throughput(Throughput::Elements(UOP_COUNT as u64));
    group.bench_function("verify", |b| b.iter(|| verify(black_box(&analysis), &policy).unwrap()));
    group.bench_function("write_metadata", |b| b.iter(|| write_metadata(black_box(&analysis), &inputs)));
    group.finish();
}

criterion_group!(analysis_benches, bench_definition_analysis, bench_verification);
criterion_main!(analysis_benches);
