//! This bench test runs the repair pipeline over a long generated article
//! containing every construct the passes rewrite.

#![allow(missing_docs)]

use std::fmt::Write;

use criterion::{Criterion, criterion_group, criterion_main};

/// Builds a document with `sections` repetitions of messy model output.
fn generated_document(sections: usize) -> String {
    let mut doc = String::from("<think>planning the outline</think>\n# Guide\n\n");
    for i in 0..sections {
        write!(
            doc,
            "## Section {i}\n\n\
             Costs are <10% of revenue and growth is >5x.   \n\n\n\n\
             - Key figures:\n  | Year | Value |\n  |--|--|\n  | 2024 | 1 | extra |\n\
             - Next point\n\n\
             Use `a<b` inline and:\n\n```rust\nlet x = 1 < 2;\n```\n\n"
        )
        .unwrap();
    }
    doc
}

fn repair(c: &mut Criterion) {
    let doc = generated_document(200);
    c.bench_function("repair generated article", |b| {
        b.iter(|| scribe::repair(std::hint::black_box(&doc)));
    });
}

criterion_group!(benches, repair);
criterion_main!(benches);
