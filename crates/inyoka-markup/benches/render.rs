//! Benchmarks for parsing, compiling and rendering pages.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use inyoka_markup::{Format, MarkupProcessor, NullContext, compile, render};

/// Generate a page with headlines, formatted paragraphs, lists and a table.
fn generate_page(sections: usize, paragraphs_per_section: usize) -> String {
    let mut page = String::with_capacity(sections * paragraphs_per_section * 200);
    page.push_str("# tag: benchmark\n[[Inhaltsverzeichnis]]\n");
    for i in 0..sections {
        page.push_str(&format!("= Section {i} =\n"));
        for j in 0..paragraphs_per_section {
            page.push_str(&format!(
                "Paragraph {j} of section {i} has '''bold''', ''italic'' and a [:Page_{j}:link]((note {j})).\n\n"
            ));
        }
        page.push_str(" * first\n * second\n   1. nested\n\n");
        page.push_str("||<header> a || b ||\n|| 1 || 2 ||\n\n");
    }
    page
}

fn bench_process(c: &mut Criterion) {
    let processor = MarkupProcessor::new();
    let source = generate_page(10, 3);

    c.bench_function("process_10_sections", |b| {
        b.iter(|| processor.process(&source, Some("Benchmark")));
    });
}

fn bench_render_varying_sizes(c: &mut Criterion) {
    let processor = MarkupProcessor::new();
    let mut group = c.benchmark_group("render_by_size");

    for (sections, paragraphs) in [(5, 2), (20, 3), (50, 5)] {
        let source = generate_page(sections, paragraphs);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("html", format!("{sections}s_{paragraphs}p")),
            &source,
            |b, source| {
                b.iter(|| {
                    let tree = processor.process(source, Some("Benchmark"));
                    render(&compile(&tree, Format::Html, &NullContext), &NullContext)
                });
            },
        );
    }

    group.finish();
}

fn bench_replay_cached_stream(c: &mut Criterion) {
    let processor = MarkupProcessor::new();
    let tree = processor.process(&generate_page(20, 3), Some("Benchmark"));
    let stream = compile(&tree, Format::Html, &NullContext);

    c.bench_function("replay_stream", |b| {
        b.iter(|| render(&stream, &NullContext));
    });
}

criterion_group!(
    benches,
    bench_process,
    bench_render_varying_sizes,
    bench_replay_cached_stream
);
criterion_main!(benches);
