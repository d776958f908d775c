//! Performance benchmarks for atomization and quote verification.
//!
//! Run with: `cargo bench --bench atomize`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use thread_forensics::{
    verify_quote, AttributionEngine, Atomizer, CacheConfig, CachedVerifier,
};

/// Build a reply chain `depth` levels deep with `sentences` per level.
fn make_thread(depth: usize, sentences: usize) -> String {
    let mut html = String::from("<body>");
    for level in 0..depth {
        html.push_str("<div>");
        for s in 0..sentences {
            if s % 5 == 0 {
                html.push_str(&format!(
                    "<span style=\"color:red\">LEVEL {} POINT {}!</span> ",
                    level, s
                ));
            } else {
                html.push_str(&format!("Level {} sentence number {} is here. ", level, s));
            }
        }
        html.push_str("</div><blockquote>");
    }
    html.push_str(&"</blockquote>".repeat(depth));
    html.push_str("</body>");
    html
}

fn bench_atomize(c: &mut Criterion) {
    let mut group = c.benchmark_group("atomize_html");
    let atomizer = Atomizer::default();
    let engine = AttributionEngine::default();

    for depth in [1usize, 4, 8] {
        let html = make_thread(depth, 20);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &html, |b, html| {
            b.iter(|| {
                let mut atoms = atomizer
                    .atomize("bench", black_box(html), "", Some("s@x.com"))
                    .unwrap();
                engine.attribute_atoms(&mut atoms, "s@x.com", None);
                atoms
            })
        });
    }
    group.finish();
}

fn bench_atomize_plain(c: &mut Criterion) {
    let body: String = (0..200)
        .map(|i| format!("{} Line {} of the reply. Another one here.\n", ">".repeat(i % 4), i))
        .collect();
    let atomizer = Atomizer::default();

    c.bench_function("atomize_plain_200_lines", |b| {
        b.iter(|| atomizer.atomize("bench", "", black_box(&body), Some("s@x.com")).unwrap())
    });
}

fn bench_verify(c: &mut Criterion) {
    let original = "The deadline for the permit filing is Friday the 14th. ".repeat(20);
    let altered = original.replace("Friday", "Monday");

    c.bench_function("verify_quote_match", |b| {
        b.iter(|| verify_quote(black_box(&original), black_box(&original)))
    });
    c.bench_function("verify_quote_mismatch", |b| {
        b.iter(|| verify_quote(black_box(&altered), black_box(&original)))
    });

    let verifier = CachedVerifier::new(CacheConfig::default());
    verifier.verify(&altered, &original);
    c.bench_function("verify_quote_cached", |b| {
        b.iter(|| verifier.verify(black_box(&altered), black_box(&original)))
    });
}

criterion_group!(benches, bench_atomize, bench_atomize_plain, bench_verify);
criterion_main!(benches);
