extern crate criterion;

use criterion::{criterion_group, criterion_main, Criterion};

use svgstyle_lib::style::properties::PropertyRegistry;
use svgstyle_lib::style::rule_model::SheetOrigin;
use svgstyle_lib::style::stylesheet_parser::StylesheetParser;
use svgstyle_lib::{Document, Environment, StyleContext};

fn large_stylesheet() -> String {
    let mut css = String::with_capacity(1_000_000);
    for i in 0..5_000 {
        css.push_str(&format!(
            ".c{} > rect {{ fill: #{:06x}; stroke-width: {}px; font: italic {}px serif }}\n",
            i,
            i * 37,
            i % 7,
            10 + i % 20
        ));
    }
    css
}

fn bench_parse_stylesheet(c: &mut Criterion) {
    let css = large_stylesheet();
    let parser = StylesheetParser::new(PropertyRegistry::standard());

    c.bench_function("parse_stylesheet", |b| {
        b.iter(|| parser.parse_sheet(&css, SheetOrigin::default()))
    });
}

fn bench_deep_inheritance(c: &mut Criterion) {
    let mut svg = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg"><style>g { stroke: red } .leaf { fill: blue }</style>"#);
    for _ in 0..200 {
        svg.push_str("<g>");
    }
    svg.push_str(r#"<rect id="leaf" class="leaf"/>"#);
    for _ in 0..200 {
        svg.push_str("</g>");
    }
    svg.push_str("</svg>");

    let doc = match Document::parse_str(&svg, None) {
        Ok(doc) => doc,
        Err(e) => panic!("benchmark document failed to parse: {}", e),
    };
    let Some(leaf) = doc.get_element_by_id("leaf") else {
        panic!("benchmark document has no leaf");
    };
    let ctx = StyleContext::new(Environment::screen(1024.0, 768.0));

    c.bench_function("deep_inheritance", |b| b.iter(|| ctx.computed_style(&leaf)));
}

criterion_group!(benches, bench_parse_stylesheet, bench_deep_inheritance);
criterion_main!(benches);
