use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mailwright::tag::TagScopeStack;

fn tag_stack() -> TagScopeStack {
    let mut tags = TagScopeStack::new();
    tags.add_tagged_domains("example.com *.example.com localhost:*")
        .unwrap();
    tags.put("utm_medium", "email");
    tags.put("utm_source", "Newsletter");
    tags.push_frame();
    tags.put("track-id", "KXQZBcdfgh");
    tags.push_frame();
    tags.put("utm_source", "Spring sale");
    tags
}

fn criterion_benchmark(c: &mut Criterion) {
    let tags = tag_stack();
    let utf8 = encoding_rs::UTF_8;

    c.bench_function("tag link to tagged domain", |b| {
        b.iter(|| {
            tags.amend_href_address(
                black_box("https://shop.example.com/sale/spring?id=345+87&zip=zoop#top"),
                utf8,
            )
            .unwrap()
        })
    });
    c.bench_function("leave link to other domain", |b| {
        b.iter(|| {
            tags.amend_href_address(black_box("https://elsewhere.example.net/?q=1"), utf8)
                .unwrap()
        })
    });
    c.bench_function("amend query string", |b| {
        b.iter(|| {
            tags.amend_query_string(black_box("?id=345+87&zip=zoop&n=%C3%A6%C3%B8"), utf8)
                .unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
