use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::io::Cursor;
use tile_exchange_rs::image_pipeline::{
    BitDepth, ColorMode, ExchangeConfig, ExchangePipeline, HostLayout, MemoryHost,
};

fn rgba_layout(width: u32, height: u32, depth: BitDepth) -> HostLayout {
    HostLayout {
        width,
        height,
        depth,
        mode: ColorMode::Rgb,
        has_transparency: true,
        can_edit_transparency: true,
        suggested_tile: (256, 256),
    }
}

fn generate_mock_host(layout: &HostLayout) -> MemoryHost {
    let len = (layout.width * layout.height) as usize * layout.depth.bytes_per_sample();
    let planes: Vec<Vec<u8>> = (0..layout.plane_count())
        .map(|plane| (0..len).map(|i| ((i + plane * 64) % 256) as u8).collect())
        .collect();
    MemoryHost::from_planes(layout.clone(), planes).unwrap()
}

fn export_stream(layout: &HostLayout) -> Vec<u8> {
    let pipeline = ExchangePipeline::new(ExchangeConfig::default());
    let mut output = Cursor::new(Vec::new());
    pipeline.export(&mut generate_mock_host(layout), &mut output).unwrap();
    output.into_inner()
}

fn benchmark_export_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_by_size");

    let sizes = vec![
        (100, 100, "100x100"),
        (500, 500, "500x500"),
        (1000, 1000, "1000x1000"),
    ];

    for (width, height, label) in sizes {
        let layout = rgba_layout(width, height, BitDepth::Eight);
        group.bench_with_input(BenchmarkId::from_parameter(label), &layout, |b, layout| {
            let pipeline = ExchangePipeline::new(ExchangeConfig::default());
            let mut host = generate_mock_host(layout);

            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = pipeline.export(black_box(&mut host), &mut output);
            });
        });
    }

    group.finish();
}

fn benchmark_import_depths(c: &mut Criterion) {
    let mut group = c.benchmark_group("import_by_depth");

    let depths = vec![
        (BitDepth::Eight, "8bit"),
        (BitDepth::Sixteen, "16bit"),
        (BitDepth::ThirtyTwo, "32bit"),
    ];

    for (depth, label) in depths {
        let layout = rgba_layout(500, 500, depth);
        let stream = export_stream(&layout);
        group.bench_with_input(BenchmarkId::from_parameter(label), &stream, |b, stream| {
            let pipeline = ExchangePipeline::new(ExchangeConfig::default());
            let mut host = MemoryHost::new(layout.clone()).unwrap();

            b.iter(|| {
                let mut source = Cursor::new(black_box(stream.as_slice()));
                let _ = pipeline.import(&mut source, &mut host);
            });
        });
    }

    group.finish();
}

fn benchmark_premultiply_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("premultiply_overhead");
    let layout = rgba_layout(500, 500, BitDepth::Eight);
    let stream = export_stream(&layout);
    let pipeline = ExchangePipeline::new(ExchangeConfig::default());

    group.bench_function("alpha_copy", |b| {
        let mut host = MemoryHost::new(layout.clone()).unwrap();
        b.iter(|| {
            let _ = pipeline.import(&mut Cursor::new(black_box(stream.as_slice())), &mut host);
        });
    });

    group.bench_function("premultiply", |b| {
        let mut host = MemoryHost::new(HostLayout {
            has_transparency: false,
            can_edit_transparency: false,
            ..layout.clone()
        })
        .unwrap();
        b.iter(|| {
            let _ = pipeline.import(&mut Cursor::new(black_box(stream.as_slice())), &mut host);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_export_sizes,
    benchmark_import_depths,
    benchmark_premultiply_overhead
);
criterion_main!(benches);
