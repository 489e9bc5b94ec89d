//! Performance benchmarks for coordinate mapping and depth alignment
//!
//! Run with: cargo bench --bench mapper_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crabsense::pipeline::align::align_depth_to;
use crabsense::{CoordinateMapper, DepthRange, Extrinsics, Intrinsics};
use glam::Vec2;
use std::time::Duration;

/// Tilted plane from 0.8 m (top) to 2.4 m (bottom), in millimeters.
fn plane_depth(width: u32, height: u32) -> Vec<u16> {
    (0..height)
        .flat_map(|y| {
            let raw = (800.0 + 1600.0 * y as f32 / height as f32) as u16;
            std::iter::repeat(raw).take(width as usize)
        })
        .collect()
}

fn offset_mapper(width: u32, height: u32) -> CoordinateMapper {
    let scale = width as f32 / 640.0;
    let depth_to_color = Extrinsics::from_translation([0.015, 0.0, 0.0]);
    CoordinateMapper::new(
        Intrinsics::pinhole(width, height, 615.0 * scale, 615.0 * scale),
        depth_to_color.inverse(),
        Intrinsics::pinhole(width, height, 385.0 * scale, 385.0 * scale),
        depth_to_color,
    )
}

fn bench_color_to_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("Color To Depth");
    group.measurement_time(Duration::from_secs(5));

    for (width, height) in [(640u32, 480u32), (1280, 720)] {
        let mapper = offset_mapper(width, height);
        let depth = plane_depth(width, height);
        let pixel = Vec2::new(width as f32 * 0.7, height as f32 * 0.4);

        group.bench_with_input(
            BenchmarkId::new("single_pixel", format!("{}x{}", width, height)),
            &(mapper, depth),
            |b, (mapper, depth)| {
                b.iter(|| {
                    mapper.map_color_to_depth(
                        black_box(pixel),
                        black_box(depth),
                        0.001,
                        DepthRange::default(),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_align_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("Depth Alignment");
    group.measurement_time(Duration::from_secs(5));

    for (width, height) in [(320u32, 240u32), (640, 480)] {
        let mapper = offset_mapper(width, height);
        let depth = plane_depth(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(
            BenchmarkId::new("align_to_color", format!("{}x{}", width, height)),
            &depth,
            |b, depth| {
                b.iter(|| {
                    align_depth_to(
                        black_box(depth),
                        mapper.depth_intrinsics(),
                        mapper.color_intrinsics(),
                        mapper.depth_extrinsics(),
                        0.001,
                    )
                })
            },
        );
    }

    group.finish();
}

criterion_group!(mapper_benches, bench_color_to_depth, bench_align_depth);
criterion_main!(mapper_benches);
