//! Benchmarks for `contour_cells`.
//!
//! Run with: `cargo bench --bench partition_benchmarks`
//!
//! These benchmarks test:
//! - Exact clipping of a box
//! - Space partition scaling with plane count
//! - Delaunay tetrahedralization of contour-sized point sets
//! - The full pipeline on a small stack of slices

use contour_cells::{
    CellPipeline, ContourPlane, ConvexPolytope, ExactPlane, ExactVec3, FacetTag, PipelineConfig, Plane,
    PlaneIdx, PlaneStore, SpacePartitioner, Tetrahedralization,
};
use divan::{Bencher, black_box};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    divan::main();
}

// ============================================================================
// Test Data Generators
// ============================================================================

/// Square contour of side `size` on the plane `z = height`.
fn square(height: f64, size: f64) -> Vec<DVec3> {
    vec![
        DVec3::new(0.0, 0.0, height),
        DVec3::new(size, 0.0, height),
        DVec3::new(size, size, height),
        DVec3::new(0.0, size, height),
    ]
}

/// `n` parallel slices, the common case for serial-section data.
fn stacked_slices(n: usize) -> PlaneStore {
    let planes = (0..n)
        .map(|i| {
            let z = i as f64;
            ContourPlane::new(Plane::new(0.0, 0.0, 1.0, -z), square(z, 10.0), Vec::new(), "stack")
        })
        .collect();
    PlaneStore::new(planes, "stack")
}

/// Random planes through the unit cube around random contour points.
fn random_store(n: usize, seed: u64) -> PlaneStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let planes = (0..n)
        .map(|_| {
            let normal = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let point = DVec3::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0), rng.random_range(0.0..1.0));
            let plane = Plane::new(normal.x, normal.y, normal.z, -normal.dot(point));
            ContourPlane::new(plane, vec![point, DVec3::ZERO, DVec3::ONE], Vec::new(), "random")
        })
        .collect();
    PlaneStore::new(planes, "random")
}

fn random_points(n: usize, seed: u64) -> Vec<DVec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| DVec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)))
        .collect()
}

// ============================================================================
// Polytope Benchmarks
// ============================================================================

#[divan::bench]
fn clip_box_corner(bencher: Bencher) {
    let cube = ConvexPolytope::from_aabb(&ExactVec3::from_integers(0, 0, 0), &ExactVec3::from_integers(2, 2, 2))
        .expect("valid box");
    let plane = ExactPlane::new(ExactVec3::from_integers(1, 1, 1), contour_cells::exact::int(5)).expect("valid plane");

    bencher.bench_local(|| black_box(cube.clip(&plane, FacetTag::Input(PlaneIdx(0))).is_ok()));
}

// ============================================================================
// Partition Scalability Benchmarks
// ============================================================================

#[divan::bench(args = [2, 4, 8, 16])]
fn partition_slices(bencher: Bencher, n: usize) {
    let store = stacked_slices(n);

    bencher.bench_local(|| {
        let mut partitioner = SpacePartitioner::new(&store);
        black_box(partitioner.compute_cells().len())
    });
}

#[divan::bench(args = [2, 4, 6, 8])]
fn partition_random(bencher: Bencher, n: usize) {
    let store = random_store(n, 0xdead_beef);

    bencher.bench_local(|| {
        let mut partitioner = SpacePartitioner::new(&store);
        black_box(partitioner.compute_cells().len())
    });
}

// ============================================================================
// Delaunay Benchmarks
// ============================================================================

#[divan::bench(args = [8, 16, 32, 64])]
fn tetrahedralize_random(bencher: Bencher, n: usize) {
    let points = random_points(n, 12345);

    bencher.bench_local(|| {
        let tri = Tetrahedralization::from_dvec3(&points).expect("finite points");
        black_box(tri.facets().len())
    });
}

// ============================================================================
// Pipeline Benchmarks
// ============================================================================

#[divan::bench(args = [2, 4, 8])]
fn pipeline_slices(bencher: Bencher, n: usize) {
    let config = PipelineConfig::default().without_cache();

    bencher
        .with_inputs(|| stacked_slices(n))
        .bench_local_values(|store| black_box(CellPipeline::run(store, "stack", &config).cells().len()));
}
