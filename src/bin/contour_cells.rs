//! CLI tool: decompose a contour file into convex cells and report them.
//!
//! Usage:
//!   contour-cells <file.contour> [--cache-dir DIR] [--no-cache] [--padding R]

use std::env;
use std::process::ExitCode;

use contour_cells::{CellPipeline, PipelineConfig, load_contour_file};

fn print_usage() {
    eprintln!("Usage: contour-cells <file.contour> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --cache-dir DIR   Cell cache root (default: $CONTOUR_CELLS_CACHE_DIR or .cache/cells)");
    eprintln!("  --no-cache        Always recompute; do not read or write the cache");
    eprintln!("  --padding R       Bounding box padding as a fraction of its diagonal (default: 0.1)");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "contour_cells=info".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return ExitCode::from(2);
    }

    let path = &args[1];
    let mut config = PipelineConfig::from_env();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--cache-dir" => {
                i += 1;
                let Some(dir) = args.get(i) else {
                    eprintln!("--cache-dir needs a directory");
                    return ExitCode::from(2);
                };
                config = config.with_cache_root(dir);
            }
            "--no-cache" => {
                config = config.without_cache();
            }
            "--padding" => {
                i += 1;
                match args.get(i).map(|v| v.parse::<f64>()) {
                    Some(Ok(ratio)) if ratio.is_finite() && ratio >= 0.0 => {
                        config = config.with_padding_ratio(ratio);
                    }
                    _ => {
                        eprintln!("--padding needs a non-negative number");
                        return ExitCode::from(2);
                    }
                }
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                return ExitCode::from(2);
            }
        }
        i += 1;
    }

    let store = match load_contour_file(path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let identifier = store.source().to_string();
    let pipeline = CellPipeline::run(store, &identifier, &config);

    println!(
        "{}: {} planes, {} cells{}",
        identifier,
        pipeline.store().len(),
        pipeline.cells().len(),
        if pipeline.from_cache() { " (cached)" } else { "" }
    );
    for (i, cell) in pipeline.cells().iter().enumerate() {
        let planes: Vec<String> = cell.planes.iter().map(|p| p.0.to_string()).collect();
        let axis = pipeline
            .selection(i)
            .map_or_else(|| "-".to_string(), |s| format!("{} ({:.3})", s.axis, s.dot));
        let triangles = pipeline.mesh(i).map_or(0, |m| m.triangle_count());
        println!(
            "  cell {i:>3}: {:>2} vertices, planes [{}], {}, axis {axis}, {triangles} triangles",
            cell.vertex_count(),
            planes.join(" "),
            if cell.is_interior() { "interior" } else { "boundary" },
        );
    }
    ExitCode::SUCCESS
}
