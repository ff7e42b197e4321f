//! Collage CLI - fragment relocation, network merge and isochrones

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geo::Point;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use collage_algorithms::enrichment::enrich_heights;
use collage_algorithms::fragment::{merge_networks, relocate, to_geographic, MergeParams};
use collage_algorithms::network::{build_graph, compute_isochrone, GraphParams, IsochroneParams};
use collage_core::io::{
    load_fragment, read_feature_set, read_fragment_json, save_fragment, write_feature_set,
    write_fragment_json,
};
use collage_core::{BBox, Feature, FeatureSet, Fragment, Settings};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "collage")]
#[command(author, version, about = "Urban fragment relocation and network analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a fragment package
    Info {
        /// Input fragment (FragmentPackage JSON)
        input: PathBuf,
        /// Write the buffered context extent here (GeoJSON polygon)
        #[arg(long)]
        extent: Option<PathBuf>,
    },
    /// Move a fragment so its buildings center on a new location
    Relocate {
        /// Input fragment (FragmentPackage JSON)
        input: PathBuf,
        /// Output fragment
        output: PathBuf,
        /// Target longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Target latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Merge a design street network into its context
    Merge {
        /// Design network (GeoJSON)
        design: PathBuf,
        /// Context network (GeoJSON)
        context: PathBuf,
        /// Output network (GeoJSON, WGS84)
        output: PathBuf,
        /// Snap distance in meters (overrides config)
        #[arg(short, long)]
        snap_threshold: Option<f64>,
        /// Drop context streets outside the design extent plus the buffer
        #[arg(long)]
        clip: bool,
    },
    /// Area reachable along a street network
    Isochrone {
        /// Street network (GeoJSON)
        streets: PathBuf,
        /// Output hull and reachable nodes (GeoJSON)
        output: PathBuf,
        /// Origin longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Origin latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Network distance cutoff in meters (overrides config)
        #[arg(short, long)]
        max_distance: Option<f64>,
    },
    /// Fill building heights from tags, levels or defaults
    Heights {
        /// Buildings (GeoJSON)
        input: PathBuf,
        /// Output buildings (GeoJSON)
        output: PathBuf,
    },
    /// Save a fragment package as buildings GeoJSON plus metadata sidecar
    Save {
        /// Input fragment (FragmentPackage JSON)
        input: PathBuf,
        /// Buildings path; metadata goes next to it
        path: PathBuf,
    },
    /// Load a saved fragment into a fragment package
    Load {
        /// Buildings path written by `save`
        path: PathBuf,
        /// Output fragment (FragmentPackage JSON)
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::new()),
    }
}

fn read_fragment(path: &Path) -> Result<Fragment> {
    let pb = spinner("Reading fragment...");
    let fragment = read_fragment_json(path)
        .with_context(|| format!("Failed to read fragment: {}", path.display()))?;
    pb.finish_and_clear();
    Ok(fragment)
}

fn write_fragment(fragment: &Fragment, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_fragment_json(fragment, path)
        .with_context(|| format!("Failed to write fragment: {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn read_features(path: &Path) -> Result<FeatureSet> {
    let pb = spinner("Reading features...");
    let set = read_feature_set(path)
        .with_context(|| format!("Failed to read features: {}", path.display()))?;
    pb.finish_and_clear();
    Ok(set)
}

/// Write in WGS84, converting out of a local frame if needed
fn write_features(set: &FeatureSet, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let set = to_geographic(set).context("Failed to convert output to WGS84")?;
    write_feature_set(&set, path)
        .with_context(|| format!("Failed to write features: {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

/// Context features near the design, compared in WGS84
fn clip_context(design: &FeatureSet, context: &FeatureSet, buffer_m: f64) -> Result<FeatureSet> {
    let design = to_geographic(design).context("Failed to convert design to WGS84")?;
    let Some(extent) = BBox::from_geometries(design.geometries()) else {
        return Ok(context.clone());
    };
    let context = to_geographic(context).context("Failed to convert context to WGS84")?;
    let clipped = context.clip_to(&extent.buffer_m(buffer_m));
    info!(
        "Clipped context to {} of {} features within {:.0} m of the design",
        clipped.len(),
        context.len(),
        buffer_m
    );
    Ok(clipped)
}

fn target_point(lon: f64, lat: f64) -> Result<Point<f64>> {
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        bail!("Coordinates out of range: lon {}, lat {}", lon, lat);
    }
    Ok(Point::new(lon, lat))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, extent } => {
            let fragment = read_fragment(&input)?;
            let meta = &fragment.metadata;

            println!("File: {}", input.display());
            if !meta.name.is_empty() {
                println!("Name: {}", meta.name);
            }
            if !meta.city.is_empty() {
                println!("Location: {}, {}", meta.city, meta.country);
            }
            if let Some(at) = meta.extracted_at {
                println!("Extracted: {}", at.to_rfc3339());
            }
            println!("CRS: {}", meta.crs);
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                meta.bbox.west, meta.bbox.south, meta.bbox.east, meta.bbox.north
            );
            if let Some(class) = settings.size_class(meta.building_count) {
                println!("Size class: {} ({} buildings)", class, meta.building_count);
            }
            let buffer_m = settings.fragment.default_buffer_m;
            let context = fragment.context_extent(buffer_m);
            if let Some(bbox) = context {
                println!(
                    "Context ({:.0} m): ({:.6}, {:.6}) - ({:.6}, {:.6})",
                    buffer_m, bbox.west, bbox.south, bbox.east, bbox.north
                );
            }
            println!("\nLayers:");
            for (name, layer) in fragment.layers() {
                println!("  {}: {} features ({})", name, layer.len(), layer.crs);
            }
            println!("\nQuality:");
            println!(
                "  Building completeness: {:.1}%",
                meta.quality.building_completeness * 100.0
            );
            println!("  Height coverage: {:.1}%", meta.quality.height_coverage * 100.0);
            println!(
                "  Street network connected: {}",
                meta.quality.street_network_connected
            );

            if let Some(path) = extent {
                let Some(bbox) = context else {
                    bail!("Fragment has no WGS84 building extent to write");
                };
                let mut set = FeatureSet::geographic();
                set.push(
                    Feature::new(bbox.to_polygon())
                        .with_property("kind", "context_extent")
                        .with_property("buffer_m", buffer_m),
                );
                write_features(&set, &path)?;
                println!("\nContext extent saved to: {}", path.display());
            }
        }

        // ── Relocate ─────────────────────────────────────────────────
        Commands::Relocate {
            input,
            output,
            lon,
            lat,
        } => {
            let target = target_point(lon, lat)?;
            let fragment = read_fragment(&input)?;
            let start = Instant::now();
            let result = relocate(&fragment, target).context("Failed to relocate fragment")?;
            let elapsed = start.elapsed();
            write_fragment(&result.fragment, &output)?;
            if let Some(source) = result.source_center {
                info!(
                    "Moved {} features from ({:.6}, {:.6}) to ({:.6}, {:.6})",
                    result.relocated_features,
                    source.x(),
                    source.y(),
                    target.x(),
                    target.y()
                );
            }
            done("Relocated fragment", &output, elapsed);
        }

        // ── Merge ────────────────────────────────────────────────────
        Commands::Merge {
            design,
            context,
            output,
            snap_threshold,
            clip,
        } => {
            let mut params = MergeParams::from(&settings);
            if let Some(threshold) = snap_threshold {
                params.snap_threshold_m = threshold;
            }
            let design = read_features(&design)?;
            let mut context = read_features(&context)?;
            if clip {
                context = clip_context(&design, &context, settings.fragment.default_buffer_m)?;
            }
            let start = Instant::now();
            let merged = merge_networks(&design, &context, &params)
                .context("Failed to merge networks")?;
            let elapsed = start.elapsed();
            write_features(&merged.network, &output)?;

            let report = serde_json::to_string_pretty(&merged.report)
                .context("Failed to format merge report")?;
            println!("{}", report);
            done("Merged network", &output, elapsed);
        }

        // ── Isochrone ────────────────────────────────────────────────
        Commands::Isochrone {
            streets,
            output,
            lon,
            lat,
            max_distance,
        } => {
            let origin = target_point(lon, lat)?;
            let mut params = IsochroneParams::from(&settings);
            if let Some(max_distance) = max_distance {
                params.max_distance_m = max_distance;
            }
            let streets = read_features(&streets)?;
            let start = Instant::now();
            let graph = build_graph(&streets, &GraphParams::from(&settings))
                .context("Failed to build street graph")?;
            let result =
                compute_isochrone(&graph, origin, &params).context("Failed to compute isochrone")?;
            let elapsed = start.elapsed();
            write_features(&result.to_feature_set(), &output)?;

            println!(
                "Graph: {} nodes, {} edges ({} features skipped)",
                graph.node_count(),
                graph.edge_count(),
                graph.skipped_features()
            );
            println!(
                "Reachable within {} m: {} nodes",
                result.max_distance_m, result.reachable_node_count
            );
            done("Isochrone", &output, elapsed);
        }

        // ── Heights ──────────────────────────────────────────────────
        Commands::Heights { input, output } => {
            let buildings = read_features(&input)?;
            let start = Instant::now();
            let (enriched, report) = enrich_heights(&buildings, &settings.heights);
            let elapsed = start.elapsed();
            write_features(&enriched, &output)?;

            println!(
                "Heights: {} from tags, {} from levels, {} defaulted ({:.1}% coverage)",
                report.from_tag,
                report.from_levels,
                report.defaulted,
                report.coverage * 100.0
            );
            done("Buildings", &output, elapsed);
        }

        // ── Persistence ──────────────────────────────────────────────
        Commands::Save { input, path } => {
            let fragment = read_fragment(&input)?;
            let start = Instant::now();
            let saved = save_fragment(&fragment, &path)
                .with_context(|| format!("Failed to save fragment to {}", path.display()))?;
            done("Fragment", &saved, start.elapsed());
        }

        Commands::Load { path, output } => {
            let start = Instant::now();
            let fragment = load_fragment(&path)
                .with_context(|| format!("Failed to load fragment from {}", path.display()))?;
            let elapsed = start.elapsed();
            write_fragment(&fragment, &output)?;
            done("Fragment", &output, elapsed);
        }
    }

    Ok(())
}
