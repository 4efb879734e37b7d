//! Boundary ingest pipeline.
//!
//! Validates, standardizes, clips, cleans and converts government boundary
//! files; `batch` runs a TOML list of jobs.

mod batch;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use oceania_geo::calc::{add_calculation, repair_geometries, CalcOptions, CentroidStrategy};
use oceania_geo::crs::{regional_crs, Crs};
use oceania_geo::io::{
    assign_default_crs, read_vector, reproject, scan_directory, validate_shapefile, write_vector,
    ReadOptions, VectorFormat,
};
use oceania_geo::models::FeatureLayer;
use oceania_geo::spatial::{
    partition_by_boundary, select_columns, spatial_filter, BoundaryIndex, FilterOptions, JoinMode,
    Predicate,
};
use oceania_geo::standardize::{clean_abs_table, standardize_columns, CapitalCity};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Ingest Oceania government boundary files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check files exist, have a known format and complete shapefile siblings
    Validate {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Unify reference system and column names, optionally adding area and centroid
    Standardize {
        #[arg(short, long)]
        input: PathBuf,

        /// Country whose schema and reference system apply
        #[arg(short, long)]
        country: String,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        calc: CalcArgs,
    },

    /// Keep the features of a layer that fall inside boundary polygons
    Clip {
        #[arg(short, long)]
        input: PathBuf,

        /// Boundary layer (e.g. GCCSA)
        #[arg(short, long)]
        boundary: PathBuf,

        #[arg(long, default_value = "GCC_CODE21")]
        code_column: String,

        #[arg(long, default_value = "GCC_NAME21")]
        name_column: String,

        /// Boundary codes, or capital city/state codes (SYD, NSW).
        /// All in-scope capitals when omitted
        #[arg(long, value_delimiter = ',')]
        codes: Vec<String>,

        #[arg(long, default_value = "within")]
        predicate: Predicate,

        /// Test the whole geometry or only its representative point
        #[arg(long, default_value = "geometry")]
        mode: JoinMode,

        /// Columns to keep, as FROM:TO
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Write one file per boundary next to the output
        #[arg(long)]
        split: bool,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        calc: CalcArgs,
    },

    /// Clean an ABS suburb table for one in-scope capital
    Clean {
        #[arg(short, long)]
        input: PathBuf,

        /// State code (NSW) or city code (SYD)
        #[arg(long)]
        city: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert between vector formats
    Convert {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Reference system of the input when it declares none
        #[arg(long)]
        source_epsg: Option<u32>,

        /// Reproject before writing
        #[arg(long)]
        target_epsg: Option<u32>,
    },

    /// Run the jobs listed in a TOML config
    Batch {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Clone)]
struct CalcArgs {
    /// Add area_km2 and centroid
    #[arg(long)]
    calculate: bool,

    /// Projected system used for measurements
    #[arg(long, default_value = "3857")]
    area_epsg: u32,

    /// Reference system of the output
    #[arg(long, default_value = "4326")]
    target_epsg: u32,

    /// representative or centroid
    #[arg(long, default_value = "representative")]
    strategy: CentroidStrategy,
}

impl CalcArgs {
    fn options(&self) -> Result<CalcOptions> {
        Ok(CalcOptions {
            area_crs: Crs::from_epsg(self.area_epsg)?,
            output_crs: Crs::from_epsg(self.target_epsg)?,
            strategy: self.strategy,
        })
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    match args.command {
        Command::Validate { paths } => validate(&paths),
        Command::Standardize {
            input,
            country,
            output,
            calc,
        } => {
            let mut layer = load_standardized(&input, &country, Crs::from_epsg(calc.target_epsg)?)?;
            if calc.calculate {
                calculate(&mut layer, &calc.options()?)?;
            }
            write_vector(&layer, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        }
        Command::Clip {
            input,
            boundary,
            code_column,
            name_column,
            codes,
            predicate,
            mode,
            select,
            split,
            output,
            calc,
        } => {
            let layer = read_vector(&input, &ReadOptions::default())
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let boundaries = read_vector(&boundary, &ReadOptions::default())
                .with_context(|| format!("Failed to read {}", boundary.display()))?;
            let selection = parse_selection(&select)?;

            let mut clipped = clip(
                &layer,
                &boundaries,
                &code_column,
                &name_column,
                &resolve_codes(&codes),
                FilterOptions { predicate, mode },
                &selection,
            )?;
            if calc.calculate {
                calculate(&mut clipped, &calc.options()?)?;
            }
            write_output(&clipped, &output, split)
        }
        Command::Clean {
            input,
            city,
            output,
        } => {
            let table = read_vector(&input, &ReadOptions::default())
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let cleaned = clean_abs_table(&table, &city)?;
            write_vector(&cleaned, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        }
        Command::Convert {
            input,
            output,
            source_epsg,
            target_epsg,
        } => {
            // Fail on the output extension before reading anything
            VectorFormat::from_path(&output)?;
            let source = source_epsg.map(Crs::from_epsg).transpose()?;
            let options = ReadOptions {
                crs: source,
                ..Default::default()
            };
            let mut layer = read_vector(&input, &options)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            if let Some(crs) = source {
                assign_default_crs(&mut layer, crs);
            }
            if let Some(epsg) = target_epsg {
                reproject(&mut layer, Crs::from_epsg(epsg)?)?;
            }
            write_vector(&layer, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        }
        Command::Batch { config } => batch::run_batch(&config),
    }
}

fn validate(paths: &[PathBuf]) -> Result<()> {
    let mut failures = 0;
    for path in paths {
        if path.is_dir() {
            for report in scan_directory(path)? {
                if !report.is_complete() {
                    failures += 1;
                }
            }
            continue;
        }
        match VectorFormat::from_path(path) {
            Ok(VectorFormat::Shapefile) => {
                let missing = validate_shapefile(path);
                if missing.is_empty() {
                    info!("{} OK", path.display());
                } else {
                    warn!("{} is missing {}", path.display(), missing.join(", "));
                    failures += 1;
                }
            }
            Ok(format) if path.exists() => info!("{} OK ({:?})", path.display(), format),
            Ok(_) => {
                warn!("{} not found", path.display());
                failures += 1;
            }
            Err(e) => {
                warn!("{}", e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} file(s) failed validation", failures);
    }
    Ok(())
}

/// Read a file, declare the country's reference system if missing,
/// reproject and rename columns to the canonical schema
pub(crate) fn load_standardized(input: &Path, country: &str, target: Crs) -> Result<FeatureLayer> {
    let mut layer = read_vector(input, &ReadOptions::default())
        .with_context(|| format!("Failed to read {}", input.display()))?;
    assign_default_crs(&mut layer, regional_crs(country));
    reproject(&mut layer, target)
        .with_context(|| format!("Failed to reproject {}", input.display()))?;
    standardize_columns(&mut layer, country);
    Ok(layer)
}

pub(crate) fn calculate(layer: &mut FeatureLayer, options: &CalcOptions) -> Result<()> {
    repair_geometries(layer);
    add_calculation(layer, options).with_context(|| format!("Failed to calculate {}", layer.name))
}

/// Capital city or state codes become their GCCSA code; anything else is kept
pub(crate) fn resolve_codes(codes: &[String]) -> Vec<String> {
    if codes.is_empty() {
        return oceania_geo::standardize::gccsa_codes();
    }
    codes
        .iter()
        .map(|code| match CapitalCity::lookup(code) {
            Some(capital) => capital.gccsa_code.to_string(),
            None => code.clone(),
        })
        .collect()
}

fn parse_selection(select: &[String]) -> Result<Vec<(String, String)>> {
    select
        .iter()
        .map(|pair| match pair.split_once(':') {
            Some((from, to)) => Ok((from.to_string(), to.to_string())),
            None => Ok((pair.clone(), pair.clone())),
        })
        .collect()
}

pub(crate) fn clip(
    layer: &FeatureLayer,
    boundaries: &FeatureLayer,
    code_column: &str,
    name_column: &str,
    codes: &[String],
    options: FilterOptions,
    selection: &[(String, String)],
) -> Result<FeatureLayer> {
    let index = BoundaryIndex::from_layer(boundaries, code_column, name_column, codes)
        .with_context(|| format!("Failed to load boundaries from {}", boundaries.name))?;
    let joined = spatial_filter(layer, &index, &options)
        .with_context(|| format!("Failed to clip {}", layer.name))?;

    if selection.is_empty() {
        return Ok(joined);
    }
    let pairs: Vec<(&str, &str)> = selection
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();
    Ok(select_columns(&joined, &pairs)?)
}

/// Write a layer, or one file per boundary when `split` is set
pub(crate) fn write_output(layer: &FeatureLayer, output: &Path, split: bool) -> Result<()> {
    if !split {
        write_vector(layer, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        return Ok(());
    }
    VectorFormat::from_path(output)?;

    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    for (code, part) in partition_by_boundary(layer)? {
        let path = output.with_file_name(format!("{}_{}.{}", stem, code, extension));
        write_vector(&part, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_codes() {
        assert_eq!(
            resolve_codes(&["syd".into(), "VIC".into(), "9OTHR".into()]),
            vec!["1GSYD", "2GMEL", "9OTHR"]
        );
        assert_eq!(resolve_codes(&[]).len(), 4);
    }

    #[test]
    fn test_parse_selection() {
        let pairs = parse_selection(&["SAL_CODE21:sal_code".into(), "geometry".into()]).unwrap();
        assert_eq!(pairs[0], ("SAL_CODE21".to_string(), "sal_code".to_string()));
        assert_eq!(pairs[1], ("geometry".to_string(), "geometry".to_string()));
    }
}
