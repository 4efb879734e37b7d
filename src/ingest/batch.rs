use crate::config::{ClipConfig, Config, GlobalConfig, JobConfig};
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use oceania_geo::calc::{CalcOptions, CentroidStrategy};
use oceania_geo::crs::Crs;
use oceania_geo::io::{read_vector, ReadOptions};
use oceania_geo::spatial::{FilterOptions, JoinMode, Predicate};
use std::path::Path;
use tracing::{error, info};

pub fn run_batch(config_path: &Path) -> Result<()> {
    let config = Config::load_from_file(config_path)?;
    info!("Starting batch run for {} jobs", config.jobs.len());

    std::fs::create_dir_all(&config.global.output_dir).with_context(|| {
        format!(
            "Failed to create output dir {}",
            config.global.output_dir.display()
        )
    })?;

    let pb = ProgressBar::new(config.jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut failed = Vec::new();
    for job in &config.jobs {
        pb.set_message(job.name.clone());
        // One failing job does not stop the rest
        if let Err(e) = run_job(job, &config.global) {
            error!("Job {} failed: {:?}", job.name, e);
            failed.push(job.name.clone());
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if !failed.is_empty() {
        return Err(anyhow!("{} job(s) failed: {}", failed.len(), failed.join(", ")));
    }
    info!("Batch run complete");
    Ok(())
}

fn run_job(job: &JobConfig, global: &GlobalConfig) -> Result<()> {
    info!("Running {}", job.name);
    let target = Crs::from_epsg(global.target_epsg)?;
    let input = global.data_dir.join(&job.input);

    let mut layer = crate::load_standardized(&input, &job.country, target)?;

    if let Some(clip) = &job.clip {
        layer = clip_job(&layer, clip, &job.columns, global)?;
    } else if !job.columns.is_empty() {
        let pairs: Vec<(&str, &str)> = job
            .columns
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        layer = oceania_geo::spatial::select_columns(&layer, &pairs)?;
    }

    if job.calculate {
        let options = CalcOptions {
            area_crs: Crs::from_epsg(global.area_epsg)?,
            output_crs: target,
            strategy: CentroidStrategy::default(),
        };
        crate::calculate(&mut layer, &options)?;
    }

    let output = global.output_dir.join(&job.output);
    crate::write_output(&layer, &output, false)?;
    info!("{} -> {} ({} features)", job.name, output.display(), layer.len());
    Ok(())
}

fn clip_job(
    layer: &oceania_geo::FeatureLayer,
    clip: &ClipConfig,
    columns: &[(String, String)],
    global: &GlobalConfig,
) -> Result<oceania_geo::FeatureLayer> {
    let path = global.data_dir.join(&clip.boundary);
    let boundaries = read_vector(&path, &ReadOptions::default())
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let options = FilterOptions {
        predicate: clip
            .predicate
            .parse::<Predicate>()
            .map_err(|e| anyhow!(e))?,
        mode: clip.mode.parse::<JoinMode>().map_err(|e| anyhow!(e))?,
    };

    crate::clip(
        layer,
        &boundaries,
        &clip.code_column,
        &clip.name_column,
        &crate::resolve_codes(&clip.codes),
        options,
        columns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;
    use oceania_geo::io::shapefile::write_shapefile;
    use oceania_geo::models::{columns, Feature, FeatureLayer};

    fn square(x: f64, y: f64, size: f64) -> geo::Geometry<f64> {
        Rect::new((x, y), (x + size, y + size)).to_polygon().into()
    }

    #[test]
    fn test_batch_clip_and_calculate() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();

        let mut gccsa = FeatureLayer::new(
            "gccsa",
            vec!["GCC_CODE21".into(), "GCC_NAME21".into()],
        )
        .with_crs(Some(Crs::WGS84));
        gccsa.push(Feature::new(
            Some(square(150.0, -34.5, 1.5)),
            vec!["1GSYD".into(), "Greater Sydney".into()],
        ));
        write_shapefile(&gccsa, &data.join("GCCSA.shp")).unwrap();

        let mut sal = FeatureLayer::new("sal", vec!["SAL_CODE21".into(), "SAL_NAME21".into()])
            .with_crs(Some(Crs::WGS84));
        sal.push(Feature::new(
            Some(square(151.0, -34.0, 0.05)),
            vec!["10001".into(), "Parramatta".into()],
        ));
        sal.push(Feature::new(
            Some(square(144.9, -37.9, 0.05)),
            vec!["20001".into(), "Carlton".into()],
        ));
        write_shapefile(&sal, &data.join("SAL.shp")).unwrap();

        let config_path = dir.path().join("batch.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
                [global]
                data_dir = "{}"
                output_dir = "{}"

                [[jobs]]
                name = "syd"
                input = "SAL.shp"
                country = "Australia"
                output = "syd.geojson"
                calculate = true

                [jobs.clip]
                boundary = "GCCSA.shp"
                code_column = "GCC_CODE21"
                name_column = "GCC_NAME21"
                codes = ["SYD"]
                "#,
                data.display(),
                dir.path().join("out").display()
            ),
        )
        .unwrap();

        run_batch(&config_path).unwrap();

        let out_path = dir.path().join("out/syd.geojson");
        let out = read_vector(&out_path, &ReadOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.column_index(columns::BOUNDARY_CODE).is_some());
        assert!(out.column_index(columns::AREA_KM2).is_some());
    }

    #[test]
    fn test_failed_job_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("batch.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
                [global]
                data_dir = "{0}"
                output_dir = "{0}"

                [[jobs]]
                name = "missing"
                input = "NOPE.shp"
                country = "Australia"
                output = "nope.csv"
                "#,
                dir.path().display()
            ),
        )
        .unwrap();

        let err = run_batch(&config_path).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
