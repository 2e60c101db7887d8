use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::SummarizeArgs;
use crate::commands::context::{SURVEY_RANGE, build_catalog, build_validator, load_rows};
use crate::model::{MANIFEST_VERSION, SummaryManifest};
use crate::report::summarize;
use crate::survey::bucketize;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};
use crate::valence::ValenceAggregator;

pub fn run(args: SummarizeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let snapshot = load_rows(&args.sheet, SURVEY_RANGE)?;
    let bucket = bucketize(&snapshot.rows).context("failed to group survey rows by year")?;

    let catalog = build_catalog(&args.catalog)?;
    let validator = build_validator(&args.catalog);
    let aggregator = ValenceAggregator::new(&catalog, &validator);

    info!(run_id = %run_id, links = bucket.link_count(), "scoring survey playlists");
    let report = summarize(&bucket, &aggregator).context("failed to score survey playlists")?;

    for (year, mean) in &report.per_year_mean {
        info!(year = %year, mean = ?mean, "year happiness");
    }

    let manifest = SummaryManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        generated_at: now_utc_string(),
        source: snapshot.source,
        link_count: bucket.link_count(),
        report,
    };

    let output_path = args.output.unwrap_or_else(|| {
        args.cache_root
            .join("reports")
            .join(format!("summary_{}.json", utc_compact_string(started_ts)))
    });
    write_json_pretty(&output_path, &manifest)?;
    info!(path = %output_path.display(), "wrote summary report");

    Ok(())
}
