use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::DeltaArgs;
use crate::commands::context::{SURVEY_RANGE, build_catalog, build_validator, load_rows};
use crate::model::{DeltaManifest, MANIFEST_VERSION};
use crate::report::delta;
use crate::survey::complete_quadruplets;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};
use crate::valence::ValenceAggregator;

pub fn run(args: DeltaArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let snapshot = load_rows(&args.sheet, SURVEY_RANGE)?;

    let catalog = build_catalog(&args.catalog)?;
    let validator = build_validator(&args.catalog);
    let quadruplets = complete_quadruplets(&snapshot.rows, &validator)
        .context("failed to collect respondents with four valid links")?;
    info!(
        run_id = %run_id,
        rows = snapshot.rows.len(),
        complete = quadruplets.len(),
        "collected complete respondents"
    );

    let aggregator = ValenceAggregator::new(&catalog, &validator);
    let deltas = delta(&quadruplets, &aggregator).context("failed to compute year deltas")?;

    for (pair, entries) in &deltas {
        info!(years = %pair, respondents = entries.len(), "year delta");
    }

    let manifest = DeltaManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        generated_at: now_utc_string(),
        source: snapshot.source,
        complete_rows: quadruplets.len(),
        deltas,
    };

    let output_path = args.output.unwrap_or_else(|| {
        args.cache_root
            .join("reports")
            .join(format!("delta_{}.json", utc_compact_string(started_ts)))
    });
    write_json_pretty(&output_path, &manifest)?;
    info!(path = %output_path.display(), "wrote delta report");

    Ok(())
}
