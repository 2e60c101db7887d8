use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ShelveArgs;
use crate::commands::context::{SURVEY_RANGE, load_rows};
use crate::model::{MANIFEST_VERSION, ShelfManifest};
use crate::survey::{SURVEY_YEARS, bucketize};
use crate::util::{now_utc_string, write_json_pretty, write_json_stdout};

pub fn run(args: ShelveArgs) -> Result<()> {
    let snapshot = load_rows(&args.sheet, SURVEY_RANGE)?;
    let years = bucketize(&snapshot.rows).context("failed to group survey rows by year")?;

    for year in SURVEY_YEARS {
        info!(year = %year, links = years.links(year).len(), "shelved year");
    }

    let manifest = ShelfManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        source: snapshot.source,
        link_count: years.link_count(),
        years,
    };

    match args.output {
        Some(path) => {
            write_json_pretty(&path, &manifest)?;
            info!(path = %path.display(), links = manifest.link_count, "wrote shelf");
        }
        None => write_json_stdout(&manifest)?,
    }

    Ok(())
}
