use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::MusicCatalog;
use crate::cli::CheckArgs;
use crate::commands::context::{build_catalog, build_validator};
use crate::report::owner_line;
use crate::valence::{Score, ValenceAggregator};

pub fn run(args: CheckArgs) -> Result<()> {
    let catalog = build_catalog(&args.catalog)?;
    let validator = build_validator(&args.catalog);

    let valid = validator
        .is_valid(&args.link)
        .context("failed to check link reachability")?;
    info!(link = %args.link, valid, "checked link");

    let aggregator = ValenceAggregator::new(&catalog, &validator);
    let score = aggregator
        .average_valence(&args.link)
        .with_context(|| format!("failed to score {}", args.link))?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    match (score, args.year.as_deref()) {
        (Score::Valence(_), Some(year)) => {
            let playlist_id = catalog.resolve_playlist_id(&args.link)?;
            let owner = catalog
                .playlist_owner(&playlist_id)
                .context("failed to look up playlist owner")?;
            writeln!(output, "{}", owner_line(&owner, score, year))?;
        }
        _ => writeln!(output, "{score}")?,
    }
    output.flush()?;

    Ok(())
}
