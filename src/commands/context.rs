use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::catalog::SpotifyCatalog;
use crate::cli::{CatalogArgs, SheetArgs};
use crate::http_client::RetryConfig;
use crate::links::{HttpProbe, LinkValidator};
use crate::model::SourceInfo;
use crate::sheets::{JsonRowsFile, SheetSource, SheetsApiSource, SheetsAuth};
use crate::util::sha256_rows;

/// Link columns, one per survey year.
pub(super) const SURVEY_RANGE: &str = "C2:F";
/// Name, the four link columns, then the email column.
pub(super) const RESPONDENT_RANGE: &str = "B2:G";

pub(super) struct SurveySnapshot {
    pub(super) rows: Vec<Vec<String>>,
    pub(super) source: SourceInfo,
}

pub(super) fn load_rows(args: &SheetArgs, default_range: &str) -> Result<SurveySnapshot> {
    let range = args.range.as_deref().unwrap_or(default_range);

    let (kind, location, source) = if let Some(path) = &args.rows_file {
        let source: Box<dyn SheetSource> = Box::new(JsonRowsFile::new(path.clone()));
        ("rows-file", path.display().to_string(), source)
    } else {
        let Some(spreadsheet_id) = args.spreadsheet_id.as_deref() else {
            bail!("either --spreadsheet-id or --rows-file is required");
        };
        let auth = match (&args.sheets_access_token, &args.sheets_api_key) {
            (Some(token), _) => SheetsAuth::Bearer(token.clone()),
            (None, Some(key)) => SheetsAuth::ApiKey(key.clone()),
            (None, None) => bail!("--sheets-access-token or --sheets-api-key is required"),
        };
        let source: Box<dyn SheetSource> = Box::new(SheetsApiSource::new(
            &args.sheets_api_base,
            spreadsheet_id,
            auth,
            RetryConfig::with_attempts(3),
        )?);
        ("google-sheets", spreadsheet_id.to_string(), source)
    };

    let rows = source
        .get_rows(range)
        .with_context(|| format!("failed to read survey rows from {location} ({range})"))?;

    Ok(SurveySnapshot {
        source: SourceInfo {
            kind: kind.to_string(),
            location,
            range: range.to_string(),
            row_count: rows.len(),
            rows_sha256: sha256_rows(&rows),
        },
        rows,
    })
}

pub(super) fn build_validator(args: &CatalogArgs) -> LinkValidator<HttpProbe> {
    let probe = HttpProbe::new(
        Duration::from_millis(args.link_timeout_ms),
        RetryConfig::with_attempts(args.max_attempts),
    );
    LinkValidator::new(probe)
}

pub(super) fn build_catalog(args: &CatalogArgs) -> Result<SpotifyCatalog> {
    let retry = RetryConfig::with_attempts(args.max_attempts);

    if let Some(token) = &args.spotify_token {
        info!("using pre-issued catalog token");
        return Ok(SpotifyCatalog::with_token(&args.spotify_api_base, token, retry)?);
    }

    match (&args.spotify_client_id, &args.spotify_client_secret) {
        (Some(client_id), Some(client_secret)) => {
            let catalog = SpotifyCatalog::with_client_credentials(
                &args.spotify_api_base,
                &args.spotify_accounts_base,
                client_id,
                client_secret,
                retry,
            )
            .context("failed to authenticate with the music catalog")?;
            Ok(catalog)
        }
        _ => bail!(
            "catalog credentials missing: set --spotify-token, \
             or both --spotify-client-id and --spotify-client-secret"
        ),
    }
}
