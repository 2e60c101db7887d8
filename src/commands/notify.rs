use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::NotifyArgs;
use crate::commands::context::{RESPONDENT_RANGE, build_catalog, build_validator, load_rows};
use crate::notify::{NotificationSender, OutboxSender, build_notifications, compose};
use crate::survey::RespondentParser;
use crate::util::utc_compact_string;
use crate::valence::ValenceAggregator;

pub fn run(args: NotifyArgs) -> Result<()> {
    let started_ts = Utc::now();

    let snapshot = load_rows(&args.sheet, RESPONDENT_RANGE)?;
    let parser = RespondentParser::new()?;
    let respondents = parser.parse(&snapshot.rows);
    info!(
        rows = snapshot.rows.len(),
        respondents = respondents.len(),
        "collected respondents with an address"
    );

    let catalog = build_catalog(&args.catalog)?;
    let validator = build_validator(&args.catalog);
    let aggregator = ValenceAggregator::new(&catalog, &validator);
    let notifications = build_notifications(&respondents, &aggregator)
        .context("failed to score respondent playlists")?;

    if args.dry_run {
        for notification in &notifications {
            let message = compose(notification);
            info!(
                to = %message.to,
                scores = ?notification.scores,
                body_chars = message.body.len(),
                "composed result email (dry-run)"
            );
        }
        info!(messages = notifications.len(), "notify dry-run complete");
        return Ok(());
    }

    let outbox_dir = args.outbox_dir.unwrap_or_else(|| {
        args.cache_root
            .join("outbox")
            .join(utc_compact_string(started_ts))
    });
    let mut outbox = OutboxSender::new(outbox_dir.clone());
    for notification in &notifications {
        outbox
            .deliver(&compose(notification))
            .with_context(|| format!("failed to queue result email for {}", notification.email))?;
    }
    info!(path = %outbox_dir.display(), messages = outbox.written(), "wrote outbox");

    Ok(())
}
