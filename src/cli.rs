use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::{SPOTIFY_ACCOUNTS_BASE, SPOTIFY_API_BASE};
use crate::links::DEFAULT_LINK_TIMEOUT;
use crate::sheets::SHEETS_API_BASE;

#[derive(Parser, Debug)]
#[command(
    name = "moodofmusic",
    version,
    about = "Survey playlist happiness scoring from Spotify valence"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Shelve(ShelveArgs),
    Summarize(SummarizeArgs),
    Delta(DeltaArgs),
    Check(CheckArgs),
    Notify(NotifyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    #[arg(long, env = "SURVEY_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    #[arg(long)]
    pub range: Option<String>,

    #[arg(long)]
    pub rows_file: Option<PathBuf>,

    #[arg(long, env = "SHEETS_API_KEY", hide_env_values = true)]
    pub sheets_api_key: Option<String>,

    #[arg(long, env = "SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_access_token: Option<String>,

    #[arg(long, default_value = SHEETS_API_BASE)]
    pub sheets_api_base: String,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    #[arg(long, env = "SPOTIFY_TOKEN", hide_env_values = true)]
    pub spotify_token: Option<String>,

    #[arg(long, default_value = SPOTIFY_API_BASE)]
    pub spotify_api_base: String,

    #[arg(long, default_value = SPOTIFY_ACCOUNTS_BASE)]
    pub spotify_accounts_base: String,

    #[arg(long, default_value_t = DEFAULT_LINK_TIMEOUT.as_millis() as u64)]
    pub link_timeout_ms: u64,

    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ShelveArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    #[arg(long, default_value = ".cache/moodofmusic")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DeltaArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    #[arg(long, default_value = ".cache/moodofmusic")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    pub link: String,

    #[arg(long)]
    pub year: Option<String>,

    #[command(flatten)]
    pub catalog: CatalogArgs,
}

#[derive(Args, Debug, Clone)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    #[arg(long, default_value = ".cache/moodofmusic")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub outbox_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
