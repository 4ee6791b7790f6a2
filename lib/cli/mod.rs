use std::path::PathBuf;

use clap::Parser;

use crate::build_info;

#[derive(Parser, Debug)]
#[command(
    about = "Selective archive synchronizer for versioned content packages",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    /// Distribution service account name
    pub account: String,

    /// Distribution service password
    pub password: String,

    #[clap(short, long = "filter")]
    /// Path prefix to select; repeatable. Overrides PAKSYNC_PATH_FILTERS
    pub filters: Vec<String>,

    #[clap(long)]
    /// Segments checkpointed per batch
    pub batch_size: Option<usize>,

    #[clap(long)]
    /// Concurrent segment downloads within a batch
    pub fetch_parallelism: Option<usize>,

    #[clap(long)]
    /// Fail the batch when a selected segment is absent from every channel
    pub strict_missing: bool,

    #[clap(long)]
    /// Extraction tool to run after each fetched batch
    pub extract_tool: Option<PathBuf>,

    #[clap(long)]
    /// Directory the extraction tool writes into
    pub extract_output: Option<PathBuf>,

    #[clap(long, default_value = "image")]
    /// Content filter passed to the extraction tool
    pub extract_filter: String,

    #[clap(long)]
    /// Pass a flat directory layout to the extraction tool
    pub extract_flat: bool,

    #[clap(long)]
    /// Delete the extraction output tree after each committed batch
    pub transient_extract: bool,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
