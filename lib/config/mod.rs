use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::distribution::ChannelId;
use crate::sync_engine::MissingSegmentPolicy;

/// Default channel priority for the Dota 2 depot family; earlier entries win
/// when a segment is published in several channels.
const DEFAULT_CHANNELS: &str = "381451,381452,381453,381454,381455,373301";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {name} is not set")]
    Missing { name: &'static str },
    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub struct Config {
    /// Distribution service base url. Required.
    pub distribution_url: String,
    pub product_id: u32,
    /// Directory holding the checkpoint file.
    pub state_dir: PathBuf,
    /// Staging directory for fetched segments.
    pub staging_dir: PathBuf,
    /// Channel ids in priority order.
    pub channels: Vec<ChannelId>,
    pub path_filters: Vec<String>,
    pub batch_size: usize,
    pub fetch_parallelism: usize,
    pub archive_stem: String,
    pub missing_segment_policy: MissingSegmentPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let distribution_url = env::var("PAKSYNC_DISTRIBUTION_URL")
            .map_err(|_| ConfigError::Missing {
                name: "PAKSYNC_DISTRIBUTION_URL",
            })?;

        Ok(Self {
            distribution_url,
            product_id: parse_number("PAKSYNC_PRODUCT_ID", env::var("PAKSYNC_PRODUCT_ID").ok(), 570)?,
            state_dir: env::var("PAKSYNC_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./static")),
            staging_dir: env::var("PAKSYNC_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./temp")),
            channels: parse_channels(
                "PAKSYNC_CHANNELS",
                &env::var("PAKSYNC_CHANNELS").unwrap_or_else(|_| DEFAULT_CHANNELS.to_string()),
            )?,
            path_filters: parse_list(env::var("PAKSYNC_PATH_FILTERS").ok().as_deref()),
            batch_size: parse_number("PAKSYNC_BATCH_SIZE", env::var("PAKSYNC_BATCH_SIZE").ok(), 10)?,
            fetch_parallelism: parse_number(
                "PAKSYNC_FETCH_PARALLELISM",
                env::var("PAKSYNC_FETCH_PARALLELISM").ok(),
                4,
            )?,
            archive_stem: env::var("PAKSYNC_ARCHIVE_STEM")
                .unwrap_or_else(|_| "pak01".to_string()),
            missing_segment_policy: parse_missing_policy(
                env::var("PAKSYNC_MISSING_SEGMENT_POLICY").ok().as_deref(),
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_channels(name: &'static str, raw: &str) -> Result<Vec<ChannelId>, ConfigError> {
    let channels: Vec<ChannelId> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| ConfigError::Invalid {
                name,
                value: raw.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;
    if channels.is_empty() {
        return Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        });
    }
    Ok(channels)
}

fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_missing_policy(raw: Option<&str>) -> Result<MissingSegmentPolicy, ConfigError> {
    match raw {
        None => Ok(MissingSegmentPolicy::default()),
        Some("skip") => Ok(MissingSegmentPolicy::SkipAndLog),
        Some("fail") => Ok(MissingSegmentPolicy::FailBatch),
        Some(other) => Err(ConfigError::Invalid {
            name: "PAKSYNC_MISSING_SEGMENT_POLICY",
            value: other.to_string(),
        }),
    }
}
