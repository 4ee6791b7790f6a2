use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::distribution::DistributionError;
use crate::pak_index::IndexError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("mandatory index entry {0} not present in any channel catalog")]
    MissingIndexEntry(String),

    #[error("staging io failure at {path}: {source}")]
    StagingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
