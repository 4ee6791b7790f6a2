pub mod build_info;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod distribution;
pub mod logging;
pub mod pak_index;
pub mod sync_engine;
