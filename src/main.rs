use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use dotenv::dotenv;
use tracing::{debug, error, info};

use paksync_lib::checkpoint::CheckpointStore;
use paksync_lib::cli::{parse_args, Cli};
use paksync_lib::config::Config;
use paksync_lib::distribution::HttpDistributionClient;
use paksync_lib::logging::{format_error_report, init_logging};
use paksync_lib::sync_engine::{
    ExtractToolConfig, ExtractToolProcessor, MissingSegmentPolicy, PostProcessor, SyncController,
    SyncEngineConfig, SyncOutcome,
};

/// Flags override their environment counterparts; everything else comes from
/// [`Config`].
fn build_engine_config(config: &Config, args: &Cli, extract_output: Option<&std::path::Path>) -> SyncEngineConfig {
    SyncEngineConfig {
        product_id: config.product_id,
        channels: config.channels.clone(),
        path_filters: if args.filters.is_empty() {
            config.path_filters.clone()
        } else {
            args.filters.clone()
        },
        batch_size: args.batch_size.unwrap_or(config.batch_size),
        fetch_parallelism: args.fetch_parallelism.unwrap_or(config.fetch_parallelism),
        staging_dir: config.staging_dir.clone(),
        archive_stem: config.archive_stem.clone(),
        missing_segment_policy: if args.strict_missing {
            MissingSegmentPolicy::FailBatch
        } else {
            config.missing_segment_policy
        },
        transient_output: if args.transient_extract {
            extract_output.map(|path| path.to_path_buf())
        } else {
            None
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = parse_args();
    init_logging("paksync", "info");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(event = "config_invalid", "{}", format_error_report(&err));
            return ExitCode::FAILURE;
        }
    };
    debug!(event = "config_loaded", product_id = config.product_id, "config loaded");

    let extract_output = args
        .extract_tool
        .as_ref()
        .map(|_| {
            args.extract_output
                .clone()
                .unwrap_or_else(|| config.state_dir.join("extracted"))
        });
    let post_processor: Option<Arc<dyn PostProcessor>> =
        args.extract_tool.as_ref().map(|program| {
            Arc::new(ExtractToolProcessor::new(ExtractToolConfig {
                program: program.clone(),
                output_dir: extract_output.clone().expect("output derived alongside tool"),
                content_filter: args.extract_filter.clone(),
                recursive: !args.extract_flat,
            })) as Arc<dyn PostProcessor>
        });

    let engine_config = build_engine_config(&config, &args, extract_output.as_deref());

    let client = match HttpDistributionClient::connect(
        config.distribution_url.clone(),
        &args.account,
        &args.password,
    )
    .await
    {
        Ok(client) => client,
        Err(err) => {
            error!(event = "connect_failed", "{}", format_error_report(&err));
            return ExitCode::FAILURE;
        }
    };

    let store = CheckpointStore::new(config.state_dir.join("sync_state.json"));
    let controller = SyncController::new(client, store, engine_config, post_processor);

    let start_time = Instant::now();
    match controller.run().await {
        Ok(SyncOutcome::Unchanged { version }) => {
            info!(event = "run_finished", version = %version, "already up to date");
            ExitCode::SUCCESS
        }
        Ok(SyncOutcome::Completed {
            version,
            batches,
            segments,
        }) => {
            info!(
                event = "run_finished",
                version = %version,
                batches,
                segments,
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "sync completed"
            );
            ExitCode::SUCCESS
        }
        Ok(SyncOutcome::Partial {
            version,
            completed_batches,
            cause,
        }) => {
            error!(
                event = "run_partial",
                version = %version,
                completed_batches,
                "{}",
                format_error_report(&cause)
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(event = "run_failed", "{}", format_error_report(&err));
            ExitCode::FAILURE
        }
    }
}
