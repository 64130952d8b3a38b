use chrono::Utc;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::ResolvedConfig;
use crate::ddbj::{CrossRefCache, DdbjHttpClient, JgaSearchClient};
use crate::error::ConvertError;
use crate::meta::WarningCollector;
use crate::output::ValidationReport;
use crate::pipeline::Converter;
use crate::store::Store;

const MAX_WORKERS: usize = 32;

/// End-of-run totals. Per-document failures are logged and counted, never
/// propagated; the run as a whole only fails on setup errors.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub warnings: usize,
}

enum TaskOutcome {
    Done,
    Skipped,
    Failed,
}

pub fn run(config: &ResolvedConfig) -> Result<RunSummary, ConvertError> {
    let store = match &config.cache_dir {
        Some(cache_dir) => Store::new_with_paths(
            config.input_dir.clone(),
            config.output_dir.clone(),
            cache_dir.clone(),
        ),
        None => Store::new(config.input_dir.clone(), config.output_dir.clone())?,
    };
    let client = DdbjHttpClient::new()?;
    run_with_client(config, &store, &client)
}

/// Same as `run` but with an injected search client, so tests never touch
/// the network.
pub fn run_with_client<C: JgaSearchClient>(
    config: &ResolvedConfig,
    store: &Store,
    client: &C,
) -> Result<RunSummary, ConvertError> {
    let hum_ids: Vec<String> = if config.hum_ids.is_empty() {
        store.list_hum_ids()?
    } else {
        config.hum_ids.iter().map(|id| id.as_str().to_string()).collect()
    };
    let explicit = !config.hum_ids.is_empty();

    let cache = CrossRefCache::load(&store.xref_cache_path())?;
    let warnings = WarningCollector::default();

    let workers = config.workers.clamp(1, MAX_WORKERS);
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
    info!(workers, documents = hum_ids.len(), "starting conversion");

    let outcomes: Vec<TaskOutcome> = pool.install(|| {
        hum_ids
            .par_iter()
            .map(|hum_id| {
                let converter = Converter::new(store, client, &cache, &warnings, config.unified);
                match converter.process_document(hum_id) {
                    Ok(outcome) if outcome.skipped => {
                        if explicit {
                            error!(
                                hum_id = hum_id.as_str(),
                                "{}",
                                ConvertError::NoSnapshots(hum_id.clone())
                            );
                            TaskOutcome::Failed
                        } else {
                            TaskOutcome::Skipped
                        }
                    }
                    Ok(_) => TaskOutcome::Done,
                    Err(err) => {
                        error!(hum_id = hum_id.as_str(), "document conversion failed: {err}");
                        TaskOutcome::Failed
                    }
                }
            })
            .collect()
    });

    if let Err(err) = cache.save(&store.xref_cache_path()) {
        warn!("failed to persist cross-reference cache: {err}");
    }

    let report = ValidationReport {
        generated_at: Utc::now().to_rfc3339(),
        warnings: warnings.snapshot(),
    };
    Store::write_json_atomic(&store.report_path(), &report)?;

    let mut summary = RunSummary {
        warnings: report.warnings.len(),
        ..RunSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Done => summary.converted += 1,
            TaskOutcome::Skipped => summary.skipped += 1,
            TaskOutcome::Failed => summary.failed += 1,
        }
    }
    info!(
        converted = summary.converted,
        skipped = summary.skipped,
        failed = summary.failed,
        warnings = summary.warnings,
        "conversion finished"
    );
    Ok(summary)
}
