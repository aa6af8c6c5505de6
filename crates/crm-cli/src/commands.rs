//! Command runners: wire the client, mapper, and orchestrator together.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};

use crm_client::{CrmApi, HttpCrmApi, RateLimitedClient, RetryPolicy};
use crm_core::MigrationOrchestrator;
use crm_map::{MappingEngine, ReadinessScorer};
use crm_model::{MigrationConfig, MigrationMapping, MigrationRun, ReadinessReport};

use crate::cli::{AccountArgs, MigrateArgs, PreviewArgs};

/// Result of the read-only preview command.
pub struct PreviewResult {
    pub mapping: MigrationMapping,
    pub readiness: ReadinessReport,
}

/// Map both schemas and score readiness without writing anything.
pub fn run_preview(args: &PreviewArgs) -> anyhow::Result<PreviewResult> {
    let config = MigrationConfig::default()
        .with_similarity_threshold(args.account.similarity_threshold);
    let source = build_api(&args.account, Credential::Source, &config)?;
    let destination = build_api(&args.account, Credential::Destination, &config)?;

    let source_fields = source.list_fields().context("fetch source fields")?;
    let destination_fields = destination
        .list_fields()
        .context("fetch destination fields")?;
    let source_catalog = source.list_pipelines().context("fetch source pipelines")?;
    let destination_catalog = destination
        .list_pipelines()
        .context("fetch destination pipelines")?;

    let mapping = MappingEngine::from_config(&config).build(
        &source_fields,
        &destination_fields,
        &source_catalog,
        &destination_catalog,
    );
    let readiness = ReadinessScorer::from_config(&config).score(&mapping, &source_catalog);
    Ok(PreviewResult { mapping, readiness })
}

/// Run the full migration and optionally write the JSON report.
pub fn run_migrate(args: &MigrateArgs) -> anyhow::Result<MigrationRun> {
    let config = MigrationConfig::default()
        .with_similarity_threshold(args.account.similarity_threshold)
        .with_batch_size(args.batch_size)
        .with_inter_request_delay_secs(args.request_delay)
        .with_max_retries(args.max_retries)
        .with_auto_create_missing(args.auto_create)
        .with_acknowledge_low_readiness(args.allow_low_readiness);

    let source: Arc<dyn CrmApi> = Arc::new(build_api(&args.account, Credential::Source, &config)?);
    let destination: Arc<dyn CrmApi> =
        Arc::new(build_api(&args.account, Credential::Destination, &config)?);

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    let progress_bar = bar.clone();

    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| format!("run-{}", Utc::now().format("%Y%m%d-%H%M%S")));

    let orchestrator = MigrationOrchestrator::new(source, destination, config).with_progress(
        Box::new(move |update| {
            if update.total > 0 {
                progress_bar.set_message(format!(
                    "{}: {} ({}/{}, {:.0}%)",
                    update.stage, update.message, update.current, update.total, update.percentage
                ));
            } else {
                progress_bar.set_message(format!("{}: {}", update.stage, update.message));
            }
        }),
    );

    let run = orchestrator.run(run_id);
    bar.finish_and_clear();

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&run).context("serialize run report")?;
        fs::write(path, json).with_context(|| format!("write report to {}", path.display()))?;
    }
    Ok(run)
}

enum Credential {
    Source,
    Destination,
}

fn build_api(
    account: &AccountArgs,
    credential: Credential,
    config: &MigrationConfig,
) -> anyhow::Result<HttpCrmApi> {
    let (flag, env_var, which) = match credential {
        Credential::Source => (&account.source_key, "CRM_SOURCE_API_KEY", "source"),
        Credential::Destination => (
            &account.destination_key,
            "CRM_DESTINATION_API_KEY",
            "destination",
        ),
    };
    let Some(key) = flag
        .clone()
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
    else {
        bail!("missing {which} API key: pass --{which}-key or set {env_var}");
    };
    let client = RateLimitedClient::over_http(
        account.base_url.as_str(),
        key,
        RetryPolicy::from_config(config),
        Duration::from_secs_f64(config.inter_request_delay_secs),
    )
    .with_context(|| format!("build {which} API client"))?;
    Ok(HttpCrmApi::new(client))
}
