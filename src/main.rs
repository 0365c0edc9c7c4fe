//! kvprovision - Azure Key Vault provisioning workflow
//!
//! Runs the provisioning sequence once against the subscription named in
//! the environment and exits non-zero if any forward step failed.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kv_provision::cli::Cli;
use kv_provision::config::{RunSettings, WorkflowConfig};
use kv_provision::utils::format::{DisplayUtils, TableFormatter};
use kv_provision::utils::network::{create_http_client, NetworkConfig};
use kv_provision::workflow::{Collaborators, ConsoleProgress, Orchestrator, RunReport, WorkflowPlan};
use kv_provision::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Configuration problems surface before any remote call
    let config = WorkflowConfig::from_source(cli.config_source())?;
    let settings = cli.run_settings();
    settings.validate()?;

    info!(
        subscription = %config.subscription_id,
        location = %settings.location,
        "Starting kvprovision"
    );

    let http_client = create_http_client(&NetworkConfig::default())?;
    let services = Collaborators::azure(http_client, &config, &settings);
    let plan = WorkflowPlan::generate(&settings);
    let progress = Arc::new(ConsoleProgress::new(settings.no_color));

    let display = DisplayUtils::new(settings.no_color);
    display.print_header(&format!(
        "Provisioning vault {} in resource group {}",
        plan.vault_name, plan.resource_group
    ));

    let orchestrator = Orchestrator::new(services, plan, progress);
    let report = orchestrator.run(&config).await?;

    print_report(&report, &settings, &display);
    Ok(())
}

fn print_report(report: &RunReport, settings: &RunSettings, display: &DisplayUtils) {
    println!();
    println!("Vault URI: {}", report.vault_uri);
    if let Some(key_id) = &report.key_id {
        println!("Key:       {}", key_id);
    }
    println!("Secret:    {}", report.secret_id);
    println!("Access policies: {}", report.access_policy_count);
    println!();
    println!(
        "{}",
        TableFormatter::new(settings.no_color).format_table(&report.object_rows())
    );

    if report.cleanup.is_clean() {
        display.print_success("Workflow completed; all resources deleted");
    } else {
        display.print_warning(&format!(
            "Workflow completed, but cleanup did not finish; delete resource group {} manually",
            report.resource_group
        ));
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kv_provision=info,kvprovision=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
