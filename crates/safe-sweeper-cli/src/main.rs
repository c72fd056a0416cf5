mod advisor;
mod commands;
mod input;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use advisor::HttpAdvisor;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use safe_sweeper_core::backup::BackupCoordinator;
use safe_sweeper_core::classify::escalate::AdvisorClient;
use safe_sweeper_core::classify::plan::build_plan;
use safe_sweeper_core::classify::rules::RuleClassifier;
use safe_sweeper_core::classify::{classify_candidates, governor_for};
use safe_sweeper_core::model::RiskTier;
use safe_sweeper_core::storage::Database;
use safe_sweeper_core::{AppConfig, ExecuteOptions, ExecutionEngine};
use tracing::{error, info};

const API_KEY_VAR: &str = "SAFE_SWEEPER_API_KEY";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match safe_sweeper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Plan {
            input,
            descriptor,
            no_escalate,
        }) => {
            if let Err(err) = run_plan(&config, &input, &descriptor, no_escalate) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Execute {
            plan_id,
            include_dangerous,
            yes,
            report,
        }) => {
            if let Err(err) = run_execute(&config, &plan_id, include_dangerous, yes, report) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Restore {
            execution_id,
            items,
        }) => {
            if let Err(err) = run_restore(&config, &execution_id, &items) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::History) => {
            if let Err(err) = run_history(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Prune { days }) => {
            if let Err(err) = run_prune(&config, days) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        Some(Commands::TruncateDb) => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the database?",
                Some(false),
            ) {
                Ok(true) => match Database::open(&config.database_path) {
                    Ok(db) => {
                        if let Err(e) = db.truncate_all() {
                            error!("Error truncating database: {}", e);
                        } else {
                            println!("All tables truncated");
                        }
                    }
                    Err(e) => error!("Error opening database: {}", e),
                },
                _ => {
                    process::exit(0);
                }
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_plan(
    config: &AppConfig,
    input_path: &Path,
    descriptor: &str,
    no_escalate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = input::load_candidates(input_path)?;
    info!("Loaded {} candidate items", candidates.len());

    let db = Database::open(&config.database_path)?;
    let classifier = RuleClassifier::new(&config.protected_paths);
    let governor = governor_for(&config.advisor);

    let api_key = std::env::var(API_KEY_VAR).unwrap_or_default();
    let http_advisor = if !no_escalate
        && config.advisor.enabled
        && !config.advisor.api_url.is_empty()
        && !api_key.is_empty()
    {
        Some(HttpAdvisor::new(
            &config.advisor.api_url,
            &api_key,
            &config.advisor.model,
        ))
    } else {
        info!("Advisor escalation disabled; using rule verdicts only");
        None
    };
    let advisor_ref = http_advisor.as_ref().map(|a| a as &dyn AdvisorClient);

    let verdicts = classify_candidates(
        &candidates,
        &classifier,
        advisor_ref,
        &governor,
        config.advisor.batch_size,
    );
    let plan = build_plan(verdicts, descriptor);
    db.save_plan(&plan)?;

    let budget = governor.snapshot();
    println!("Plan {} created", plan.id.bold());
    info!(
        "{} safe / {} suspicious / {} dangerous, {} bytes total",
        format!("{}", plan.count_for(RiskTier::Safe)).green(),
        format!("{}", plan.count_for(RiskTier::Suspicious)).yellow(),
        format!("{}", plan.count_for(RiskTier::Dangerous)).red(),
        plan.total_bytes(),
    );
    info!(
        "advisor usage: {} calls, ${:.4}",
        budget.calls_made, budget.spend_accrued_usd
    );

    Ok(())
}

fn run_execute(
    config: &AppConfig,
    plan_id: &str,
    include_dangerous: bool,
    yes: bool,
    report: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    {
        let db = Database::open(&config.database_path)?;
        let plan = db
            .get_plan(plan_id)?
            .ok_or_else(|| format!("unknown plan {plan_id}"))?;
        println!(
            "Plan {}: {} items, {} bytes ({} dangerous)",
            plan_id.bold(),
            plan.total_items,
            plan.total_bytes,
            plan.dangerous_count,
        );
        if !yes
            && !prompt_confirm(
                "Execute this cleanup plan? Items will be backed up, then deleted.",
                Some(false),
            )?
        {
            process::exit(0);
        }
    }

    let engine = ExecutionEngine::new(config);
    let reporter = Arc::new(CliReporter::new());
    let handle = engine.execute(
        plan_id,
        ExecuteOptions { include_dangerous },
        reporter,
    )?;
    let result = handle.wait()?;

    println!();
    info!(
        "Execution {} finished: {}",
        result.execution_id,
        result.status.as_str().bold(),
    );
    info!(
        "{} succeeded, {} failed, {} skipped, {} bytes freed",
        format!("{}", result.success_count).green(),
        format!("{}", result.failed_count).red(),
        format!("{}", result.skipped_count).yellow(),
        result.bytes_freed,
    );
    for failure in &result.failures {
        info!(
            "  {} [{}]: {} — {}",
            failure.path.red(),
            failure.kind.as_str(),
            failure.error_text,
            failure.suggested_remedy(),
        );
    }

    if let Some(report_path) = report {
        safe_sweeper_core::report::write_execution_report(&result, &report_path)?;
        println!("Report written to {}", report_path.display());
    }

    Ok(())
}

fn run_restore(
    config: &AppConfig,
    execution_id: &str,
    items: &[i64],
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.database_path)?;
    let selection = if items.is_empty() { None } else { Some(items) };
    let session =
        safe_sweeper_core::restore::create_restore_session(&db, execution_id, selection)?;

    for warning in &session.integrity_warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }

    let outcome = safe_sweeper_core::restore::execute_restore(&db, &session)?;
    info!(
        "{} restored, {} already restored, {} failed, {} untouched",
        format!("{}", outcome.restored).green(),
        outcome.already_restored,
        format!("{}", outcome.failures.len()).red(),
        outcome.untouched,
    );
    for failure in &outcome.failures {
        info!("  {}: {}", failure.path.red(), failure.error);
    }

    Ok(())
}

fn run_history(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.database_path)?;
    let rows = safe_sweeper_core::restore::undo_history(&db)?;
    if rows.is_empty() {
        println!("No undo history.");
        return Ok(());
    }
    for row in rows {
        let state = match row.restore_state.as_str() {
            "available" => row.restore_state.green(),
            "restored" => row.restore_state.cyan(),
            _ => row.restore_state.red(),
        };
        println!(
            "{}  completed {}  eligible until {}  [{}]",
            row.execution_id.bold(),
            row.completed_at,
            row.eligible_until,
            state,
        );
    }
    Ok(())
}

fn run_prune(config: &AppConfig, days: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.database_path)?;
    let coordinator = BackupCoordinator::new(Path::new(&config.backup_root))?;
    let retention = days.unwrap_or(config.backup_retention_days);
    let stats = coordinator.prune_expired(&db, retention)?;
    println!(
        "Pruned {} payloads, removed {} orphans (retention {} days)",
        stats.pruned_payloads, stats.orphans_removed, retention,
    );

    let totals = coordinator.stats(&db)?;
    info!(
        "manifest: {} entries ({} links / {} full copies / {} none), {} bytes, {} pruned",
        totals.total_entries,
        totals.ref_link_entries,
        totals.full_copy_entries,
        totals.none_entries,
        totals.total_bytes,
        totals.pruned_entries,
    );
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
