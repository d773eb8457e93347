//! Rekindle - hot class reload for running applications.

#![allow(dead_code)]

mod cache;
mod cli;
mod compile;
mod config;
mod core;
mod loader;
mod logger;
mod model;
mod pipeline;
mod project;
mod redefine;
mod reload;
mod scan;
mod source;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};

use cli::{Cli, Commands};
use compile::Modelc;
use config::Config;
use loader::NoParent;
use model::{ClassCodec, JsonCodec};
use pipeline::Pipeline;
use project::DirLayout;
use redefine::{AgentGateway, InProcessGateway, NoAttach, RedefinitionGateway, SwapOnly};
use reload::{CycleOutcome, ReloadCoordinator, ReloadError};
use watch::SourceWatcher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Arc::new(Config::load(cli.config.as_deref())?);

    match cli.command {
        Commands::Cycle => run_cycle(config, cli.swap_only),
        Commands::Watch => run_watch(config, cli.swap_only),
        Commands::Clean => clean(&config),
    }
}

// =============================================================================
// Wiring
// =============================================================================

fn build_coordinator(
    config: Arc<Config>,
    swap_only: bool,
) -> Result<Option<(Arc<ReloadCoordinator>, Vec<PathBuf>)>> {
    // Missing source root degrades instead of failing: hot reload stays off
    // until a root is configured or discoverable.
    static NO_ROOT_NOTICE: std::sync::Once = std::sync::Once::new();
    let source_root = match &config.project.source_root {
        Some(root) if root.is_absolute() => root.clone(),
        Some(root) => config.root.join(root),
        None => {
            match project::discover_source_root(&config.root, &config.project.source_suffix) {
                Some(root) => root,
                None => {
                    logger::log_once(
                        &NO_ROOT_NOTICE,
                        "discover",
                        "no source root found, hot reload disabled (set \
                         [project].source_root or REKINDLE_SOURCE_ROOT)",
                    );
                    return Ok(None);
                }
            }
        }
    };

    let layout = Arc::new(DirLayout::single(source_root.clone(), config.output_dir()));
    let codec: Arc<dyn ClassCodec> = Arc::new(JsonCodec);
    let pipeline = Arc::new(Pipeline::from_config(&config, codec.clone())?);
    if pipeline.is_empty() {
        log!("pipeline"; "no [enhancer] stages registered, classes load as compiled");
    }

    let gateway: Box<dyn RedefinitionGateway> = if swap_only {
        log!("reload"; "swap-only mode: in-place redefinition disabled");
        Box::new(SwapOnly)
    } else if let Some(agent) = &config.redefine.agent {
        // Attach-first: a configured agent outranks the in-process gateway.
        // No attach facility on this platform falls back to it.
        let gateway = AgentGateway::new(&NoAttach, agent, &config.redefine.agent_params);
        if gateway.capable() {
            log!("reload"; "redefinition agent attached from {}", agent.display());
            Box::new(gateway)
        } else {
            log!("reload"; "agent attach unavailable, using in-process redefinition");
            Box::new(InProcessGateway)
        }
    } else {
        Box::new(InProcessGateway)
    };

    let coordinator = Arc::new(ReloadCoordinator::new(
        config,
        layout,
        Arc::new(Modelc::new(codec.clone())),
        codec,
        pipeline,
        Arc::new(NoParent),
        gateway,
    ));
    Ok(Some((coordinator, vec![source_root])))
}

// =============================================================================
// Commands
// =============================================================================

fn run_cycle(config: Arc<Config>, swap_only: bool) -> Result<()> {
    let Some((coordinator, _)) = build_coordinator(config, swap_only)? else {
        return Ok(());
    };
    report_outcome(coordinator.try_cycle().map_err(render_reload_error)?);
    Ok(())
}

fn run_watch(config: Arc<Config>, swap_only: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let debounce = Duration::from_millis(config.watch.debounce_ms);
    let suffix = config.project.source_suffix.clone();
    let Some((coordinator, roots)) = build_coordinator(config, swap_only)? else {
        return Ok(());
    };

    // Watcher-first: attach before the initial cycle so edits made while it
    // runs buffer instead of getting lost.
    let watcher = SourceWatcher::new(coordinator.clone(), &roots, suffix, debounce)?;
    match coordinator.try_cycle() {
        Ok(outcome) => report_outcome(outcome),
        // Watch mode stays up through a broken initial state.
        Err(e) => log!("error"; "{}", render_reload_error(e)),
    }

    watcher.run(&running);
    log!("watch"; "shutting down");
    Ok(())
}

fn clean(config: &Config) -> Result<()> {
    let output_dir = config.output_dir();
    let generated = output_dir
        .parent()
        .map(|p| p.join(cache::GENERATED_DIR))
        .unwrap_or_else(|| config.root.join(cache::GENERATED_DIR));

    for dir in [&output_dir, &generated] {
        if dir.exists() {
            std::fs::remove_dir_all(dir)
                .with_context(|| format!("failed to remove {}", dir.display()))?;
            log!("clean"; "removed {}", dir.display());
        }
    }
    Ok(())
}

// =============================================================================
// Reporting
// =============================================================================

fn report_outcome(outcome: CycleOutcome) {
    match outcome {
        CycleOutcome::Unchanged => log!("reload"; "nothing to do"),
        CycleOutcome::Busy => log!("reload"; "cycle already in flight"),
        CycleOutcome::Redefined(classes) => {
            log!("reload"; "redefined {} class(es) in place", classes.len());
        }
        CycleOutcome::Swapped { generation, classes } => {
            log!("reload"; "generation {generation} live, {} class(es)", classes.len());
        }
    }
}

/// Surface the first compiler diagnostic with its source line; everything
/// else passes through.
fn render_reload_error(error: ReloadError) -> anyhow::Error {
    if let ReloadError::Compile(ref compile) = error
        && let Some(diag) = compile.primary()
    {
        let source = std::fs::read_to_string(&diag.file).unwrap_or_default();
        return anyhow::anyhow!("{}", diag.render(&source));
    }
    error.into()
}
