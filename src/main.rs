mod audio;
mod cli;
mod config;
mod encode;
mod mastering;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};

use audio::analysis::SpectralAnalyzer;
use cli::Cli;
use config::Config;
use mastering::pipeline::{MasteringPipeline, PipelineSpec, StageEvent};
use mastering::profile::ProfileStore;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect automaster.toml / global config
    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    let store = ProfileStore::with_custom(&config.profiles).context("Invalid profile in config")?;

    // List profiles mode
    if cli.list {
        println!("Available profiles:");
        for name in store.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let (input, output) = match (&cli.input, &cli.output) {
        (Some(input), Some(output)) => (input.clone(), output.clone()),
        _ => {
            Cli::command().print_help()?;
            println!();
            std::process::exit(2);
        }
    };
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    // CLI values win over config values when given
    let steps = if cli.steps.is_empty() {
        config.pipeline.steps.clone()
    } else {
        cli.steps.clone()
    };
    let profile = cli.profile.clone().unwrap_or_else(|| config.pipeline.profile.clone());
    let automastering = config.pipeline.automastering && !cli.no_auto;
    let segment_size = cli.segment_size.unwrap_or(config.analysis.segment_size);

    let spec = PipelineSpec::from_names(&steps, config.settings, &store, &profile, automastering)?;

    log::info!("automaster - automatic audio mastering");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output.display());
    log::info!("Profile: {}", spec.profile.name());
    log::info!("Stages: {:?}", spec.steps.iter().map(|s| s.name()).collect::<Vec<_>>());
    log::info!("Automastering: {}", if automastering { "on" } else { "off" });

    let pb = ProgressBar::new(spec.steps.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} stages {msg}")?
            .progress_chars("=>-"),
    );

    let mut pipeline = MasteringPipeline::new(&input, &output, spec)
        .with_analyzer(SpectralAnalyzer::new(segment_size));

    let result = pipeline.run_with(|event| match event {
        StageEvent::Started { stage, .. } => pb.set_message(stage.to_string()),
        StageEvent::Finished { index, .. } => pb.set_position(*index as u64 + 1),
        StageEvent::AnalysisPerformed { stage } => {
            log::debug!("Derived {} settings from the input spectrum", stage)
        }
    });

    let report = match result {
        Ok(report) => {
            pb.finish_with_message("Mastering complete");
            report
        }
        Err(e) => {
            pb.abandon();
            return Err(e).context("Mastering failed");
        }
    };

    for stage in &report.stages {
        log::info!("  {}: {} settings", stage.stage, stage.source);
    }

    if let Some(ref path) = cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("Report: {}", path.display());
    }

    log::info!("Done! Output: {}", output.display());
    Ok(())
}
