use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use viralscope::cli::{Cli, Commands, OutputFormat};
use viralscope::config::Config;
use viralscope::metadata::ContentType;
use viralscope::output;
use viralscope::pipeline::{Pipeline, RunHandle, RunState};
use viralscope::providers::ProviderKind;
use viralscope::usage::UsageLedger;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "viralscope=debug"
    } else {
        "viralscope=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    let config = Config::load().await?;

    match cli.command {
        Commands::Videos {
            inputs,
            transcripts,
            provider,
            output,
            format,
        } => {
            let provider = provider.unwrap_or(config.app.default_provider);
            let mut pipeline = Pipeline::with_provider(config, provider);
            let run = RunState::new();

            pipeline.fetch_batch_videos(&inputs, &run).await?;
            run.set_progress(30);

            if transcripts {
                run_transcripts(&mut pipeline, &run, cli.quiet).await?;
            } else {
                run.set_progress(100);
            }

            emit(&run, output, &format, cli.quiet).await?;
        }
        Commands::Channel {
            channel,
            limit,
            content_type,
            transcripts,
            provider,
            output,
            format,
        } => {
            let limit = checked_limit(limit, &config)?;
            let provider = provider.unwrap_or(config.app.default_provider);
            let mut pipeline = Pipeline::with_provider(config, provider);
            let run = RunState::new();

            pipeline
                .fetch_channel_videos(&channel, limit, content_type, &run)
                .await?;
            run.set_progress(30);

            if transcripts {
                run_transcripts(&mut pipeline, &run, cli.quiet).await?;
            } else {
                run.set_progress(100);
            }

            emit(&run, output, &format, cli.quiet).await?;
        }
        Commands::Analyze {
            inputs,
            channel,
            limit,
            content_type,
            output,
            format,
        } => {
            validate_analyze_args(&inputs, &channel, content_type)?;
            let limit = checked_limit(limit, &config)?;
            let pipeline = Pipeline::new(config);
            let run = RunState::new();

            match channel {
                Some(channel) => {
                    pipeline
                        .analyze_channel(&channel, limit, content_type, &run)
                        .await?;
                }
                None => {
                    pipeline.analyze_batch(&inputs, &run).await?;
                }
            }
            run.set_progress(100);

            emit(&run, output, &format, cli.quiet).await?;
        }
        Commands::Usage { set } => {
            let mut config = config;
            match set {
                Some(spec) => {
                    let (name, value) = spec
                        .split_once('=')
                        .context("expected PROVIDER=COUNT, e.g. --set direct=0")?;
                    let provider = parse_provider(name)?;
                    let value: u32 = value.parse().context("COUNT must be a non-negative integer")?;

                    let mut ledger = UsageLedger::from_config(&config);
                    let clamped = ledger.override_count(provider, value);
                    ledger.write_back(&mut config);
                    config.save().await?;

                    println!("{} usage set to {}/{}", provider, clamped, provider.ceiling());
                }
                None => {
                    let ledger = UsageLedger::from_config(&config);
                    for provider in [ProviderKind::Direct, ProviderKind::Polling] {
                        let exhausted = if ledger.is_exhausted(provider) {
                            " (exhausted)"
                        } else {
                            ""
                        };
                        println!(
                            "{}: {}/{}{}",
                            provider,
                            ledger.count(provider),
                            provider.ceiling(),
                            exhausted
                        );
                    }
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file to set API keys:");
                println!("  {}", Config::describe_path()?.display());
            }
        }
    }

    Ok(())
}

async fn run_transcripts(pipeline: &mut Pipeline, run: &RunHandle, quiet: bool) -> Result<()> {
    let progress = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Fetching transcripts...");
        Some(pb)
    };

    let result = pipeline.run_transcript_phase(run, 30, 70).await;

    if let Some(pb) = progress {
        match &result {
            Ok(()) => pb.finish_with_message("Transcripts complete"),
            Err(_) => pb.finish_with_message("Transcript phase failed"),
        }
    }

    result
}

async fn emit(run: &RunState, output: Option<PathBuf>, format: &OutputFormat, quiet: bool) -> Result<()> {
    if !quiet {
        for line in run.log_lines() {
            eprintln!("{line}");
        }
    }

    let records = run.records();
    match output {
        Some(path) => {
            output::save_to_file(&records, &path, format).await?;
            println!("Saved {} record(s) to {}", records.len(), path.display());
        }
        None => output::print_to_console(&records, format)?,
    }

    Ok(())
}

/// The content-type filter only exists for channel discovery; an explicit
/// video list has no duration filter to apply.
fn validate_analyze_args(
    inputs: &[String],
    channel: &Option<String>,
    content_type: ContentType,
) -> Result<()> {
    if channel.is_none() {
        if inputs.is_empty() {
            anyhow::bail!("provide video URLs/IDs or --channel");
        }
        if content_type != ContentType::Any {
            anyhow::bail!("--content-type only applies when analyzing with --channel");
        }
    }
    Ok(())
}

fn checked_limit(limit: Option<usize>, config: &Config) -> Result<usize> {
    let limit = limit.unwrap_or(config.app.default_limit);
    if !(1..=50).contains(&limit) {
        anyhow::bail!("--limit must be between 1 and 50");
    }
    Ok(limit)
}

fn parse_provider(name: &str) -> Result<ProviderKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "direct" => Ok(ProviderKind::Direct),
        "polling" => Ok(ProviderKind::Polling),
        other => anyhow::bail!("unknown provider '{other}' (expected 'direct' or 'polling')"),
    }
}
