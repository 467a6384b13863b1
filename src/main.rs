use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use videoscribe::pipeline::{Pipeline, PipelineRequest};
use videoscribe::progress::{MemoryProgressStore, ProgressStore};
use videoscribe::server::{self, AppState};
use videoscribe::store::cache::ResultCache;
use videoscribe::store::TranscriptStore;
use videoscribe::translate::TranslationStage;
use videoscribe::{output, utils, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videoscribe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().await?;

    // Check for required external tools (non-fatal; they may appear later)
    let missing_deps = utils::check_dependencies(&config.tools).await;
    if !missing_deps.is_empty() {
        eprintln!("{}", console::style("⚠️  Dependency check warnings:").yellow());
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    match cli.command {
        Commands::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());

            let progress: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
            let result_cache = Arc::new(ResultCache::new());
            let transcripts = Arc::new(TranscriptStore::new(&config.storage.transcript_dir)?);
            let pipeline = Arc::new(Pipeline::new(
                config.clone(),
                progress.clone(),
                result_cache,
                transcripts.clone(),
            )?);
            let translation = Arc::new(TranslationStage::new(&config, progress.clone()));

            let state = AppState::new(config, pipeline, translation, progress, transcripts);
            server::serve(state, &bind_addr).await?;
        }
        Commands::Transcribe {
            url,
            target_lang,
            platform,
            output: output_path,
            format,
        } => {
            let target_lang =
                target_lang.unwrap_or_else(|| config.translation.default_target_lang.clone());

            let progress: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
            let transcripts = Arc::new(TranscriptStore::new(&config.storage.transcript_dir)?);
            let pipeline = Pipeline::new(
                config,
                progress.clone(),
                Arc::new(ResultCache::new()),
                transcripts,
            )?;

            let request =
                PipelineRequest::new(&url, platform.as_deref(), &target_lang, None);
            let request_id = request.request_id.clone();

            tracing::info!("Starting pipeline for URL: {}", url);

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap(),
            );
            spinner.set_message("Starting pipeline...");

            let ticker = {
                let spinner = spinner.clone();
                let progress = progress.clone();
                let request_id = request_id.clone();
                tokio::spawn(async move {
                    loop {
                        let snapshot = progress.get(&request_id);
                        spinner.set_message(format!(
                            "{} ({}%)",
                            snapshot.step, snapshot.percent
                        ));
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    }
                })
            };

            let result = pipeline.run(request).await;
            ticker.abort();
            spinner.finish_with_message(if result.success {
                "Pipeline complete"
            } else {
                "Pipeline failed"
            });

            match output_path {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("Result saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format)?;
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written. Edit it and run again:");
                config.display();
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            println!("  • YouTube (youtube.com, youtu.be)");
            println!("  • Facebook (facebook.com, fb.watch)");
            println!("  • TikTok (tiktok.com)");
            println!("  • Instagram (instagram.com posts, reels)");
            println!("  • Vimeo (vimeo.com)");
            println!("  • Other http(s) URLs (best effort via yt-dlp)");
        }
    }

    Ok(())
}
