use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubescribe::batch::state::JsonStateStore;
use tubescribe::batch::{BatchExtractor, BatchOptions};
use tubescribe::cli::{Cli, Commands};
use tubescribe::config::Config;
use tubescribe::discover::api::DataApiProvider;
use tubescribe::discover::manifest::ManifestProvider;
use tubescribe::discover::scrape::HttpScraper;
use tubescribe::discover::{DiscoveryMethod, PlaylistInfo, VideoListProvider};
use tubescribe::output::OutputManager;
use tubescribe::resolver::{self, Target};
use tubescribe::transcript::innertube::InnerTubeFetcher;
use tubescribe::TubescribeError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tubescribe=debug"
    } else {
        "tubescribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Extract {
            input,
            output_dir,
            format,
            language,
            max_videos,
            retry_failed,
            no_skip_existing,
            rate_limit,
            method,
            save_manifest,
        } => {
            let info = discover_targets(&input, method, None, &config).await?;
            if info.videos.is_empty() {
                anyhow::bail!("No videos discovered for '{}'", input);
            }

            tracing::info!(
                "Discovered {} videos ({} accessible) for '{}'",
                info.video_count,
                info.accessible_count(),
                if info.title.is_empty() { &input } else { &info.title },
            );

            let base_dir = output_dir.unwrap_or_else(|| config.output.base_dir.clone());
            let format = format.unwrap_or(config.output.format);
            let manager = OutputManager::new(&base_dir, &info.channel_name, format);

            if save_manifest {
                let path = manager.save_playlist_info(&info)?;
                println!("Manifest saved to: {}", path.display());
            }

            let options = BatchOptions {
                skip_existing: !no_skip_existing && config.extraction.skip_existing,
                retry_failed_only: retry_failed,
                max_videos,
                language: language.unwrap_or_else(|| config.extraction.language.clone()),
                rate_limit: rate_limit
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.rate_limit()),
                max_fetch_attempts: config.extraction.max_fetch_attempts,
                ssl_bypass: config.extraction.ssl_bypass,
                show_progress: !cli.quiet,
            };

            let fetcher = Arc::new(InnerTubeFetcher::new()?);
            let store = Arc::new(JsonStateStore::new(config.state_dir()));
            let sink = Arc::new(manager);

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing current video");
                    ctrl_c_token.cancel();
                }
            });

            let key = job_key(&info);
            let extractor = BatchExtractor::new(fetcher, sink.clone(), store, options)
                .with_cancellation(cancel);
            let report = extractor.run(&key, &info).await;

            let report_path = sink.save_report(&report)?;
            println!("{}", report.summary());
            println!("Report saved to: {}", report_path.display());
            if report.ip_blocked {
                eprintln!("Extraction halted: the remote service blocked this IP.");
                eprintln!("Wait a while, then rerun with --retry-failed to continue.");
                std::process::exit(2);
            }
        }

        Commands::List { input, max, json } => {
            let info = discover_targets(&input, DiscoveryMethod::Auto, max, &config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                if !info.title.is_empty() {
                    println!("{} — {} ({} videos)", info.channel_name, info.title, info.video_count);
                }
                for video in &info.videos {
                    println!("{:3}  {}  {}", video.index, video.video_id, video.title);
                }
            }
        }

        Commands::Resolve { input } => match resolver::resolve(&input)? {
            Target::Video {
                video_id,
                playlist_id,
            } => {
                println!("video: {video_id}");
                if let Some(list) = playlist_id {
                    println!("playlist context: {list}");
                }
            }
            Target::Playlist { playlist_id } => println!("playlist: {playlist_id}"),
            Target::Channel(channel) => println!("channel: {}", channel.url()),
        },

        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written. Edit it and rerun with --show to review.");
            }
        }
    }

    Ok(())
}

/// Resolve the input into a video list: a manifest file path loads directly,
/// anything else goes through the identifier resolver and a provider — the
/// Data API when a key is available, the HTTP scraper otherwise.
async fn discover_targets(
    input: &str,
    method: DiscoveryMethod,
    max: Option<usize>,
    config: &Config,
) -> Result<PlaylistInfo> {
    let as_path = Path::new(input);
    if input.ends_with(".json") && as_path.exists() {
        let provider = ManifestProvider::from_file(as_path)?;
        // The manifest already names its targets; resolve is skipped.
        let target = Target::Playlist {
            playlist_id: String::new(),
        };
        return Ok(provider.discover(&target, max).await?);
    }

    let target = resolver::resolve(input)?;
    let api = DataApiProvider::from_config(config.extraction.api_key.as_deref())?;

    match method {
        DiscoveryMethod::Api => match api {
            Some(provider) => Ok(provider.discover(&target, max).await?),
            None => Err(TubescribeError::DiscoveryUnavailable(format!(
                "the api method requires a YouTube Data API key; set extraction.api_key \
in the config or the {} environment variable",
                tubescribe::discover::api::API_KEY_ENV
            ))
            .into()),
        },
        DiscoveryMethod::Browser => Err(TubescribeError::DiscoveryUnavailable(
            "browser automation is not available in this build; use 'api', 'http', or 'auto'"
                .to_string(),
        )
        .into()),
        DiscoveryMethod::Auto => match api {
            Some(provider) => {
                tracing::debug!("API key available, discovering via the Data API");
                Ok(provider.discover(&target, max).await?)
            }
            None => Ok(HttpScraper::new()?.discover(&target, max).await?),
        },
        DiscoveryMethod::Http => Ok(HttpScraper::new()?.discover(&target, max).await?),
    }
}

/// Key a batch by playlist when there is one, by the single video otherwise
fn job_key(info: &PlaylistInfo) -> String {
    if !info.playlist_id.is_empty() {
        info.playlist_id.clone()
    } else if let Some(video) = info.videos.first() {
        format!("video-{}", video.video_id)
    } else {
        "batch".to_string()
    }
}
