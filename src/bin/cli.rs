// Pica - Media Download Core
// Copyright (C) 2025 Pica contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pica_core::file::AppPaths;
use pica_core::format::humanize_date_local;
use pica_core::media::{quality_options, FfmpegMerger, ManifestResolver, MergeRequest, MergeTool, StreamResolver};
use pica_core::{DownloadConfig, DownloadJob, DownloadPlan, DownloadRunner, JsonLibrary, LibraryStore, PreferenceStore};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pica-cli")]
#[command(about = "Pica CLI - media download core", long_about = None)]
struct Cli {
    /// Application data directory (defaults to ~/.pica)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the quality options of a stream manifest
    Options {
        /// Path to the JSON stream manifest
        manifest: String,
    },
    /// Download a source described by a stream manifest
    Download {
        /// Path to the JSON stream manifest
        manifest: String,
        /// Quality label prefix, e.g. "720p" or "Audio" (default: best)
        #[arg(short, long)]
        quality: Option<String>,
        /// Target directory (default: last used directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Merge a video-only and an audio-only file without re-encoding
    Merge {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
    },
    /// Inspect the download history
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },
    /// Show or change the default download directory
    Dir {
        #[command(subcommand)]
        action: DirAction,
    },
}

#[derive(Subcommand)]
enum LibraryAction {
    /// List all entries
    List,
    /// Print the number of entries
    Count,
    /// Remove an entry (and its thumbnail)
    Remove { id: String },
}

#[derive(Subcommand)]
enum DirAction {
    Get,
    Set { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = match cli.data_dir {
        Some(dir) => AppPaths::with_data_dir(dir),
        None => AppPaths::from_home()?,
    };
    paths.ensure_dirs()?;

    let library = JsonLibrary::open(paths.library_file()).with_thumbs_dir(paths.thumbs_dir());
    let preferences = PreferenceStore::new(paths.settings_file());

    match cli.command {
        Commands::Options { manifest } => {
            let media = ManifestResolver::default().resolve(&manifest).await?;
            println!("{}", media.source.title);
            for option in quality_options(&media)? {
                println!("  {}", option.label);
            }
        }
        Commands::Download {
            manifest,
            quality,
            dir,
        } => {
            let media = ManifestResolver::default().resolve(&manifest).await?;
            let options = quality_options(&media)?;
            let chosen = match quality.as_deref() {
                Some(wanted) => options
                    .iter()
                    .find(|option| option.label.starts_with(wanted))
                    .with_context(|| format!("no quality option matches '{}'", wanted))?,
                None => options.first().context("no quality options")?,
            };

            let target_dir = match dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    preferences.set_download_dir(&dir)?;
                    dir
                }
                None => preferences.download_dir()?,
            };

            let plan = DownloadPlan::select(Arc::clone(&chosen.stream), &media)?;
            let job = DownloadJob::new(media.source.clone(), plan, &target_dir)?;
            println!("Downloading {} -> {}", chosen.label, job.output_path.display());

            let config = DownloadConfig {
                ffmpeg_path: cli.ffmpeg.clone(),
                ..DownloadConfig::default()
            };
            let runner = DownloadRunner::with_ffmpeg(Arc::new(library), config);

            let mut handle = runner.start(job);
            let control = handle.control();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    control.cancel();
                }
            });

            let observer = handle.observer()?;
            observer
                .run(|view| {
                    print!(
                        "\r{:<20} {:>3}%  {}  {}  {}",
                        view.status(),
                        view.percent,
                        view.speed_label(),
                        view.elapsed_label(),
                        view.remaining_label()
                    );
                    let _ = std::io::stdout().flush();
                })
                .await;
            println!();

            let summary = handle.join().await?;
            match (&summary.output_path, summary.is_success()) {
                (Some(path), true) => println!("Saved to {}", path.display()),
                _ => bail!("{}", summary.phase),
            }
        }
        Commands::Merge {
            video,
            audio,
            output,
        } => {
            FfmpegMerger::new(cli.ffmpeg)
                .merge(&MergeRequest::new(video, audio, &output))
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Merged into {}", output.display());
        }
        Commands::Library { action } => match action {
            LibraryAction::List => {
                for entry in library.entries()? {
                    let published = if entry.publish_date.is_empty() {
                        "Unknown".to_string()
                    } else {
                        humanize_date_local(&entry.publish_date)
                    };
                    println!(
                        "{}  {} - {} ({})\n    {}",
                        entry.id, entry.title, entry.author, published, entry.path
                    );
                }
            }
            LibraryAction::Count => println!("{}", library.count()),
            LibraryAction::Remove { id } => {
                if !library.remove(&id)? {
                    bail!("no library entry with id '{}'", id);
                }
                println!("Removed {}", id);
            }
        },
        Commands::Dir { action } => match action {
            DirAction::Get => println!("{}", preferences.download_dir()?.display()),
            DirAction::Set { path } => {
                preferences.set_download_dir(&path)?;
                println!("Download directory set to {}", path.display());
            }
        },
    }

    Ok(())
}
