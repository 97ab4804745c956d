use clap::{Parser, Subcommand};
use photo_slim::config::MirrorConfig;
use photo_slim::events::{Event, Phase};
use photo_slim::imaging::RustBackend;
use photo_slim::metadata::ExifTimeReader;
use photo_slim::run::{self, AutoConfirm, ConfirmationGate, RunError};
use photo_slim::{config, output};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "photo-slim")]
#[command(about = "Keep a slim, flattened mirror of a photo library")]
#[command(long_about = "\
Keep a slim, flattened mirror of a photo library

Images are downscaled into a bounding box and re-encoded, everything else
listed in copy_extensions is copied as is, and directories deeper than
max_depth are folded into the file name:

  source/2019/Trip/Day1/Beach/IMG_01.jpg  →  dest/2019/Trip/Day1-Beach-IMG_01.jpg   (max_depth = 2)

Commands:

  mirror      classify the source, then transform and copy into the destination
  sync        delete destination files whose source is gone
  repair      reset modification times that drifted from the EXIF capture time
  check       classify and look for orphans without changing anything

Every command that writes or deletes shows what it found and asks before
touching anything. Pass --yes to approve unattended.

Run 'photo-slim gen-config' to generate a documented photo-slim.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (TOML, or JSON when the name ends in .json)
    #[arg(long, short, default_value = "photo-slim.toml", global = true)]
    config: PathBuf,

    /// Approve every confirmation prompt
    #[arg(long, short, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror the source tree into the destination
    Mirror,
    /// Delete destination files that no source file maps to
    Sync,
    /// Reset drifted modification times to the EXIF capture time
    Repair,
    /// Report classification and orphans without changing anything
    Check,
    /// Print a stock photo-slim.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Mirror => {
            let config = load(&cli.config)?;
            println!(
                "==> Mirroring {} → {}",
                config.source_dir.display(),
                config.dest_dir.display()
            );
            let backend = RustBackend::new();
            let summary = with_printer(cli.yes, |gate, events| {
                run::run_mirror(&config, &backend, gate, Some(events))
            })?;
            print_lines(output::format_mirror_summary(&summary));
        }
        Command::Sync => {
            let config = load(&cli.config)?;
            println!("==> Looking for orphans in {}", config.dest_dir.display());
            let summary =
                with_printer(cli.yes, |gate, events| run::run_sync(&config, gate, Some(events)))?;
            print_lines(output::format_sync_summary(&summary));
        }
        Command::Repair => {
            let config = load(&cli.config)?;
            println!("==> Checking timestamps in {}", config.repair_time_dir.display());
            let summary = with_printer(cli.yes, |gate, events| {
                run::run_repair(&config, &ExifTimeReader, gate, Some(events))
            })?;
            print_lines(output::format_repair_summary(&summary));
        }
        Command::Check => {
            let config = load(&cli.config)?;
            println!("==> Checking {}", config.source_dir.display());
            let classification = run::scan_source(&config)?;
            print_lines(output::format_event(&run::classified_event(&classification)));
            let orphans = run::find_config_orphans(&config)?;
            println!(
                "{} orphans in {} ({})",
                orphans.orphans.len(),
                config.dest_dir.display(),
                output::format_size(orphans.total_bytes())
            );
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<MirrorConfig, config::ConfigError> {
    let config = config::load_config(path)?;
    println!("==> {} ({})", config.name, path.display());
    Ok(config)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_slim=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Run an operation with events printed on a dedicated thread.
///
/// The terminal prompt waits until the printer has shown everything the
/// scan reported, so the question always comes after the findings.
fn with_printer<T>(
    yes: bool,
    operation: impl FnOnce(&mut dyn ConfirmationGate, Sender<Event>) -> Result<T, RunError>,
) -> Result<T, RunError> {
    let (tx, rx) = mpsc::channel::<Event>();
    let (caught_up_tx, caught_up) = mpsc::channel();
    let printer: JoinHandle<()> = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
            if event == Event::PhaseChanged(Phase::AwaitingConfirmation) {
                let _ = caught_up_tx.send(());
            }
        }
    });

    let mut gate: Box<dyn ConfirmationGate> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalGate { caught_up })
    };
    let result = operation(gate.as_mut(), tx);
    let _ = printer.join();
    result
}

/// Interactive yes/no prompt. Defaults to no.
struct TerminalGate {
    caught_up: Receiver<()>,
}

impl ConfirmationGate for TerminalGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        let _ = self.caught_up.recv();
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                tracing::warn!("no answer ({e}), treating as no");
                false
            })
    }
}
