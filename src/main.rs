use clap::{Parser, Subcommand};
use rawpreview::config::PreviewConfig;
use rawpreview::engine::PreviewEngine;
use rawpreview::source::LocalFile;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Version shown by `--version`: the plain package version on a tagged
/// release, `<version>-dev+<commit>` otherwise. The dev string is built
/// once and leaked; clap wants `'static`.
fn version() -> &'static str {
    if env!("RAWPREVIEW_RELEASE") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("RAWPREVIEW_COMMIT") {
        "" => concat!(env!("CARGO_PKG_VERSION"), "-dev"),
        commit => {
            Box::leak(format!("{}-dev+{commit}", env!("CARGO_PKG_VERSION")).into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "rawpreview")]
#[command(about = "Extract embedded previews from camera RAW files")]
#[command(long_about = "\
Extract embedded previews from camera RAW files

Camera RAW files carry a ready-made JPEG (sometimes TIFF) preview inside
the container. rawpreview finds the best one with exiftool, restores its
EXIF orientation, scales it into a bounding box, and writes the result.
AVIF photos are decoded in-process without exiftool.

Supported: 3fr arw cr2 cr3 crw dng erf fff iiq kdc mrw nef nrw orf ori
pef raf rw2 rwl sr2 srf srw x3f, plus indd, tif/tiff and avif.")]
#[command(version = version())]
struct Cli {
    /// Config file (optional; defaults apply when absent)
    #[arg(long, default_value = "rawpreview.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a bounded preview from a file
    Extract {
        /// Input RAW/TIFF/INDD/AVIF file
        input: PathBuf,
        /// Output image path (extension follows the configured format)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Bounding-box width in pixels
        #[arg(long, default_value_t = 2048)]
        max_width: u32,
        /// Bounding-box height in pixels
        #[arg(long, default_value_t = 2048)]
        max_height: u32,
    },
    /// Print the preview tags exiftool reports for a file
    Probe {
        /// Input file
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PreviewConfig::load_or_default(&cli.config)?;
    let engine = PreviewEngine::new(&config)?;

    match cli.command {
        Command::Extract {
            input,
            out,
            max_width,
            max_height,
        } => {
            let source = LocalFile::new(&input);
            let Some(preview) = engine.extract_preview(&source, max_width, max_height) else {
                eprintln!("no preview found in {}", input.display());
                std::process::exit(1);
            };
            let settings = engine.settings();
            let out = out.unwrap_or_else(|| input.with_extension(settings.format.extension()));
            std::fs::write(&out, preview.encode(settings)?)?;
            println!(
                "{} ({}x{})",
                out.display(),
                preview.width(),
                preview.height()
            );
        }
        Command::Probe { input } => {
            let probed = engine.probe_file(&input)?;
            println!("FileType: {}", probed.file_type);
            if probed.tags.is_empty() {
                println!("(no preview tags)");
            }
            for (tag, value) in &probed.tags {
                println!("{tag}: {value}");
            }
        }
    }

    Ok(())
}
