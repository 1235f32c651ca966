use anyhow::Context;
use clap::{Parser, ValueEnum};
use pngsqueeze::{
    codec::{self, PngEncoder},
    kmeans::KmeansOptions,
    paths::sibling_path,
    reindex::TieBreak,
    search::{EncoderParams, ParameterSet, RasterEncoder},
    Optimizer, PaletteSize,
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pngsqueeze", version)]
#[command(about = "Shrink a PNG image with a k-means palette and a compression parameter search")]
struct Cli {
    /// The PNG image to shrink
    source: PathBuf,

    /// The output file, or a directory to write an image with the same name into
    destination: PathBuf,

    /// Palette sizes to try for true color images, comma separated (e.g. "16,32,64")
    #[arg(
        short = 'k',
        long = "colors",
        value_delimiter = ',',
        default_value = "32",
        value_parser = parse_palette_size
    )]
    colors: Vec<PaletteSize>,

    /// Which encoder settings to search
    #[arg(long, value_enum, default_value_t = Mode::Max)]
    mode: Mode,

    /// Seed for the k-means++ initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop k-means after this many rounds even if it has not converged
    #[arg(long)]
    max_rounds: Option<u32>,

    /// How to order palette entries used by the same number of pixels
    #[arg(long, value_enum, default_value_t = TieBreakArg::Luma)]
    tie_break: TieBreakArg,

    /// Cluster colors after multiplying them by their alpha
    #[arg(long)]
    premultiply: bool,

    /// Also encode a true color image without quantizing it, and keep that if it is smallest
    #[arg(long)]
    lossless: bool,

    /// Also write the per-pixel quantization error as <name>_error.png
    #[arg(long)]
    error_map: bool,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    threads: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Level 9, filtered strategy, adaptive filtering
    One,
    /// A dozen common combinations
    Mid,
    /// Every level, strategy and filter
    Max,
}

impl From<Mode> for ParameterSet {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::One => ParameterSet::Single,
            Mode::Mid => ParameterSet::Curated,
            Mode::Max => ParameterSet::Exhaustive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakArg {
    /// Darker colors first
    Luma,
    /// By red, green, blue and then alpha
    Lexicographic,
}

impl From<TieBreakArg> for TieBreak {
    fn from(tie_break: TieBreakArg) -> Self {
        match tie_break {
            TieBreakArg::Luma => TieBreak::Luma,
            TieBreakArg::Lexicographic => TieBreak::Lexicographic,
        }
    }
}

fn parse_palette_size(value: &str) -> Result<PaletteSize, String> {
    let size = value
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("{value:?} is not a number: {e}"))?;

    match PaletteSize::try_from(size) {
        Ok(size) if size.into_inner() > 0 => Ok(size),
        Ok(_) => Err("palette size must be at least 1".into()),
        Err(e) => Err(format!("palette size is {e}")),
    }
}

/// Resolves where to write the output for `source`.
///
/// The destination is a directory if it already is one or has no extension.
fn output_path(source: &Path, destination: &Path) -> anyhow::Result<PathBuf> {
    if destination.is_dir() || destination.extension().is_none() {
        fs::create_dir_all(destination)
            .with_context(|| format!("creating {}", destination.display()))?;

        let name = source
            .file_name()
            .with_context(|| format!("{} has no file name", source.display()))?;
        Ok(destination.join(name))
    } else {
        Ok(destination.to_path_buf())
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring the thread pool")?;
    }

    let input = fs::read(&cli.source).with_context(|| format!("reading {}", cli.source.display()))?;
    let raster =
        codec::decode(&input).with_context(|| format!("decoding {}", cli.source.display()))?;
    let output = output_path(&cli.source, &cli.destination)?;

    tracing::info!(
        path = %cli.source.display(),
        width = raster.width(),
        height = raster.height(),
        color_type = ?raster.color_type(),
        "loaded image"
    );

    let optimized = Optimizer::new(&raster)
        .palette_sizes(cli.colors.clone())
        .kmeans_options(KmeansOptions::new().seed(cli.seed).max_rounds(cli.max_rounds))
        .parameter_set(cli.mode.into())
        .tie_break(cli.tie_break.into())
        .premultiply(cli.premultiply)
        .lossless(cli.lossless)
        .optimize_par(&PngEncoder)?;

    fs::write(&output, &optimized.bytes)
        .with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(
        path = %output.display(),
        before = input.len(),
        after = optimized.bytes.len(),
        params = %optimized.params,
        "wrote image"
    );

    if cli.error_map {
        if let Some(error_raster) = &optimized.error_raster {
            let path = sibling_path(&output, "error");
            let bytes = PngEncoder.encode(error_raster, &EncoderParams::default())?;
            fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote error map");
        } else {
            tracing::warn!("the smallest encoding is lossless, so there is no error map");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pngsqueeze=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Fatal error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
