use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use arenafile_core::{
    ArenaError, FlcFile, ImgFile, MusicLibrary, MusicType, Options, VfsManager, VocFile,
};

fn main() -> arenafile_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { data, pattern } => run_list(&data, pattern.as_deref()),
        Commands::Extract { data, name, output } => run_extract(&data, &name, &output),
        Commands::Img {
            data,
            name,
            palette,
            json,
        } => run_img(&data, &name, palette.as_deref(), json),
        Commands::Flc { data, name, json } => run_flc(&data, &name, json),
        Commands::Voc { data, name, json } => run_voc(&data, &name, json),
        Commands::Music { file, json } => run_music(&file, json),
        Commands::Options { dir, json } => run_options(&dir, json),
        Commands::Unpack { data, name, output } => run_unpack(&data, &name, &output),
    }
}

fn to_json<T: Serialize>(value: &T) -> arenafile_core::Result<String> {
    Ok(serde_json::to_string_pretty(value).map_err(std::io::Error::from)?)
}

fn open_vfs(data: &[PathBuf]) -> arenafile_core::Result<VfsManager> {
    let (root, extra) = data
        .split_first()
        .ok_or_else(|| ArenaError::NotFound("no data path given".into()))?;
    let mut vfs = VfsManager::new(root)?;
    for path in extra {
        vfs.add_data_path(path);
    }
    Ok(vfs)
}

fn run_list(data: &[PathBuf], pattern: Option<&str>) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    for name in vfs.list(pattern) {
        println!("{name}");
    }
    Ok(())
}

fn run_extract(data: &[PathBuf], name: &str, output: &Path) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    let bytes = vfs.open(name)?;
    std::fs::write(output, &bytes)?;
    tracing::info!(name, bytes = bytes.len(), ?output, "extracted file");
    Ok(())
}

#[derive(Serialize)]
struct ImgReport {
    name: String,
    width: usize,
    height: usize,
    x_offset: u16,
    y_offset: u16,
    flags: u16,
    has_builtin_palette: bool,
    decoded: bool,
}

fn run_img(
    data: &[PathBuf],
    name: &str,
    palette: Option<&str>,
    json: bool,
) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    let bytes = vfs.open(name)?;
    let metadata = ImgFile::metadata(name, &bytes)?;

    // Borrowed palettes come from another IMG carrying a built-in one.
    let borrowed = palette
        .map(|source| ImgFile::extract_palette(source, &vfs.open(source)?))
        .transpose()?;

    let decoded = if borrowed.is_some() || metadata.has_builtin_palette {
        ImgFile::from_bytes(name, &bytes, borrowed.as_ref())?;
        true
    } else {
        tracing::warn!(name, "no palette available, reporting header only");
        false
    };

    let report = ImgReport {
        name: name.to_owned(),
        width: metadata.width,
        height: metadata.height,
        x_offset: metadata.x_offset,
        y_offset: metadata.y_offset,
        flags: metadata.flags,
        has_builtin_palette: metadata.has_builtin_palette,
        decoded,
    };

    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!(
            "{name}: {}x{} flags {:#06x} builtin palette: {}",
            report.width, report.height, report.flags, report.has_builtin_palette
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct FlcReport {
    name: String,
    width: usize,
    height: usize,
    frame_count: usize,
    frame_duration_secs: f64,
}

fn run_flc(data: &[PathBuf], name: &str, json: bool) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    let flc = FlcFile::from_bytes(name, &vfs.open(name)?)?;

    let report = FlcReport {
        name: name.to_owned(),
        width: flc.width(),
        height: flc.height(),
        frame_count: flc.frame_count(),
        frame_duration_secs: flc.frame_duration(),
    };

    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!(
            "{name}: {}x{}, {} frames, {:.3}s per frame",
            report.width, report.height, report.frame_count, report.frame_duration_secs
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct VocReport {
    name: String,
    sample_rate: u32,
    sample_count: usize,
    duration_secs: f64,
}

fn run_voc(data: &[PathBuf], name: &str, json: bool) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    let voc = VocFile::from_bytes(name, &vfs.open(name)?)?;

    let report = VocReport {
        name: name.to_owned(),
        sample_rate: voc.sample_rate(),
        sample_count: voc.samples().len(),
        duration_secs: voc.duration(),
    };

    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!(
            "{name}: {} Hz, {} samples, {:.3}s",
            report.sample_rate, report.sample_count, report.duration_secs
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct MusicReport {
    category: &'static str,
    entries: Vec<String>,
}

fn run_music(file: &Path, json: bool) -> arenafile_core::Result<()> {
    let library = MusicLibrary::open(file)?;

    let reports: Vec<MusicReport> = MusicType::ALL
        .iter()
        .map(|&music_type| MusicReport {
            category: music_type.name(),
            entries: (0..library.count(music_type))
                .filter_map(|index| library.get(music_type, index))
                .map(|definition| definition.filename.clone())
                .collect(),
        })
        .collect();

    if json {
        println!("{}", to_json(&reports)?);
    } else {
        for report in &reports {
            println!("{} ({} entries)", report.category, report.entries.len());
            for entry in &report.entries {
                println!("  {entry}");
            }
        }
    }
    Ok(())
}

fn run_options(dir: &Path, json: bool) -> arenafile_core::Result<()> {
    let options = Options::load(dir)?;

    if json {
        println!("{}", to_json(&options)?);
    } else {
        println!("{options:#?}");
    }
    Ok(())
}

fn run_unpack(data: &[PathBuf], name: &str, output: &Path) -> arenafile_core::Result<()> {
    let vfs = open_vfs(data)?;
    let unpacked = arenafile_core::exe::unpack(name, &vfs.open(name)?)?;
    std::fs::write(output, &unpacked)?;
    tracing::info!(name, bytes = unpacked.len(), ?output, "unpacked executable");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and extract Arena game data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List files visible through the virtual filesystem.
    List {
        /// Game data directories; the first must contain GLOBAL.BSA.
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        /// Optional glob pattern (e.g. "*.IMG").
        pattern: Option<String>,
    },
    /// Extract a file from the virtual filesystem.
    Extract {
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        /// Name of the file to extract.
        name: String,
        /// Where to write the extracted bytes.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Inspect an IMG texture.
    Img {
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        name: String,
        /// IMG file whose built-in palette should be used for decoding.
        #[arg(short, long)]
        palette: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Inspect an FLC animation.
    Flc {
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Inspect a VOC sound file.
    Voc {
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Summarize a music definition file.
    Music {
        /// Path to the music definition text file.
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show effective options from an options directory.
    Options {
        /// Directory holding options-default.txt and options-changes.txt.
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Decompress a PKLITE-packed executable.
    Unpack {
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
        /// Name of the packed executable (e.g. A.EXE).
        name: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}
