//! stackfile CLI
//!
//! Command-line front end: add files or directories to an archive, extract
//! them, list keys and show the header.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use regex::Regex;
use stackfile::store::KeyFilter;
use stackfile::{
    Archive, BlockArchive, CompressionType, Config, GzipLevel, OpenFlags, Result, Settings,
    StackError, TarArchive,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

/// stackfile
#[derive(Parser, Debug)]
#[command(name = "stackfile")]
#[command(about = "Keyed block archive with per-block compression")]
#[command(version)]
struct Args {
    /// Archive file
    #[arg(short, long, global = true)]
    archive: Option<PathBuf>,

    /// TOML settings file with defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Archive format
    #[arg(long, value_enum, default_value_t = ArchiveFormat::Block, global = true)]
    format: ArchiveFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ArchiveFormat {
    Block,
    Tar,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a file, or every file under a directory
    Add {
        /// File or directory to add
        #[arg(short, long)]
        source: PathBuf,

        /// Key (prefix for directories); defaults to the source's file name
        #[arg(short, long)]
        key: Option<String>,

        /// Compression for a new archive: none, gzip, zlib
        #[arg(short, long)]
        compression: Option<String>,

        /// Gzip level: default, fastest, best, huffman-only
        #[arg(long)]
        level: Option<String>,
    },

    /// Extract one key, or every key into a directory
    Get {
        /// Key to extract; omit to extract everything
        #[arg(short, long)]
        key: Option<String>,

        /// Output file (`-` for stdout), or directory when no key is given
        #[arg(short, long)]
        target: PathBuf,
    },

    /// List keys
    List {
        /// Only show keys matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Show the archive header
    Info,
}

fn main() {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error [{}]: {}", e.code(), e);
                std::process::exit(2);
            }
        },
        None => Settings::default(),
    };

    // Logs go to stderr so `get -t -` can stream payloads to stdout
    let default_filter = if args.verbose || settings.verbose {
        "debug"
    } else {
        "warn,stackfile=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    tracing::debug!("stackfile v{}", stackfile::VERSION);

    if let Err(e) = run(args, &settings) {
        tracing::error!(code = e.code(), kind = ?e.kind(), "{}", e);
        eprintln!("error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn run(args: Args, settings: &Settings) -> Result<()> {
    let mut builder = settings.apply(Config::builder())?;
    match &args.archive {
        Some(path) => builder = builder.path(path),
        None if settings.archive.is_none() => {
            return Err(StackError::Config(
                "no archive given (use --archive or set `archive` in the settings file)".to_string(),
            ))
        }
        None => {}
    }

    match args.command {
        Commands::Add {
            source,
            key,
            compression,
            level,
        } => {
            if let Some(name) = compression {
                let compression = CompressionType::from_name(&name)
                    .ok_or_else(|| StackError::Config(format!("unknown compression: {}", name)))?;
                builder = builder.compression(compression);
            }
            if let Some(name) = level {
                let level = GzipLevel::from_name(&name)
                    .ok_or_else(|| StackError::Config(format!("unknown gzip level: {}", name)))?;
                builder = builder.gzip_level(level);
            }
            let config = builder.build();
            let mut archive = open_archive(args.format, &config, OpenFlags::WRITE | OpenFlags::CREATE)?;
            let added = add(&*archive, &source, key)?;
            archive.close()?;
            tracing::info!(files = added, archive = %config.path.display(), "add finished");
        }
        Commands::Get { key, target } => {
            let config = builder.build();
            let mut archive = open_archive(args.format, &config, OpenFlags::READ)?;
            match key {
                Some(key) => get_one(&*archive, &key, &target)?,
                None => get_all(&*archive, &target)?,
            }
            archive.close()?;
        }
        Commands::List { filter } => {
            let config = builder.build();
            let filter = filter.map(|pattern| key_filter(&pattern)).transpose()?;
            let mut archive = open_archive(args.format, &config, OpenFlags::READ)?;
            let mut out = io::stdout().lock();
            for key in archive.keys()? {
                if filter.as_ref().map_or(true, |f| f(key.as_str())) {
                    writeln!(out, "{}", key)?;
                }
            }
            archive.close()?;
        }
        Commands::Info => info(args.format, &builder.build())?,
    }
    Ok(())
}

fn open_archive(format: ArchiveFormat, config: &Config, flags: OpenFlags) -> Result<Box<dyn Archive>> {
    let archive: Box<dyn Archive> = match format {
        ArchiveFormat::Block => Box::new(BlockArchive::open_with(config.clone(), flags)?),
        ArchiveFormat::Tar => {
            let mut tar = TarArchive::new(&config.path);
            tar.open(flags)?;
            Box::new(tar)
        }
    };
    Ok(archive)
}

fn key_filter(pattern: &str) -> Result<KeyFilter> {
    let re = Regex::new(pattern).map_err(|e| StackError::Config(format!("bad filter: {}", e)))?;
    Ok(Arc::new(move |key: &str| re.is_match(key)))
}

// =============================================================================
// add
// =============================================================================

fn add(archive: &dyn Archive, source: &Path, key: Option<String>) -> Result<usize> {
    let base = match key {
        Some(key) => key,
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StackError::Config(format!("cannot derive a key from {}", source.display())))?,
    };

    if !fs::metadata(source)?.is_dir() {
        add_file(archive, &base, source)?;
        return Ok(1);
    }

    let mut added = 0;
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| StackError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| StackError::Config(format!("{} is outside the source", entry.path().display())))?;
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let key = format!("{}/{}", base, rel.join("/"));

        match add_file(archive, &key, entry.path()) {
            Ok(()) => added += 1,
            Err(e) if e.kind().is_recoverable() => {
                tracing::warn!(key = %key, error = %e, "skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(added)
}

fn add_file(archive: &dyn Archive, key: &str, path: &Path) -> Result<()> {
    let size = fs::metadata(path)?.len();
    let mut file = File::open(path)?;
    let written = archive.write(key, Some(size), &mut file)?;
    tracing::info!(key, size, stored = written, "added");
    Ok(())
}

// =============================================================================
// get
// =============================================================================

fn get_one(archive: &dyn Archive, key: &str, target: &Path) -> Result<()> {
    // Existence check first so a missing key never leaves an empty file behind
    archive.read(key, None)?;

    if target == Path::new("-") {
        let mut out = io::stdout().lock();
        archive.read(key, Some(&mut out))?;
        out.flush()?;
        return Ok(());
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(target)?;
    let written = archive.read(key, Some(&mut file))?;
    file.flush()?;
    tracing::info!(key, bytes = written, target = %target.display(), "extracted");
    Ok(())
}

fn get_all(archive: &dyn Archive, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    for key in archive.keys()? {
        let dest = target.join(safe_relative(&key)?);
        if dest.exists() {
            return Err(StackError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            )));
        }
        get_one(archive, &key, &dest)?;
    }
    Ok(())
}

/// Keys become relative paths; anything that could escape the target is refused
fn safe_relative(key: &str) -> Result<PathBuf> {
    let path = Path::new(key);
    if path.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(path.to_path_buf())
    } else {
        Err(StackError::Config(format!("refusing to extract key {:?}", key)))
    }
}

// =============================================================================
// info
// =============================================================================

fn info(format: ArchiveFormat, config: &Config) -> Result<()> {
    if format == ArchiveFormat::Tar {
        let mut tar = TarArchive::new(&config.path);
        tar.open(OpenFlags::READ)?;
        println!("format:      tar");
        println!("entries:     {}", tar.keys()?.len());
        return tar.close();
    }

    let mut archive = BlockArchive::open_with(config.clone(), OpenFlags::READ)?;
    let header = archive.header()?;
    println!("version:     {}", header.version);
    println!(
        "data format: {} ({})",
        header.data_format,
        config.registry.name(header.data_format)
    );
    println!("reserved:    {}", header.reserved);
    println!("blocks:      {}", archive.keys()?.len());
    archive.close()
}
