//! Flatslot CLI - Command-line tool for flatslot buffers.
//!
//! This is the main entry point for the flatslot command-line application.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use flatslot::codec::{
    strip_size_prefix, Table, VerifierOptions, FILE_IDENTIFIER_LENGTH, SIZE_PREFIX_LENGTH,
    SIZE_UOFFSET,
};
use flatslot::prelude::*;

/// Flatslot - flat binary table tool
#[derive(Parser)]
#[command(name = "flatslot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How the root of a buffer is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RootKind {
    /// An ObjectData envelope (type name + payload)
    Object,
    /// Any table, checked without a schema
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the root table layout of a buffer
    Inspect {
        /// Input buffer
        #[arg(short, long)]
        input: PathBuf,

        /// Buffer starts with a u32 length prefix
        #[arg(long)]
        size_prefixed: bool,
    },

    /// Verify buffers matching one or more glob patterns
    Verify {
        /// Input files or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Root interpretation
        #[arg(short, long, value_enum, default_value = "object")]
        root: RootKind,

        /// Expected 4-byte file identifier
        #[arg(long)]
        identifier: Option<String>,

        /// Maximum table nesting depth
        #[arg(long, env = "FLATSLOT_MAX_DEPTH", default_value_t = 64)]
        max_depth: usize,

        /// Maximum number of tables
        #[arg(long, env = "FLATSLOT_MAX_TABLES", default_value_t = 1_000_000)]
        max_tables: usize,

        /// Do not reject unaligned values
        #[arg(long)]
        no_alignment: bool,
    },

    /// Convert a JSON description with a registered converter
    Convert {
        /// Registered type name
        #[arg(short, long)]
        type_name: String,

        /// Input JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Output buffer
        #[arg(short, long)]
        output: PathBuf,

        /// Write the converter output without the ObjectData envelope
        #[arg(long)]
        raw: bool,
    },

    /// Convert every `{"type": ..., "data": ...}` JSON file under a directory
    ConvertBatch {
        /// Input directory
        #[arg(short, long, env = "INPUT_FOLDER")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,
    },

    /// Extract the payload of an ObjectData envelope
    Unwrap {
        /// Input envelope
        #[arg(short, long)]
        input: PathBuf,

        /// Output payload buffer
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List registered converter types
    Types,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = ConvertContext::with_builtins();

    match cli.command {
        Commands::Inspect { input, size_prefixed } => {
            cmd_inspect(&input, size_prefixed)?;
        }
        Commands::Verify {
            inputs,
            root,
            identifier,
            max_depth,
            max_tables,
            no_alignment,
        } => {
            let options = VerifierOptions {
                max_depth,
                max_tables,
                check_alignment: !no_alignment,
            };
            let identifier = identifier.as_deref().map(parse_identifier).transpose()?;
            cmd_verify(&inputs, root, identifier.as_ref(), options)?;
        }
        Commands::Convert {
            type_name,
            input,
            output,
            raw,
        } => {
            cmd_convert(&ctx, &type_name, &input, &output, raw)?;
        }
        Commands::ConvertBatch { input, output } => {
            cmd_convert_batch(&ctx, &input, &output)?;
        }
        Commands::Unwrap { input, output } => {
            cmd_unwrap(&input, &output)?;
        }
        Commands::Types => {
            for name in ctx.type_names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;
    Ok(mmap)
}

fn parse_identifier(value: &str) -> Result<[u8; FILE_IDENTIFIER_LENGTH]> {
    value
        .as_bytes()
        .try_into()
        .map_err(|_| anyhow::anyhow!("File identifier must be exactly {} bytes", FILE_IDENTIFIER_LENGTH))
}

fn cmd_inspect(input: &Path, size_prefixed: bool) -> Result<()> {
    let mmap = map_file(input)?;
    let data: &[u8] = if size_prefixed {
        strip_size_prefix(&mmap).context("Invalid size prefix")?
    } else {
        &mmap
    };

    println!("File: {} ({} bytes)", input.display(), mmap.len());

    if data.len() >= SIZE_UOFFSET + FILE_IDENTIFIER_LENGTH {
        let ident = &data[SIZE_UOFFSET..SIZE_UOFFSET + FILE_IDENTIFIER_LENGTH];
        if ident.iter().all(|b| b.is_ascii_alphanumeric()) {
            println!("Identifier: {}", String::from_utf8_lossy(ident));
        }
    }

    let root = root_table(data).context("Failed to read root table")?;
    print_table("Root", &root)?;

    // Envelopes get their payload shown too
    let base = if size_prefixed { SIZE_PREFIX_LENGTH } else { 0 };
    let mut verifier = Verifier::with_base(data, base, VerifierOptions::default());
    if verifier.verify_buffer::<ObjectData>(None).is_ok() {
        let object = ObjectData::from_table(root);
        let type_name = object.type_name()?.unwrap_or("?");
        let payload = object.data()?.unwrap_or_default();
        println!("ObjectData: type {}, payload {} bytes", type_name, payload.len());
        match object.nested_root() {
            Ok(Some(nested)) => print_table("Payload root", &nested)?,
            Ok(None) => {}
            Err(e) => println!("Payload is not a valid buffer: {}", e),
        }
    }

    Ok(())
}

fn print_table(label: &str, table: &Table<'_>) -> Result<()> {
    let vtable = table.vtable().context("Failed to read vtable")?;
    println!(
        "{} table at {}: vtable at {} ({} slots), inline size {}",
        label,
        table.loc(),
        vtable.loc(),
        vtable.num_slots(),
        vtable.table_len()
    );
    for (slot, offset) in vtable.present_slots() {
        println!("  slot {:>3}: +{}", slot, offset);
    }
    Ok(())
}

/// Expand each argument as a glob pattern; arguments matching nothing are
/// kept as plain paths so missing files are reported.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let matches: Vec<PathBuf> = glob::glob(input)
            .with_context(|| format!("Invalid glob pattern: {}", input))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        if matches.is_empty() {
            paths.push(PathBuf::from(input));
        } else {
            paths.extend(matches);
        }
    }
    Ok(paths)
}

fn verify_file(
    path: &Path,
    root: RootKind,
    identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    options: VerifierOptions,
) -> Result<()> {
    let mmap = map_file(path)?;
    let mut verifier = Verifier::new(&mmap, options);
    match root {
        RootKind::Object => verifier.verify_buffer::<ObjectData>(identifier)?,
        RootKind::Table => verifier.verify_buffer::<Table>(identifier)?,
    }
    debug!(path = %path.display(), tables = verifier.num_tables(), "verified");
    Ok(())
}

fn cmd_verify(
    inputs: &[String],
    root: RootKind,
    identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    options: VerifierOptions,
) -> Result<()> {
    let paths = expand_inputs(inputs)?;
    println!("Verifying {} files...", paths.len());

    let pb = progress_bar(paths.len())?;
    let start = Instant::now();

    let failures: Vec<(PathBuf, anyhow::Error)> = paths
        .par_iter()
        .filter_map(|path| {
            let result = verify_file(path, root, identifier, options);
            pb.inc(1);
            result.err().map(|e| (path.clone(), e))
        })
        .collect();

    pb.finish_with_message("Done");

    for (path, e) in &failures {
        eprintln!("{}: {:#}", path.display(), e);
    }
    println!(
        "Verified {} files in {:?} ({} failed)",
        paths.len(),
        start.elapsed(),
        failures.len()
    );

    if !failures.is_empty() {
        anyhow::bail!("{} of {} files failed verification", failures.len(), paths.len());
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

fn cmd_convert(
    ctx: &ConvertContext,
    type_name: &str,
    input: &Path,
    output: &Path,
    raw: bool,
) -> Result<()> {
    println!("Converting {}: {} -> {}", type_name, input.display(), output.display());

    let value = read_json(input)?;
    let bytes = if raw {
        ctx.convert(type_name, &value)
    } else {
        ctx.convert_to_buffer(type_name, &value)
    }
    .with_context(|| format!("Failed to convert {}", input.display()))?;

    fs::write(output, &bytes).context("Failed to write output file")?;
    println!("Wrote {} bytes", bytes.len());

    Ok(())
}

fn convert_entry(ctx: &ConvertContext, input: &Path, output: &Path) -> Result<()> {
    let value = read_json(input)?;
    let type_name = value
        .get("type")
        .and_then(|t| t.as_str())
        .with_context(|| format!("{} has no \"type\" string", input.display()))?;
    let data = value.get("data").unwrap_or(&serde_json::Value::Null);

    let bytes = ctx.convert_to_buffer(type_name, data)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes)?;
    Ok(())
}

fn cmd_convert_batch(ctx: &ConvertContext, input: &Path, output: &Path) -> Result<()> {
    println!("Scanning {}...", input.display());

    let entries: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    println!("Converting {} files to {}...", entries.len(), output.display());
    fs::create_dir_all(output)?;

    let pb = progress_bar(entries.len())?;
    let start = Instant::now();
    let errors = AtomicUsize::new(0);

    entries.par_iter().for_each(|path| {
        let relative = path.strip_prefix(input).unwrap_or(path);
        let output_path = output.join(relative).with_extension("bin");

        if let Err(e) = convert_entry(ctx, path, &output_path) {
            warn!(path = %path.display(), error = %e, "conversion failed");
            eprintln!("Error converting {}: {:#}", path.display(), e);
            errors.fetch_add(1, Ordering::Relaxed);
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");
    let errors = errors.into_inner();
    println!(
        "Converted {} files in {:?} ({} errors)",
        entries.len() - errors,
        start.elapsed(),
        errors
    );

    if errors > 0 {
        anyhow::bail!("{} of {} files failed to convert", errors, entries.len());
    }
    Ok(())
}

fn cmd_unwrap(input: &Path, output: &Path) -> Result<()> {
    println!("Unwrapping: {} -> {}", input.display(), output.display());

    let mmap = map_file(input)?;
    let object: ObjectData = verify_root_as(&mmap, VerifierOptions::default())
        .context("Input is not a valid ObjectData buffer")?;

    let type_name = object.type_name()?.unwrap_or("?");
    let payload = object
        .data()?
        .context("ObjectData has no payload")?;
    fs::write(output, payload).context("Failed to write output file")?;

    println!("Wrote {} payload ({} bytes)", type_name, payload.len());

    Ok(())
}
