//! `modelstore`: inspect and verify model store files.
//!
//! Every command works on one dataset triplet inside `--dir`, picked by
//! `--category` (`trees.*`, `buildings.*` or `prototypes.*`).
//!
//! ```bash
//! modelstore --dir /data/city --category building info
//! modelstore --dir /data/city --category tree list
//! RUST_LOG=debug modelstore --dir /data/city verify
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use model::{BillboardSerializer, Category, ObjectSerializer, WorldObjectSerializer};
use std::io::{self, Write};
use std::path::PathBuf;
use store::{ModelFile, StoreOptions, StorePaths, DEFAULT_BATCH_BYTES};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modelstore")]
#[command(about = "Inspect and verify indexed model store files")]
struct Args {
    /// Directory holding the store files
    #[arg(long, env = "MODELSTORE_DIR", default_value = ".")]
    dir: PathBuf,

    /// Dataset to work on (tree, building or prototype)
    #[arg(long, short, default_value = "building")]
    category: Category,

    /// Approximate bytes decoded per batch during bulk reads
    #[arg(long, default_value_t = DEFAULT_BATCH_BYTES)]
    batch_size: u64,

    /// Coordinate reference system attached to envelopes read back
    #[arg(long)]
    crs: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Create an empty store if its files do not exist yet
    Init,
    /// Print record count, ordinate counters and dataset envelope
    Info,
    /// Print every id with its data offset, in file order
    List,
    /// Decode and print one record
    Get { id: String },
    /// Bulk-read the store and check it against the index
    Verify,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let stdout = io::stdout();
    run(&args, &mut stdout.lock())
}

fn run<W: Write>(args: &Args, out: &mut W) -> Result<()> {
    let paths = StorePaths::for_category(&args.dir, args.category);

    if args.command == Command::Init {
        paths
            .create()
            .with_context(|| format!("create store in {}", args.dir.display()))?;
        info!(dir = %args.dir.display(), category = %args.category, "initialised store");
        writeln!(out, "created {}", paths.data.display())?;
        return Ok(());
    }

    if let Some(missing) = paths.missing() {
        bail!("store file {} does not exist", missing.display());
    }

    let options = StoreOptions {
        batch_bytes: args.batch_size.max(1),
    };
    match args.category {
        Category::Tree => {
            let file = ModelFile::open_paths(&paths, BillboardSerializer, &options)?;
            execute(file, args, out)
        }
        Category::Building | Category::Prototype => {
            let file = ModelFile::open_paths(&paths, WorldObjectSerializer, &options)?;
            execute(file, args, out)
        }
    }
}

fn execute<S: ObjectSerializer, W: Write>(
    mut file: ModelFile<S>,
    args: &Args,
    out: &mut W,
) -> Result<()> {
    match &args.command {
        Command::Init => {}
        Command::Info => {
            let info = file.info();
            writeln!(out, "category:            {}", args.category)?;
            writeln!(out, "records:             {}", file.len())?;
            writeln!(out, "data bytes:          {}", file.data().size())?;
            writeln!(out, "ordinates:           {}", info.ordinate_count())?;
            writeln!(out, "texture ordinates:   {}", info.texture_ordinate_count())?;
            match info.dataset_envelope() {
                Some(env) => {
                    writeln!(out, "envelope min:        {:?}", env.min)?;
                    writeln!(out, "envelope max:        {:?}", env.max)?;
                    if let Some(crs) = &env.crs {
                        writeln!(out, "crs:                 {crs}")?;
                    }
                }
                None => writeln!(out, "envelope:            unknown")?,
            }
        }
        Command::List => {
            for entry in file.index().entries() {
                writeln!(out, "{}\t{}", entry.data_position, entry.id)?;
            }
        }
        Command::Get { id } => match file.get(id)? {
            Some(record) => writeln!(out, "{record:#?}")?,
            None => bail!("no record with id {id}"),
        },
        Command::Verify => {
            let indexed = file.len();
            let (envelope, records) = file.read_all_from_file(args.crs.as_deref())?;
            debug!(indexed, decoded = records.len(), "bulk read finished");

            let unindexed: Vec<_> = records
                .iter()
                .filter(|r| !file.contains(&r.id))
                .map(|r| r.id.as_str())
                .collect();
            if records.len() != indexed || !unindexed.is_empty() {
                bail!(
                    "store is inconsistent: {indexed} indexed, {} decoded, {} not indexed",
                    records.len(),
                    unindexed.len()
                );
            }
            writeln!(out, "ok: {} records", records.len())?;
            if let Some(env) = envelope {
                writeln!(out, "envelope {:?} .. {:?}", env.min, env.max)?;
            }
        }
    }
    Ok(())
}
