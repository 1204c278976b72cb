//! sigilwire CLI
//!
//! # Commands
//!
//! - `sigilwire compile <id>` - Compile one pattern to a wiring diagram
//! - `sigilwire compile-all --out-dir <dir>` - Compile the whole library
//! - `sigilwire stats` - Summarise provenance, mix-modes and classes
//! - `sigilwire analyze <wiring.json>` - Analyse a wiring diagram
//! - `sigilwire rule <n>` - Emit and analyse the canonical circuit for a rule

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use sigilwire::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sigilwire")]
#[command(about = "Compile patterns to wiring diagrams and classify them as cellular-automaton rules")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Pattern library (flexiarg text)
    #[arg(long, global = true)]
    library: Option<PathBuf>,
    /// Keyed parameter table (TSV)
    #[arg(long, global = true)]
    params: Option<PathBuf>,
    /// Pattern-id bridge table (TSV)
    #[arg(long, global = true)]
    bridge: Option<PathBuf>,
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a single pattern
    Compile {
        /// Pattern id
        id: String,
        /// Write the diagram here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Compile every pattern in the library
    CompileAll {
        /// Directory receiving one JSON file per pattern
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print batch statistics
    Stats {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Analyse a wiring diagram document
    Analyze {
        /// Wiring diagram JSON
        file: PathBuf,
        /// Accept only the Boolean-logic components
        #[arg(long)]
        strict: bool,
    },
    /// Synthesise and analyse the canonical circuit for a rule number
    Rule {
        /// Rule number (0-255)
        number: u8,
        /// Also write the synthesised diagram here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.library.is_some() {
        config.library = cli.library.clone();
    }
    if cli.params.is_some() {
        config.param_table = cli.params.clone();
    }
    if cli.bridge.is_some() {
        config.bridge_table = cli.bridge.clone();
    }

    match cli.command {
        Commands::Compile { id, out } => {
            let library = load_library(&config)?;
            let cache = config.table_cache();
            let analyzer = config.analyzer();
            let driver = config.batch_driver(&library, &cache, &analyzer);
            let compiled = driver.compile_one(&id)?;
            info!(
                pattern = %id,
                provenance = %compiled.resolution.provenance,
                nodes = compiled.diagram.node_count(),
                "compiled"
            );
            match compiled.analysis {
                Some(Ok(a)) => info!(rule = a.wolfram_rule, class = %a.structural_class, "analysed"),
                Some(Err(e)) => warn!(error = %e, "not analysable"),
                None => {}
            }
            match out {
                Some(path) => compiled.diagram.save_json(&path)?,
                None => println!("{}", compiled.diagram.to_json()?),
            }
        }
        Commands::CompileAll { out_dir } => {
            let library = load_library(&config)?;
            let cache = config.table_cache();
            let analyzer = config.analyzer();
            let driver = config.batch_driver(&library, &cache, &analyzer);
            std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
            let results = driver.compile_all();
            for (id, r) in &results {
                if let Err(e) = r {
                    warn!(pattern = %id, error = %e, "compile failed");
                }
            }
            let written = write_all(&results, &out_dir);
            let mut failures = 0;
            for w in &written {
                if let Err(e) = w {
                    warn!(error = %e, "write failed");
                    failures += 1;
                }
            }
            info!(written = written.len() - failures, dir = %out_dir.display(), "diagrams written");
            print!("{}", BatchStats::collect(&results));
        }
        Commands::Stats { json } => {
            let library = load_library(&config)?;
            let cache = config.table_cache();
            let analyzer = config.analyzer();
            let driver = config.batch_driver(&library, &cache, &analyzer);
            let stats = BatchStats::collect(&driver.compile_all());
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{stats}");
            }
        }
        Commands::Analyze { file, strict } => {
            let diagram = WiringDiagram::load_json(&file).with_context(|| format!("loading {}", file.display()))?;
            if strict {
                config.eval_mode = EvalMode::Strict;
            }
            let result = config.analyzer().analyze(&diagram)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Rule { number, out } => {
            let diagram = synthesize_rule(number)?;
            if let Some(path) = out {
                diagram.save_json(&path)?;
            }
            let result = config.analyzer().analyze(&diagram)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

fn load_library(config: &Config) -> anyhow::Result<PatternLibrary> {
    let Some(path) = &config.library else {
        bail!("no pattern library configured (use --library or the `library` config key)");
    };
    PatternLibrary::load(path).with_context(|| format!("loading {}", path.display()))
}
