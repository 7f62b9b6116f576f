//! bibdb - BibTeX database manager
//!
//! Checks, lists, formats, merges and exports `.bib` files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bibdb_core::{
    parse_filter, BibDbConfig, Database, ExportTarget, LoadSummary, Session, Severity,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Manage BibTeX databases
#[derive(Parser, Debug)]
#[command(name = "bibdb", version)]
#[command(about = "Check, list, format, merge and export BibTeX databases")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a file and report every problem found
    Check {
        file: PathBuf,
        /// Print the load summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List entry keys
    List {
        file: PathBuf,
        /// Filter expression, e.g. 'author:knuth && !year:19'
        #[arg(short, long)]
        filter: Option<String>,
        /// Print JSON instead of plain keys
        #[arg(long)]
        json: bool,
    },

    /// Show one entry with macros resolved and crossref fields inherited
    Show { file: PathBuf, key: String },

    /// Write a file back in canonical form
    Format {
        file: PathBuf,
        /// Rewrite the file itself (with backup) instead of printing
        #[arg(short, long)]
        in_place: bool,
    },

    /// Merge other files into a database and save it
    Merge {
        file: PathBuf,
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Append entries to another file
    Export {
        file: PathBuf,
        /// File the entries are appended to
        #[arg(short, long)]
        to: PathBuf,
        /// Export the entries matching this filter
        #[arg(short, long)]
        filter: Option<String>,
        /// Keys to export
        keys: Vec<String>,
    },
}

#[derive(Serialize)]
struct ListItem<'a> {
    key: &'a str,
    entry_type: &'a str,
    title: Option<String>,
    year: Option<String>,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => BibDbConfig::load(path)?,
        None => BibDbConfig::load_standard()?,
    };

    match cli.command {
        Command::Check { file, json } => {
            let (_, summary) = Database::open(&file, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                report(&file, &summary);
            }
            if summary.has_errors() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::List { file, filter, json } => {
            let (mut db, _) = Database::open(&file, &config)?;
            if let Some(filter) = filter {
                db.set_filter(Some(parse_filter(&filter)?));
            }
            if json {
                let items: Vec<ListItem<'_>> = db
                    .list_keys()
                    .iter()
                    .filter_map(|key| db.get_entry(key))
                    .map(|entry| ListItem {
                        key: &entry.key,
                        entry_type: &entry.entry_type,
                        title: db.resolved_field(&entry.key, "title"),
                        year: db.resolved_field(&entry.key, "year"),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for key in db.list_keys() {
                    println!("{}", key);
                }
            }
        }
        Command::Show { file, key } => {
            let (db, _) = Database::open(&file, &config)?;
            let entry = db
                .get_entry(&key)
                .ok_or_else(|| format!("No entry with key: {}", key))?;
            println!("@{}{{{}}}", entry.entry_type, entry.key);
            for field in config.entry_types.all_fields(entry) {
                if let Some(lookup) = db.get_field(&key, &field) {
                    let text = lookup.value.resolve(db.strings());
                    match lookup.inherited_from {
                        Some(parent) => println!("  {:<14} {}  (from {})", field, text, parent),
                        None => println!("  {:<14} {}", field, text),
                    }
                }
            }
            let missing = config.entry_types.missing_required(entry);
            if !missing.is_empty() {
                println!("  missing: {}", missing.join(", "));
            }
        }
        Command::Format { file, in_place } => {
            let (mut db, summary) = Database::open(&file, &config)?;
            report(&file, &summary);
            if in_place {
                db.save(&config)?;
            } else {
                print!("{}", db.to_bibtex(&config.sort_policy()));
            }
        }
        Command::Merge { file, sources } => {
            let (mut db, _) = Database::open(&file, &config)?;
            for source in &sources {
                let summary = db.merge_file(source, &config)?;
                report(source, &summary);
            }
            if db.is_modified() {
                db.save(&config)?;
            }
        }
        Command::Export {
            file,
            to,
            filter,
            keys,
        } => {
            let mut session = Session::new(config);
            let (handle, _) = session.open(&file)?;
            let keys = match filter {
                Some(filter) => {
                    let db = session.get_mut(handle)?;
                    db.set_filter(Some(parse_filter(&filter)?));
                    db.list_keys().to_vec()
                }
                None => keys,
            };
            let count = session.export(handle, &keys, &ExportTarget::File(to.clone()))?;
            eprintln!("Exported {} entries to {}", count, to.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(file: &Path, summary: &LoadSummary) {
    for diagnostic in &summary.diagnostics {
        if diagnostic.severity > Severity::Info {
            eprintln!(
                "{}:{}: {}: {}",
                file.display(),
                diagnostic.line,
                diagnostic.severity,
                diagnostic.message
            );
        }
    }
    let (entries, strings, preamble) = summary.counts();
    eprintln!(
        "{}: {} entries, {} strings{}",
        file.display(),
        entries,
        strings,
        if preamble { ", preamble" } else { "" }
    );
}
