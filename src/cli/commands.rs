//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::core::client::ElmTranslator;
use crate::core::models::{library_identifier, ElmOutput, TranslationIssue};
use crate::processors::library::LibraryLoader;

/// Commands for the CQL-to-ELM client
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate a main library together with its dependencies
    Convert {
        /// Main CQL file (required)
        #[arg(short, long)]
        main: PathBuf,

        /// Dependency library file, repeatable
        #[arg(short, long = "lib")]
        libs: Vec<PathBuf>,

        /// Directory whose .cql files are sent as libraries
        #[arg(long)]
        library_dir: Option<PathBuf>,

        /// Search the library directory recursively
        #[arg(short, long)]
        recursive: bool,

        /// Output directory (prints JSON to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Succeed even when the translator reports errors
        #[arg(long)]
        allow_errors: bool,
    },

    /// Translate a single CQL file without multipart framing
    Raw {
        /// CQL file (required)
        #[arg(short, long)]
        file: PathBuf,

        /// Output file (prints JSON to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Succeed even when the translator reports errors
        #[arg(long)]
        allow_errors: bool,
    },
}

/// Handle structured translation command
pub async fn handle_convert(
    translator: &ElmTranslator,
    main: PathBuf,
    mut libs: Vec<PathBuf>,
    library_dir: Option<PathBuf>,
    recursive: bool,
    output: Option<PathBuf>,
    allow_errors: bool,
) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let loader = LibraryLoader::new()?;

    if let Some(dir) = library_dir {
        libs.extend(loader.find_files(&dir, recursive)?);
    }

    let input = loader.load(&main, &libs).await?;
    let elm = translator.convert_structured(&input).await?;

    let missing: Vec<&String> = input
        .libraries
        .keys()
        .filter(|name| !elm.libraries.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        warn!("Service returned no ELM for: {:?}", missing);
    }
    if elm.main.is_none() {
        warn!("Service returned no ELM for the main library");
    }

    report_issues(&elm);

    match output {
        Some(dir) => {
            let written = elm.write_to_dir(&dir).await?;
            println!("✅ Wrote {} ELM files to {}", written.len(), dir.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&elm)?),
    }

    info!("Completed in {:?}", start_time.elapsed());

    if elm.has_errors() && !allow_errors {
        anyhow::bail!("Translation reported errors for {}", main.display());
    }

    Ok(())
}

/// Handle raw translation command
pub async fn handle_raw(
    translator: &ElmTranslator,
    file: PathBuf,
    output: Option<PathBuf>,
    allow_errors: bool,
) -> anyhow::Result<()> {
    let cql = tokio::fs::read_to_string(&file).await?;
    let elm = translator.convert_raw(&cql).await?;

    if let Some((id, version)) = library_identifier(&elm) {
        info!("Translated library {} {}", id, version.unwrap_or_default());
    }

    let issues = TranslationIssue::from_elm(&elm);
    for issue in &issues {
        eprintln!("{}: {}", issue.severity, issue);
    }

    let content = serde_json::to_string_pretty(&elm)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, content).await?;
            println!("✅ Wrote ELM to {}", path.display());
        }
        None => println!("{}", content),
    }

    if issues.iter().any(|issue| issue.is_error()) && !allow_errors {
        anyhow::bail!("Translation reported errors for {}", file.display());
    }

    Ok(())
}

fn report_issues(elm: &ElmOutput) {
    for (library, issue) in elm.issues() {
        eprintln!("{} {}: {}", library, issue.severity, issue);
    }
}
