//! # mdpanes
//!
//! Command-line front end for section extraction, splicing and live section
//! embeds.
//!
//! ## Usage
//!
//! Print a section:
//! ```sh
//! mdpanes extract notes/plan.md Goals
//! ```
//!
//! List the embeds of a note and where they point:
//! ```sh
//! mdpanes embeds notes/home.md --vault notes
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=mdpanes=debug`).

mod cli;

use clap::Parser as ClapParser;
use cli::{Cli, Command, OutputFormat};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use mdpanes::store::write_atomic;
use mdpanes::{
    BufferSurface, Config, DocumentHandle, DocumentStore, EditingSurface, EditorCommand, FsStore,
    ReloadOutcome, SectionSession, VaultResolver, extract_section, find_embeds, panel_set_id,
    replace_section, resolve_embed,
};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = match args.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    match args.command {
        Command::Extract { file, section } => {
            let content = read_file(&file)?;
            println!("{}", extract_section(&content, &section));
        }
        Command::Replace {
            file,
            section,
            input,
        } => replace(&file, &section, input.as_deref())?,
        Command::Resolve {
            source,
            link,
            vault,
            output,
        } => resolve(&source, &link, vault, output, &config)?,
        Command::Embeds {
            file,
            vault,
            output,
        } => list_embeds(&file, vault, output, &config)?,
        Command::Watch { file, section } => watch(file, section, &config)?,
        Command::PanelId { file } => {
            let source = match file.as_deref() {
                Some(path) if path != Path::new("-") => read_file(path)?,
                _ => read_stdin()?,
            };
            println!("{}", panel_set_id(&source));
        }
        Command::Commands { output } => print_commands(output)?,
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .wrap_err("Failed to read stdin")?;
    Ok(buffer)
}

/// Vault root for links in `source`: the explicit one, or the source's directory.
fn vault_root(vault: Option<PathBuf>, source: &Path) -> PathBuf {
    vault.unwrap_or_else(|| {
        source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    })
}

fn replace(file: &Path, section: &str, input: Option<&Path>) -> Result<()> {
    let text = match input {
        Some(path) => read_file(path)?,
        None => read_stdin()?,
    };
    // Editors and heredocs end input with a newline that is not part of the section.
    let text = text.strip_suffix('\n').unwrap_or(&text);

    let current = read_file(file)?;
    let updated = replace_section(&current, section, text);

    if updated == current {
        eprintln!("{}: unchanged", file.display());
        return Ok(());
    }
    write_atomic(file, &updated)?;
    Ok(())
}

fn resolve(
    source: &Path,
    link: &str,
    vault: Option<PathBuf>,
    output: OutputFormat,
    config: &Config,
) -> Result<()> {
    let resolver = VaultResolver::new(vault_root(vault, source));
    let source = DocumentHandle::new(source);

    match (resolve_embed(link, &source, &resolver, &config.embeds), output) {
        (Ok(target), OutputFormat::Plain) => match target.section {
            Some(section) => println!("{}#{}", target.document, section),
            None => println!("{}", target.document),
        },
        (Ok(target), OutputFormat::Json) => {
            let value = json!({
                "link": link,
                "document": target.document.path(),
                "section": target.section,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        (Err(e), OutputFormat::Plain) => {
            eprintln!("{}: {}", e.kind(), e);
            process::exit(1);
        }
        (Err(e), OutputFormat::Json) => {
            let value = json!({
                "link": link,
                "error": e.kind(),
                "message": e.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            process::exit(1);
        }
    }
    Ok(())
}

fn list_embeds(
    file: &Path,
    vault: Option<PathBuf>,
    output: OutputFormat,
    config: &Config,
) -> Result<()> {
    let content = read_file(file)?;
    let resolver = VaultResolver::new(vault_root(vault, file));
    let source = DocumentHandle::new(file);

    let mut rows = Vec::new();
    for embed in find_embeds(&content) {
        let line = content[..embed.offset].matches('\n').count() + 1;
        let resolved = resolve_embed(&embed.raw, &source, &resolver, &config.embeds);

        match output {
            OutputFormat::Plain => match &resolved {
                Ok(target) => {
                    let section = target
                        .section
                        .as_deref()
                        .map(|s| format!("#{}", s))
                        .unwrap_or_default();
                    println!("{:>4}: {} -> {}{}", line, embed.raw, target.document, section);
                }
                Err(e) => println!("{:>4}: {} -> {}: {}", line, embed.raw, e.kind(), e),
            },
            OutputFormat::Json => rows.push(match resolved {
                Ok(target) => json!({
                    "line": line,
                    "link": embed.raw,
                    "document": target.document.path(),
                    "section": target.section,
                }),
                Err(e) => json!({
                    "line": line,
                    "link": embed.raw,
                    "error": e.kind(),
                    "message": e.to_string(),
                }),
            }),
        }
    }

    if let OutputFormat::Json = output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}

fn watch(file: PathBuf, section: String, config: &Config) -> Result<()> {
    let store: Rc<dyn DocumentStore> = Rc::new(FsStore::new()?);
    let mut session = SectionSession::open(
        DocumentHandle::new(file),
        section,
        store,
        BufferSurface::new(),
        &config.sync,
    )?;

    let print = |session: &SectionSession<BufferSurface>| {
        if let Some(surface) = session.surface() {
            println!("{}", surface.text());
            println!("---");
        }
    };
    print(&session);

    loop {
        std::thread::sleep(Duration::from_millis(100));
        let report = session.poll(Instant::now());
        if report.reload == Some(ReloadOutcome::Reloaded) {
            print(&session);
        }
    }
}

fn print_commands(output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Plain => {
            for command in EditorCommand::iter() {
                println!("{:<34} {}", command.id(), command.description());
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = EditorCommand::iter()
                .map(|c| json!({ "id": c.id(), "description": c.description() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
