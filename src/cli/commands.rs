use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mdpanes")]
#[command(version)]
#[command(about = "Markdown panels with live, editable section embeds")]
#[command(
    long_about = "mdpanes - Section extraction, splicing and live section embeds for markdown vaults.\n\n\
    Embeds are written ![[note#Section]]. A section embed is an editor bound to that\n\
    section of the other note: edits are written back, and changes made elsewhere are\n\
    reloaded.\n\n\
    Examples:\n  \
    mdpanes extract notes/plan.md Goals        # Print a section\n  \
    mdpanes replace notes/plan.md Goals < new.md # Splice a section\n  \
    mdpanes resolve notes/home.md '![[plan#Goals]]'\n  \
    mdpanes embeds notes/home.md               # List embeds and their targets\n  \
    mdpanes watch notes/plan.md Goals          # Follow a section as it changes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Use this config file instead of the default location
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Print a section of a document
    ///
    /// The section runs from its heading to the next heading of the same or a
    /// shallower level. A missing section prints a placeholder.
    Extract {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Heading text of the section
        section: String,
    },

    /// Replace a section of a document
    ///
    /// The new section text, including its heading line, is read from --input
    /// or stdin. A missing section is appended after a blank line. The file is
    /// only written when its content changes.
    Replace {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Heading text of the section
        section: String,

        /// Read the new section text from this file instead of stdin
        #[arg(short = 'i', long = "input", value_name = "PATH")]
        input: Option<PathBuf>,
    },

    /// Resolve an embed link written in a document
    Resolve {
        /// Document containing the link
        #[arg(value_hint = clap::ValueHint::FilePath)]
        source: PathBuf,

        /// Link token, e.g. '![[plan#Goals]]' or 'plan#Goals'
        link: String,

        /// Vault root used when the link is not found next to the source
        #[arg(long = "vault", value_name = "DIR")]
        vault: Option<PathBuf>,

        #[arg(short = 'o', long = "output", default_value = "plain")]
        output: OutputFormat,
    },

    /// List every embed in a document and what it resolves to
    Embeds {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Vault root used when a link is not found next to the document
        #[arg(long = "vault", value_name = "DIR")]
        vault: Option<PathBuf>,

        #[arg(short = 'o', long = "output", default_value = "plain")]
        output: OutputFormat,
    },

    /// Follow a section, printing it whenever the document changes on disk
    ///
    /// Runs a headless section session until interrupted.
    Watch {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Heading text of the section
        section: String,
    },

    /// Print the panel-set identifier of a panel block
    ///
    /// Reads the block from FILE, or from stdin when FILE is omitted or '-'.
    PanelId {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: Option<PathBuf>,
    },

    /// List the editor commands redirected to embedded editors
    Commands {
        #[arg(short = 'o', long = "output", default_value = "plain")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Plain,
    /// JSON output
    Json,
}
