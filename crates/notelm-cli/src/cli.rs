use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "notelm")]
#[command(about = "Local-first notes with multi-device sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Quick capture: notelm "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note content
        content: Vec<String>,
        /// Note title
        #[arg(short, long)]
        title: Option<String>,
        /// Tag to apply (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List notes, most recent first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Filter notes by tag name
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single note
    Show {
        /// Note ID or unique ID prefix (current note when omitted)
        id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search note titles and content
    Search {
        /// Search query
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Rename the note instead of opening an editor
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Select the current note
    Select {
        /// Note ID or unique ID prefix
        id: Option<String>,
        /// Clear the current selection
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },
    /// Manage note tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Manage note source links
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },
    /// Attach a document whose text was already extracted to a file
    Attach {
        /// Note ID or unique ID prefix
        id: String,
        /// File containing the extracted text
        #[arg(value_name = "PATH")]
        file: PathBuf,
        /// Attachment name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Attachment kind (guessed from the name when omitted)
        #[arg(long, value_enum)]
        kind: Option<AttachmentKindArg>,
    },
    /// Export notes
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or change AI provider settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Sync the local store with the profile's remote directory
    Sync {
        /// Keep syncing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AttachmentKindArg {
    Pdf,
    Image,
    File,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProviderArg {
    Gemini,
    Ollama,
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// Add a tag to a note
    Add {
        /// Note ID or unique ID prefix
        id: String,
        /// Tag name
        tag: String,
    },
    /// Remove a tag from a note
    Remove {
        /// Note ID or unique ID prefix
        id: String,
        /// Tag name
        tag: String,
    },
    /// List every tag in use
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// Add a source link to a note
    Add {
        /// Note ID or unique ID prefix
        id: String,
        /// http:// or https:// URL
        url: String,
    },
    /// Remove a source link from a note
    Remove {
        /// Note ID or unique ID prefix
        id: String,
        /// Source URL
        url: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update one or more settings
    Set {
        /// AI provider
        #[arg(long, value_enum)]
        provider: Option<ProviderArg>,
        /// API key for hosted providers
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Ollama server URL
        #[arg(long, value_name = "URL")]
        ollama_url: Option<String>,
        /// Model name
        #[arg(long)]
        model: Option<String>,
    },
    /// Restore default settings
    Reset,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Shared directory used as the remote store
        #[arg(long, value_name = "PATH")]
        remote_dir: Option<PathBuf>,
        /// Remote namespace for this user
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Interval between remote directory scans
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Profile name to show
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
