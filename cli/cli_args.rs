use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: <ROOT>/.codedigest/codedigest.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,

    #[arg(
        long,
        help = "Specify the project name (overrides config/dir name).",
        value_name = "NAME",
        help_heading = "Project Setup"
    )]
    pub project_name: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    name = "codedigest",
    author,
    version,
    about = "Pack a source tree into LLM-ready text digests.",
    long_about = "codedigest walks a project directory (or a JSON snapshot of one), skips binaries, \nassets and ignored paths, and writes the remaining sources into one digest file \nor into numbered parts that each stay under a token budget.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  codedigest generate\n  codedigest g ./my-app --token-limit 128k --preset android\n  codedigest g snapshot.json --format markdown -o ./digests\n  codedigest presets",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Generate the digest for a project directory or snapshot."
    )]
    Generate(GenerateArgs),

    #[command(visible_alias = "p", about = "List the built-in exclude presets.")]
    Presets(PresetsArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(
        value_name = "ROOT",
        help = "Project directory or JSON snapshot (default: current dir)."
    )]
    pub root: Option<PathBuf>,

    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        short = 'o',
        long,
        value_name = "DIR",
        help = "Directory for the digest files (default: <Documents>/CodeDigest).",
        help_heading = "Output Control"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_name = "FORMAT",
        value_parser = ["plain", "text", "txt", "markdown", "md", "xml"],
        help = "Framing of the digest text.",
        help_heading = "Output Control"
    )]
    pub format: Option<String>,

    #[arg(
        short = 't',
        long,
        value_name = "TOKENS",
        help = "Split output into parts of at most TOKENS tokens (e.g. 32k, 128k, 200k; 0 = single file).",
        help_heading = "Output Control"
    )]
    pub token_limit: Option<String>,

    #[arg(
        long,
        help = "Skip token counting (parts are never split).",
        help_heading = "Output Control"
    )]
    pub no_token_count: bool,

    #[arg(
        long,
        help = "Omit the directory tree block.",
        help_heading = "Output Control"
    )]
    pub skip_tree: bool,

    #[arg(
        long,
        help = "Add a generation timestamp to each part header.",
        help_heading = "Output Control"
    )]
    pub timestamp: bool,

    #[arg(
        long,
        help = "Print the run summary as JSON instead of a table.",
        help_heading = "Output Control"
    )]
    pub json: bool,

    #[arg(
        long,
        help = "Strip comments with a language-agnostic heuristic.",
        help_heading = "Content"
    )]
    pub remove_comments: bool,

    #[arg(
        long,
        help = "Drop blank lines from file contents.",
        help_heading = "Content"
    )]
    pub compact: bool,

    #[clap(flatten)]
    pub filters: FilterGroup,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterGroup {
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append, help = "Add an exclude pattern ('*' wildcard, matched anywhere in the path).", help_heading = "Filtering")]
    pub exclude: Vec<String>,

    #[arg(short = 'p', long = "preset", value_name = "NAME", action = clap::ArgAction::Append, help = "Enable an exclude preset (android, web, python, media).", help_heading = "Filtering")]
    pub presets: Vec<String>,

    #[arg(
        long,
        help = "Do not read the root .gitignore.",
        help_heading = "Filtering"
    )]
    pub no_gitignore: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Read extra exclude patterns from FILE (one per line).",
        help_heading = "Filtering"
    )]
    pub ignore_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "SIZE",
        help = "Leave out files larger than SIZE (e.g. 500, 512KB, 2MiB; bare numbers are KB).",
        help_heading = "Filtering"
    )]
    pub max_file_size: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PresetsArgs {
    #[arg(long, help = "Print presets as JSON.")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_enum,
        default_value_t = Shell::Fish,
        help = "Shell to generate completions for."
    )]
    pub shell: Shell,

    #[arg(long, help = "Write the script to the shell's completion directory.")]
    pub save: bool,

    #[arg(
        long,
        value_name = "DIR",
        requires = "save",
        help = "Save into DIR instead of the shell's default directory."
    )]
    pub dir: Option<PathBuf>,

    #[arg(long, requires = "save", help = "Replace an existing completion file.")]
    pub force: bool,
}
