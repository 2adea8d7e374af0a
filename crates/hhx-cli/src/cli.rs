use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hhx",
    about = "Track local files and push them to remote collections",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a repository in the current directory
    Init(InitArgs),
    /// Show staged, modified, deleted and untracked files
    Status(StatusArgs),
    /// Stage files or directories for the next push
    Stage(StageArgs),
    /// Remove files from the staging area
    Unstage(UnstageArgs),
    /// Upload staged files to a remote collection
    Push(PushArgs),
    /// Manage collections
    Collection(CollectionArgs),
    /// Manage remotes
    Remote(RemoteArgs),
    /// List tracked files
    LsFiles(LsFilesArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Name of the initial (default) collection
    #[arg(long)]
    pub collection: Option<String>,
    /// URL of the `origin` remote
    #[arg(long)]
    pub remote: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct StageArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct UnstageArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct PushArgs {
    /// Remote name; defaults to the current remote
    pub remote: Option<String>,
    /// Stage all new and modified files first
    #[arg(long)]
    pub all: bool,
    /// Collection to push into; defaults to the default collection
    #[arg(long)]
    pub collection: Option<String>,
}

#[derive(Args)]
pub struct CollectionArgs {
    #[command(subcommand)]
    pub action: CollectionAction,
}

#[derive(Subcommand)]
pub enum CollectionAction {
    /// Register a collection
    Add(CollectionDef),
    /// Change an existing collection
    Update(CollectionDef),
    /// Remove a collection
    Remove { name: String },
    /// List collections
    List,
    /// Show one collection
    Show { name: String },
    /// Make a collection the default push target
    SetDefault { name: String },
}

#[derive(Args)]
pub struct CollectionDef {
    pub name: String,
    /// `bucket` or `table`
    #[arg(long = "type")]
    pub kind: Option<String>,
    /// Remote path or table name; defaults to the collection name
    #[arg(long)]
    pub path: Option<String>,
    /// Table columns, e.g. `id:string:pk,value:float:null`
    #[arg(long)]
    pub schema: Option<String>,
    /// Metadata entry `key=value`, repeatable
    #[arg(long = "meta")]
    pub metadata: Vec<String>,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: Option<RemoteAction>,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    Add { name: String, url: String },
    Remove { name: String },
    List,
}

#[derive(Args)]
pub struct LsFilesArgs {
    /// Only files uploaded to this collection
    #[arg(long)]
    pub collection: Option<String>,
}
