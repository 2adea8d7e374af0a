use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use hhx_sdk::{
    ByteSize, Collection, CollectionType, FileRecord, FileStatus, MetadataValue, Repository,
    Schema, WorkdirStatus,
};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let format = cli.format;
    debug!(cwd = %cwd.display(), ?format, "running command");
    match cli.command {
        Command::Init(args) => cmd_init(&cwd, args, format),
        Command::Status(_) => cmd_status(&cwd, format),
        Command::Stage(args) => cmd_stage(&cwd, args, format),
        Command::Unstage(args) => cmd_unstage(&cwd, args, format),
        Command::Push(args) => cmd_push(&cwd, args, format).await,
        Command::Collection(args) => cmd_collection(&cwd, args, format),
        Command::Remote(args) => cmd_remote(&cwd, args, format),
        Command::LsFiles(args) => cmd_ls_files(&cwd, args, format),
    }
}

fn print_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn open(cwd: &Path) -> Result<Repository> {
    Repository::discover(cwd).context("run 'hhx init' to create a repository")
}

fn cmd_init(cwd: &Path, args: InitArgs, format: OutputFormat) -> Result<()> {
    let repo = Repository::init(cwd, args.collection.as_deref(), args.remote.as_deref())?;
    let collection = repo.collection(None)?;
    if format == OutputFormat::Json {
        return print_json(json!({
            "root": repo.root(),
            "default_collection": collection.name,
            "remote": repo.config().resolve_remote(None).ok().map(|(_, url)| url),
        }));
    }
    println!(
        "{} Initialized hhx repository in {}",
        "✓".green().bold(),
        repo.root().display().to_string().bold()
    );
    println!("  Default collection: {}", collection.name.cyan());
    if let Ok((name, url)) = repo.config().resolve_remote(None) {
        println!("  Remote: {} {}", name.bold(), url.blue());
    }
    Ok(())
}

fn status_label(record: &FileRecord) -> &'static str {
    if record.is_new() {
        "new file:"
    } else {
        "modified:"
    }
}

fn cmd_status(cwd: &Path, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let status = repo.status()?;
    // The scan may have moved synced files into the deleted set.
    repo.save()?;

    for diagnostic in &status.diagnostics {
        eprintln!("{} {}", "warning:".yellow(), diagnostic);
    }
    if format == OutputFormat::Json {
        return print_json(serde_json::to_value(&status)?);
    }
    print_status(&status);
    Ok(())
}

fn print_status(status: &WorkdirStatus) {
    if status.is_clean() {
        println!("Nothing to push, working tree clean.");
        return;
    }
    if !status.staged.is_empty() {
        println!("Changes staged for push:");
        for file in &status.staged {
            println!(
                "  {} {} ({})",
                status_label(file).green(),
                file.path.green(),
                ByteSize(file.size)
            );
        }
        println!();
    }
    if !status.modified.is_empty() || !status.deleted.is_empty() {
        println!("Changes not staged:");
        for file in &status.modified {
            println!("  {} {}", "modified:".red(), file.path.red());
        }
        for file in &status.deleted {
            println!("  {} {}", "deleted: ".red(), file.path.red());
        }
        println!();
    }
    if !status.untracked.is_empty() {
        println!("Untracked files:");
        for file in &status.untracked {
            println!("  {}", file.path.red());
        }
        println!();
    }
}

fn cmd_stage(cwd: &Path, args: StageArgs, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let mut staged = Vec::new();
    let mut failures = 0usize;
    for raw in &args.paths {
        let path = Repository::resolve_path(cwd, Path::new(raw));
        match repo.stage(&path) {
            Ok(report) => {
                for diagnostic in &report.diagnostics {
                    eprintln!("{} skipped {}", "warning:".yellow(), diagnostic);
                }
                staged.extend(report.staged);
            }
            Err(err) => {
                eprintln!("{} {}: {}", "error:".red().bold(), raw, err);
                failures += 1;
            }
        }
    }
    repo.save()?;

    if format == OutputFormat::Json {
        print_json(json!({ "staged": staged, "failed": failures }))?;
    } else {
        for path in &staged {
            println!("  {} {}", "staged:".green(), path);
        }
    }
    if failures > 0 {
        bail!("{failures} path(s) could not be staged");
    }
    Ok(())
}

fn cmd_unstage(cwd: &Path, args: UnstageArgs, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let mut total = 0;
    for raw in &args.paths {
        let path = Repository::resolve_path(cwd, Path::new(raw));
        let count = repo.unstage(&path);
        if count == 0 && format == OutputFormat::Text {
            println!("  {} {} (not staged)", "skipped:".dimmed(), raw);
        }
        total += count;
    }
    repo.save()?;

    if format == OutputFormat::Json {
        return print_json(json!({ "unstaged": total }));
    }
    println!("Unstaged {} file(s).", total.to_string().bold());
    Ok(())
}

async fn cmd_push(cwd: &Path, args: PushArgs, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let started = Instant::now();
    let result = repo
        .push(args.remote.as_deref(), args.collection.as_deref(), args.all)
        .await
        .context("push failed")?;
    let elapsed = started.elapsed();
    debug!(
        uploaded = result.uploaded.len(),
        failed = result.failed.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "push command finished"
    );

    if format == OutputFormat::Json {
        print_json(serde_json::to_value(&result)?)?;
    } else if result.is_empty() {
        println!("No files to push.");
    } else {
        if !result.failed.is_empty() {
            println!("Some files failed to upload:");
            for failed in &result.failed {
                println!("  {}: {}", failed.path.red(), failed.error);
            }
        }
        println!(
            "{} Uploaded {} file(s) ({}) to collection '{}' in {}ms",
            "✓".green().bold(),
            result.uploaded.len(),
            ByteSize(result.bytes_transferred),
            result.collection.cyan(),
            elapsed.as_millis()
        );
        if result.stale > 0 {
            println!("  {} upload(s) ignored: unstaged during push", result.stale);
        }
    }
    if !result.is_success() {
        bail!("{} file(s) failed to upload", result.failed.len());
    }
    Ok(())
}

/// Parse `key=value`, reading numbers and booleans as such.
fn parse_metadata(entry: &str) -> Result<(String, MetadataValue)> {
    let Some((key, raw)) = entry.split_once('=') else {
        bail!("metadata must be key=value, got '{entry}'");
    };
    if key.is_empty() {
        bail!("metadata key cannot be empty in '{entry}'");
    }
    let value = if let Ok(n) = raw.parse::<i64>() {
        MetadataValue::Integer(n)
    } else if let Ok(x) = raw.parse::<f64>() {
        MetadataValue::Float(x)
    } else if let Ok(b) = raw.parse::<bool>() {
        MetadataValue::Bool(b)
    } else {
        MetadataValue::from(raw)
    };
    Ok((key.to_string(), value))
}

/// Apply a command-line definition on top of `base`.
fn apply_definition(mut base: Collection, def: CollectionDef) -> Result<Collection> {
    if let Some(kind) = def.kind.as_deref() {
        base.kind = kind.parse::<CollectionType>()?;
        if base.kind == CollectionType::Bucket {
            base.schema = None;
        }
    }
    if let Some(path) = def.path {
        base.path = path;
    }
    if let Some(columns) = def.schema.as_deref() {
        base.schema = Some(Schema::parse_columns(columns)?);
    }
    for entry in &def.metadata {
        let (key, value) = parse_metadata(entry)?;
        base.metadata.insert(key, value);
    }
    Ok(base)
}

fn print_collection(collection: &Collection, is_default: bool) {
    let marker = if is_default { "*".green().bold() } else { " ".normal() };
    println!(
        "{} {} [{}] -> {}",
        marker,
        collection.name.bold(),
        collection.kind,
        collection.path.cyan()
    );
}

fn cmd_collection(cwd: &Path, args: CollectionArgs, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let index = repo.index();
    match args.action {
        CollectionAction::Add(def) => {
            let name = def.name.clone();
            let collection = apply_definition(Collection::bucket(name.clone(), name), def)?;
            index.add_collection(collection.clone())?;
            repo.save()?;
            if format == OutputFormat::Json {
                return print_json(serde_json::to_value(&collection)?);
            }
            println!("{} Added collection {}", "✓".green(), collection.name.bold());
        }
        CollectionAction::Update(def) => {
            let existing = index.collection(&def.name)?;
            let collection = apply_definition(existing, def)?;
            index.update_collection(collection.clone())?;
            repo.save()?;
            if format == OutputFormat::Json {
                return print_json(serde_json::to_value(&collection)?);
            }
            println!("{} Updated collection {}", "✓".green(), collection.name.bold());
        }
        CollectionAction::Remove { name } => {
            index.remove_collection(&name)?;
            repo.save()?;
            if format == OutputFormat::Json {
                return print_json(json!({
                    "removed": name,
                    "default_collection": index.default_collection_name(),
                }));
            }
            println!("Removed collection {}", name.bold());
            match index.default_collection_name() {
                Some(default) => println!("Default collection: {}", default.cyan()),
                None => println!("{}", "No default collection set.".yellow()),
            }
        }
        CollectionAction::List => {
            let collections = index.collections();
            let default = index.default_collection_name();
            if format == OutputFormat::Json {
                return print_json(json!({
                    "default_collection": default,
                    "collections": collections,
                }));
            }
            if collections.is_empty() {
                println!("No collections.");
            }
            for collection in &collections {
                print_collection(collection, default.as_deref() == Some(collection.name.as_str()));
            }
        }
        CollectionAction::Show { name } => {
            let collection = index.collection(&name)?;
            let files = index.files_in_collection(&name);
            if format == OutputFormat::Json {
                return print_json(json!({ "collection": collection, "files": files }));
            }
            let is_default = index.default_collection_name().as_deref() == Some(name.as_str());
            print_collection(&collection, is_default);
            if let Some(schema) = &collection.schema {
                println!("  Schema:");
                for column in &schema.columns {
                    let mut flags = Vec::new();
                    if column.primary_key {
                        flags.push("pk");
                    }
                    if column.nullable {
                        flags.push("null");
                    }
                    println!("    {} {} {}", column.name, column.data_type.cyan(), flags.join(" "));
                }
            }
            for (key, value) in &collection.metadata {
                println!("  {}: {}", key, serde_json::to_string(value)?);
            }
            println!("  Files: {}", files.len());
        }
        CollectionAction::SetDefault { name } => {
            index.set_default_collection(&name)?;
            repo.save()?;
            if format == OutputFormat::Json {
                return print_json(json!({ "default_collection": name }));
            }
            println!("Default collection set to {}", name.bold());
        }
    }
    Ok(())
}

fn cmd_remote(cwd: &Path, args: RemoteArgs, format: OutputFormat) -> Result<()> {
    let mut repo = open(cwd)?;
    match args.action {
        Some(RemoteAction::Add { name, url }) => {
            repo.config_mut().add_remote(&name, &url)?;
            repo.save()?;
            if !url.starts_with("file://") {
                eprintln!(
                    "{} only file:// remotes can be pushed to",
                    "warning:".yellow()
                );
            }
            if format == OutputFormat::Text {
                println!("Added remote {} -> {}", name.bold(), url.blue());
            }
        }
        Some(RemoteAction::Remove { name }) => {
            repo.config_mut().remove_remote(&name)?;
            repo.save()?;
            if format == OutputFormat::Text {
                println!("Removed remote {}", name.bold());
            }
        }
        Some(RemoteAction::List) | None => {
            let config = repo.config();
            if format == OutputFormat::Json {
                return print_json(json!({
                    "current_remote": config.current_remote,
                    "remotes": config.remotes,
                }));
            }
            if config.remotes.is_empty() {
                println!("No remotes configured.");
            }
            for (name, url) in &config.remotes {
                let marker = if *name == config.current_remote { "*" } else { " " };
                println!("{} {} {}", marker.green(), name.bold(), url.blue());
            }
        }
    }
    Ok(())
}

fn status_colored(status: FileStatus) -> colored::ColoredString {
    let label = format!("{status:<9}");
    match status {
        FileStatus::Staged => label.green(),
        FileStatus::Synced => label.normal(),
        FileStatus::Modified => label.yellow(),
        FileStatus::Untracked => label.red(),
    }
}

fn cmd_ls_files(cwd: &Path, args: LsFilesArgs, format: OutputFormat) -> Result<()> {
    let repo = open(cwd)?;
    let files = match args.collection.as_deref() {
        Some(name) => {
            repo.index().collection(name)?;
            repo.index().files_in_collection(name)
        }
        None => repo.index().all_files(),
    };
    if format == OutputFormat::Json {
        return print_json(serde_json::to_value(&files)?);
    }
    let deleted: Vec<String> = repo
        .index()
        .deleted_files()
        .into_iter()
        .map(|f| f.path)
        .collect();
    for file in &files {
        let label = if deleted.contains(&file.path) {
            format!("{:<9}", "deleted").red()
        } else {
            status_colored(file.status)
        };
        println!(
            "{} {:>10}  {}  {}",
            label,
            ByteSize(file.size).to_string(),
            file.digest.short_hex().dimmed(),
            file.path
        );
    }
    Ok(())
}
