use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use context_session::{ChatRole, ChatSession, LoggingListener, SessionStore, StoreConfig};
use context_transport::{SseSegmenter, TaskSupervisor};
use context_tree::{
    render_tree, ClassDependencyGraph, ClassFacts, MethodFacts, MutationOutcome, RemovalTarget,
    SelectedFile, TreeBuilder, TreeStats, WorkspaceRef, WorkspaceSource,
};
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncReadExt;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "context-tree")]
#[command(about = "Curate code context for chat sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (default: ~/.context-tree/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session document (overrides CONTEXT_TREE_SESSION_FILE)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Workspace (project) name; defaults to the root directory name
    #[arg(short = 'w', long = "workspace", global = true)]
    workspace_name: Option<String>,

    /// Workspace root; defaults to the current directory
    #[arg(long, global = true)]
    workspace_root: Option<PathBuf>,

    /// Work on this session instead of the workspace's latest one
    #[arg(long, global = true)]
    session: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the session tree with one built from a class dependency graph
    Build(GraphArgs),

    /// Fold a tree built from a class dependency graph into the session tree
    Merge(GraphArgs),

    /// Select a whole file of the workspace
    #[command(name = "add-file")]
    AddFile(AddFileArgs),

    /// Select one method of a class
    #[command(name = "add-method")]
    AddMethod(AddMethodArgs),

    /// Drop a file, class or methods from the selection
    Remove(RemoveArgs),

    /// Print the session tree as JSON
    Show(ShowArgs),

    /// Render the selection as fenced source fragments
    Render(RenderArgs),

    /// Manage chat sessions
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Manage the message log of the current session
    Message {
        #[command(subcommand)]
        action: MessageCommand,
    },
}

#[derive(Args)]
struct GraphArgs {
    /// Class dependency graph (JSON)
    graph: PathBuf,
}

#[derive(Args)]
struct AddFileArgs {
    /// File to select, relative to the workspace root or absolute
    path: PathBuf,

    /// Package the file declares
    #[arg(long)]
    package: Option<String>,
}

#[derive(Args)]
struct AddMethodArgs {
    /// Class facts (JSON) as the code graph provider emits them
    #[arg(long, conflicts_with_all = ["file", "class"])]
    facts: Option<PathBuf>,

    /// File declaring the class
    #[arg(long, required_unless_present = "facts")]
    file: Option<String>,

    /// Qualified class name
    #[arg(long, required_unless_present = "facts")]
    class: Option<String>,

    /// Method name
    #[arg(long)]
    method: String,

    /// Parameter type, repeated in declaration order
    #[arg(long = "param")]
    params: Vec<String>,

    #[arg(long)]
    constructor: bool,
}

#[derive(Args)]
struct RemoveArgs {
    /// File to remove from (omit with --all)
    #[arg(long, required_unless_present = "all")]
    file: Option<String>,

    /// Class within --file
    #[arg(long, requires = "file")]
    class: Option<String>,

    /// Method name within --class, repeatable; all overloads go
    #[arg(long = "method", requires = "class")]
    methods: Vec<String>,

    /// Clear every local selection of the workspace
    #[arg(long, conflicts_with = "file")]
    all: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Print node counts instead of the tree
    #[arg(long)]
    stats: bool,
}

#[derive(Args)]
struct RenderArgs {
    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Start a new session for the workspace
    New,

    /// List sessions, newest first
    List,

    /// Switch to a session and print it
    Use { id: String },

    /// Delete a session
    Delete { id: String },
}

#[derive(Subcommand)]
enum MessageCommand {
    /// Append a message; `-` reads the content from stdin
    Append {
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
        content: String,
    },

    /// Drop every message after the given index
    Truncate {
        #[arg(long)]
        after: usize,
    },

    /// Print the transcript
    Export,

    /// Append the payloads of captured event streams, one message per stream
    Stream {
        #[arg(long, value_enum, default_value_t = RoleArg::Assistant)]
        role: RoleArg,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    System,
    User,
    Assistant,
}

impl From<RoleArg> for ChatRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::System => ChatRole::System,
            RoleArg::User => ChatRole::User,
            RoleArg::Assistant => ChatRole::Assistant,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary<'a> {
    id: &'a str,
    workspace: &'a str,
    start_time: u64,
    messages: usize,
    files: usize,
    current: bool,
}

impl<'a> SessionSummary<'a> {
    fn new(session: &'a ChatSession, current: bool) -> Self {
        Self {
            id: &session.id,
            workspace: &session.workspace,
            start_time: session.start_time,
            messages: session.messages.len(),
            files: session.app_file_tree.stats().files,
            current,
        }
    }
}

#[derive(Serialize)]
struct EditReport<'a> {
    outcome: &'static str,
    session: &'a str,
    stats: TreeStats,
}

struct Runtime {
    store: SessionStore,
    workspace: WorkspaceRef,
    pinned_session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = Config::load(cli.config.as_deref())?.overlay(Config {
        workspace_name: cli.workspace_name.clone(),
        workspace_root: cli.workspace_root.clone(),
        session_file: cli.session_file.clone(),
    });

    let mut rt = Runtime::open(&config, cli.session.clone())?;

    match cli.command {
        Commands::Build(args) => run_build(&mut rt, &args, false)?,
        Commands::Merge(args) => run_build(&mut rt, &args, true)?,
        Commands::AddFile(args) => run_add_file(&mut rt, &args)?,
        Commands::AddMethod(args) => run_add_method(&mut rt, &args)?,
        Commands::Remove(args) => run_remove(&mut rt, &args)?,
        Commands::Show(args) => run_show(&mut rt, &args)?,
        Commands::Render(args) => run_render(&mut rt, &args)?,
        Commands::Session { action } => run_session(&mut rt, action)?,
        Commands::Message { action } => run_message(&mut rt, action).await?,
    }

    Ok(())
}

impl Runtime {
    fn open(config: &Config, pinned_session: Option<String>) -> Result<Self> {
        let store_config = StoreConfig::resolve(config.session_file.as_deref())?;
        log::debug!("Session file: {}", store_config.session_file.display());

        let mut store = SessionStore::open(store_config);
        store.add_listener(Arc::new(LoggingListener));

        let workspace = resolve_workspace(config)?;
        if let Some(id) = &pinned_session {
            store
                .set_current_session(&workspace.name, id)
                .with_context(|| format!("Cannot switch to session {}", id))?;
        }

        Ok(Self {
            store,
            workspace,
            pinned_session,
        })
    }

    fn ws(&self) -> &str {
        &self.workspace.name
    }

    fn report_edit(&mut self, outcome: MutationOutcome) -> Result<()> {
        let outcome = match outcome {
            MutationOutcome::Changed => "changed",
            MutationOutcome::Unchanged => "unchanged",
            MutationOutcome::Skipped(err) => bail!("Edit rejected: {}", err),
        };
        let workspace = self.workspace.name.clone();
        let session = self.store.current_session(&workspace);
        print_json(&EditReport {
            outcome,
            session: &session.id,
            stats: session.app_file_tree.stats(),
        })
    }

    /// Current session id without creating one
    fn current_id(&self) -> Option<String> {
        if let Some(id) = &self.pinned_session {
            return Some(id.clone());
        }
        self.store
            .sessions()
            .into_iter()
            .find(|s| s.workspace == self.workspace.name)
            .map(|s| s.id.clone())
    }
}

fn resolve_workspace(config: &Config) -> Result<WorkspaceRef> {
    let root = match &config.workspace_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Invalid workspace root {}", root.display()))?;

    let name = match &config.workspace_name {
        Some(name) => name.clone(),
        None => root
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Cannot derive a workspace name from {}; pass --workspace",
                    root.display()
                )
            })?,
    };

    Ok(WorkspaceRef::new(name, root.to_string_lossy()))
}

fn run_build(rt: &mut Runtime, args: &GraphArgs, merge: bool) -> Result<()> {
    let bytes = std::fs::read(&args.graph)
        .with_context(|| format!("Failed to read graph {}", args.graph.display()))?;
    let graph = ClassDependencyGraph::from_json_slice(&bytes)
        .with_context(|| format!("Invalid graph {}", args.graph.display()))?;

    let mut builder = TreeBuilder::new();
    let built = builder.build(&graph);
    let report = builder.report();
    log::debug!(
        "Placed {} classes, skipped {}, collapsed {} files",
        report.placed,
        report.skipped,
        report.collapsed_files
    );

    let workspace = rt.workspace.name.clone();
    let outcome = if merge {
        rt.store.merge_tree(&workspace, built)?
    } else {
        rt.store.replace_tree(&workspace, built)?
    };
    rt.report_edit(outcome)
}

fn run_add_file(rt: &mut Runtime, args: &AddFileArgs) -> Result<()> {
    let path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        Path::new(&rt.workspace.root).join(&args.path)
    };
    let path = path
        .canonicalize()
        .with_context(|| format!("Cannot select {}", path.display()))?;
    let writable = std::fs::metadata(&path)
        .map(|meta| !meta.permissions().readonly())
        .with_context(|| format!("Cannot stat {}", path.display()))?;

    let mut selected = SelectedFile::new(path);
    selected.writable = writable;
    if let Some(package) = &args.package {
        selected = selected.with_package(package.clone());
    }

    let workspace = rt.workspace.clone();
    let outcome = rt.store.add_file(&workspace, &selected)?;
    rt.report_edit(outcome)
}

fn run_add_method(rt: &mut Runtime, args: &AddMethodArgs) -> Result<()> {
    let class = match &args.facts {
        Some(path) => {
            let raw = std::fs::read(path)
                .with_context(|| format!("Failed to read class facts {}", path.display()))?;
            serde_json::from_slice::<ClassFacts>(&raw)
                .with_context(|| format!("Invalid class facts {}", path.display()))?
        }
        None => class_from_flags(rt, args)?,
    };

    let method = if args.constructor {
        MethodFacts::constructor(&args.method, args.params.clone())
    } else {
        MethodFacts::new(&args.method, args.params.clone())
    };

    let outcome = rt.store.add_method(&class, &method)?;
    rt.report_edit(outcome)
}

fn class_from_flags(rt: &Runtime, args: &AddMethodArgs) -> Result<ClassFacts> {
    let (Some(file), Some(qualified)) = (&args.file, &args.class) else {
        bail!("--file and --class are required without --facts");
    };
    let file_path = if Path::new(file).is_absolute() || file.contains("!/") {
        file.clone()
    } else {
        Path::new(&rt.workspace.root)
            .join(file)
            .to_string_lossy()
            .into_owned()
    };
    let simple = qualified.rsplit('.').next().unwrap_or(qualified.as_str()).to_string();

    Ok(ClassFacts {
        workspace: rt.workspace.clone(),
        file_path,
        qualified_name: Some(qualified.clone()),
        name: Some(simple),
        methods: Vec::new(),
        handle: None,
    })
}

fn run_remove(rt: &mut Runtime, args: &RemoveArgs) -> Result<()> {
    let target = match (&args.file, &args.class) {
        (None, _) => RemovalTarget::workspace(),
        (Some(file), None) => RemovalTarget::file(file.clone()),
        (Some(file), Some(class)) if args.methods.is_empty() => {
            RemovalTarget::class(file.clone(), class.clone())
        }
        (Some(file), Some(class)) => {
            RemovalTarget::methods(file.clone(), class.clone(), args.methods.clone())
        }
    };

    let workspace = rt.ws().to_string();
    let outcome = rt.store.remove_selected(&workspace, &target)?;
    rt.report_edit(outcome)
}

fn run_show(rt: &mut Runtime, args: &ShowArgs) -> Result<()> {
    let workspace = rt.ws().to_string();
    let tree = &rt.store.current_session(&workspace).app_file_tree;
    if args.stats {
        print_json(&tree.stats())
    } else {
        print_json(tree)
    }
}

fn run_render(rt: &mut Runtime, args: &RenderArgs) -> Result<()> {
    let workspace = rt.ws().to_string();
    let tree = rt.store.current_session(&workspace).app_file_tree.clone();
    let source = WorkspaceSource::new(&rt.workspace.root);
    let rendered = render_tree(&tree, &source);

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Rendered context to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn run_session(rt: &mut Runtime, action: SessionCommand) -> Result<()> {
    let workspace = rt.ws().to_string();
    match action {
        SessionCommand::New => {
            let id = rt.store.create_session(&workspace)?;
            print_json(&json!({ "id": id }))
        }
        SessionCommand::List => {
            let current = rt.current_id();
            let summaries: Vec<_> = rt
                .store
                .sessions()
                .into_iter()
                .map(|s| SessionSummary::new(s, current.as_deref() == Some(s.id.as_str())))
                .collect();
            print_json(&summaries)
        }
        SessionCommand::Use { id } => {
            rt.store
                .set_current_session(&workspace, &id)
                .with_context(|| format!("Cannot switch to session {}", id))?;
            let session = rt.store.current_session(&workspace);
            print_json(&SessionSummary::new(session, true))
        }
        SessionCommand::Delete { id } => {
            rt.store
                .delete_session(&id)
                .with_context(|| format!("Cannot delete session {}", id))?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

async fn run_message(rt: &mut Runtime, action: MessageCommand) -> Result<()> {
    let workspace = rt.ws().to_string();
    match action {
        MessageCommand::Append { role, content } => {
            let content = if content == "-" {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read message from stdin")?;
                buf
            } else {
                content
            };
            let index = rt.store.append_message(&workspace, role.into(), content)?;
            print_json(&json!({ "index": index }))
        }
        MessageCommand::Truncate { after } => {
            let truncated = rt.store.truncate_messages_after(&workspace, after)?;
            print_json(&json!({ "truncated": truncated }))
        }
        MessageCommand::Export => {
            println!("{}", rt.store.export_chat_history(&workspace));
            Ok(())
        }
        MessageCommand::Stream { role, files } => {
            let replies = collect_streams(files).await;
            let mut appended = Vec::new();
            let mut failed = 0usize;
            for reply in replies {
                match reply {
                    Some(text) => {
                        appended.push(rt.store.append_message(&workspace, role.into(), text)?)
                    }
                    None => failed += 1,
                }
            }
            if appended.is_empty() {
                bail!("No stream could be read");
            }
            print_json(&json!({ "appended": appended, "failed": failed }))
        }
    }
}

/// Read every capture on its own supervised task; a broken capture yields
/// `None` without disturbing the others.
async fn collect_streams(files: Vec<PathBuf>) -> Vec<Option<String>> {
    let slots = Arc::new(Mutex::new(vec![None; files.len()]));
    let mut supervisor = TaskSupervisor::new();

    for (index, path) in files.into_iter().enumerate() {
        let slots = slots.clone();
        let name = path.display().to_string();
        supervisor.spawn(name, async move {
            let text = read_stream(&path).await?;
            slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(text);
            Ok::<(), anyhow::Error>(())
        });
    }

    let report = supervisor.join_all().await;
    log::debug!(
        "Streams: {} completed, {} failed, {} panicked",
        report.completed,
        report.failed,
        report.panicked
    );

    let mut guard = slots.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *guard)
}

async fn read_stream(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut segmenter = SseSegmenter::new(false);
    let mut chunk = vec![0u8; 8 * 1024];
    let mut text = String::new();

    while !segmenter.is_finished() {
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        for event in segmenter.feed(&chunk[..read])? {
            text.push_str(&event.data);
        }
    }
    Ok(text)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
