use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use page_picker::{
    EntryFileReaction, NodeRole, PageId, PickView, PickerSession, Scope, SelectionStore,
    StorageLocation, ViewEntry,
};
use page_picker_config::{EntryFileEvent, EntryFileMonitor, RevertOutcome, RevertSkip};
use page_picker_settings::{settings_path, SettingsStore};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Quiet period after a file event before the entry file is re-read.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Parser)]
#[command(
    name = "page-picker",
    about = "Pick which mini-program pages go into the entry configuration",
    author,
    version
)]
struct Cli {
    /// 專案根目錄；預設為目前目錄。 / Project root (defaults to the current directory).
    #[arg(long, global = true, value_name = "PATH", env = "PAGE_PICKER_PROJECT")]
    project: Option<PathBuf>,

    /// 備援選取紀錄的存放目錄。 / Root of the fallback selection store (defaults to the user data directory).
    #[arg(long, global = true, value_name = "PATH", env = "PAGE_PICKER_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// 提高日誌層級（-v、-vv）。 / Raise the log level (-v info, -vv debug); `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// 以 JSON 輸出。 / Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Selection(SelectionCommand),
    /// 檢視或修改工具設定。 / Show or change picker settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum SelectionCommand {
    /// 列出頁面樹。 / Print the page tree.
    Tree(TreeArgs),
    /// 選取頁面。 / Pick a page.
    Pick(PageArgs),
    /// 取消選取頁面。 / Unpick a page.
    Unpick(PageArgs),
    /// 指定 entry 頁面。 / Make a main-package page the entry page.
    Entry(PageArgs),
    /// 選取範圍內所有頁面。 / Pick every page of `main` or a sub-package root.
    PickAll(ScopeArgs),
    /// 取消選取範圍內所有頁面。 / Unpick every page of `main` or a sub-package root.
    UnpickAll(ScopeArgs),
    /// 將已選頁面寫入入口檔。 / Write the picked pages into the entry file.
    Save,
    /// 重新讀取入口檔。 / Re-read the entry file.
    Reload,
    /// 還原入口檔原始內容。 / Restore the hand-written entry file.
    Revert,
    /// 顯示頁面原始碼路徑。 / Print the source file of a page.
    Locate(PageArgs),
    /// 監看入口檔變更。 / Watch the entry file and reload on hand edits.
    Watch,
}

#[derive(Args)]
struct TreeArgs {
    /// 僅顯示已選頁面。 / Show picked pages only.
    #[arg(long, conflicts_with = "all")]
    picked_only: bool,

    /// 顯示所有頁面。 / Show every page, overriding the saved preference.
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct PageArgs {
    /// 頁面 id（分包頁面需加上 root）。 / Page id; sub-package pages are prefixed with their root.
    id: String,
}

#[derive(Args)]
struct ScopeArgs {
    /// `main` 或分包 root。 / `main` or a sub-package root.
    scope: String,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// 顯示目前設定。 / Print the effective settings.
    Show,
    /// 設定 tree 預設是否只顯示已選頁面。 / Set whether `tree` shows picked pages only by default.
    PickedOnly {
        #[arg(value_name = "true|false", action = ArgAction::Set)]
        value: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        project,
        state_dir,
        verbose,
        json,
        command,
    } = Cli::parse();
    init_tracing(verbose)?;
    let project = resolve_project(project)?;

    match command {
        Commands::Selection(command) => {
            let mut session = open_session(&project, state_dir.as_deref())?;
            execute_selection_command(command, &mut session, json)
        }
        Commands::Settings(command) => execute_settings_command(command, &project, json),
    }
}

fn execute_selection_command(
    command: SelectionCommand,
    session: &mut PickerSession,
    json: bool,
) -> Result<()> {
    match command {
        SelectionCommand::Tree(args) => {
            let picked_only = picked_only(session, &args);
            print_tree(session, picked_only, json)
        }
        SelectionCommand::Pick(args) => update_page(session, &args.id, "picked", PageAction::Pick),
        SelectionCommand::Unpick(args) => {
            update_page(session, &args.id, "unpicked", PageAction::Unpick)
        }
        SelectionCommand::Entry(args) => {
            update_page(session, &args.id, "set as entry", PageAction::Entry)
        }
        SelectionCommand::PickAll(args) => update_scope(session, &args.scope, true),
        SelectionCommand::UnpickAll(args) => update_scope(session, &args.scope, false),
        SelectionCommand::Save => save(session, json),
        SelectionCommand::Reload => reload(session, json),
        SelectionCommand::Revert => revert(session),
        SelectionCommand::Locate(args) => locate(session, &args.id),
        SelectionCommand::Watch => watch(session),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn resolve_project(project: Option<PathBuf>) -> Result<PathBuf> {
    match project {
        Some(path) => {
            if path.is_absolute() {
                Ok(path)
            } else {
                Ok(std::env::current_dir()
                    .context("determine current directory")?
                    .join(path))
            }
        }
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn load_settings(project: &Path) -> Result<SettingsStore> {
    let path = settings_path(project);
    SettingsStore::load(&path).with_context(|| format!("load settings from {}", path.display()))
}

fn open_session(project: &Path, state_dir: Option<&Path>) -> Result<PickerSession> {
    let settings = load_settings(project)?.settings().clone();
    let store = SelectionStore::for_project(project, &settings, state_dir);
    debug!(
        primary = ?store.primary_path(),
        fallback = ?store.fallback_path(),
        "selection store resolved"
    );
    Ok(PickerSession::open(project, settings, store))
}

fn picked_only(session: &PickerSession, args: &TreeArgs) -> bool {
    if args.picked_only {
        true
    } else if args.all {
        false
    } else {
        session.settings().show_picked_only
    }
}

fn print_tree(session: &mut PickerSession, picked_only: bool, json: bool) -> Result<()> {
    let status = session.status().map(str::to_string);
    let view = PickView::new(picked_only);
    let (summary, snapshot) = match session.selection_mut() {
        Some(selection) => (view.summary(selection), view.snapshot(selection)),
        None => (None, Vec::new()),
    };

    if json {
        let payload = json!({
            "entryFile": session.entry_file(),
            "pickedOnly": picked_only,
            "summary": summary,
            "status": status,
            "tree": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if let Some(entry) = session.entry_file() {
        println!("{}", entry.display());
    }
    for node in &snapshot {
        print_node(node, 0);
    }
    if let Some(summary) = summary {
        println!("picked {summary}");
    }
    if let Some(status) = status {
        println!("{status}");
    }
    Ok(())
}

fn print_node(node: &ViewEntry, depth: usize) {
    let indent = "  ".repeat(depth);
    let display = &node.display;
    let line = match role_mark(display.role) {
        Some(mark) => format!("{indent}{mark} {}", display.id.as_deref().unwrap_or(&display.label)),
        None => format!("{indent}{} {}", display.label, display.description),
    };
    println!("{}", line.trim_end());
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn role_mark(role: NodeRole) -> Option<&'static str> {
    match role {
        NodeRole::PageEntry => Some("[E]"),
        NodeRole::PageTabbar => Some("[T]"),
        NodeRole::PagePicked => Some("[x]"),
        NodeRole::PageUnpicked => Some("[ ]"),
        NodeRole::Root | NodeRole::RootSub | NodeRole::Package => None,
    }
}

#[derive(Clone, Copy)]
enum PageAction {
    Pick,
    Unpick,
    Entry,
}

fn require_loaded(session: &PickerSession) -> Result<()> {
    if session.is_loaded() {
        Ok(())
    } else {
        Err(anyhow!(
            "{}",
            session.status().unwrap_or("no page configuration found")
        ))
    }
}

fn find_page(session: &PickerSession, id: &str) -> Result<PageId> {
    require_loaded(session)?;
    session
        .selection()
        .and_then(|selection| selection.tree().find(id))
        .ok_or_else(|| anyhow!("unknown page id `{id}`"))
}

fn update_page(session: &mut PickerSession, id: &str, verb: &str, action: PageAction) -> Result<()> {
    let page = find_page(session, id)?;
    let selection = session
        .selection_mut()
        .ok_or_else(|| anyhow!("no page configuration found"))?;
    let changed = match action {
        PageAction::Pick => selection.pick(page),
        PageAction::Unpick => selection.unpick(page),
        PageAction::Entry => selection.set_entry(page),
    };
    if !changed {
        println!("{id}: unchanged");
        return Ok(());
    }

    let entry = selection
        .entry()
        .and_then(|entry| selection.tree().page(entry))
        .map(|page| page.id().to_string());
    warn_if_unsaved(&session.commit_selection());
    println!("{id}: {verb}");
    if let Some(entry) = entry {
        println!("entry: {entry}");
    }
    Ok(())
}

fn resolve_scope(session: &PickerSession, scope: &str) -> Result<Scope> {
    require_loaded(session)?;
    if scope == "main" {
        return Ok(Scope::Main);
    }
    session
        .selection()
        .and_then(|selection| selection.tree().find_sub_package(scope))
        .map(Scope::SubPackage)
        .ok_or_else(|| anyhow!("unknown scope `{scope}`; use `main` or a sub-package root"))
}

fn update_scope(session: &mut PickerSession, scope_name: &str, pick: bool) -> Result<()> {
    let scope = resolve_scope(session, scope_name)?;
    let selection = session
        .selection_mut()
        .ok_or_else(|| anyhow!("no page configuration found"))?;
    let changed = if pick {
        selection.pick_all(scope)
    } else {
        selection.unpick_all(scope)
    };
    let counts = selection.tree().scope_counts(scope);
    if changed > 0 {
        warn_if_unsaved(&session.commit_selection());
    }
    let verb = if pick { "picked" } else { "unpicked" };
    println!("{scope_name}: {changed} page(s) {verb} {counts}");
    Ok(())
}

fn warn_if_unsaved(location: &StorageLocation) {
    match location {
        StorageLocation::Project(path) => debug!(path = %path.display(), "selection stored"),
        StorageLocation::Fallback(path) => {
            eprintln!("note: selection stored outside the project at {}", path.display())
        }
        StorageLocation::Unsaved => eprintln!("warning: selection could not be stored"),
    }
}

fn save(session: &mut PickerSession, json: bool) -> Result<()> {
    require_loaded(session)?;
    let report = session.save().context("save entry configuration")?;
    if json {
        let storage = match &report.storage {
            StorageLocation::Project(path) | StorageLocation::Fallback(path) => Some(path.clone()),
            StorageLocation::Unsaved => None,
        };
        let payload = json!({
            "entryFile": report.entry_file,
            "pages": report.pages,
            "subPackages": report.sub_packages,
            "storage": storage,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    warn_if_unsaved(&report.storage);
    println!(
        "wrote {} page(s) and {} sub-package(s) to {}",
        report.pages,
        report.sub_packages,
        report.entry_file.display()
    );
    Ok(())
}

fn reload(session: &mut PickerSession, json: bool) -> Result<()> {
    let loaded = session.reload();
    let summary = session
        .selection()
        .map(|selection| selection.counts().to_string());
    if json {
        let payload = json!({
            "loaded": loaded,
            "entryFile": session.entry_file(),
            "summary": summary,
            "status": session.status(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if let Some(entry) = session.entry_file() {
        println!("{}", entry.display());
    }
    if let Some(summary) = summary {
        println!("picked {summary}");
    }
    if let Some(status) = session.status() {
        println!("{status}");
    }
    Ok(())
}

fn revert(session: &mut PickerSession) -> Result<()> {
    match session.revert().context("revert entry file")? {
        RevertOutcome::Reverted(path) => println!("restored {}", path.display()),
        RevertOutcome::NothingToRevert(reason) => {
            let message = match reason {
                RevertSkip::NoEntryFile => "no entry file found",
                RevertSkip::NoBackup => "no original entry file is stored",
                RevertSkip::BackupIsGenerated => "the stored original is itself generated",
                RevertSkip::EntryNotGenerated => "the entry file is not generated",
            };
            println!("nothing to revert: {message}");
        }
    }
    Ok(())
}

fn locate(session: &PickerSession, id: &str) -> Result<()> {
    let page = find_page(session, id)?;
    let path = session
        .locate_page(page)
        .ok_or_else(|| anyhow!("no source file found for `{id}`"))?;
    println!("{}", path.display());
    Ok(())
}

fn watch(session: &mut PickerSession) -> Result<()> {
    let mut entry = session
        .entry_file()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("{}", session.status().unwrap_or("no entry file found")))?;
    let mut monitor = EntryFileMonitor::new(&entry)
        .with_context(|| format!("watch {}", entry.display()))?;
    println!("watching {}", entry.display());

    loop {
        let event = monitor.recv()?;
        std::thread::sleep(WATCH_DEBOUNCE);
        let event = monitor.drain().unwrap_or(event);
        info!(?event, entry = %entry.display(), "entry file event");

        let reaction = match event {
            EntryFileEvent::Changed => session.on_entry_file_changed(),
            EntryFileEvent::Removed => {
                session.reload();
                EntryFileReaction::Reloaded
            }
        };
        match reaction {
            EntryFileReaction::Reloaded => match session.selection() {
                Some(selection) => println!("reloaded: picked {}", selection.counts()),
                None => println!("{}", session.status().unwrap_or("no page configuration found")),
            },
            EntryFileReaction::GeneratedFileEdited => println!(
                "entry file is generated; hand edits are overwritten by the next save (run `page-picker revert` first)"
            ),
            EntryFileReaction::Unchanged => {}
        }

        if let Some(current) = session.entry_file() {
            if current != entry {
                entry = current.to_path_buf();
                monitor = EntryFileMonitor::new(&entry)
                    .with_context(|| format!("watch {}", entry.display()))?;
                println!("watching {}", entry.display());
            }
        }
    }
}

fn execute_settings_command(command: SettingsCommand, project: &Path, json: bool) -> Result<()> {
    let mut store = load_settings(project)?;
    match command {
        SettingsCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.settings())?);
            } else {
                let settings = store.settings();
                println!("settings file: {}", store.path().display());
                println!("source_dir: {}", settings.source_dir);
                println!("suffixes: {}", settings.suffixes.join(", "));
                let layouts: Vec<&str> = settings.layouts.iter().map(|layout| layout.stem()).collect();
                println!("entry stems: {}", layouts.join(", "));
                println!("storage: {}", settings.storage_path(project).display());
                println!("marker_flag: {}", settings.marker_flag);
                println!("show_picked_only: {}", settings.show_picked_only);
            }
        }
        SettingsCommand::PickedOnly { value } => {
            store
                .update(|settings| settings.show_picked_only = value)
                .context("save settings")?;
            println!("show_picked_only: {value}");
        }
    }
    Ok(())
}
