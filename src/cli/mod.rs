//! # CLI Module
//!
//! Command-line interface for the media catalog.
//!
//! ## Usage
//! ```bash
//! # Index a directory (the root is remembered for next time)
//! media-catalog scan ~/Pictures
//! media-catalog scan
//!
//! # Page through records carrying every listed tag
//! media-catalog list --tag beach --tag 2024 --limit 50
//!
//! # Any of the tags, as JSON
//! media-catalog list --tag beach --tag lake --any --output json
//!
//! # Tagging
//! media-catalog tag add 42 beach sunset
//! media-catalog tags
//!
//! # Exact duplicates, or images that look like record 42
//! media-catalog dupes
//! media-catalog dupes --similar-to 42 --distance 6
//!
//! # Keep a root indexed while files change
//! media-catalog watch ~/Pictures
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use crossbeam_channel::RecvTimeoutError;
use indicatif::{ProgressBar, ProgressStyle};
use media_catalog::config::AppSettings;
use media_catalog::core::catalog::{CatalogStore, MediaOrder, MediaQuery, QueryPage};
use media_catalog::core::fingerprint::{FingerprintConfig, Fingerprinter};
use media_catalog::core::media::{normalize_path, MediaId, MediaRecord};
use media_catalog::core::scanner::{
    IncrementalScanner, ScanConfig, ScanController, ScanSummary,
};
use media_catalog::core::thumbcache::{ThumbnailCache, ThumbnailCacheConfig};
use media_catalog::core::watcher::{FolderWatcher, WatcherConfig};
use media_catalog::error::{ConfigError, Result, ScanError, StoreError};
use media_catalog::events::{
    null_sender, Event, EventChannel, EventSender, ScanEvent, ThumbnailEvent, WatcherEvent,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long `warm` waits for any single thumbnail event
const WARM_EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Media Catalog - index, tag and browse large media folders
#[derive(Parser, Debug)]
#[command(name = "media-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Settings file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Incrementally index a directory
    Scan {
        /// Directory to scan (defaults to the last scanned root)
        root: Option<PathBuf>,

        /// Write thumbnails here instead of <root>/thumbnails
        #[arg(long)]
        thumbnails: Option<PathBuf>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,
    },

    /// Page through active records
    List {
        /// Required tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Match any listed tag instead of all of them
        #[arg(long)]
        any: bool,

        /// Case-insensitive file name substring
        #[arg(short, long)]
        search: Option<String>,

        /// Only records under this root
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long, default_value = "200")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(long, default_value = "modified")]
        order: Order,
    },

    /// Change the tags on one record
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Show every tag with its record count
    Tags,

    /// Remove a tag from every record
    Untag {
        tag: String,
    },

    /// Find exact duplicates, or images similar to one record
    Dupes {
        /// Probe record for a near-duplicate search
        #[arg(long)]
        similar_to: Option<MediaId>,

        /// Maximum differing pHash bits (0-64)
        #[arg(long, default_value = "8")]
        distance: u32,

        /// Only records under this root
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Decode thumbnails for the first page of records
    Warm {
        /// Grid cell edge in pixels (defaults to the saved thumbnail size)
        #[arg(long)]
        size: Option<u32>,

        #[arg(long, default_value = "200")]
        limit: usize,
    },

    /// Rescan a directory whenever its media changes
    Watch {
        /// Directory to watch (defaults to the last scanned root)
        root: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    /// Add tags to a record
    Add { id: MediaId, tags: Vec<String> },
    /// Remove tags from a record
    Remove { id: MediaId, tags: Vec<String> },
    /// Replace a record's tags
    Set { id: MediaId, tags: Vec<String> },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    /// Newest modification first
    Modified,
    /// Oldest modification first
    ModifiedAsc,
    /// File name A-Z
    Name,
    /// File name Z-A
    NameDesc,
    /// Newest capture time first
    Captured,
    /// Largest first
    Size,
}

impl From<Order> for MediaOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Modified => MediaOrder::ModifiedDesc,
            Order::ModifiedAsc => MediaOrder::ModifiedAsc,
            Order::Name => MediaOrder::NameAsc,
            Order::NameDesc => MediaOrder::NameDesc,
            Order::Captured => MediaOrder::CapturedDesc,
            Order::Size => MediaOrder::SizeDesc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Resolved global options
struct Context {
    db_path: PathBuf,
    config_path: PathBuf,
    output: OutputFormat,
    term: Term,
}

impl Context {
    fn open_store(&self) -> Result<CatalogStore> {
        Ok(CatalogStore::open(&self.db_path)?)
    }

    fn load_settings(&self) -> Result<AppSettings> {
        Ok(AppSettings::load(&self.config_path)?)
    }

    fn pretty(&self) -> bool {
        matches!(self.output, OutputFormat::Pretty)
    }

    fn line(&self, text: impl AsRef<str>) {
        self.term.write_line(text.as_ref()).ok();
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context {
        db_path: cli.db.unwrap_or_else(AppSettings::default_database_path),
        config_path: cli.config.unwrap_or_else(AppSettings::default_path),
        output: cli.output,
        term: Term::stderr(),
    };

    match cli.command {
        Commands::Scan {
            root,
            thumbnails,
            include_hidden,
        } => run_scan(&ctx, root, thumbnails, include_hidden),
        Commands::List {
            tags,
            any,
            search,
            root,
            limit,
            offset,
            order,
        } => {
            let mut query = if any {
                MediaQuery::default().with_any_tags(&tags)
            } else {
                MediaQuery::default().with_all_tags(&tags)
            };
            query = query.with_page(limit, offset).with_order(order.into());
            if let Some(search) = search {
                query = query.with_search(search);
            }
            if let Some(root) = root {
                query = query.with_root(root);
            }
            run_list(&ctx, &query)
        }
        Commands::Tag { action } => run_tag(&ctx, action),
        Commands::Tags => run_tags(&ctx),
        Commands::Untag { tag } => run_untag(&ctx, &tag),
        Commands::Dupes {
            similar_to,
            distance,
            root,
        } => run_dupes(&ctx, similar_to, distance, root.as_deref()),
        Commands::Warm { size, limit } => run_warm(&ctx, size, limit),
        Commands::Watch { root } => run_watch(&ctx, root),
    }
}

/// Explicit root, else the remembered one, absolute and normalized
fn resolve_root(settings: &AppSettings, root: Option<PathBuf>) -> Result<PathBuf> {
    root.or_else(|| settings.last_root_dir().map(Path::to_path_buf))
        .map(|root| normalize_path(&root))
        .ok_or_else(|| ConfigError::NoLastRoot.into())
}

fn build_scanner(
    store: Arc<CatalogStore>,
    thumbnails: Option<PathBuf>,
    include_hidden: bool,
    events: EventSender,
) -> IncrementalScanner {
    let config = ScanConfig {
        thumbnails_dir: thumbnails,
        include_hidden,
        ..Default::default()
    };
    IncrementalScanner::new(store, Fingerprinter::new(FingerprintConfig::default()), config)
        .with_events(events)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

fn run_scan(
    ctx: &Context,
    root: Option<PathBuf>,
    thumbnails: Option<PathBuf>,
    include_hidden: bool,
) -> Result<()> {
    let mut settings = ctx.load_settings()?;
    let root = resolve_root(&settings, root)?;

    if ctx.pretty() {
        ctx.line(format!(
            "{} {}",
            style("Media Catalog").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ));
        ctx.line(format!("Scanning {}", style(root.display()).bold()));
        ctx.line("");
    }

    let store = Arc::new(ctx.open_store()?);
    let (sender, receiver) = EventChannel::new();
    let controller = ScanController::new(build_scanner(store, thumbnails, include_hidden, sender));

    let progress = ctx.pretty().then(progress_bar);

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress.as_ref() else {
                continue;
            };
            match event {
                Event::Scan(ScanEvent::Started { total_files, .. }) => {
                    pb.set_length(total_files as u64);
                }
                Event::Scan(ScanEvent::Progress(p)) => {
                    pb.set_position(p.current as u64);
                    pb.set_message(
                        p.current_path
                            .file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .into_owned(),
                    );
                }
                Event::Scan(ScanEvent::FileFailed { path, message }) => {
                    pb.println(format!("  {} {}: {}", style("!").yellow(), path.display(), message));
                }
                Event::Scan(ScanEvent::Finished(_)) | Event::Scan(ScanEvent::Cancelled(_)) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    controller.start(&root)?;
    let outcome = controller.wait();

    // Dropping the controller drops the last event sender
    drop(controller);
    event_thread.join().ok();

    let summary = match outcome {
        Some(result) => result?,
        None => return Err(ScanError::RootNotFound { path: root }.into()),
    };

    settings.set_last_root_dir(&root);
    settings.save(&ctx.config_path)?;

    match ctx.output {
        OutputFormat::Pretty => print_scan_summary(ctx, &summary),
        OutputFormat::Json => print_json(&summary),
    }
    Ok(())
}

fn print_scan_summary(ctx: &Context, summary: &ScanSummary) {
    let headline = if summary.cancelled {
        format!("{} Scan Cancelled", style("■").yellow().bold())
    } else {
        format!("{} Scan Complete", style("✓").green().bold())
    };
    ctx.line(headline);
    ctx.line("");
    ctx.line(format!(
        "  {} files scanned in {:.1}s",
        style(summary.scanned).cyan(),
        summary.duration_ms as f64 / 1000.0
    ));
    ctx.line(format!(
        "  {} added or updated",
        style(summary.added_or_updated).cyan()
    ));
    ctx.line(format!("  {} unchanged", style(summary.skipped).dim()));
    if summary.repaired > 0 {
        ctx.line(format!("  {} thumbnails repaired", style(summary.repaired).cyan()));
    }
    if summary.marked_deleted > 0 {
        ctx.line(format!(
            "  {} missing files marked deleted",
            style(summary.marked_deleted).yellow()
        ));
    }
    if summary.errors > 0 {
        ctx.line(format!("  {} errors", style(summary.errors).red()));
    }
}

fn run_list(ctx: &Context, query: &MediaQuery) -> Result<()> {
    let store = ctx.open_store()?;
    let page = store.query(query)?;

    match ctx.output {
        OutputFormat::Pretty => print_page(ctx, &store, &page)?,
        OutputFormat::Json => print_json(&page),
    }
    Ok(())
}

fn print_page(ctx: &Context, store: &CatalogStore, page: &QueryPage) -> Result<()> {
    if page.records.is_empty() {
        ctx.line(format!("  {}", style("No matching media").dim()));
        return Ok(());
    }

    for record in &page.records {
        let tags = store.tags_for(record.id)?;
        println!(
            "{:>7}  {:<5}  {:>9}  {}{}",
            style(record.id).cyan(),
            record.media_type.as_str(),
            record.size_bytes.map(format_bytes).unwrap_or_default(),
            display_path(&record.file_path),
            if tags.is_empty() {
                String::new()
            } else {
                format!("  {}", style(format!("[{}]", tags.join(", "))).yellow())
            }
        );
    }

    ctx.line("");
    ctx.line(format!(
        "  {} of {} records",
        style(page.records.len()).cyan(),
        style(page.total_count).cyan()
    ));
    Ok(())
}

fn run_tag(ctx: &Context, action: TagAction) -> Result<()> {
    let store = ctx.open_store()?;
    let (id, tags) = match &action {
        TagAction::Add { id, tags } | TagAction::Remove { id, tags } | TagAction::Set { id, tags } => {
            (*id, tags)
        }
    };

    if store.get_by_id(id)?.is_none() {
        return Err(StoreError::MediaNotFound { id }.into());
    }

    match action {
        TagAction::Add { .. } => store.add_tags(id, tags)?,
        TagAction::Remove { .. } => store.remove_tags(id, tags)?,
        TagAction::Set { .. } => store.set_tags(id, tags)?,
    }

    let current = store.tags_for(id)?;
    match ctx.output {
        OutputFormat::Pretty => {
            ctx.line(format!(
                "{} {} now tagged [{}]",
                style("✓").green().bold(),
                id,
                current.join(", ")
            ));
        }
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "tags": current })),
    }
    Ok(())
}

fn run_tags(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let counts = store.tag_counts()?;
    let untagged = store.untagged_count()?;

    match ctx.output {
        OutputFormat::Pretty => {
            for tag in &counts {
                println!("{:>7}  {}", style(tag.count).cyan(), tag.name);
            }
            println!("{:>7}  {}", style(untagged).dim(), style("(untagged)").dim());
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "tags": counts,
            "untagged": untagged,
        })),
    }
    Ok(())
}

fn run_untag(ctx: &Context, tag: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let removed = store.remove_tag_globally(tag)?;

    match ctx.output {
        OutputFormat::Pretty => ctx.line(format!(
            "{} Removed '{}' from {} records",
            style("✓").green().bold(),
            tag,
            style(removed).cyan()
        )),
        OutputFormat::Json => print_json(&serde_json::json!({ "tag": tag, "removed": removed })),
    }
    Ok(())
}

fn run_dupes(
    ctx: &Context,
    similar_to: Option<MediaId>,
    distance: u32,
    root: Option<&Path>,
) -> Result<()> {
    let store = ctx.open_store()?;

    if let Some(id) = similar_to {
        let matches = store.similar_to(id, distance)?;
        match ctx.output {
            OutputFormat::Pretty => {
                if matches.is_empty() {
                    ctx.line(format!("  {}", style("No similar images found").dim()));
                }
                for m in &matches {
                    println!(
                        "{:>3} bits  {:>7}  {}",
                        style(m.distance).yellow(),
                        style(m.record.id).cyan(),
                        display_path(&m.record.file_path)
                    );
                }
            }
            OutputFormat::Json => print_json(&matches),
        }
        return Ok(());
    }

    let groups = store.exact_duplicates(root)?;
    match ctx.output {
        OutputFormat::Pretty => {
            if groups.is_empty() {
                ctx.line(format!("  {} No exact duplicates", style("✓").green()));
            }
            for (i, group) in groups.iter().enumerate() {
                let wasted: u64 = group
                    .records
                    .iter()
                    .skip(1)
                    .filter_map(|r| r.size_bytes)
                    .sum();
                println!(
                    "{} {} copies, {} reclaimable",
                    style(format!("Group {}:", i + 1)).bold(),
                    group.records.len(),
                    style(format_bytes(wasted)).yellow()
                );
                for record in &group.records {
                    println!("    {:>7}  {}", style(record.id).dim(), display_path(&record.file_path));
                }
            }
        }
        OutputFormat::Json => print_json(&groups),
    }
    Ok(())
}

fn run_warm(ctx: &Context, size: Option<u32>, limit: usize) -> Result<()> {
    let settings = ctx.load_settings()?;
    let size = size.unwrap_or_else(|| settings.thumbnail_size());
    let store = ctx.open_store()?;
    let page = store.query(&MediaQuery::default().with_page(limit, 0))?;

    let (sender, receiver) = EventChannel::new();
    let cache = ThumbnailCache::new(ThumbnailCacheConfig::default(), sender);
    let records: Vec<&MediaRecord> = page.records.iter().collect();
    for record in &records {
        cache.request_async(record.id, record.thumbnail_path.as_deref(), size);
    }

    let progress = ctx.pretty().then(progress_bar);
    if let Some(pb) = &progress {
        pb.set_length(records.len() as u64);
    }

    let (mut loaded, mut failed) = (0usize, 0usize);
    while loaded + failed < records.len() {
        match receiver.recv_timeout(WARM_EVENT_TIMEOUT) {
            Some(Event::Thumbnail(ThumbnailEvent::Loaded { .. })) => loaded += 1,
            Some(Event::Thumbnail(ThumbnailEvent::Failed { .. })) => failed += 1,
            Some(_) => continue,
            None => break,
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let stats = cache.stats();
    match ctx.output {
        OutputFormat::Pretty => {
            ctx.line(format!(
                "{} {} thumbnails ready at {}px, {} unavailable",
                style("✓").green().bold(),
                style(loaded).cyan(),
                size,
                style(failed).yellow()
            ));
            ctx.line(format!(
                "  {} decode jobs, {} evictions",
                style(stats.jobs_run).dim(),
                style(stats.evictions).dim()
            ));
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "size": size,
            "loaded": loaded,
            "failed": failed,
            "stats": stats,
        })),
    }
    Ok(())
}

fn run_watch(ctx: &Context, root: Option<PathBuf>) -> Result<()> {
    let mut settings = ctx.load_settings()?;
    let root = resolve_root(&settings, root)?;
    let store = Arc::new(ctx.open_store()?);
    let controller = ScanController::new(build_scanner(store, None, false, null_sender()));

    let (tx, rx) = crossbeam_channel::unbounded();
    let config = WatcherConfig {
        ignored_dirs: vec![controller.scanner().config().thumbnails_dir_for(&root)],
        ..Default::default()
    };
    let debounce = config.debounce_duration;
    let mut watcher = FolderWatcher::new(config, move |event| {
        let _ = tx.send(event);
    })?;
    watcher.watch(&root)?;

    ctx.line(format!(
        "{} Watching {}",
        style("●").green(),
        style(root.display()).bold()
    ));
    rescan(ctx, &controller, &root)?;
    settings.set_last_root_dir(&root);
    settings.save(&ctx.config_path)?;

    while let Ok(first) = rx.recv() {
        report_change(ctx, &first);

        // Wait for the burst to settle before rescanning
        loop {
            match rx.recv_timeout(debounce) {
                Ok(event) => report_change(ctx, &event),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }

        rescan(ctx, &controller, &root)?;
    }
    Ok(())
}

fn rescan(ctx: &Context, controller: &ScanController, root: &Path) -> Result<()> {
    controller.start(root)?;
    if let Some(outcome) = controller.wait() {
        let summary = outcome?;
        match ctx.output {
            OutputFormat::Pretty => ctx.line(format!(
                "  {} {} updated, {} deleted, {} errors",
                style("↻").cyan(),
                summary.added_or_updated,
                summary.marked_deleted,
                summary.errors
            )),
            OutputFormat::Json => print_json(&summary),
        }
    }
    Ok(())
}

fn report_change(ctx: &Context, event: &WatcherEvent) {
    if !ctx.pretty() {
        return;
    }
    let line = match event {
        WatcherEvent::MediaAdded { path } => format!("  {} {}", style("+").green(), display_path(path)),
        WatcherEvent::MediaModified { path } => format!("  {} {}", style("~").yellow(), display_path(path)),
        WatcherEvent::MediaRemoved { path } => format!("  {} {}", style("-").red(), display_path(path)),
        WatcherEvent::Error { message } => format!("  {} {}", style("!").red(), message),
        WatcherEvent::Started { .. } | WatcherEvent::Stopped { .. } => return,
    };
    ctx.line(line);
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Show paths under the home directory as `~/...`
fn display_path(path: &Path) -> String {
    dirs::home_dir()
        .and_then(|home| path.strip_prefix(home).ok().map(|rel| format!("~/{}", rel.display())))
        .unwrap_or_else(|| path.display().to_string())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
