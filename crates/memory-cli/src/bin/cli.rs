//! `memory` CLI
//!
//! Command-line interface for the local knowledge store.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use memory_core::config::Config;
use memory_core::embeddings::{EmbeddingCache, EmbeddingProvider, StubEmbeddingProvider};
use memory_core::graph::Graph;
use memory_core::index::Index;
use memory_core::scope::ScopeResolver;
use memory_core::store::{ListFilter, SortBy, SortOrder, Store, WriteRequest};
use memory_core::{Direction, IndexEntry, Memory, MemoryError, MemoryType, Result, Scope, Severity};

/// Memory — local knowledge store for programming sessions.
#[derive(Parser)]
#[command(name = "memory")]
#[command(author = "Claude Memory Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the project's local memory store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Storage tier to operate on. Defaults to the config/context default.
    #[arg(long, global = true)]
    scope: Option<String>,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    List,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a memory
    Write {
        /// Title of the memory
        title: String,
        /// Memory type: decision, learning, artifact, gotcha, breadcrumb, hub
        #[arg(long = "type")]
        memory_type: String,
        /// Body text; read from stdin if omitted
        #[arg(long)]
        body: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Severity: critical, high, medium, low (gotcha memories)
        #[arg(long)]
        severity: Option<String>,
        /// Comma-separated source references
        #[arg(long)]
        source: Option<String>,
        /// Existing id to update instead of creating a new memory
        #[arg(long)]
        id: Option<String>,
    },

    /// Read a memory by id
    Read { id: String },

    /// List memories
    List {
        #[arg(long = "type")]
        memory_type: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long = "sort-by", default_value = "updated")]
        sort_by: String,
        #[arg(long = "sort-order", default_value = "desc")]
        sort_order: String,
    },

    /// Delete a memory
    Delete {
        id: String,
        /// Skip the "not fully cleaned up" warning exit code
        #[arg(long)]
        force: bool,
    },

    /// Keyword search over title, tags, and body
    Search {
        query: String,
        #[arg(long = "type")]
        memory_type: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Embedding-based semantic search
    Semantic {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Link two memories
    Link {
        a: String,
        b: String,
        #[arg(long, default_value = "relates-to")]
        label: String,
        #[arg(long = "reverse-label")]
        reverse_label: Option<String>,
    },

    /// Remove the link(s) between two memories
    Unlink { a: String, b: String },

    /// List the graph edges touching a memory
    Edges {
        id: String,
        #[arg(long, default_value = "both")]
        direction: String,
    },

    /// Expand the graph from a memory up to a hop depth
    Graph {
        id: String,
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },

    /// Suggest links for a memory via semantic similarity
    SuggestLinks {
        id: String,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Report store health: orphan index entries, dangling graph edges, duplicates
    Quality,

    /// Repair recoverable store inconsistencies
    Repair {
        /// Apply fixes instead of only reporting them
        #[arg(long)]
        fix: bool,
    },
}

struct Context {
    resolver: ScopeResolver,
    config: Config,
}

impl Context {
    fn requested_scope(&self, raw: &Option<String>) -> Result<Option<Scope>> {
        match raw {
            None => Ok(None),
            Some(s) => Scope::from_str(s).map(Some).map_err(MemoryError::Validation),
        }
    }

    fn store_for(&self, requested: Option<Scope>) -> Result<Store> {
        let scope = requested.unwrap_or_else(|| self.resolver.default_scope());
        let root = self.resolver.resolve(Some(scope))?;
        std::fs::create_dir_all(&root).map_err(MemoryError::Filesystem)?;
        Ok(Store::new(root, scope))
    }

    fn scopes_to_search(&self, requested: Option<Scope>) -> Vec<Scope> {
        match requested {
            Some(scope) => vec![scope],
            None => self.resolver.readable_scopes(),
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let ctx = build_context();

    let outcome = run(&cli, &ctx);
    match outcome {
        Ok(warned) => std::process::exit(if warned { 1 } else { 0 }),
        Err(e) => {
            print_error(&e, cli.format);
            std::process::exit(cli_exit_code(&e));
        }
    }
}

fn build_context() -> Context {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let global_root = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".claude").join("memory"))
        .unwrap_or_else(|| cwd.join(".claude-memory-fallback"));
    let enterprise_path = std::env::var("CLAUDE_MEMORY_ENTERPRISE_PATH").ok().map(PathBuf::from);

    Config::seed_from_plugin_root(&global_root);
    let config = Config::load(&global_root.join("config.yaml"));
    Context {
        resolver: ScopeResolver {
            cwd,
            global_root,
            enterprise_enabled: enterprise_path.is_some(),
            enterprise_path,
            configured_default: None,
        },
        config,
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}

/// CLI-specific exit-code mapping (§6): 0 success, 1 warning/fixable issue,
/// 2 protection/validation block, 3 I/O failure. Distinct from the hook
/// dispatcher's allow/warn/block mapping in `memory-cli::hooks`, since the
/// CLI's contract names a fourth code for plain I/O failure.
fn cli_exit_code(e: &MemoryError) -> i32 {
    match e {
        MemoryError::Validation(_)
        | MemoryError::InvalidSchema(_)
        | MemoryError::MalformedHeader { .. }
        | MemoryError::SelfLink(_)
        | MemoryError::DuplicateEdge { .. }
        | MemoryError::GraphNotFound(_)
        | MemoryError::ShapeMismatch { .. }
        | MemoryError::Empty
        | MemoryError::ScopeDisabled(_)
        | MemoryError::ScopeUnavailable(_, _) => 2,

        MemoryError::NotFound(_) | MemoryError::Configuration(_) | MemoryError::Timeout(_) | MemoryError::EmbeddingProvider(_) => 1,

        MemoryError::Filesystem(_) | MemoryError::Parse(_) | MemoryError::Internal(_) => 3,

        _ => 3,
    }
}

fn print_error(e: &MemoryError, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let value = json!({
                "status": "error",
                "error": e.to_string(),
                "details": { "class": format!("{:?}", e.class()) },
            });
            println!("{}", serde_json::to_string_pretty(&value).unwrap());
        }
        _ => {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
    }
}

fn run(cli: &Cli, ctx: &Context) -> Result<bool> {
    let scope = ctx.requested_scope(&cli.scope)?;
    match &cli.command {
        Commands::Write { title, memory_type, body, tags, severity, source, id } => {
            cmd_write(ctx, cli.format, scope, title, memory_type, body, tags, severity, source, id)
        }
        Commands::Read { id } => cmd_read(ctx, cli.format, scope, id),
        Commands::List { memory_type, tags, limit, offset, sort_by, sort_order } => {
            cmd_list(ctx, cli.format, scope, memory_type, tags, *limit, *offset, sort_by, sort_order)
        }
        Commands::Delete { id, force } => cmd_delete(ctx, cli.format, scope, id, *force),
        Commands::Search { query, memory_type, limit } => cmd_search(ctx, cli.format, scope, query, memory_type, *limit),
        Commands::Semantic { query, limit, threshold } => cmd_semantic(ctx, cli.format, scope, query, *limit, *threshold),
        Commands::Link { a, b, label, reverse_label } => cmd_link(ctx, cli.format, scope, a, b, label, reverse_label),
        Commands::Unlink { a, b } => cmd_unlink(ctx, cli.format, scope, a, b),
        Commands::Edges { id, direction } => cmd_edges(ctx, cli.format, scope, id, direction),
        Commands::Graph { id, depth } => cmd_graph(ctx, cli.format, scope, id, *depth),
        Commands::SuggestLinks { id, threshold, limit } => cmd_suggest_links(ctx, cli.format, scope, id, *threshold, *limit),
        Commands::Quality => cmd_quality(ctx, cli.format, scope),
        Commands::Repair { fix } => cmd_repair(ctx, cli.format, scope, *fix),
    }
}

fn parse_tags(raw: &Option<String>) -> BTreeSet<String> {
    raw.as_ref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn memory_json(m: &Memory) -> serde_json::Value {
    json!({
        "id": m.id,
        "type": m.memory_type.to_string(),
        "title": m.title,
        "tags": m.tags,
        "severity": m.severity.map(|s| s.to_string()),
        "created": m.created,
        "updated": m.updated,
        "links": m.links,
        "source": m.source,
        "body": m.body,
        "scope": m.scope.map(|s| s.to_string()),
    })
}

fn entry_json(e: &IndexEntry) -> serde_json::Value {
    json!({
        "id": e.id,
        "type": e.memory_type.to_string(),
        "title": e.title,
        "tags": e.tags,
        "severity": e.severity.map(|s| s.to_string()),
        "created": e.created,
        "updated": e.updated,
        "scope": e.scope.to_string(),
    })
}

fn print_success(format: OutputFormat, value: serde_json::Value, human: impl FnOnce()) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({"status": "ok", "data": value})).unwrap()),
        _ => human(),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_write(
    ctx: &Context,
    format: OutputFormat,
    scope: Option<Scope>,
    title: &str,
    memory_type: &str,
    body: &Option<String>,
    tags: &Option<String>,
    severity: &Option<String>,
    source: &Option<String>,
    id: &Option<String>,
) -> Result<bool> {
    let memory_type = MemoryType::from_str(memory_type).map_err(MemoryError::Validation)?;
    let severity = severity
        .as_deref()
        .map(Severity::from_str)
        .transpose()
        .map_err(MemoryError::Validation)?;

    let body = match body {
        Some(b) => b.clone(),
        None => read_stdin_body(),
    };

    let store = ctx.store_for(scope)?;
    let git_root = ctx.resolver.git_root();
    let memory = store.write(
        WriteRequest {
            id: id.clone(),
            memory_type,
            title: title.to_string(),
            body,
            tags: parse_tags(tags),
            severity,
            links: Default::default(),
            source: source.clone(),
        },
        git_root.as_deref(),
    )?;

    print_success(format, memory_json(&memory), || {
        println!("{} {} ({})", "wrote".green().bold(), memory.title, memory.id);
    });
    Ok(false)
}

fn read_stdin_body() -> String {
    use std::io::{IsTerminal, Read};
    if std::io::stdin().is_terminal() {
        return String::new();
    }
    let mut buf = String::new();
    let _ = std::io::stdin().read_to_string(&mut buf);
    buf
}

fn cmd_read(ctx: &Context, format: OutputFormat, scope: Option<Scope>, id: &str) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let memory = store.read(id)?;
    print_success(format, memory_json(&memory), || {
        println!("{} {}", memory.title.bold(), format!("({})", memory.id).dimmed());
        println!("{}: {}", "type".cyan(), memory.memory_type);
        if !memory.tags.is_empty() {
            println!("{}: {}", "tags".cyan(), memory.tags.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        println!();
        println!("{}", memory.body);
    });
    Ok(false)
}

#[allow(clippy::too_many_arguments)]
fn cmd_list(
    ctx: &Context,
    format: OutputFormat,
    scope: Option<Scope>,
    memory_type: &Option<String>,
    tags: &Option<String>,
    limit: usize,
    offset: usize,
    sort_by: &str,
    sort_order: &str,
) -> Result<bool> {
    let memory_type = memory_type.as_deref().map(MemoryType::from_str).transpose().map_err(MemoryError::Validation)?;
    let sort_by = match sort_by {
        "created" => SortBy::Created,
        "title" => SortBy::Title,
        _ => SortBy::Updated,
    };
    let sort_order = match sort_order {
        "asc" | "ascending" => SortOrder::Ascending,
        _ => SortOrder::Descending,
    };
    let tag_list: Vec<String> = tags
        .as_ref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let entries = match scope {
        Some(s) => {
            let store = ctx.store_for(Some(s))?;
            let filter = ListFilter {
                memory_type,
                tags: tag_list,
                scope: None,
                sort_by: Some(sort_by),
                sort_order: Some(sort_order),
                limit: Some(limit),
                offset: Some(offset),
            };
            store.list(&filter)
        }
        None => {
            let mut all: Vec<IndexEntry> = ctx.resolver.merge();
            all.retain(|e| memory_type.is_none_or(|t| e.memory_type == t));
            all.retain(|e| tag_list.is_empty() || tag_list.iter().any(|t| e.tags.contains(t)));
            let total = all.len();
            all.sort_by(|a, b| {
                let ordering = match sort_by {
                    SortBy::Created => a.created.cmp(&b.created),
                    SortBy::Updated => a.updated.cmp(&b.updated),
                    SortBy::Title => a.title.cmp(&b.title),
                };
                match sort_order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
            let entries = all.into_iter().skip(offset).take(limit).collect();
            memory_core::store::ListResult { entries, total }
        }
    };

    print_success(
        format,
        json!({ "total": entries.total, "entries": entries.entries.iter().map(entry_json).collect::<Vec<_>>() }),
        || {
            println!("{} ({} total)", "memories".bold(), entries.total);
            for e in &entries.entries {
                println!(
                    "  {} {} {} [{}]",
                    format!("{}", e.memory_type).cyan(),
                    e.title,
                    format!("({})", e.id).dimmed(),
                    e.scope
                );
            }
        },
    );
    Ok(false)
}

fn cmd_delete(ctx: &Context, format: OutputFormat, scope: Option<Scope>, id: &str, force: bool) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let report = store.delete(id);
    let warned = !report.is_ok() && !force;
    print_success(
        format,
        json!({
            "id": id,
            "ok": report.is_ok(),
            "errors": report.errors.iter().map(|e| json!({"step": e.step, "message": e.message})).collect::<Vec<_>>(),
        }),
        || {
            if report.is_ok() {
                println!("{} {}", "deleted".green().bold(), id);
            } else {
                println!("{} {} (with warnings)", "deleted".yellow().bold(), id);
                for e in &report.errors {
                    println!("  {}: {}", e.step, e.message);
                }
            }
        },
    );
    Ok(warned)
}

fn load_memory(ctx: &Context, entry: &IndexEntry) -> Result<Memory> {
    let root = ctx.resolver.resolve(Some(entry.scope))?;
    Store::new(root, entry.scope).read(&entry.id)
}

fn cmd_search(ctx: &Context, format: OutputFormat, scope: Option<Scope>, query: &str, memory_type: &Option<String>, limit: usize) -> Result<bool> {
    let memory_type = memory_type.as_deref().map(MemoryType::from_str).transpose().map_err(MemoryError::Validation)?;
    let needle = query.to_lowercase();

    let mut candidates: Vec<IndexEntry> = entries_in_scopes(ctx, scope);
    candidates.retain(|e| memory_type.is_none_or(|t| e.memory_type == t));

    let mut matches = Vec::new();
    for entry in &candidates {
        let Ok(memory) = load_memory(ctx, entry) else { continue };
        let hit = memory.title.to_lowercase().contains(&needle)
            || memory.body.to_lowercase().contains(&needle)
            || memory.tags.iter().any(|t| t.to_lowercase().contains(&needle));
        if hit {
            matches.push(memory);
        }
        if matches.len() >= limit {
            break;
        }
    }

    print_success(
        format,
        json!({ "query": query, "results": matches.iter().map(memory_json).collect::<Vec<_>>() }),
        || {
            println!("{} matches for {:?}", matches.len(), query);
            for m in &matches {
                println!("  {} {} {}", format!("{}", m.memory_type).cyan(), m.title, format!("({})", m.id).dimmed());
            }
        },
    );
    Ok(false)
}

fn entries_in_scopes(ctx: &Context, scope: Option<Scope>) -> Vec<IndexEntry> {
    match scope {
        Some(s) => {
            let root = match ctx.resolver.resolve(Some(s)) {
                Ok(root) => root,
                Err(_) => return Vec::new(),
            };
            Index::load(&root).all().cloned().collect()
        }
        None => ctx.resolver.merge(),
    }
}

fn embedding_model_name(ctx: &Context) -> String {
    ctx.config.embedding_model.clone().unwrap_or_else(|| "stub".to_string())
}

fn cmd_semantic(ctx: &Context, format: OutputFormat, scope: Option<Scope>, query: &str, limit: usize, threshold: Option<f32>) -> Result<bool> {
    let threshold = threshold.unwrap_or(ctx.config.semantic_threshold);
    let provider = StubEmbeddingProvider::default();
    let model = embedding_model_name(ctx);

    let entries = entries_in_scopes(ctx, scope);
    let mut memories = Vec::new();
    let mut vectors = Vec::new();
    let mut caches_by_scope: std::collections::HashMap<Scope, EmbeddingCache> = std::collections::HashMap::new();

    for entry in &entries {
        let Ok(memory) = load_memory(ctx, entry) else { continue };
        let Ok(root) = ctx.resolver.resolve(Some(entry.scope)) else { continue };
        let cache = caches_by_scope.entry(entry.scope).or_insert_with(|| EmbeddingCache::load(&root));
        let text = format!("{}\n{}", memory.title, memory.body);
        match cache.get(&memory.id, &text, &model, &provider) {
            Ok(v) => {
                vectors.push(v);
                memories.push(memory);
            }
            Err(MemoryError::EmbeddingProvider(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    for (scope, cache) in &caches_by_scope {
        if let Ok(root) = ctx.resolver.resolve(Some(*scope)) {
            cache.save(&root)?;
        }
    }

    let query_vec = provider.embed(query)?;
    let neighbors = memory_core::similarity::knn(&query_vec, &vectors, limit, threshold, &[])?;

    let results: Vec<&Memory> = neighbors.iter().map(|n| &memories[n.index]).collect();
    print_success(
        format,
        json!({
            "query": query,
            "results": neighbors.iter().map(|n| json!({
                "memory": memory_json(&memories[n.index]),
                "similarity": n.similarity,
            })).collect::<Vec<_>>(),
        }),
        || {
            println!("{} semantic matches for {:?}", results.len(), query);
            for (n, m) in neighbors.iter().zip(results.iter()) {
                println!("  {:.3} {} {}", n.similarity, m.title, format!("({})", m.id).dimmed());
            }
        },
    );
    Ok(false)
}

fn cmd_link(ctx: &Context, format: OutputFormat, scope: Option<Scope>, a: &str, b: &str, label: &str, reverse_label: &Option<String>) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let root = store.root().to_path_buf();
    let known = store.known_ids();
    let mut graph = Graph::load(&root);
    graph.link(a, b, label, reverse_label.as_deref(), &known)?;
    graph.save(&root)?;

    print_success(format, json!({"a": a, "b": b, "label": label}), || {
        println!("{} {} -> {} ({})", "linked".green().bold(), a, b, label);
    });
    Ok(false)
}

fn cmd_unlink(ctx: &Context, format: OutputFormat, scope: Option<Scope>, a: &str, b: &str) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let root = store.root().to_path_buf();
    let mut graph = Graph::load(&root);
    graph.unlink(a, b);
    graph.save(&root)?;

    print_success(format, json!({"a": a, "b": b}), || {
        println!("{} {} -- {}", "unlinked".green().bold(), a, b);
    });
    Ok(false)
}

fn cmd_edges(ctx: &Context, format: OutputFormat, scope: Option<Scope>, id: &str, direction: &str) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let root = store.root().to_path_buf();
    let direction = match direction {
        "out" => Direction::Out,
        "in" => Direction::In,
        _ => Direction::Both,
    };
    let graph = Graph::load(&root);
    let edges = graph.edges(id, direction);

    print_success(
        format,
        json!({"id": id, "edges": edges.iter().map(|e| json!({"target": e.target, "label": e.label})).collect::<Vec<_>>()}),
        || {
            println!("{} edges for {}", edges.len(), id);
            for e in &edges {
                println!("  {} {}", e.label.cyan(), e.target);
            }
        },
    );
    Ok(false)
}

fn cmd_graph(ctx: &Context, format: OutputFormat, scope: Option<Scope>, id: &str, depth: usize) -> Result<bool> {
    let store = ctx.store_for(scope)?;
    let root = store.root().to_path_buf();
    let graph = Graph::load(&root);
    let expanded = graph.expand(id, depth);

    print_success(
        format,
        json!({
            "root": id,
            "nodes": expanded.nodes.iter().map(|(id, hops)| json!({"id": id, "hops": hops})).collect::<Vec<_>>(),
            "edges": expanded.edges.iter().map(|(source, e)| json!({"source": source, "target": e.target, "label": e.label})).collect::<Vec<_>>(),
        }),
        || {
            println!("{} nodes reachable from {} within {} hops", expanded.nodes.len(), id, depth);
            for (node, hops) in &expanded.nodes {
                println!("  {} (hop {})", node, hops);
            }
        },
    );
    Ok(false)
}

fn cmd_suggest_links(ctx: &Context, format: OutputFormat, scope: Option<Scope>, id: &str, threshold: Option<f32>, limit: usize) -> Result<bool> {
    let threshold = threshold.unwrap_or(ctx.config.semantic_threshold);
    let store = ctx.store_for(scope)?;
    let target = store.read(id)?;

    let provider = StubEmbeddingProvider::default();
    let model = embedding_model_name(ctx);
    let mut cache = EmbeddingCache::load(store.root());

    let entries = store.list(&ListFilter::default());
    let mut others = Vec::new();
    let mut vectors = Vec::new();
    for entry in &entries.entries {
        if entry.id == target.id {
            continue;
        }
        let Ok(memory) = store.read(&entry.id) else { continue };
        let text = format!("{}\n{}", memory.title, memory.body);
        let v = cache.get(&memory.id, &text, &model, &provider)?;
        vectors.push(v);
        others.push(memory);
    }
    cache.save(store.root())?;

    let target_text = format!("{}\n{}", target.title, target.body);
    let target_vec = cache.get(&target.id, &target_text, &model, &provider)?;
    cache.save(store.root())?;

    let neighbors = memory_core::similarity::knn(&target_vec, &vectors, limit, threshold, &[])?;

    print_success(
        format,
        json!({
            "id": id,
            "suggestions": neighbors.iter().map(|n| json!({
                "memory": memory_json(&others[n.index]),
                "similarity": n.similarity,
            })).collect::<Vec<_>>(),
        }),
        || {
            println!("{} suggested links for {}", neighbors.len(), id);
            for n in &neighbors {
                println!("  {:.3} {} {}", n.similarity, others[n.index].title, format!("({})", others[n.index].id).dimmed());
            }
        },
    );
    Ok(false)
}

struct QualityReport {
    orphan_entries: Vec<(Scope, String)>,
    dangling_edges: usize,
    duplicate_pairs: Vec<(Scope, String, String, f32)>,
    /// Mean embedding cohesion across scopes with enough memories to judge
    /// (`None` when every scope had fewer than two embeddable memories).
    health_score: Option<f32>,
}

/// Parallel `(ids, vectors)` for every non-orphaned entry in one scope's
/// index that embeds successfully, skipping any whose body embeds to an
/// error (e.g. empty) rather than failing the whole pass.
fn embed_scope(
    root: &std::path::Path,
    scope: Scope,
    index: &Index,
    model: &str,
    provider: &dyn EmbeddingProvider,
    cache: &mut EmbeddingCache,
) -> (Vec<String>, Vec<Vec<f32>>) {
    let mut ids = Vec::new();
    let mut vectors = Vec::new();
    for entry in index.all() {
        if !root.join(&entry.relative_path).is_file() {
            continue;
        }
        let Ok(memory) = Store::new(root.to_path_buf(), scope).read(&entry.id) else { continue };
        let text = format!("{}\n{}", memory.title, memory.body);
        match cache.get(&memory.id, &text, model, provider) {
            Ok(v) => {
                vectors.push(v);
                ids.push(memory.id);
            }
            Err(_) => continue,
        }
    }
    (ids, vectors)
}

fn assess_quality(ctx: &Context, scopes: &[Scope]) -> Result<QualityReport> {
    let mut orphan_entries = Vec::new();
    let mut dangling_edges = 0;
    let mut duplicate_pairs = Vec::new();
    let mut cohesion_scores = Vec::new();

    let provider = StubEmbeddingProvider::default();
    let model = embedding_model_name(ctx);

    for &scope in scopes {
        let Ok(root) = ctx.resolver.resolve(Some(scope)) else { continue };
        let index = Index::load(&root);
        let known: HashSet<String> = index.ids();

        for entry in index.all() {
            if !root.join(&entry.relative_path).is_file() {
                orphan_entries.push((scope, entry.id.clone()));
            }
        }

        let graph = Graph::load(&root);
        let mut check = graph.clone();
        dangling_edges += check.prune_dangling(&known);

        let mut cache = EmbeddingCache::load(&root);
        let (ids, vectors) = embed_scope(&root, scope, &index, &model, &provider, &mut cache);
        let _ = cache.save(&root);

        // Fast path activates once the scope's embeddable collection grows
        // past `lsh_collection_threshold`, per §4.8.
        let pairs = if vectors.len() as u32 >= ctx.config.lsh_collection_threshold {
            let lsh_config = memory_core::similarity::lsh::LshConfig::from_config(&ctx.config);
            memory_core::similarity::lsh::duplicates(&vectors, ctx.config.duplicate_threshold, lsh_config)?
        } else {
            memory_core::similarity::duplicates(&vectors, ctx.config.duplicate_threshold)?
        };
        for pair in pairs {
            duplicate_pairs.push((scope, ids[pair.a].clone(), ids[pair.b].clone(), pair.similarity));
        }

        if vectors.len() >= 2 {
            let k = 5.min(vectors.len() - 1);
            let mut sum = 0.0;
            for (i, v) in vectors.iter().enumerate() {
                let others: Vec<Vec<f32>> =
                    vectors.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, v)| v.clone()).collect();
                sum += memory_core::similarity::avg_knn(v, &others, k)?;
            }
            cohesion_scores.push(sum / vectors.len() as f32);
        }
    }

    let health_score = if cohesion_scores.is_empty() {
        None
    } else {
        Some(cohesion_scores.iter().sum::<f32>() / cohesion_scores.len() as f32)
    };

    Ok(QualityReport { orphan_entries, dangling_edges, duplicate_pairs, health_score })
}

fn cmd_quality(ctx: &Context, format: OutputFormat, scope: Option<Scope>) -> Result<bool> {
    let scopes = ctx.scopes_to_search(scope);
    let report = assess_quality(ctx, &scopes)?;
    let below_health_threshold = report.health_score.is_some_and(|h| h < ctx.config.health_threshold);
    let has_issues = !report.orphan_entries.is_empty()
        || report.dangling_edges > 0
        || !report.duplicate_pairs.is_empty()
        || below_health_threshold;

    print_success(
        format,
        json!({
            "orphan_entries": report.orphan_entries.iter().map(|(s, id)| json!({"scope": s.to_string(), "id": id})).collect::<Vec<_>>(),
            "dangling_edges": report.dangling_edges,
            "duplicate_pairs": report.duplicate_pairs.iter().map(|(s, a, b, sim)| json!({
                "scope": s.to_string(), "a": a, "b": b, "similarity": sim,
            })).collect::<Vec<_>>(),
            "health_score": report.health_score,
            "health_threshold": ctx.config.health_threshold,
        }),
        || {
            if has_issues {
                println!("{}", "issues found".yellow().bold());
            } else {
                println!("{}", "no issues found".green().bold());
            }
            for (scope, id) in &report.orphan_entries {
                println!("  {} orphan index entry: {} ({})", "!".yellow(), id, scope);
            }
            if report.dangling_edges > 0 {
                println!("  {} {} dangling graph edge(s)", "!".yellow(), report.dangling_edges);
            }
            for (scope, a, b, sim) in &report.duplicate_pairs {
                println!("  {} possible duplicate ({:.3}): {} <-> {} ({})", "!".yellow(), sim, a, b, scope);
            }
            if let Some(score) = report.health_score {
                if below_health_threshold {
                    println!("  {} health score {:.2} is below threshold {:.2}", "!".yellow(), score, ctx.config.health_threshold);
                }
            }
            println!();
            println!("run `memory repair --fix` to clean these up");
        },
    );
    Ok(has_issues)
}

fn cmd_repair(ctx: &Context, format: OutputFormat, scope: Option<Scope>, fix: bool) -> Result<bool> {
    let scopes = ctx.scopes_to_search(scope);
    let mut fixed_entries = 0;
    let mut fixed_edges = 0;

    for &scope in &scopes {
        let root = ctx.resolver.resolve(Some(scope))?;
        let mut index = Index::load(&root);
        let known: HashSet<String> = index.ids();

        let orphans: Vec<String> = index
            .all()
            .filter(|e| !root.join(&e.relative_path).is_file())
            .map(|e| e.id.clone())
            .collect();

        if fix {
            for id in &orphans {
                index.remove(id);
            }
            if !orphans.is_empty() {
                index.save(&root)?;
            }
        }
        fixed_entries += orphans.len();

        let mut graph = Graph::load(&root);
        let removed = if fix {
            let removed = graph.prune_dangling(&known);
            if removed > 0 {
                graph.save(&root)?;
            }
            removed
        } else {
            graph.clone().prune_dangling(&known)
        };
        fixed_edges += removed;
    }

    let had_issues = fixed_entries > 0 || fixed_edges > 0;
    print_success(
        format,
        json!({
            "applied": fix,
            "orphan_entries_removed": fixed_entries,
            "dangling_edges_removed": fixed_edges,
        }),
        || {
            let verb = if fix { "repaired" } else { "would repair" };
            println!("{} {} orphan index entr{}, {} dangling edge(s)", verb, fixed_entries, if fixed_entries == 1 { "y" } else { "ies" }, fixed_edges);
        },
    );
    Ok(had_issues && !fix)
}
