use clap::{Parser, Subcommand};
use ogcard::config::{self, RenderConfig};
use ogcard::lifecycle::ArtifactManager;
use ogcard::output;
use ogcard::policy::EntitySnapshot;
use ogcard::registry::TemplateRegistry;
use ogcard::service::PreviewService;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn version_string() -> &'static str {
    let on_tag = env!("OGCARD_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("OGCARD_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "ogcard")]
#[command(about = "Social preview card renderer for content collections")]
#[command(long_about = "\
Social preview card renderer for content collections

Every entity write is checked against its previous snapshot. A 1200×630 PNG
card is rendered only when the entity has none yet, was just published, or
one of its watched fields (title, excerpt, category, color, logo) changed.

Entities are JSON objects:

  {
    \"id\": \"42\",
    \"title\": \"Summer Fades Are Back\",
    \"excerpt\": \"Short on the **sides**, long on style.\",
    \"category\": \"haircut\",
    \"status\": \"published\",
    \"ogImage\": \"/media/generated-og/blog-posts-42-2026-03-01-summer-fades-are-back.png\"
  }

Field fallbacks (first available wins):
  Title:     title → name
  Excerpt:   excerpt → description → first 150 chars of content
  Category:  category → eventType → serviceType
  Logo:      logoUrl → logo.default_ref

Run 'ogcard gen-config' to generate a documented ogcard.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./ogcard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a card unconditionally and print its URL
    Preview {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        excerpt: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    /// Run the write hook for one entity and print the entity to store
    Sync {
        #[arg(long)]
        collection: String,
        /// Current entity snapshot (JSON file)
        #[arg(long)]
        current: PathBuf,
        /// Previous entity snapshot (JSON file)
        #[arg(long)]
        previous: Option<PathBuf>,
    },
    /// Run the delete hook for one entity
    Delete {
        #[arg(long)]
        collection: String,
        /// Entity snapshot (JSON file)
        #[arg(long)]
        entity: PathBuf,
    },
    /// Render cards for a JSON array of entities in parallel
    Batch {
        #[arg(long)]
        collection: String,
        /// Re-render every publishable entity, not just those without a card
        #[arg(long)]
        force: bool,
        /// JSON file holding an array of entity snapshots
        file: PathBuf,
    },
    /// List collections and their templates
    Templates,
    /// Delete cards that are no longer current
    Prune,
    /// Print a stock ogcard.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Preview {
            collection,
            title,
            excerpt,
            category,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let service = PreviewService::from_config(&config)?;
            let artifact = service.render_preview(&collection, &title, &excerpt, &category)?;
            output::print_preview_output(&artifact);
        }
        Command::Sync {
            collection,
            current,
            previous,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let service = PreviewService::from_config(&config)?;
            let current = read_entity(&current)?;
            let previous = previous.as_deref().map(read_entity).transpose()?;
            let (stored, outcome) = service.sync_entity(&collection, &current, previous.as_ref());
            let entity_id = current.id().unwrap_or_default();
            match &outcome {
                Some(outcome) => output::print_sync_output(&collection, &entity_id, outcome),
                None => eprintln!("{}/{} failed, previous card kept", collection, entity_id),
            }
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Delete { collection, entity } => {
            let config = load_config(cli.config.as_deref())?;
            // Deletion never renders, so font files are not required.
            let service = PreviewService::from_config_deferred(&config);
            let entity = read_entity(&entity)?;
            let removed = service.on_entity_delete(&collection, &entity);
            output::print_delete_output(&collection, &entity.id().unwrap_or_default(), removed);
        }
        Command::Batch {
            collection,
            force,
            file,
        } => {
            let config = load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let service = PreviewService::from_config(&config)?;
            let entities: Vec<EntitySnapshot> =
                serde_json::from_str(&std::fs::read_to_string(&file)?)?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = service.sync_all(&collection, entities, force, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_batch_summary(&report);

            let json = serde_json::to_string_pretty(&report.entities)?;
            std::fs::write(&file, json)?;
        }
        Command::Templates => {
            let config = load_config(cli.config.as_deref())?;
            output::print_templates_output(&TemplateRegistry::new(&config));
        }
        Command::Prune => {
            let config = load_config(cli.config.as_deref())?;
            let artifacts = ArtifactManager::from_config(&config.output);
            let report = artifacts.prune()?;
            output::print_prune_output(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` filters (default `ogcard=info`);
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ogcard=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Explicit `--config` must exist; otherwise `./ogcard.toml` is optional.
fn load_config(path: Option<&Path>) -> Result<RenderConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

fn read_entity(path: &Path) -> Result<EntitySnapshot, Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    EntitySnapshot::from_value(value)
        .ok_or_else(|| format!("{} must hold a JSON object", path.display()).into())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
