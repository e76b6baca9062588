//! Admin Sync - Demo CLI
//!
//! Drives the notification pipeline and a CRUD cache against in-memory
//! resource backends and prints each toast as it appears and expires.

use admin_sync::events::NotificationBus;
use admin_sync::notifications::NotificationStore;
use admin_sync::resources::mock::InMemoryResourceApi;
use admin_sync::resources::{
    CallWrapper, CrudSync, ResourceApi, ResourceError, ResourceRegistry,
};
use admin_sync::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "admin-sync")]
#[command(about = "Admin console notification and CRUD sync demo")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted CRUD session and print notifications
    Demo {
        /// Resource to operate on
        #[arg(short, long, default_value = "products")]
        resource: String,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,admin_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo { resource } => run_demo(config, &resource).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Backends for every resource the admin console manages
fn seeded_registry() -> ResourceRegistry {
    let backend = |records: Vec<Value>| -> Arc<dyn ResourceApi> {
        Arc::new(InMemoryResourceApi::with_records(records))
    };

    ResourceRegistry::new()
        .register(
            "products",
            backend(vec![
                json!({"id": 1, "name": "Espresso", "price": 2.5}),
                json!({"id": 2, "name": "Cappuccino", "price": 3.2}),
            ]),
        )
        .register(
            "categories",
            backend(vec![json!({"id": 1, "name": "Drinks"})]),
        )
        .register("events", backend(Vec::new()))
        .register("media", backend(Vec::new()))
        .register(
            "locations",
            backend(vec![json!({"id": 1, "name": "Main street"})]),
        )
        .register("services", backend(Vec::new()))
        .register(
            "users",
            Arc::new(
                InMemoryResourceApi::with_records(vec![json!({"id": 1, "name": "admin"})])
                    .read_only(),
            ),
        )
}

async fn run_demo(config: Config, resource: &str) -> Result<()> {
    let settings = config.notifications;
    let registry = Arc::new(seeded_registry());
    if !registry.contains(resource) {
        anyhow::bail!(
            "unknown resource '{}' (registered: {})",
            resource,
            registry.names().join(", ")
        );
    }

    let bus = NotificationBus::new();
    let store = NotificationStore::with_max_visible(settings.max_visible);
    store.attach(&bus);

    // Render every change of the visible list
    let mut changes = store.watch();
    let renderer = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let visible = changes.borrow_and_update().clone();
            if visible.is_empty() {
                println!("  (no notifications)");
            }
            for n in &visible {
                println!("  [{}] #{} {} ({} ms)", n.kind, n.id, n.message, n.duration_ms);
            }
        }
    });

    let wrapper = CallWrapper::new(Arc::new(bus.clone()), settings.clone());
    let sync: CrudSync<Value> = CrudSync::new(resource, registry, wrapper);

    tracing::info!("Loading {}", resource);
    let count = sync.load().await.context("initial load failed")?;
    tracing::info!("Loaded {} records", count);

    let created = match sync.create(&json!({"name": "Flat white"})).await {
        Ok(created) => created,
        Err(e @ ResourceError::UnsupportedVerb { .. }) => {
            tracing::warn!("{}; stopping after load", e);
            store.teardown();
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let id = created
        .get("id")
        .and_then(Value::as_i64)
        .context("created record has no id")?;

    // Same name again: the backend rejects it and the error toast shows
    if let Err(e) = sync.create(&json!({"name": "Flat white"})).await {
        tracing::info!("Duplicate rejected as expected: {}", e);
    }

    sync.update(id, &json!({"name": "Flat white (large)"})).await?;
    sync.remove(id).await?;

    // Overlapping calls settle in arrival order
    let batch = [json!({"name": "Mocha"}), json!({"name": "Cortado"})];
    let (loaded, created) = futures::join!(
        sync.load(),
        futures::future::join_all(batch.iter().map(|item| sync.create(item)))
    );
    tracing::info!(
        "Concurrent load: {:?}, creates: {}/{} ok",
        loaded,
        created.iter().filter(|r| r.is_ok()).count(),
        created.len()
    );
    tracing::info!(
        "{} records cached, {} notifications visible",
        sync.data().len(),
        store.len()
    );

    // Let every toast expire
    let longest = settings
        .success_duration_ms
        .max(settings.error_duration_ms)
        .max(settings.warning_duration_ms)
        .max(settings.info_duration_ms);
    tokio::time::sleep(Duration::from_millis(longest + 100)).await;

    store.teardown();
    drop(store);
    renderer.await.context("renderer task failed")?;

    tracing::info!("Demo complete");
    Ok(())
}
