mod cli;

use captioneer::{
    captioning::{CaptionQueue, ProviderRegistry},
    config::{self, ModelProviderConfig},
    events::{Event, EventBus},
    library::Library,
    store::{FileStore, Store},
    sync::CatalogSync,
};
use captioneer_common::{Image, UNKNOWN_CAPTION};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// How often staged catalog updates are written while the queue runs.
const CATALOG_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Everything a command needs, wired together.
struct App {
    config_path: PathBuf,
    store: Arc<FileStore>,
    providers: Arc<ProviderRegistry>,
    sync: Arc<CatalogSync>,
    library: Library,
}

impl App {
    /// Load settings and the catalog, and wire the queue to the event bus.
    /// Must be called inside the Tokio runtime.
    fn open(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let settings = config::load_config_or_default(config_path)?;
        let settings_path = config::settings_path(config_path);

        // Determine data directory from the flag, the config path, or the current directory
        let data_dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| {
                config::find_config(config_path)
                    .and_then(|p| p.parent().map(Path::to_path_buf))
                    .filter(|p| !p.as_os_str().is_empty())
            })
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

        tracing::debug!("Using data directory {:?}", data_dir);
        let store = Arc::new(FileStore::open(
            &data_dir,
            Some(settings_path.clone()),
            settings.clone(),
        )?);

        let providers = Arc::new(ProviderRegistry::with_defaults(&settings));
        let events = Arc::new(EventBus::default());
        let sync = Arc::new(CatalogSync::new(store.clone()));
        events.subscribe(sync.clone());

        let queue = CaptionQueue::new(store.clone(), providers.clone(), events);
        let library = Library::new(store.clone(), providers.clone(), queue);

        Ok(Self {
            config_path: settings_path,
            store,
            providers,
            sync,
            library,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "captioneer=trace,captioneer_common=debug,reqwest=debug".to_string()
        } else {
            "captioneer=info,captioneer_common=info".to_string()
        }
    });

    // Logs go to stderr so `list --json` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Scan { folder } => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let updates = app.sync.subscribe();
            app.library.resume_pending()?;

            let summary = app.library.scan_folder(&folder)?;
            println!(
                "Found {} images ({} new) in {}",
                summary.discovered,
                summary.added,
                folder.display()
            );
            wait_for_queue(&app, updates).await
        }),
        Commands::Regenerate { path } => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let updates = app.sync.subscribe();
            app.library.resume_pending()?;

            let image = app.library.regenerate(&path)?;
            println!("Regenerating caption for {}", image.id);
            wait_for_queue(&app, updates).await
        }),
        Commands::Resume => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let updates = app.sync.subscribe();

            let count = app.library.resume_pending()?;
            if count == 0 {
                println!("No pending images.");
                return Ok(());
            }
            println!("Resuming {} pending images", count);
            wait_for_queue(&app, updates).await
        }),
        Commands::List { json } => block_on(async {
            let app = App::open(config_path, data_dir)?;
            list_images(&app.library.images()?, json)
        }),
        Commands::Folders => block_on(async {
            let app = App::open(config_path, data_dir)?;
            for folder in app.library.list_folders()? {
                println!("{}", folder.display());
            }
            Ok(())
        }),
        Commands::RemoveFolder { folder } => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let before = app.store.get_images()?.len();
            let remaining = app.library.remove_folder(&folder)?;
            println!(
                "Removed {} images; {} remain in the catalog",
                before - remaining.len(),
                remaining.len()
            );
            Ok(())
        }),
        Commands::Models => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let settings = app.store.get_settings();
            let models = app.providers.get_models(&settings).await;
            if models.is_empty() {
                println!("No models available from {}", settings.provider.kind());
            }
            for model in models {
                let marker = if model == settings.provider.model() { "*" } else { " " };
                println!("{} {}", marker, model);
            }
            Ok(())
        }),
        Commands::Configure {
            provider,
            base_url,
            api_key,
            model,
            timeout,
        } => block_on(async {
            let app = App::open(config_path, data_dir)?;
            let mut settings = app.store.get_settings();

            if let Some(kind) = provider {
                if kind != settings.provider.kind() {
                    settings.provider = ModelProviderConfig::for_kind(kind);
                }
            }
            match &mut settings.provider {
                ModelProviderConfig::OpenAi(c) => {
                    if let Some(url) = base_url {
                        c.base_url = url;
                    }
                    if let Some(key) = api_key {
                        c.api_key = key;
                    }
                    if let Some(model) = model {
                        c.model = model;
                    }
                }
                ModelProviderConfig::Ollama(c) => {
                    if api_key.is_some() {
                        anyhow::bail!("The ollama provider does not take an API key");
                    }
                    if let Some(url) = base_url {
                        c.base_url = url;
                    }
                    if let Some(model) = model {
                        c.model = model;
                    }
                }
            }
            if let Some(secs) = timeout {
                settings.request_timeout_secs = secs;
            }

            app.store.set_settings(settings)?;
            println!("Saved settings to {}", app.config_path.display());
            Ok(())
        }),
        Commands::Status => block_on(async {
            let app = App::open(config_path, data_dir)?;
            show_status(&app)
        }),
        Commands::Validate {
            config: validate_path,
        } => {
            validate_config(validate_path.as_deref().or(config_path))
        }
        Commands::Version => {
            println!("captioneer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to start Tokio runtime")?;
    rt.block_on(future)
}

/// Print forwarded updates until the queue drains or the user interrupts.
async fn wait_for_queue(app: &App, mut updates: broadcast::Receiver<Event>) -> Result<()> {
    let queue = app.library.queue().clone();
    let idle = queue.wait_idle();
    tokio::pin!(idle);

    let mut flush_timer = tokio::time::interval(CATALOG_FLUSH_INTERVAL);
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut idle => break,
            _ = flush_timer.tick() => {
                if let Err(e) = flush_catalog(&app.store).await {
                    tracing::warn!(error = %e, "Failed to save image catalog");
                }
            }
            update = updates.recv() => match update {
                Ok(event) => print_update(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted; pending images will resume on the next run");
                break;
            }
        }
    }

    // Updates published just before the queue went idle
    while let Ok(event) = updates.try_recv() {
        print_update(&event);
    }

    flush_catalog(&app.store).await?;
    println!("Total cost: ${:.4}", queue.total_cost());
    Ok(())
}

/// Write staged catalog updates off the async worker threads.
async fn flush_catalog(store: &Arc<FileStore>) -> Result<()> {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.flush())
        .await
        .context("Catalog save task failed")?
}

fn print_update(event: &Event) {
    let Some(image) = event.image() else {
        return;
    };

    if image.processing {
        println!("… {}", image.id);
    } else if image.caption == UNKNOWN_CAPTION {
        println!("✗ {}", image.id);
    } else {
        println!("✓ {}: {}", image.id, image.caption);
        if !image.tags.is_empty() {
            println!("    tags: {}", image.tags.join(", "));
        }
    }
}

fn list_images(images: &[Image], json: bool) -> Result<()> {
    if json {
        let json_str = serde_json::to_string_pretty(images)?;
        println!("{}", json_str);
        return Ok(());
    }

    for image in images {
        let state = if image.processing { " [pending]" } else { "" };
        println!("{}{}", image.id, state);
        if !image.caption.is_empty() {
            println!("  {}", image.caption);
        }
        if !image.tags.is_empty() {
            println!("  tags: {}", image.tags.join(", "));
        }
    }
    println!("\n{} images", images.len());
    Ok(())
}

fn show_status(app: &App) -> Result<()> {
    let settings = app.store.get_settings();
    let images = app.store.get_images()?;

    let pending = images.iter().filter(|i| i.processing).count();
    let unknown = images
        .iter()
        .filter(|i| !i.processing && i.caption == UNKNOWN_CAPTION)
        .count();
    let captioned = images
        .iter()
        .filter(|i| !i.processing && !i.caption.is_empty() && i.caption != UNKNOWN_CAPTION)
        .count();

    println!("Config: {}", app.config_path.display());
    if let Some(path) = app.store.catalog_path() {
        println!("Catalog: {}", path.display());
    }
    println!("Provider: {}", settings.provider.kind());
    println!("  Model: {}", settings.provider.model());
    println!(
        "  Configured: {}",
        if app.providers.is_initialized(&settings) { "yes" } else { "no" }
    );
    println!("  Request timeout: {}s", settings.request_timeout_secs);
    println!("Images: {}", images.len());
    println!("  Captioned: {}", captioned);
    println!("  Pending: {}", pending);
    println!("  Unknown: {}", unknown);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match config::find_config(path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let settings = config::load_config(&p)?;
            println!("✓ Configuration is valid");
            println!("  Provider: {}", settings.provider.kind());
            println!("  Model: {}", settings.provider.model());
            println!("  Request timeout: {}s", settings.request_timeout_secs);
        }
        None => {
            println!("No config file found, using defaults");
            let settings = config::Settings::default();
            println!("Default config:");
            println!("  Provider: {}", settings.provider.kind());
            println!("  Model: {}", settings.provider.model());
        }
    }

    Ok(())
}
