use std::{fs, path::PathBuf, process, sync::Arc};

use glossa::{
    application::{
        error::AppError,
        events::{ContentEventSource, SignalBus},
        import::import_language_file,
        module::{LocalizationDeps, LocalizationModule},
        provider::{ContentLocalizationProvider, LoadOutcome},
        service::LocalizationService,
    },
    config,
    domain::ContentId,
    infra::{
        error::InfraError,
        events::{ContentEventHub, LocalSignalBus},
        memory::MemoryContentTree,
        snapshot, telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if let AppError::MissingTranslation { .. } = error {
        eprintln!("{error}");
        return;
    }

    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?error.messages(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?error.messages(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Render(_) => run_render(settings).await,
        config::Command::Lookup(args) => run_lookup(settings, args).await,
        config::Command::Keys(args) => run_keys(settings, args).await,
        config::Command::Import(args) => run_import(settings, args).await,
    }
}

fn snapshot_path(settings: &config::Settings) -> Result<PathBuf, AppError> {
    settings.tree.snapshot.clone().ok_or_else(|| {
        AppError::validation("no tree snapshot given; pass --tree or set tree.snapshot")
    })
}

fn open_tree(settings: &config::Settings) -> Result<Arc<MemoryContentTree>, AppError> {
    let path = snapshot_path(settings)?;
    Ok(Arc::new(snapshot::load_tree(&path)?))
}

/// Load the configured provider once, failing when only a fallback table could be built.
async fn load_provider(
    settings: &config::Settings,
    tree: Arc<MemoryContentTree>,
) -> Result<ContentLocalizationProvider, AppError> {
    let provider = ContentLocalizationProvider::new(
        settings.localization.provider_options(),
        tree.clone(),
        tree,
    );
    match provider.load().await {
        LoadOutcome::Fresh { generation } => {
            info!(
                target = "glossa::render",
                generation,
                site_id = %settings.localization.site_id,
                "Translations loaded"
            );
            Ok(provider)
        }
        outcome => Err(AppError::unexpected(format!(
            "translations could not be loaded ({})",
            outcome.label()
        ))),
    }
}

async fn run_render(settings: config::Settings) -> Result<(), AppError> {
    let tree = open_tree(&settings)?;
    let provider = load_provider(&settings, tree).await?;
    let loaded = provider
        .snapshot()
        .ok_or_else(|| AppError::unexpected("provider holds no translations after loading"))?;

    println!("{}", loaded.document.as_str());
    Ok(())
}

async fn run_lookup(settings: config::Settings, args: config::LookupArgs) -> Result<(), AppError> {
    let tree = open_tree(&settings)?;
    let hub = Arc::new(ContentEventHub::default());
    let bus = Arc::new(LocalSignalBus::default());

    let mut options = settings.localization.module_options();
    if !options.enabled {
        info!(
            target = "glossa::lookup",
            "Enabling content localization for this lookup"
        );
        options.enabled = true;
    }

    let deps = LocalizationDeps {
        accessor: tree.clone(),
        settings: tree,
        content_events: hub as Arc<dyn ContentEventSource>,
        bus: bus as Arc<dyn SignalBus>,
        service: Arc::new(LocalizationService::new()),
    };
    let mut module = LocalizationModule::initialize(options, deps).await;
    if let Some(outcome) = module.initial_load()
        && !matches!(outcome, LoadOutcome::Fresh { .. })
    {
        warn!(
            target = "glossa::lookup",
            outcome = outcome.label(),
            "Translations could not be loaded; every lookup will miss"
        );
    }

    let translation = module.service().translate(&args.key, &args.language);
    module.shutdown().await;

    match translation {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => Err(AppError::MissingTranslation {
            key: args.key,
            language: args.language,
        }),
    }
}

async fn run_keys(settings: config::Settings, args: config::KeysArgs) -> Result<(), AppError> {
    let tree = open_tree(&settings)?;
    let provider = load_provider(&settings, tree).await?;
    let loaded = provider
        .snapshot()
        .ok_or_else(|| AppError::unexpected("provider holds no translations after loading"))?;

    let language = args
        .language
        .unwrap_or_else(|| settings.localization.master_language.code.clone());
    for key in loaded.table.keys(&language) {
        println!("{key}");
    }
    Ok(())
}

async fn run_import(settings: config::Settings, args: config::ImportArgs) -> Result<(), AppError> {
    let path = snapshot_path(&settings)?;
    let tree = snapshot::load_tree(&path)?;

    info!(
        target = "glossa::import",
        file = %args.file.display(),
        parent = args.parent,
        "Starting import"
    );

    let xml =
        fs::read_to_string(&args.file).map_err(|err| AppError::from(InfraError::Io(err)))?;
    let report = import_language_file(&tree, ContentId(args.parent), &xml).await?;
    snapshot::save_tree(&path, &tree)?;

    info!(
        target = "glossa::import",
        containers_created = report.containers_created,
        items_created = report.items_created,
        items_updated = report.items_updated,
        skipped = report.skipped,
        languages = ?report.languages,
        "Import completed"
    );
    println!(
        "{} containers created, {} items created, {} items updated, {} skipped",
        report.containers_created, report.items_created, report.items_updated, report.skipped
    );
    Ok(())
}
