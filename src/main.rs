use std::{net::SocketAddr, path::Path, process, sync::Arc, time::Duration};

use letter_generator::{
    application::{
        error::AppError,
        letter::{LetterForm, LetterService},
        observer::MetricsObserver,
        render::{LatexRenderService, RenderPipelineConfig},
    },
    config::{self, RenderArgs},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        templates::TemplateStore,
    },
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    let metrics = match (&command, settings.server.metrics_addr) {
        (config::Command::Serve(_), Some(addr)) => {
            Some((addr, telemetry::install_metrics_exporter().map_err(AppError::from)?))
        }
        _ => None,
    };

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    telemetry::record_build_info();

    match command {
        config::Command::Serve(_) => run_serve(settings, metrics).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

fn build_letter_service(settings: &config::Settings) -> LetterService {
    let renderer = LatexRenderService::new(RenderPipelineConfig::from(&settings.render));
    LetterService::new(Arc::new(renderer), Arc::new(MetricsObserver))
}

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

async fn run_serve(
    settings: config::Settings,
    metrics: Option<(SocketAddr, PrometheusHandle)>,
) -> Result<(), AppError> {
    let state = HttpState {
        letters: Arc::new(build_letter_service(&settings)),
        templates: Arc::new(TemplateStore::new(settings.render.templates_dir.clone())),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "letter_generator::serve",
        addr = %settings.server.addr,
        compiler = %settings.render.compiler_path.display(),
        templates_dir = %settings.render.templates_dir.display(),
        workspace_dir = %settings.render.workspace_dir.display(),
        "Listening"
    );

    let metrics_tasks = match metrics {
        Some((addr, handle)) => Some(spawn_metrics_listener(addr, handle).await?),
        None => None,
    };

    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    if let Some(tasks) = metrics_tasks {
        for task in tasks {
            task.abort();
        }
    }
    served?;

    info!(target = "letter_generator::serve", "Server stopped");
    Ok(())
}

async fn spawn_metrics_listener(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<[tokio::task::JoinHandle<()>; 2], AppError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "letter_generator::serve",
        addr = %addr,
        "Metrics listening"
    );

    let upkeep_handle = handle.clone();
    let upkeep = tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            upkeep_handle.run_upkeep();
        }
    });

    let router = telemetry::metrics_router(handle);
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router.into_make_service()).await {
            error!(
                target = "letter_generator::serve",
                error = %err,
                "Metrics listener failed"
            );
        }
    });

    Ok([upkeep, server])
}

async fn run_render(settings: config::Settings, args: RenderArgs) -> Result<(), AppError> {
    let form = read_letter_file(&args.input).await?;
    let letters = build_letter_service(&settings);

    let pdf = letters.generate(form).await?;
    tokio::fs::write(&args.output, &pdf)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "letter_generator::render",
        input = %args.input.display(),
        output = %args.output.display(),
        pdf_bytes = pdf.len(),
        "Letter written"
    );
    Ok(())
}

async fn read_letter_file(path: &Path) -> Result<LetterForm, AppError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    toml::from_str(&raw).map_err(|err| {
        AppError::validation(format!(
            "letter file `{}` is not valid: {err}",
            path.display()
        ))
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
