use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;

use judi_detector::AppState;
use judi_detector::config::AppConfig;
use judi_detector::logging;
use judi_detector::routes;
use judi_detector::services::classifier::RecurrentClassifier;
use judi_detector::services::detector::Detector;
use judi_detector::services::models::ModelFiles;
use judi_detector::services::ocr::TesseractOcr;
use judi_detector::services::tokenizer::{Tokenizer, VocabularyTokenizer};
use judi_detector::services::video::FfmpegDecoder;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    if let Err(e) = run().await {
        tracing::error!("[startup] {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env();
    tracing::info!("[startup] {:?}", config);

    let detector = build_detector(&config)?;
    let state = Arc::new(AppState { detector });
    let app = routes::app(state, config.max_upload_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Load the model and check the external tools; any failure aborts startup
fn build_detector(config: &AppConfig) -> Result<Detector> {
    let files = ModelFiles::resolve(&config.model_dir, config.model_repo.as_deref())?;

    let tokenizer = VocabularyTokenizer::load(&files.vocabulary)
        .with_context(|| format!("Failed to load tokenizer from {}", files.vocabulary.display()))?;
    tracing::info!(
        "[startup] Tokenizer loaded ({} words)",
        tokenizer.vocabulary_size()
    );

    let classifier = RecurrentClassifier::load(&files.weights, &files.config)
        .context("Failed to load classifier")?;

    let ocr = TesseractOcr::new(&config.tesseract_bin, &config.ocr_langs);
    ocr.ensure_available()
        .context("Tesseract is not usable")?;

    let decoder = FfmpegDecoder::new(&config.ffmpeg_bin, &config.ffprobe_bin);
    decoder
        .ensure_available()
        .context("ffmpeg/ffprobe are not usable")?;

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(tokenizer);
    Ok(Detector::new(
        tokenizer,
        Arc::new(classifier),
        Arc::new(ocr),
        Arc::new(decoder),
        config.sampler(),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
