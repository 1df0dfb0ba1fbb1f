use std::sync::Arc;

use clap::Parser;

use prosept_matcher::models::config::MatcherConfig;
use prosept_matcher::processing::ZMQMessage;
use prosept_matcher::processing::embedding::FastEmbedProvider;
use prosept_matcher::processing::matching::Matcher;
use prosept_matcher::processing::worker::{
    Cli, ReceiveFailure, process_match_message, run_match,
};
use prosept_matcher::repository::{FileRepository, MatchOutput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match MatcherConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let settings = config.embedding.clone();
    let provider = match tokio::task::spawn_blocking(move || FastEmbedProvider::new(&settings)).await {
        Ok(Ok(provider)) => provider,
        Ok(Err(e)) => {
            log::error!("Failed to load embedding model: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("Embedding model loader panicked: {e}");
            std::process::exit(1);
        }
    };
    let matcher = Arc::new(Matcher::from_config(Arc::new(provider), &config));

    if let Some(job) = cli.one_shot() {
        let repo = FileRepository::new(job.catalog_path, job.listings_path, MatchOutput::Stdout);
        let k = job.top_k.unwrap_or(config.top_k);
        if let Err(e) = run_match(&repo, matcher.as_ref(), k).await {
            log::error!("Matching failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let context = zmq::Context::new();
    let responder = match context.socket(zmq::PULL) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Cannot create zmq socket: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = responder.bind(&config.zmq_address) {
        log::error!("Cannot bind to {}: {e}", config.zmq_address);
        std::process::exit(1);
    }
    log::info!("Waiting for match jobs on {}", config.zmq_address);

    loop {
        let msg = match responder.recv_bytes(0) {
            Ok(msg) => msg,
            Err(e) => match ReceiveFailure::classify(&e) {
                ReceiveFailure::Stop => {
                    log::info!("Socket closed, stopping worker: {e}");
                    break;
                }
                ReceiveFailure::Retry(delay) => {
                    log::error!("Failed to receive message: {e}");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            },
        };
        match serde_json::from_slice::<ZMQMessage>(&msg) {
            Ok(parsed) => {
                let matcher = Arc::clone(&matcher);
                let default_k = config.top_k;
                tokio::spawn(async move {
                    match parsed {
                        ZMQMessage::Match(job) => {
                            process_match_message(job, matcher.as_ref(), default_k).await
                        }
                    }
                });
            }
            Err(e) => log::error!("Failed to parse JSON: {e}"),
        }
    }
}
