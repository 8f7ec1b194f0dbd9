use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quiz_festival::QuizServer;
use quiz_festival::data::FileSource;
use quiz_festival::server::{DEFAULT_TIME_LIMIT_SECS, acceptor};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file to load the question bank from
    #[arg(short, long, default_value = "questions.json")]
    questions: PathBuf,

    /// Port for the query/mutate HTTP interface
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Port for the realtime WebSocket channel
    #[arg(long, default_value_t = 8081)]
    ws_port: u16,

    /// Seconds before an open question closes automatically
    #[arg(long, default_value_t = DEFAULT_TIME_LIMIT_SECS)]
    time_limit: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let server = QuizServer::new(
        Box::new(FileSource::new(args.questions)),
        Duration::from_secs(args.time_limit),
    );
    info!(questions = server.question_bank().len(), "question bank loaded");

    let ws_listener = TcpListener::bind(("0.0.0.0", args.ws_port)).await?;
    info!(port = args.ws_port, "websocket channel listening");
    tokio::spawn(acceptor::run(Arc::clone(&server), ws_listener));

    let http_listener = TcpListener::bind(("0.0.0.0", args.http_port)).await?;
    info!(port = args.http_port, "http interface listening");
    axum::serve(http_listener, quiz_festival::http::router(server)).await?;

    Ok(())
}
