//! Terminal client for Castline live chat.
//!
//! Logs in (or reuses the stored session), resolves whether the user owns the
//! stream, then joins the stream's chat room and sends messages from stdin.
//! Reconnects with exponential backoff when the connection drops.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin castline-client -- --stream 42 --email alice@example.com --password secret
//! cargo run --bin castline-client -- -s 42
//! cargo run --bin castline-client -- --logout
//! ```

use std::path::PathBuf;

use clap::Parser;

use castline_client::{
    cli::{Credentials, ReconnectPolicy, run_client},
    config::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_SESSION_DIR, DEFAULT_WS_HOST},
};
use castline_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "castline-client")]
#[command(about = "Live chat client for Castline streams", long_about = None)]
struct Args {
    /// Stream (room) id to join
    #[arg(short, long, required_unless_present = "logout")]
    stream: Option<i64>,

    /// API base URL
    #[arg(short, long, env = "CASTLINE_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Chat host (and port)
    #[arg(short = 'w', long, env = "CASTLINE_WS_HOST", default_value = DEFAULT_WS_HOST)]
    ws_host: String,

    /// Chat endpoint path
    #[arg(long, env = "CASTLINE_WS_PATH", default_value = "/ws")]
    ws_path: String,

    /// Use wss for the chat endpoint
    #[arg(long)]
    secure: bool,

    /// Login email; a stored session is used when omitted
    #[arg(short, long, env = "CASTLINE_EMAIL", requires = "password")]
    email: Option<String>,

    /// Login password
    #[arg(short, long, env = "CASTLINE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory holding the stored session
    #[arg(long, env = "CASTLINE_SESSION_DIR", default_value = DEFAULT_SESSION_DIR)]
    session_dir: PathBuf,

    /// Maximum reconnect attempts (0 disables reconnecting)
    #[arg(long, default_value_t = 5)]
    max_reconnects: u32,

    /// Clear the stored session and exit
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_PKG_NAME"), "info");

    let args = Args::parse();

    let config = ClientConfig {
        api_base_url: args.api_url,
        ws_host: args.ws_host,
        ws_path: args.ws_path,
        secure: args.secure,
        session_dir: args.session_dir,
        reconnect: ReconnectPolicy {
            max_attempts: args.max_reconnects,
            ..ReconnectPolicy::default()
        },
    };

    if args.logout {
        config.token_store().set_tokens(None);
        println!("Logged out");
        return;
    }

    let Some(stream_id) = args.stream else {
        tracing::error!("--stream is required");
        std::process::exit(2);
    };

    let credentials = match (args.email, args.password) {
        (Some(email), Some(password)) => Some(Credentials { email, password }),
        _ => None,
    };

    if let Err(e) = run_client(config, stream_id, credentials).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
