//! Termie demo bot.
//!
//! Logs into every configured server, logs presence changes, and answers `!ping`
//! with `pong`. Config path: argv[1], else `termie.yaml`.

use tracing_subscriber::{fmt, EnvFilter};

use termie_client::{config, Client, ClientEvent};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "termie.yaml".to_owned());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let (client, mut events) = Client::new(&cfg).expect("client init failed");

    tracing::info!(%path, servers = cfg.servers.len(), "termie bot starting");
    if let Err(e) = client.login().await {
        tracing::error!(code = e.code().as_str(), error = %e, "login failed");
        std::process::exit(1);
    }

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Ready => tracing::info!("ready on every server"),
            ClientEvent::MemberConnect(m) => tracing::info!(session = %m.session, member = %m, "member connected"),
            ClientEvent::MemberDisconnect(m) => {
                tracing::info!(session = %m.session, member = %m, "member disconnected")
            }
            ClientEvent::Error { session, error } => {
                tracing::warn!(%session, code = error.code().as_str(), error = %error, "session error")
            }
            ClientEvent::Message(msg) => {
                if msg.is_server_message || msg.content.trim() != "!ping" {
                    continue;
                }
                if let Err(e) = client.reply(&msg, "pong").await {
                    tracing::warn!(error = %e, "reply failed");
                }
            }
        }
    }
}
