//! `mchat` - chat over plain email.
//!
//! Polls a POP3 mailbox, groups messages into conversations and sends
//! replies over SMTP.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod render;

use clap::{Parser, Subcommand};
use mchat_core::Endpoint;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mchat", version, about = "Chat over plain email")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print stored messages, then poll forever and print new ones
    Sync,

    /// Run one fetch cycle and exit
    Fetch,

    /// Print conversations
    Chats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a message
    Send {
        /// Recipient address
        address: String,

        /// Message text
        text: String,
    },

    /// Store the account and its secret
    Login {
        /// Account address
        user: String,

        /// Password for plain authentication
        #[arg(long, conflicts_with = "refresh_token")]
        password: Option<String>,

        /// `OAuth2` refresh token for token authentication
        #[arg(long, required_unless_present = "password")]
        refresh_token: Option<String>,

        /// `OAuth2` client id
        #[arg(long)]
        client_id: Option<String>,

        /// `OAuth2` client secret
        #[arg(long)]
        client_secret: Option<String>,

        /// POP3 server as host:port
        #[arg(long, value_parser = parse_endpoint)]
        pop3: Option<Endpoint>,

        /// SMTP server as host:port
        #[arg(long, value_parser = parse_endpoint)]
        smtp: Option<Endpoint>,
    },
}

fn parse_endpoint(value: &str) -> Result<Endpoint, String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got '{value}'"))?;
    let port = port
        .parse()
        .map_err(|e| format!("invalid port in '{value}': {e}"))?;
    if host.is_empty() {
        return Err(format!("missing host in '{value}'"));
    }
    Ok(Endpoint::new(host, port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Both ring and aws-lc-rs can end up linked; pick one explicitly.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mchat=info,mchat_core=info,mchat_pop3=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Sync => commands::sync().await,
        Command::Fetch => commands::fetch().await,
        Command::Chats { json } => commands::chats(json).await,
        Command::Send { address, text } => commands::send(&address, &text).await,
        Command::Login {
            user,
            password,
            refresh_token,
            client_id,
            client_secret,
            pop3,
            smtp,
        } => commands::login(commands::Login {
            user,
            password,
            refresh_token,
            client_id,
            client_secret,
            pop3,
            smtp,
        }),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(parse_endpoint("localhost:1110").unwrap(), Endpoint::new("localhost", 1110));
        assert!(parse_endpoint("localhost").is_err());
        assert!(parse_endpoint(":25").is_err());
        assert!(parse_endpoint("host:notaport").is_err());
    }

    #[test]
    fn test_login_requires_a_secret() {
        assert!(Args::try_parse_from(["mchat", "login", "me@example.com"]).is_err());
        assert!(
            Args::try_parse_from(["mchat", "login", "me@example.com", "--password", "pw"]).is_ok()
        );
        assert!(
            Args::try_parse_from([
                "mchat",
                "login",
                "me@example.com",
                "--password",
                "pw",
                "--refresh-token",
                "rt",
            ])
            .is_err()
        );
    }
}
