//! formrelay - relays one serverless form submission event.
//!
//! Reads an invocation event (`{httpMethod, headers, body, isBase64Encoded}`)
//! from a file or stdin, relays it to the mailer API and prints the response
//! event (`{statusCode, headers, body}`) to stdout. Logs go to stderr.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formrelay_core::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_FILE_BYTES};
use formrelay_core::{InboundRequest, Limits, Relay, RelayConfig};

#[derive(Parser)]
#[command(name = "formrelay", version, about)]
struct Cli {
    /// Invocation event JSON file (reads stdin when omitted or "-")
    #[arg(value_name = "EVENT")]
    event: Option<PathBuf>,

    /// Base URL of the mailer API
    #[arg(long, env = "FORMRELAY_BASE_URL", default_value = "")]
    base_url: String,

    /// Identifier of the target form
    #[arg(long, env = "FORMRELAY_FORM_ID", default_value = "")]
    form_id: String,

    /// Bearer credential for the mailer API
    #[arg(long, env = "FORMRELAY_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Verbose diagnostics (payload previews, byte counts)
    #[arg(long, env = "FORMRELAY_DEBUG")]
    debug: bool,

    /// Largest decoded request body accepted, in bytes
    #[arg(long, env = "FORMRELAY_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Largest single attachment buffered, in bytes
    #[arg(long, env = "FORMRELAY_MAX_FILE_BYTES", default_value_t = DEFAULT_MAX_FILE_BYTES)]
    max_file_bytes: usize,
}

impl Cli {
    fn config(&self) -> RelayConfig {
        RelayConfig::new(&self.base_url, &self.form_id, &self.api_key)
            .with_debug(self.debug)
            .with_limits(Limits {
                max_body_bytes: self.max_body_bytes,
                max_file_bytes: self.max_file_bytes,
            })
    }

    fn read_event(&self) -> anyhow::Result<InboundRequest> {
        let raw = match &self.event {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
                .with_context(|| format!("reading event from {}", path.display()))?,
            _ => {
                let mut raw = String::new();
                std::io::stdin()
                    .read_to_string(&mut raw)
                    .context("reading event from stdin")?;
                raw
            }
        };
        serde_json::from_str(&raw).context("parsing invocation event")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "formrelay=debug,formrelay_core=debug"
    } else {
        "formrelay=info,formrelay_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    let request = cli.read_event()?;
    info!(method = %request.http_method, "relaying form submission");

    let relay = Relay::new(config);
    let response = relay.handle(request).await;
    info!(status = response.status_code, "relay finished");

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
