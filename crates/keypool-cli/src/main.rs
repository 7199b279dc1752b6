//! # keypool CLI Entry Point
//!
//! Main binary for keypool. Runs echo endpoints and dispatches one-off calls
//! through a failover client pool.
//!
//! ## Usage
//!
//! ```bash
//! # Start an echo endpoint; prints "<key>@<addr>"
//! keypool serve -b 127.0.0.1:9001
//!
//! # Start a deliberately slow endpoint with a fixed key
//! keypool serve -b 127.0.0.1:9002 --key <64 hex chars> --delay-ms 5000
//!
//! # Call through a pool of endpoints (outputs raw JSON)
//! keypool call -e <key>@127.0.0.1:9001 -e <key>@127.0.0.1:9002 echo '{"arg": "value"}'
//!
//! # Send a plain string and override the pool config
//! keypool call -e <key>@127.0.0.1:9001 --encoding utf8 --timeout-ms 500 echo hi
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use keypool_cli::{call, serve};
use keypool_common::{Encoding, EndpointKey};
use tokio_util::sync::CancellationToken;

/// keypool - failover RPC client pool
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Top-level commands
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Run a TCP echo endpoint
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// address to bind to (default: 127.0.0.1:0)
    #[argh(option, short = 'b', default = "\"127.0.0.1:0\".into()")]
    bind: String,

    /// endpoint key, hex or z-base-32 (random if omitted)
    #[argh(option)]
    key: Option<String>,

    /// delay before every reply, in milliseconds
    #[argh(option, long = "delay-ms", default = "0")]
    delay_ms: u64,
}

/// Dispatch one request through a client pool and print the JSON result
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
struct CallArgs {
    /// endpoint as <key>@<host:port>, key in hex or z-base-32; repeat for more endpoints
    #[argh(option, short = 'e', long = "endpoint")]
    endpoints: Vec<String>,

    /// JSON file with pool configuration
    #[argh(option)]
    config: Option<PathBuf>,

    /// maximum attempts
    #[argh(option)]
    retries: Option<usize>,

    /// per-attempt timeout in milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// total deadline in milliseconds
    #[argh(option, long = "deadline-ms")]
    deadline_ms: Option<u64>,

    /// payload encoding: json, utf8 or binary (default: json)
    #[argh(option, default = "Encoding::Json")]
    encoding: Encoding,

    /// method to call
    #[argh(positional)]
    method: String,

    /// arguments, interpreted per --encoding
    #[argh(positional, default = "\"null\".into()")]
    args: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call: keep stdout clean for piping the result to other tools
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => {
            let key = match &args.key {
                Some(encoded) => EndpointKey::decode(encoded)?,
                None => serve::generate_key(),
            };
            let endpoint = serve::EchoEndpoint::bind(&args.bind, key, Duration::from_millis(args.delay_ms)).await?;
            println!("{}", endpoint.entry()?);

            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received interrupt, shutting down");
                    on_signal.cancel();
                }
            });

            endpoint.run(shutdown).await?;
        }
        Commands::Call(args) => {
            let config = call::load_config(args.config.as_deref())?;
            let config = call::apply_overrides(
                config,
                call::Overrides {
                    retries: args.retries,
                    timeout_ms: args.timeout_ms,
                    deadline_ms: args.deadline_ms,
                },
            );

            let result = call::run(&args.endpoints, config, &args.method, &args.args, args.encoding).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
