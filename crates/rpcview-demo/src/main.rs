//! rpcview demo host.
//!
//! Builds a component for the in-process greeter and drives it from the
//! command line.
//!
//! Usage:
//!   cargo run -p rpcview-demo -- list
//!   cargo run -p rpcview-demo -- render --visible
//!   cargo run -p rpcview-demo -- call recite --request '{"name":"Nancy"}'
//!   cargo run -p rpcview-demo -- call chat --cancel-after-ms 1500
//!   cargo run -p rpcview-demo -- --metadata testkey=testvalue call say_hello

mod greeter;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rpcview_core::{Component, ComponentBuilder, RpcViewConfig, Services, StaticMetadata};
use rpcview_rpc::Metadata;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use greeter::GreeterClient;

#[derive(Parser, Debug)]
#[command(name = "rpcview-demo")]
#[command(about = "Interactive RPC call panels for an in-process greeter service")]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pause between streamed service responses, in milliseconds
    #[arg(long, default_value_t = greeter::DEFAULT_ELEMENT_DELAY.as_millis() as u64)]
    delay_ms: u64,

    /// Metadata entry attached to every call (key=value, repeatable)
    #[arg(short, long = "metadata", value_parser = parse_metadata)]
    metadata: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered operations
    List,
    /// Print the component's markup
    Render {
        /// Expand every panel first
        #[arg(long)]
        visible: bool,
    },
    /// Execute one operation and print each response update
    Call {
        /// Operation name
        operation: String,
        /// Request text (defaults to the operation's template)
        #[arg(short, long)]
        request: Option<String>,
        /// Cancel the call after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
}

fn parse_metadata(entry: &str) -> Result<(String, String), String> {
    entry
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got {entry:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rpcview_core=debug,rpcview_demo=debug,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RpcViewConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RpcViewConfig::load_default(),
    };

    let template = ComponentBuilder::new()
        .with_config(config)
        .contract::<GreeterClient>()
        .build()?;

    let mut services =
        Services::new().with_client(GreeterClient::new(Duration::from_millis(args.delay_ms)));
    if !args.metadata.is_empty() {
        let metadata: Metadata = args.metadata.iter().cloned().collect();
        services.set_metadata_provider(StaticMetadata(metadata));
    }
    let component = template.mount(&services)?;

    match args.command {
        Command::List => {
            for (index, op) in template.operations().enumerate() {
                println!(
                    "{index:>2}  {:<17} {:<16} {} -> {}",
                    op.shape.label(),
                    op.name,
                    op.request.short_name(),
                    op.response.short_name()
                );
            }
        }
        Command::Render { visible } => {
            if visible {
                for index in 0..component.panel_count() {
                    component.toggle_visibility(index)?;
                }
            }
            println!("{}", component.markup());
        }
        Command::Call {
            operation,
            request,
            cancel_after_ms,
        } => {
            let Some(index) = template.panel_index(&operation) else {
                bail!("no operation named {operation:?}; try `list`");
            };
            if let Some(request) = request {
                component.set_request_text(index, request)?;
            }
            run_call(&component, index, cancel_after_ms.map(Duration::from_millis)).await?;
        }
    }

    component.teardown();
    Ok(())
}

/// Execute a panel and print its response text every time it changes.
async fn run_call(component: &Component, index: usize, cancel_after: Option<Duration>) -> Result<()> {
    let mut renders = component.subscribe_renders();
    component.execute(index)?;

    let deadline = async {
        match cancel_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut last = String::new();
    while component.is_in_flight(index)? {
        tokio::select! {
            changed = renders.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = component.response_text(index)?;
                if text != last {
                    println!("---\n{text}");
                    last = text;
                }
            }
            _ = &mut deadline => {
                tracing::info!(panel = index, "cancelling after timeout");
                component.cancel(index)?;
            }
        }
    }

    let text = component.response_text(index)?;
    if text != last {
        println!("---\n{text}");
    }
    Ok(())
}
