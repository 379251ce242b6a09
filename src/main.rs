//! kubedoctor (kd) - Kubernetes diagnosis from the command line

use anyhow::{Context, Result};
use clap::Parser;
use kubedoctor::cli::{Cli, Command};
use kubedoctor::commands;
use kubedoctor::config::load_config;
use kubedoctor::server::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    setup_tracing(cli.verbose);

    let config = load_config()?;

    // Handle color settings
    let colors = config.colors && !cli.no_color;
    if !colors {
        owo_colors::set_override(false);
    }

    let output = cli.output.unwrap_or(config.default_output);
    let context = cli.context.as_deref();

    if let Some((tool, args)) = cli.command.tool_call(cli.namespace.as_deref()) {
        commands::run_tool(context, &config, tool, args, output, colors).await?;
        return Ok(());
    }

    match cli.command {
        Command::Tools => commands::list_tools(output)?,
        Command::Call(ref args) => {
            let value = commands::parse_call_args(&args.args)?;
            commands::run_tool(context, &config, &args.tool, value, output, colors).await?;
        }
        Command::Serve(ref args) => {
            let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
                .parse()
                .with_context(|| format!("invalid bind address {}:{}", args.bind, args.port))?;
            let cluster = commands::connect(context, &config).await?;
            server::start_server(addr, AppState::new(Arc::new(cluster), config)).await?;
        }
        Command::Completions(ref args) => generate_completions(args.shell),
        _ => {}
    }

    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kd", &mut std::io::stdout());
}
