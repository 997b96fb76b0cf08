use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "sgtm",
    about = "Server-side tag manager on Fargate — tier validation and stack synthesis",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported CPU/memory tiers
    Tiers {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Check that a CPU/memory pair is a supported tier
    Validate {
        /// CPU units (1024 = 1 vCPU)
        #[arg(long)]
        cpu: u32,
        /// Memory in MiB
        #[arg(long, visible_alias = "mem")]
        memory: u32,
    },
    /// Resolve configuration and synthesize the stack template.
    ///
    /// Context is layered: sgtm.toml [context], then SGTM_* environment
    /// variables, then --context overrides.
    Synth {
        /// Stack config file
        #[arg(short = 'f', long, default_value = commands::CONFIG_FILE)]
        config: PathBuf,
        /// Context override, repeatable
        #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
        /// Write the template here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write a scaffold sgtm.toml
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
        /// Stack name
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("sgtm=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Tiers { format } => commands::tiers::tiers(&format),
        Commands::Validate { cpu, memory } => commands::validate::validate(cpu, memory),
        Commands::Synth {
            config,
            context,
            out,
        } => commands::synth::synth(&config, &context, out.as_deref()),
        Commands::Init { path, name } => commands::init::init(&path, name.as_deref()),
    }
}
