//! ImageForge CLI
//!
//! Runs each tool from the command line and serves the background-removal
//! proxy.

use anyhow::Context;
use clap::{Parser, Subcommand};
use imageforge::config::ProxyConfig;
use imageforge::file_ops::{read_source, write_result};
use imageforge::remote::{self, RemoveBgClient};
use imageforge::{
    inspect_pdf, ConversionMode, ProxyCredential, RasterBackend, Tool, ToolKind, ToolPage,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Single-purpose image and PDF tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Input file and optional output path shared by every tool
#[derive(clap::Args, Debug)]
struct Io {
    /// Input file path
    #[arg(short, long)]
    input: PathBuf,

    /// Output file path (defaults to the tool's download name)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-encode an image as JPEG at a given quality
    Compress {
        #[command(flatten)]
        io: Io,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "75", value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
    },
    /// Re-encode an image into another container
    Convert {
        #[command(flatten)]
        io: Io,

        /// webp-to-png, png-to-jpg or jpg-to-png
        #[arg(short, long, default_value = "webp-to-png")]
        mode: ConversionMode,
    },
    /// Blur-fill the top-centre band of an image
    RemoveWatermark {
        #[command(flatten)]
        io: Io,
    },
    /// Stamp a name and a date of birth along the bottom edge
    TextOverlay {
        #[command(flatten)]
        io: Io,

        #[arg(long)]
        name: String,

        #[arg(long)]
        dob: String,
    },
    /// Re-serialize a PDF after a no-op title rewrite
    UnlockPdf {
        #[command(flatten)]
        io: Io,
    },
    /// Print page count, title and encryption flag of a PDF as JSON
    InspectPdf {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Send an image to the background-removal service
    RemoveBg {
        #[command(flatten)]
        io: Io,

        /// Proxy route (or upstream URL when --api-key is given)
        #[arg(long, default_value = "http://127.0.0.1:3000/api/removebg")]
        endpoint: String,

        /// Call the endpoint with this key attached
        #[arg(long, env = "REMOVE_BG_API_KEY", hide_env_values = true)]
        api_key: Option<ProxyCredential>,
    },
    /// Serve the background-removal proxy
    Serve {
        #[command(flatten)]
        config: ProxyConfig,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let (tool, io) = match args.command {
        Command::Serve { config } => return serve(config),
        Command::InspectPdf { input } => return inspect(input),
        Command::RemoveBg {
            io,
            endpoint,
            api_key,
        } => return remove_bg(io, endpoint, api_key),
        Command::Compress { io, quality } => (Tool::Compressor { quality }, io),
        Command::Convert { io, mode } => (Tool::Converter { mode }, io),
        Command::RemoveWatermark { io } => (Tool::WatermarkRemover, io),
        Command::TextOverlay { io, name, dob } => (Tool::TextOverlay { name, dob }, io),
        Command::UnlockPdf { io } => (Tool::PdfUnlocker, io),
    };

    run_tool(tool, io, args.verbose)
}

fn run_tool(tool: Tool, io: Io, verbose: bool) -> anyhow::Result<()> {
    let kind = tool.kind();
    let source = read_source(&io.input)
        .with_context(|| format!("{}: {:?}", imageforge::READ_FAILED_MESSAGE, io.input))?;

    if verbose && kind == ToolKind::PdfUnlocker {
        if let Ok(summary) = inspect_pdf(&source.bytes) {
            tracing::info!(
                pages = summary.page_count,
                title = ?summary.title,
                encrypted = summary.encrypted,
                "input PDF"
            );
        }
    }

    let mut page = ToolPage::with_tool(tool);
    page.select_file(source);
    if !page.run_local(&RasterBackend::new()) {
        anyhow::bail!("{}: missing input", kind.failure_message());
    }
    if let Some(message) = page.error() {
        anyhow::bail!("{}", message);
    }

    let result = page
        .result()
        .context("transform produced no result")?;
    let output = io.output.unwrap_or_else(|| PathBuf::from(result.filename));
    write_result(&output, &result).with_context(|| format!("writing {:?}", output))?;

    println!("{} -> {:?} ({} bytes)", kind.title(), output, result.bytes.len());
    Ok(())
}

fn inspect(input: PathBuf) -> anyhow::Result<()> {
    let source = read_source(&input)
        .with_context(|| format!("{}: {:?}", imageforge::READ_FAILED_MESSAGE, input))?;
    let summary = inspect_pdf(&source.bytes).context("Failed to load PDF")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn remove_bg(io: Io, endpoint: String, api_key: Option<ProxyCredential>) -> anyhow::Result<()> {
    let source = read_source(&io.input)
        .with_context(|| format!("{}: {:?}", imageforge::READ_FAILED_MESSAGE, io.input))?;

    let mut client = RemoveBgClient::new(endpoint);
    if let Some(key) = api_key {
        client = client.with_credential(key);
    }

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let mut page = ToolPage::new(ToolKind::BackgroundRemover);
    page.select_file(source);
    runtime.block_on(page.run_remote(&client));

    if let Some(message) = page.error() {
        anyhow::bail!("{}", message);
    }
    let result = page.result().context("request produced no result")?;
    let output = io.output.unwrap_or_else(|| PathBuf::from(result.filename));
    write_result(&output, &result).with_context(|| format!("writing {:?}", output))?;

    println!("Background removed -> {:?} ({} bytes)", output, result.bytes.len());
    Ok(())
}

fn serve(config: ProxyConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime
        .block_on(remote::serve(&config))
        .with_context(|| format!("serving on {}", config.listen))
}
