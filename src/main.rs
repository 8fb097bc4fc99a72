//! @ai:module:intent CLI for submitting generation requests through the scheduler
//! @ai:module:layer presentation

use aigen::{
    config::AigenConfig,
    providers::{
        Capability, ImageEditRequest, ImageRequest, ProviderClient, ProviderKind, SpeechRequest,
        TextRequest,
    },
    ResponseBody, Scheduler,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "aigen.toml";

#[derive(Parser)]
#[command(name = "aigen")]
#[command(about = "Generate images, text and speech through third-party AI APIs")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ./aigen.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a prompt
    Image {
        #[arg(short, long, default_value = "openai")]
        provider: ProviderKind,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        /// Pixel size such as 1024x1024
        #[arg(long)]
        size: Option<String>,
        #[arg(short = 'n', long)]
        count: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate text from a prompt
    Text {
        #[arg(short, long, default_value = "openai")]
        provider: ProviderKind,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Synthesize speech; audio is written to --output
    Speech {
        #[arg(short, long, default_value = "openai")]
        provider: ProviderKind,
        #[arg(long)]
        text: String,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove the background of a local image
    RemoveBg {
        #[arg(short, long, default_value = "stability")]
        provider: ProviderKind,
        /// png, jpeg or webp file to upload
        #[arg(long)]
        image: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transform an image guided by a prompt
    Transform {
        #[arg(short, long, default_value = "stability")]
        provider: ProviderKind,
        /// png, jpeg or webp file to upload
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        strength: Option<f32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Estimate the cost of a capability call without contacting the provider
    Cost {
        #[arg(short, long, default_value = "openai")]
        provider: ProviderKind,
        #[arg(long, value_enum)]
        capability: CapabilityArg,
        #[arg(short, long, default_value = "1")]
        units: u32,
    },

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CapabilityArg {
    Image,
    Text,
    Speech,
    RemoveBg,
    Transform,
}

impl From<CapabilityArg> for Capability {
    fn from(arg: CapabilityArg) -> Self {
        match arg {
            CapabilityArg::Image => Capability::GenerateImage,
            CapabilityArg::Text => Capability::GenerateText,
            CapabilityArg::Speech => Capability::GenerateSpeech,
            CapabilityArg::RemoveBg => Capability::RemoveBackground,
            CapabilityArg::Transform => Capability::TransformImage,
        }
    }
}

/// @ai:intent One capability call with its inputs
enum Operation {
    Image(ImageRequest),
    Text(TextRequest),
    Speech(SpeechRequest),
    RemoveBackground(ImageEditRequest),
    Transform(ImageEditRequest),
}

impl Operation {
    /// @ai:effects network
    async fn run(&self, client: &ProviderClient) -> aigen::Result<ResponseBody> {
        match self {
            Operation::Image(request) => client.generate_image(request).await,
            Operation::Text(request) => client.generate_text(request).await,
            Operation::Speech(request) => client.generate_speech(request).await,
            Operation::RemoveBackground(request) => client.remove_background(request).await,
            Operation::Transform(request) => client.transform_image(request).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aigen=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let (provider, operation, output) = match cli.command {
        Commands::Init { output } => return init_config(&output),
        Commands::Cost {
            provider,
            capability,
            units,
        } => return estimate_cost(provider, capability.into(), units),
        Commands::Image {
            provider,
            prompt,
            model,
            size,
            count,
            output,
        } => (
            provider,
            Operation::Image(ImageRequest {
                prompt,
                model,
                size,
                count,
            }),
            output,
        ),
        Commands::Text {
            provider,
            prompt,
            system,
            model,
            max_tokens,
            output,
        } => (
            provider,
            Operation::Text(TextRequest {
                prompt,
                system,
                model,
                max_tokens,
            }),
            output,
        ),
        Commands::Speech {
            provider,
            text,
            voice,
            model,
            output,
        } => (
            provider,
            Operation::Speech(SpeechRequest { text, voice, model }),
            output,
        ),
        Commands::RemoveBg {
            provider,
            image,
            output,
        } => (
            provider,
            Operation::RemoveBackground(ImageEditRequest {
                image: read_image(&image)?,
                prompt: None,
                strength: None,
            }),
            output,
        ),
        Commands::Transform {
            provider,
            image,
            prompt,
            strength,
            output,
        } => (
            provider,
            Operation::Transform(ImageEditRequest {
                image: read_image(&image)?,
                prompt: Some(prompt),
                strength,
            }),
            output,
        ),
    };

    let config = load_or_default_config(cli.config)?;
    let body = submit(&config, provider, operation).await?;
    write_body(body, output.as_deref())
}

/// @ai:effects fs:read
fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))
}

/// @ai:intent Load the given config, ./aigen.toml, or built-in defaults
/// @ai:effects fs:read
fn load_or_default_config(path: Option<PathBuf>) -> Result<AigenConfig> {
    match path {
        Some(path) => AigenConfig::load(&path),
        None if Path::new(DEFAULT_CONFIG).exists() => AigenConfig::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(AigenConfig::default()),
    }
}

/// @ai:intent Run one operation through the scheduler and wait for its result
/// @ai:effects network
async fn submit(config: &AigenConfig, provider: ProviderKind, operation: Operation) -> Result<ResponseBody> {
    let client = Arc::new(config.client(provider)?);
    let operation = Arc::new(operation);
    let scheduler = Scheduler::new(config.scheduler.scheduler_config());

    tracing::info!("Submitting request to {}", provider);
    let handle = scheduler.submit(provider.id(), move || {
        let client = client.clone();
        let operation = operation.clone();
        async move { operation.run(&client).await }
    });

    let body = handle.await?;
    Ok(body)
}

/// @ai:intent Print JSON bodies or write them, and any binary body, to the output path
/// @ai:effects fs:write
fn write_body(body: ResponseBody, output: Option<&Path>) -> Result<()> {
    match (body, output) {
        (ResponseBody::Json(value), None) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        (ResponseBody::Json(value), Some(path)) => {
            std::fs::write(path, serde_json::to_string_pretty(&value)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Response saved to {}", path.display());
        }
        (ResponseBody::Binary { content_type, bytes }, Some(path)) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("{} bytes of {} saved to {}", bytes.len(), content_type, path.display());
        }
        (ResponseBody::Binary { content_type, bytes }, None) => {
            anyhow::bail!(
                "Received {} bytes of {}; pass --output to save them",
                bytes.len(),
                content_type
            );
        }
    }
    Ok(())
}

/// @ai:intent Print a cost estimate
/// @ai:effects pure
fn estimate_cost(provider: ProviderKind, capability: Capability, units: u32) -> Result<()> {
    let estimate = provider.estimate_cost(capability, units)?;

    println!(
        "{} {} x {} ({}): ${:.4}",
        estimate.provider,
        estimate.capability.as_str(),
        estimate.units,
        estimate.unit,
        estimate.usd
    );
    Ok(())
}

/// @ai:intent Initialize default configuration file
/// @ai:effects fs:write
fn init_config(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    AigenConfig::starter().save(output)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}
