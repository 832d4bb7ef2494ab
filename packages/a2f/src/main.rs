//! Command-line front end for the Audio2Face headless client

use std::path::{Path, PathBuf};

use a2f_client::domain::{AudioChunk, EmotionSettingsPatch, StreamRequest};
use a2f_client::{A2fClient, A2fConfig, ConvertOptions, PidFile, ReadinessState, terminate_pid};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use futures::stream;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "a2f")]
#[command(about = "Drive an Audio2Face headless server")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// REST base URL, overrides configuration and A2F_URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Installation directory, overrides configuration and A2F_INSTALL_PATH
    #[arg(long, global = true)]
    install_path: Option<PathBuf>,

    /// Talk to an already running server without requiring a local install
    #[arg(long, global = true)]
    remote: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the headless server and wait until it is ready
    Start {
        /// Keep running and stop the server on Ctrl-C
        #[arg(long)]
        attach: bool,
    },

    /// Stop a server left running by `start`
    Stop,

    /// Probe the server once
    Status,

    /// Convert one audio file into a blendshape animation
    Convert {
        audio: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        convert: ConvertArgs,

        /// Fail if the server does not confirm the export
        #[arg(long)]
        strict: bool,
    },

    /// Convert every .wav/.mp3 file of a folder
    ConvertFolder {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Stream a WAV file to a streaming audio player
    Stream {
        wav: PathBuf,

        /// Streaming player prim path
        #[arg(long)]
        instance: Option<String>,

        /// Samples per data frame
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,

        /// Return as soon as the audio is sent instead of after playback
        #[arg(long)]
        no_block: bool,
    },

    /// List emotion names, or show the emotion vector at a frame
    Emotions {
        #[arg(long)]
        frame: Option<i64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Export frame rate (defaults to the configured fps)
    #[arg(long)]
    fps: Option<u32>,

    /// Generate emotion keys before exporting
    #[arg(long)]
    emotion: bool,

    #[arg(long, requires = "emotion")]
    emotion_strength: Option<f64>,

    #[arg(long, requires = "emotion")]
    max_emotions: Option<u32>,

    #[arg(long, requires = "emotion")]
    contrast: Option<f64>,
}

impl ConvertArgs {
    fn options(&self, config: &A2fConfig) -> ConvertOptions {
        let options = ConvertOptions::new(self.fps.unwrap_or(config.default_fps));
        if !self.emotion {
            return options;
        }
        let mut patch = EmotionSettingsPatch::new();
        if let Some(strength) = self.emotion_strength {
            patch = patch.emotion_strength(strength);
        }
        if let Some(max) = self.max_emotions {
            patch = patch.max_emotions(max);
        }
        if let Some(contrast) = self.contrast {
            patch = patch.contrast(contrast);
        }
        options.with_emotion(patch)
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    match cli.command {
        Commands::Start { attach } => start(config, attach).await?,

        Commands::Stop => stop(&config).await?,

        Commands::Status => {
            let client = A2fClient::remote(config)?;
            if client.is_ready().await {
                println!("✓ Audio2Face is ready at {}", client.config().base_url);
            } else {
                println!("✗ Audio2Face is not answering at {}", client.config().base_url);
                std::process::exit(1);
            }
        }

        Commands::Convert {
            audio,
            output,
            convert,
            strict,
        } => {
            let options = convert.options(&config);
            let mut client = build_client(config, cli.remote)?;
            let outcome = client.convert_one(&audio, &output, &options).await?;
            let path = if strict {
                outcome.into_result()?
            } else {
                outcome.path
            };
            println!("{}", path.display());
        }

        Commands::ConvertFolder {
            input,
            output,
            convert,
        } => {
            let options = convert.options(&config);
            let mut client = build_client(config, cli.remote)?;
            let report = client.convert_folder(&input, &output, &options).await?;
            for path in report.outputs() {
                println!("{}", path.display());
            }
            for failure in &report.failed {
                eprintln!("✗ {}: {}", failure.input.display(), failure.error);
            }
            if !report.is_clean() {
                bail!("{} of {} files failed", report.failed.len(), report.failed.len() + report.converted.len());
            }
        }

        Commands::Stream {
            wav,
            instance,
            chunk_size,
            no_block,
        } => {
            let instance = instance.unwrap_or_else(|| config.instances.stream_player.clone());
            let (samples, sample_rate) = read_wav_mono(&wav)?;
            let request = StreamRequest::new(sample_rate, instance, !no_block)?;
            let chunks: Vec<AudioChunk> = samples
                .chunks(chunk_size.max(1))
                .map(AudioChunk::from)
                .collect();

            let mut client = build_client(config, cli.remote)?;
            let cancel = client.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            if client.stream_audio(&request, stream::iter(chunks)).await? {
                println!("✓ Stream played");
            } else {
                bail!("server reported streaming failure");
            }
        }

        Commands::Emotions { frame } => {
            let client = build_client(config, cli.remote)?;
            match frame {
                Some(frame) => {
                    let vector = client.emotion_at(frame).await?;
                    for (emotion, strength) in a2f_client::domain::Emotion::ALL
                        .iter()
                        .zip(vector.as_slice())
                    {
                        println!("{emotion:<12} {strength:.3}");
                    }
                }
                None => {
                    for name in client.emotion_names().await? {
                        println!("{name}");
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists, pass --force to overwrite", path.display());
                }
                A2fConfig::default().save(&path).await?;
                println!("✓ Wrote {}", path.display());
            }
            ConfigAction::Validate { path } => {
                A2fConfig::load(&path).await?;
                println!("✓ {} is valid", path.display());
            }
        },
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("a2f_client=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<A2fConfig> {
    let mut config = match &cli.config {
        Some(path) => A2fConfig::load(path).await?.with_env_overrides(),
        None => A2fConfig::from_env(),
    };
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    if let Some(path) = &cli.install_path {
        config.install_path = path.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_client(config: A2fConfig, remote: bool) -> Result<A2fClient> {
    let client = if remote {
        A2fClient::remote(config)?
    } else {
        A2fClient::new(config)?
    };
    Ok(client)
}

async fn start(config: A2fConfig, attach: bool) -> Result<()> {
    let mut client = A2fClient::new(config)?;

    let cancel = client.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let state = client.ensure_ready().await?;
    watcher.abort();
    if state != ReadinessState::Ready {
        bail!("Audio2Face did not become ready within {:?}", client.config().startup_timeout());
    }
    println!("✓ Audio2Face ready at {}", client.config().base_url);

    if attach {
        println!("Press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        client.shutdown()?;
    } else if let Some(pid) = client.server_pid() {
        let pid_file = PidFile::new(client.config().pid_file());
        pid_file.write(pid).await?;
        println!("Server process {pid} recorded in {}", pid_file.path().display());
    }
    Ok(())
}

async fn stop(config: &A2fConfig) -> Result<()> {
    let pid_file = PidFile::new(config.pid_file());
    let Some(pid) = pid_file.read().await? else {
        println!("No server recorded in {}; it was not started by `a2f start`", pid_file.path().display());
        return Ok(());
    };

    terminate_pid(pid).with_context(|| format!("failed to stop server process {pid}"))?;
    pid_file.remove().await?;
    println!("✓ Stopped server process {pid}");
    Ok(())
}

/// Samples of `path` down-mixed to mono, with the file's sample rate
fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}
