//! Audio2Face headless client
//!
//! Drives an Audio2Face server running in headless mode: starts and monitors
//! the server process, converts audio files into blendshape animations, and
//! streams live audio to a streaming audio player.
//!
//! ```no_run
//! use std::path::Path;
//! use a2f_client::{A2fClient, A2fConfig, ConvertOptions};
//!
//! # async fn run() -> a2f_client::Result<()> {
//! let mut client = A2fClient::new(A2fConfig::from_env())?;
//! let outcome = client
//!     .convert_one(
//!         Path::new("speech/line_01.wav"),
//!         Path::new("out/line_01.usd"),
//!         &ConvertOptions::new(60),
//!     )
//!     .await?;
//! println!("{}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

pub mod a2e;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod gateway;
pub mod lifecycle;
pub mod orchestrator;
pub mod player;
pub mod session;
pub mod streaming;

pub use client::A2fClient;
pub use config::{A2fConfig, InstanceConfig};
pub use error::{A2fError, ConfigError, Result};
pub use export::{ExportFormat, ExportOutcome};
pub use gateway::{Gateway, HttpGateway, RequestResult};
pub use lifecycle::{
    DetachedLauncher, PidFile, ReadinessState, ServerLauncher, ServerLifecycle, ServerProcess,
    terminate_pid,
};
pub use orchestrator::{ConvertOptions, FileFailure, FolderReport, SceneOrchestrator};
pub use session::SessionState;
pub use streaming::{StreamState, StreamingProtocolClient};

pub use a2f_domain as domain;
