//! # bugtracker-flows
//!
//! Scripted end-to-end flows against the BugTracker Pro demo board. Every
//! interaction goes through a [`Stabilizer`], which polls the live page under
//! bounded wait policies and clears the randomly appearing modal overlay when
//! it swallows a click.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bugtracker_flows::{Config, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> bugtracker_flows::Result<()> {
//! let config = Config::load("configs/bugtracker.yaml")?;
//! let runner = Runner::new(&config).await?;
//! let report = runner.run(&config).await;
//! runner.close().await?;
//! println!("Success: {}", report.success());
//! # Ok(())
//! # }
//! ```

mod config;
pub mod driver;
pub mod flows;
pub mod locator;
pub mod probe;
mod runner;
pub mod stabilizer;
pub mod wait;

pub use config::{
    AnalyticsFlowConfig, BrowserConfig, Config, DragFlowConfig, EditFlowConfig, FlowsConfig,
    OnFailure, OverlayConfig, ProbeConfig, RetryConfig, Viewport, WaitConfig,
};
pub use driver::{Driver, EokaDriver, ElementState};
pub use flows::{FlowKind, FlowOutcome, FlowProgress, FlowRecord, FlowState, RunReport};
pub use locator::{Frame, Locator};
pub use probe::LinkProbe;
pub use runner::Runner;
pub use stabilizer::{with_recovery, NotificationSnapshot, Retried, Scope, Stabilizer};
pub use wait::{WaitPolicies, WaitPolicy};

/// Result type for bugtracker-flows operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the flows.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("timed out after {timeout_ms}ms waiting for {locator}")]
    ElementWaitTimeout { locator: String, timeout_ms: u64 },

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("action failed: {0}")]
    ActionFailed(String),
}

impl Error {
    /// Short, stable name of the variant, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Yaml(_) => "yaml",
            Self::Io(_) => "io",
            Self::Browser(_) => "browser",
            Self::ElementWaitTimeout { .. } => "element_wait_timeout",
            Self::NotInteractable(_) => "not_interactable",
            Self::Transport(_) => "transport",
            Self::ActionFailed(_) => "action_failed",
        }
    }
}
