//! # C-Measure: multi-cell load measurement client
//!
//! Client-side control logic for a multi-cell load measurement instrument.
//! The instrument bridge is an HTTP service; this crate holds everything
//! the operator's control panel needs between the bridge and the screen.
//!
//! ## Architecture
//!
//! - **Backend**: The [`backend::InstrumentApi`] seam with a reqwest client
//!   and an in-memory simulator
//! - **Session**: A single tokio actor owning the connection, polling,
//!   calibration and report state machines
//! - **Analysis**: Pure chart projection of measurement series
//! - **Communication**: Commands over a tokio channel, events back over a
//!   crossbeam channel that a synchronous UI loop can drain
//!
//! ## Configuration
//!
//! Client configuration is stored in the platform-appropriate data directory
//! under `dev.cmeasure.panel`:
//!
//! - **Linux**: `~/.local/share/dev.cmeasure.panel/client.toml`
//! - **macOS**: `~/Library/Application Support/dev.cmeasure.panel/client.toml`
//! - **Windows**: `%APPDATA%\dev.cmeasure.panel\client.toml`
//!
//! ## Example
//!
//! ```ignore
//! use cmeasure_rs::{
//!     backend::HttpInstrumentApi,
//!     config::ClientConfig,
//!     session::{SessionController, SessionEvent},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::load_or_default().with_env_overrides();
//!     let api = HttpInstrumentApi::new(&config.backend_url, config.request_timeout())?;
//!
//!     let (controller, handle) = SessionController::new(Box::new(api), &config);
//!     tokio::spawn(controller.run());
//!     handle.start();
//!
//!     for event in handle.drain() {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{HttpInstrumentApi, InstrumentApi, MockInstrument};
pub use config::ClientConfig;
pub use error::{PanelError, Result};
pub use session::{SessionCommand, SessionController, SessionEvent, SessionHandle};
pub use types::{CalibrationRow, CellStatus, Measurement, View};
