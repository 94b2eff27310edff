//! # agrolink-rs: soil sensor link and crop prediction
//!
//! Receives text frames from a wireless soil sensor, classifies them into
//! readings, keeps a curated log of saved frames, and turns staged readings
//! into crop recommendation requests.
//!
//! ## Architecture
//!
//! - **Link**: scan / connect / subscribe state machine driven by an
//!   injected [`LinkTransport`], running its own loop and talking to the
//!   caller over crossbeam channels
//! - **Parser**: ordered rule table mapping frame text to a
//!   [`ClassifiedReading`]
//! - **Storage**: [`SavedLog`] persisted through a [`PersistenceProvider`]
//! - **Prediction**: [`PredictionBridge`] staging readings and calling a
//!   [`ScoringService`]
//!
//! ## Configuration
//!
//! Configuration and the saved log live in the platform data directory under
//! `dev.agrolink.agrolink-rs`:
//!
//! - **Linux**: `~/.local/share/dev.agrolink.agrolink-rs/`
//! - **macOS**: `~/Library/Application Support/dev.agrolink.agrolink-rs/`
//! - **Windows**: `%APPDATA%\dev.agrolink.agrolink-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use agrolink_rs::{
//!     config::{resolve_data_dir, AppConfig},
//!     link::{LinkEvent, LinkService, MockTransport},
//!     storage::{FileStore, SavedLog},
//!     types::SavedMessage,
//! };
//!
//! let data_dir = resolve_data_dir(None)?;
//! let config = AppConfig::load_or_default(AppConfig::path_in(&data_dir));
//! let mut log = SavedLog::restore(
//!     Box::new(FileStore::new(&data_dir)),
//!     config.storage.saved_log_key.clone(),
//! );
//!
//! let transport = MockTransport::demo(&config.link.device_name);
//! let (service, handle) = LinkService::new(config.link.clone(), Box::new(transport));
//! std::thread::spawn(move || service.run());
//! handle.start_scan();
//!
//! while let Some(event) = handle.recv_timeout(std::time::Duration::from_secs(1)) {
//!     if let LinkEvent::Frame(frame) = event {
//!         log.toggle(SavedMessage::from(&frame));
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod logging;
pub mod parser;
pub mod prediction;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AgrolinkError, ErrorKind, Result, ResultExt};
pub use link::{LinkCommand, LinkEvent, LinkHandle, LinkService, LinkTransport};
pub use parser::{classify, ClassifiedReading};
pub use prediction::{
    HttpScoringClient, PendingPrediction, PredictionBridge, PredictionForm, PredictionRequest,
    ScoringService,
};
pub use storage::{FileStore, MemoryStore, PersistenceProvider, SavedLog};
pub use types::{ConnectionState, RawFrame, SavedMessage};
