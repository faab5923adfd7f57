pub mod batch;
pub mod config;
pub mod depth;
pub mod editing;
pub mod editor;
pub mod error;
pub mod gesture;
pub mod history;
pub mod snapping;
pub mod trim_limits;
pub mod types;
pub mod validation;

pub use config::EngineConfig;
pub use editor::Editor;
pub use error::{CoreError, Result};
