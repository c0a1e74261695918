pub mod api;
pub mod config;
pub mod engine;
mod integrations;
pub mod kodi;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::Event;
pub use engine::State;
