mod app;
mod engine;
mod event;
mod integration;
mod message;
pub mod state;

pub use app::App;
pub use app::AppContext;
pub use app::AppFactoryResult;
pub use app::Subscription;
pub use app::APPS as APP_REGISTRY;
pub use engine::AppStatus;
pub use engine::Engine;
pub use event::Event;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::FromIntegrationMessage;
pub use message::ServiceCall;
pub use message::ToIntegrationMessage;
pub use state::EntityState;
pub use state::State;
