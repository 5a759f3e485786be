//! attuned - cognitive-state notification and adaptation daemon
//!
//! Library half of the daemon so integration tests can build the router,
//! the engine and the session manager without a socket.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod logging;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use engine::CognitiveEngine;
pub use gateway::{DeliveryGateway, DeliveryOutcome, FakeDeliveryGateway, LoggingGateway};
pub use server::AppState;
pub use session::SessionManager;
pub use store::Stores;
