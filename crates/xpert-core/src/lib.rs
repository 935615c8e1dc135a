pub mod access;
pub mod actions;
pub mod config;
pub mod error;
pub mod experiments;
pub mod message;
pub mod panel;
pub mod reducer;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod trial;
pub mod upgrade;

pub use actions::*;
pub use error::*;
pub use message::*;
pub use reducer::*;
pub use state::*;
pub use store::*;
