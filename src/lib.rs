pub mod classify;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod time;
pub mod wal;

pub use engine::{Engine, EngineError};
