pub mod antibot;
pub mod budget;
pub mod coordinator;
pub mod core;
pub mod crawler;
pub mod extract;
pub mod fetcher;
pub mod filters;
pub mod hitl;
pub mod ingest;
pub mod per_site;
pub mod proxy;
pub mod sources;
pub mod state;
pub mod strategy;
pub mod url_norm;

pub use core::types;
pub use core::types::*;
pub use state::AppState;
