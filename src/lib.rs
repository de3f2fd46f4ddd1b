//! Advancement server glue: data packs, configuration and the graph manager.

pub mod config;
pub mod manager;
pub mod packs;

pub use config::ServerConfig;
pub use manager::{build_graph, AdvancementManager};
