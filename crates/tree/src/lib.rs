#![warn(missing_docs)]
//! Advancement forest and tree layout.

mod graph;
mod layout;

pub use graph::{AdvancementGraph, GraphError, GraphListener, LoadReport};
pub use layout::{LayoutError, LayoutResult, TreeLayout};
