//! Services that drive a lineage view

pub mod handlers;
pub mod lineage_view;

pub use handlers::{LineageHandlers, LineageTabData, LoadOutcome};
pub use lineage_view::LineageView;
