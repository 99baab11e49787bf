//! Named tile products: base layers, thematic groups and alert overlays.

pub mod catalog;
pub mod products;

pub use catalog::{GroupEntry, LayerCatalog};
pub use products::{BaseLayer, LayerGroup};
