#![doc = "ShapeEditor public API"]
mod common;

pub mod cli;
pub mod commands;
pub mod config;
pub mod crs;
pub mod editor;
pub mod geometry;
pub mod io;
pub mod server;
pub mod store;
pub mod tms;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use geometry::{FeatureGeometry, GeometryKind, LayerGeometryType};

#[doc(inline)]
pub use store::Store;
