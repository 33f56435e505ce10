//! Feature geometry model: layer geometry types, the five storage kinds, and
//! the tagged union each persisted feature carries.

mod feature;
mod kind;

pub use feature::FeatureGeometry;
pub use kind::{GeometryCategory, GeometryKind, LayerGeometryType};
