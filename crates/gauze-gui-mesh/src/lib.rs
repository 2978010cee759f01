//! # gauze-gui-mesh
//!
//! Geometry companions for the overlay layer: extruding flat polygons into
//! prism meshes the host engine can upload, and packing named rectangles
//! into a growing texture atlas.

mod atlas;
mod extrude;

pub use atlas::*;
pub use extrude::*;
