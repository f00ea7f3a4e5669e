//! GPU resource wrappers: textures, bitmaps, meshes and the terrain.
//!
//! - `bitmap` holds CPU side pixel buffers loaded from image files
//! - `model` contains vertex layouts and the mesh resource
//! - `terrain` is the terrain grid and its draw call
//! - `texture` contains texture, texture array and cubemap wrappers

pub mod bitmap;
pub mod model;
pub mod terrain;
pub mod texture;
