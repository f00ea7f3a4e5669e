//! potato-gfx
//!
//! Resource helpers for the Potato real-time renderer, built on wgpu. The
//! crate is a thin layer: it loads and compiles shaders, builds texture
//! arrays and cubemaps out of image files, and owns the terrain mesh that the
//! engine draws every frame. The caller owns the device and queue and decides
//! when resources are built and when they are drawn.
//!
//! High-level modules
//! - `context`: headless device/queue pair for tools and tests
//! - `data_structures`: GPU resource wrappers (textures, bitmaps, meshes, terrain)
//! - `error`: the error taxonomy every loader reports through
//! - `pipelines`: effects and the draw context abstraction
//! - `resources`: loaders that turn files into GPU resources
//!

pub mod context;
pub mod data_structures;
pub mod error;
pub mod pipelines;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use data_structures::bitmap::BitMap;
pub use data_structures::terrain::Terrain;
pub use data_structures::texture::{ArrayView, Cubemap, Texture, TextureArray, TextureArrayDesc};
pub use error::GfxError;
pub use pipelines::{DeviceContext, Effect};
pub use resources::shader::{ShaderBlob, ShaderModel, create_shader_from_file};
pub use resources::texture::{
    create_dds_texture_2d_array_from_file, create_texture_2d_array,
    create_wic_texture_2d_array_from_file, create_wic_texture_2d_cube_from_file,
    create_wic_texture_2d_cube_from_files, load_bitmap,
};
pub use wgpu;
