use std::path::Path;

use anyhow::Result;

use crate::error::GfxError;

/**
 * This module contains all logic for loading shaders/textures/etc. from external files.
 */
pub mod dds;
pub mod shader;
pub mod texture;

pub fn load_string(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path).map_err(|e| GfxError::io(path, e))?)
}

pub fn load_binary(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path).map_err(|e| GfxError::io(path, e))?)
}
