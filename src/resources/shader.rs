//! Shader blobs: precompiled SPIR-V or WGSL compiled through naga.

use std::path::Path;

use anyhow::Result;

use crate::{error::GfxError, resources::{load_binary, load_string}};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl From<ShaderStage> for naga::ShaderStage {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }
}

/// A shader model string such as `vs_5_0`.
///
/// Only the stage prefix influences compilation; the version is kept so
/// callers can log or compare it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderModel {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl ShaderModel {
    /// Parse `<stage>_<major>_<minor>`, optionally followed by a feature
    /// level suffix such as `_level_9_3`, which is ignored.
    pub fn parse(model: &str) -> Result<Self> {
        let invalid = || GfxError::InvalidInput(format!("malformed shader model `{model}`"));
        let parts: Vec<&str> = model.split('_').collect();
        let (prefix, major, minor) = match parts.as_slice() {
            [prefix, major, minor] => (*prefix, *major, *minor),
            [prefix, major, minor, "level", a, b]
                if a.parse::<u8>().is_ok() && b.parse::<u8>().is_ok() =>
            {
                (*prefix, *major, *minor)
            }
            _ => return Err(invalid().into()),
        };
        let stage = match prefix {
            "vs" => ShaderStage::Vertex,
            "ps" | "fs" => ShaderStage::Fragment,
            "cs" => ShaderStage::Compute,
            "gs" | "hs" | "ds" => {
                return Err(GfxError::InvalidInput(format!(
                    "shader model `{model}` names a stage wgpu has no pipeline slot for"
                ))
                .into());
            }
            _ => return Err(invalid().into()),
        };
        Ok(Self {
            stage,
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Compiled shader bytecode for a single entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderBlob {
    bytes: Vec<u8>,
    entry_point: String,
    stage: ShaderStage,
}

impl ShaderBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn create_module(&self, device: &wgpu::Device, label: Option<&str>) -> wgpu::ShaderModule {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::util::make_spirv(&self.bytes),
        })
    }
}

/// Load a shader, preferring a precompiled SPIR-V binary.
///
/// `cso` is read first; if it holds a valid module exposing `entry_point`
/// for the stage of `shader_model`, its bytes are returned untouched.
/// Otherwise `source` is compiled as WGSL and, when `cso` was given, the
/// result is written there for the next run.
pub fn create_shader_from_file(
    cso: Option<&Path>,
    source: &Path,
    entry_point: &str,
    shader_model: &str,
) -> Result<ShaderBlob> {
    let model = ShaderModel::parse(shader_model)?;

    if let Some(cso) = cso {
        match load_binary(cso) {
            Ok(bytes) if is_valid_spirv(&bytes, entry_point, model.stage) => {
                log::debug!("Using precompiled shader {cso:?} for `{entry_point}`");
                return Ok(ShaderBlob {
                    bytes,
                    entry_point: entry_point.to_string(),
                    stage: model.stage,
                });
            }
            Ok(_) => log::warn!(
                "{cso:?} is not a SPIR-V module with `{entry_point}`, compiling {source:?}"
            ),
            Err(e) => log::debug!("No precompiled shader ({e}), compiling {source:?}"),
        }
    }

    let text = load_string(source)?;
    let blob = compile_wgsl(&text, entry_point, model)?;

    if let Some(cso) = cso {
        if let Err(e) = std::fs::write(cso, blob.as_bytes()) {
            log::warn!("Could not cache compiled shader at {cso:?}: {e}");
        }
    }
    Ok(blob)
}

/// Compile WGSL source for one entry point into SPIR-V.
pub fn compile_wgsl(source: &str, entry_point: &str, model: ShaderModel) -> Result<ShaderBlob> {
    let fail = |message: String| GfxError::ShaderCompile {
        entry_point: entry_point.to_string(),
        message,
    };

    let module = naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| fail(e.to_string()))?;

    let stage: naga::ShaderStage = model.stage.into();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == stage)
    {
        return Err(fail(format!("no {:?} entry point with that name", model.stage)).into());
    }

    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: stage,
        entry_point: entry_point.to_string(),
    };
    // wgpu reads SPIR-V with WebGPU's y-up clip space, so no flip here.
    let mut options = naga::back::spv::Options::default();
    options
        .flags
        .remove(naga::back::spv::WriterFlags::ADJUST_COORDINATE_SPACE);
    let words = naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .map_err(|e| fail(e.to_string()))?;

    Ok(ShaderBlob {
        bytes: bytemuck::cast_slice(&words).to_vec(),
        entry_point: entry_point.to_string(),
        stage: model.stage,
    })
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

fn is_valid_spirv(bytes: &[u8], entry_point: &str, stage: ShaderStage) -> bool {
    if bytes.len() < 20 || bytes.len() % 4 != 0 {
        return false;
    }
    if u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) != SPIRV_MAGIC {
        return false;
    }
    let stage: naga::ShaderStage = stage.into();
    let options = naga::front::spv::Options {
        adjust_coordinate_space: false,
        ..Default::default()
    };
    match naga::front::spv::parse_u8_slice(bytes, &options) {
        Ok(module) => module
            .entry_points
            .iter()
            .any(|ep| ep.name == entry_point && ep.stage == stage),
        Err(e) => {
            log::debug!("Precompiled shader rejected: {e}");
            false
        }
    }
}
