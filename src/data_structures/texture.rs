//! GPU textures, texture arrays and cubemaps.
//!
//! [`Texture`] wraps a single 2D texture as it comes out of an image file.
//! [`TextureArray`] and [`Cubemap`] are what the builders in
//! [`crate::resources::texture`] return: one GPU texture with several array
//! layers and the view shaders sample it through.

use anyhow::Result;
use image::{RgbaImage, imageops};

use crate::error::GfxError;

/// A GPU texture with a view and optional sampler.
///
/// Single-layer textures are the input of the array builders, so they are
/// always created with `COPY_SRC` in addition to the sampling usages.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Usages every uploaded source texture carries.
    pub const SOURCE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
        .union(wgpu::TextureUsages::COPY_DST)
        .union(wgpu::TextureUsages::COPY_SRC);

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        }));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload a full mip chain of RGBA8 images as one sRGB texture.
    ///
    /// `levels[0]` is the base level; every following level must be the
    /// next smaller mip of it (see [`mip_chain`]).
    pub fn from_rgba_levels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        levels: &[RgbaImage],
        label: Option<&str>,
    ) -> Result<Self> {
        let texture = upload_rgba_levels(device, queue, levels, label)?;
        Ok(Self::from_texture(device, texture))
    }

    /// Wrap an already filled texture with a default view and sampler.
    pub fn from_texture(device: &wgpu::Device, texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }
}

/// Upload RGBA8 mips into a bare sRGB texture with [`Texture::SOURCE_USAGE`].
///
/// Array builders copy out of these right away, so no view or sampler is made.
pub fn upload_rgba_levels(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    levels: &[RgbaImage],
    label: Option<&str>,
) -> Result<wgpu::Texture> {
    let base = levels
        .first()
        .ok_or_else(|| GfxError::InvalidInput("no mip levels to upload".into()))?;
    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    check_texture_request(
        device.features(),
        &device.limits(),
        format,
        base.width(),
        base.height(),
    )?;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label,
        size: wgpu::Extent3d {
            width: base.width(),
            height: base.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: Texture::SOURCE_USAGE,
        view_formats: &[],
    });

    for (mip, level) in levels.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d::ZERO,
            },
            level.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width()),
                rows_per_image: Some(level.height()),
            },
            wgpu::Extent3d {
                width: level.width(),
                height: level.height(),
                depth_or_array_layers: 1,
            },
        );
    }
    Ok(texture)
}

/// Refuse 2D textures `device` cannot create before wgpu sees them.
///
/// Missing features and sizes over the limit are [`GfxError::Device`]; a
/// zero size or a block compressed base level that is not a whole number
/// of blocks is [`GfxError::InvalidInput`].
pub(crate) fn check_texture_request(
    features: wgpu::Features,
    limits: &wgpu::Limits,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> Result<()> {
    let required = format.required_features();
    if !features.contains(required) {
        return Err(GfxError::Device(format!(
            "{format:?} needs {required:?}, which the device does not have"
        ))
        .into());
    }
    if width == 0 || height == 0 {
        return Err(GfxError::InvalidInput(format!("empty {width}x{height} texture")).into());
    }
    let max = limits.max_texture_dimension_2d;
    if width > max || height > max {
        return Err(GfxError::Device(format!(
            "{width}x{height} texture exceeds the device limit of {max}"
        ))
        .into());
    }
    let (bw, bh) = format.block_dimensions();
    if width % bw != 0 || height % bh != 0 {
        return Err(GfxError::InvalidInput(format!(
            "{width}x{height} is not a whole number of {bw}x{bh} blocks of {format:?}"
        ))
        .into());
    }
    Ok(())
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

/// Which view, if any, is created over a freshly built array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArrayView {
    /// Only the resource is wanted; views are created by the caller.
    None,
    /// A `texture_2d_array` view over every layer.
    #[default]
    D2Array,
    /// A `texture_cube` view over the first six layers.
    Cube,
}

/// Creation parameters of a texture array.
///
/// `usage` plays the part of the bind and CPU access flags, `view` the part
/// of the misc flags (cube compatibility) and of the optional view output.
#[derive(Clone, Debug)]
pub struct TextureArrayDesc<'a> {
    pub label: Option<&'a str>,
    pub usage: wgpu::TextureUsages,
    pub view: ArrayView,
}

impl Default for TextureArrayDesc<'_> {
    fn default() -> Self {
        Self {
            label: None,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view: ArrayView::D2Array,
        }
    }
}

impl<'a> TextureArrayDesc<'a> {
    pub fn cube(label: Option<&'a str>) -> Self {
        Self {
            label,
            view: ArrayView::Cube,
            ..Default::default()
        }
    }
}

/// A 2D texture with one layer per source texture.
#[derive(Debug)]
pub struct TextureArray {
    pub texture: wgpu::Texture,
    pub view: Option<wgpu::TextureView>,
    pub layers: u32,
    pub mip_level_count: u32,
}

impl TextureArray {
    /// Create a view over `count` layers starting at `base`.
    ///
    /// Used to carve extra cube or array views out of arrays that hold more
    /// than six faces.
    pub fn create_layer_view(
        &self,
        dimension: wgpu::TextureViewDimension,
        base: u32,
        count: u32,
    ) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("texture array layer view"),
            dimension: Some(dimension),
            base_array_layer: base,
            array_layer_count: Some(count),
            ..Default::default()
        })
    }
}

/// A texture array holding cube faces, with the cube view when one was made.
#[derive(Debug)]
pub struct Cubemap {
    pub array: TextureArray,
    pub cube_view: Option<wgpu::TextureView>,
}

/// Cube faces in layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const COUNT: u32 = 6;

    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Cell (column, row) of the face in a 4x3 cross:
    ///
    /// ```text
    /// .  +Y .  .
    /// -X +Z +X -Z
    /// .  -Y .  .
    /// ```
    pub fn cross_cell(self) -> (u32, u32) {
        match self {
            CubeFace::PositiveX => (2, 1),
            CubeFace::NegativeX => (0, 1),
            CubeFace::PositiveY => (1, 0),
            CubeFace::NegativeY => (1, 2),
            CubeFace::PositiveZ => (1, 1),
            CubeFace::NegativeZ => (3, 1),
        }
    }
}

/// Cut a 4:3 cross image into its six faces, in layer order.
///
/// Fails when the image is not exactly four faces wide and three high.
pub fn split_cross(image: &RgbaImage) -> std::result::Result<Vec<RgbaImage>, String> {
    let (width, height) = image.dimensions();
    if width == 0 || width % 4 != 0 || height % 3 != 0 || width / 4 != height / 3 {
        return Err(format!(
            "cube cross must be 4:3 with square cells, got {width}x{height}"
        ));
    }
    let face = width / 4;
    Ok(CubeFace::ALL
        .iter()
        .map(|f| {
            let (col, row) = f.cross_cell();
            imageops::crop_imm(image, col * face, row * face, face, face).to_image()
        })
        .collect())
}

/// Number of levels in a full mip chain for the given size.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Base image followed by its downsampled levels when `generate` is set.
pub fn mip_chain(base: RgbaImage, generate: bool) -> Vec<RgbaImage> {
    let count = if generate {
        mip_level_count(base.width(), base.height())
    } else {
        1
    };
    let mut levels = Vec::with_capacity(count as usize);
    levels.push(base);
    for _ in 1..count {
        let prev = &levels[levels.len() - 1];
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        levels.push(imageops::resize(prev, w, h, imageops::FilterType::Triangle));
    }
    levels
}
