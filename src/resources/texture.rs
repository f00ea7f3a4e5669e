//! Texture arrays and cubemaps built from files.
//!
//! Every builder ends in [`create_texture_2d_array`]: sources are uploaded as
//! ordinary 2D textures first and then copied, mip by mip, into the layers of
//! one array texture.

use std::path::Path;

use anyhow::Result;
use image::RgbaImage;

use crate::{
    data_structures::{
        bitmap::BitMap,
        texture::{
            ArrayView, CubeFace, Cubemap, TextureArray, TextureArrayDesc, mip_chain, split_cross,
            upload_rgba_levels,
        },
    },
    error::GfxError,
    resources::{dds::DdsImage, load_binary},
};

/// Load an image file into `bitmap`.
///
/// Returns `false` and leaves `bitmap` as it was when the file cannot be
/// read or decoded.
pub fn load_bitmap(path: impl AsRef<Path>, bitmap: &mut BitMap) -> bool {
    match BitMap::from_file(path.as_ref()) {
        Ok(loaded) => {
            *bitmap = loaded;
            true
        }
        Err(e) => {
            log::error!("Failed to load bitmap: {e}");
            false
        }
    }
}

/// What the array builder needs to know about a source texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SliceInfo {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub mip_level_count: u32,
    pub usage: wgpu::TextureUsages,
}

impl From<&wgpu::Texture> for SliceInfo {
    fn from(texture: &wgpu::Texture) -> Self {
        Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            mip_level_count: texture.mip_level_count(),
            usage: texture.usage(),
        }
    }
}

/// Make sure the slices can be copied into one array.
pub(crate) fn check_uniform(slices: &[SliceInfo]) -> Result<()> {
    let first = slices
        .first()
        .ok_or_else(|| GfxError::InvalidInput("no textures to build an array from".into()))?;
    for (index, slice) in slices.iter().enumerate() {
        if !slice.usage.contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(GfxError::InvalidInput(format!(
                "texture {index} was created without COPY_SRC"
            ))
            .into());
        }
        let reason = if (slice.width, slice.height) != (first.width, first.height) {
            format!(
                "size {}x{} differs from {}x{}",
                slice.width, slice.height, first.width, first.height
            )
        } else if slice.format != first.format {
            format!("format {:?} differs from {:?}", slice.format, first.format)
        } else if slice.mip_level_count != first.mip_level_count {
            format!(
                "{} mip levels instead of {}",
                slice.mip_level_count, first.mip_level_count
            )
        } else {
            continue;
        };
        return Err(GfxError::Mismatch { index, reason }.into());
    }
    Ok(())
}

/// Everything the array builder validates before creating resources.
pub(crate) fn check_array_request(
    slices: &[SliceInfo],
    view: ArrayView,
    max_layers: u32,
) -> Result<()> {
    check_uniform(slices)?;
    let first = slices[0];
    let layers = slices.len() as u32;
    if layers > max_layers {
        return Err(GfxError::Device(format!(
            "{layers} layers requested, the device allows {max_layers}"
        ))
        .into());
    }
    if view == ArrayView::Cube {
        if layers < CubeFace::COUNT {
            return Err(GfxError::InvalidInput(format!(
                "a cube view needs {} layers, got {layers}",
                CubeFace::COUNT
            ))
            .into());
        }
        if first.width != first.height {
            return Err(GfxError::InvalidInput(format!(
                "cube faces must be square, got {}x{}",
                first.width, first.height
            ))
            .into());
        }
    }
    Ok(())
}

/// Build one array texture out of `textures`, layer `i` being `textures[i]`.
///
/// All sources must share size, format and mip count and carry `COPY_SRC`.
/// `COPY_DST` is always added to `desc.usage`, the copies need it.
pub fn create_texture_2d_array(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    textures: &[&wgpu::Texture],
    desc: &TextureArrayDesc,
) -> Result<TextureArray> {
    let slices: Vec<SliceInfo> = textures.iter().map(|t| SliceInfo::from(*t)).collect();
    check_array_request(&slices, desc.view, device.limits().max_texture_array_layers)?;
    let first = slices[0];
    let layers = textures.len() as u32;

    let base = wgpu::Extent3d {
        width: first.width,
        height: first.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: desc.label,
        size: wgpu::Extent3d {
            depth_or_array_layers: layers,
            ..base
        },
        mip_level_count: first.mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: first.format,
        usage: desc.usage | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Array Copy Encoder"),
    });
    for (layer, &source) in textures.iter().enumerate() {
        for mip in 0..first.mip_level_count {
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: source,
                    mip_level: mip,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                },
                base.mip_level_size(mip, wgpu::TextureDimension::D2)
                    .physical_size(first.format),
            );
        }
    }
    queue.submit(std::iter::once(encoder.finish()));

    let view = match desc.view {
        ArrayView::None => None,
        ArrayView::D2Array => Some(texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_array_layer: 0,
            array_layer_count: Some(layers),
            ..Default::default()
        })),
        ArrayView::Cube => Some(texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(wgpu::TextureViewDimension::Cube),
            base_array_layer: 0,
            array_layer_count: Some(CubeFace::COUNT),
            ..Default::default()
        })),
    };

    log::debug!(
        "Created {layers} layer texture array {:?} ({}x{}, {:?}, {} mips)",
        desc.label,
        first.width,
        first.height,
        first.format,
        first.mip_level_count
    );

    Ok(TextureArray {
        texture,
        view,
        layers,
        mip_level_count: first.mip_level_count,
    })
}

/// Load DDS files into one array. The files must agree on size, format and mips.
///
/// With `generate_mips` single level RGBA8/BGRA8 files get a full chain;
/// other files keep the chain they store.
pub fn create_dds_texture_2d_array_from_file<P: AsRef<Path>>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    paths: &[P],
    generate_mips: bool,
) -> Result<TextureArray> {
    let mut textures = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let mut dds = DdsImage::from_file(path)?;
        if generate_mips && !dds.generate_mips() {
            log::warn!(
                "Cannot generate mips for {path:?} ({:?}, {} stored levels), using the stored chain",
                dds.format,
                dds.levels.len()
            );
        }
        textures.push(dds.upload(device, queue, path.to_str())?);
    }
    let sources: Vec<&wgpu::Texture> = textures.iter().collect();
    create_texture_2d_array(
        device,
        queue,
        &sources,
        &TextureArrayDesc {
            label: Some("dds texture array"),
            ..Default::default()
        },
    )
}

/// Load common image files (PNG, JPEG, BMP, ...) into one sRGB array.
pub fn create_wic_texture_2d_array_from_file<P: AsRef<Path>>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    paths: &[P],
    generate_mips: bool,
) -> Result<TextureArray> {
    let images = paths
        .iter()
        .map(|p| load_rgba(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let textures = upload_all(device, queue, images, generate_mips)?;
    let sources: Vec<&wgpu::Texture> = textures.iter().collect();
    create_texture_2d_array(
        device,
        queue,
        &sources,
        &TextureArrayDesc {
            label: Some("wic texture array"),
            ..Default::default()
        },
    )
}

/// Build a cubemap from one image holding the faces as a 4:3 cross.
///
/// ```text
/// .  +Y .  .
/// -X +Z +X -Z
/// .  -Y .  .
/// ```
pub fn create_wic_texture_2d_cube_from_file(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: impl AsRef<Path>,
    generate_mips: bool,
) -> Result<Cubemap> {
    let path = path.as_ref();
    let cross = load_rgba(path)?;
    let faces = split_cross(&cross).map_err(|reason| GfxError::decode(path, reason))?;
    let textures = upload_all(device, queue, faces, generate_mips)?;
    build_cubemap(device, queue, &textures, true)
}

/// Build a cubemap from faces given in layer order (+X, -X, +Y, -Y, +Z, -Z).
///
/// More than six faces may be passed; the extra layers end up in the array
/// for the caller to create further views over (see
/// [`TextureArray::create_layer_view`]). The cube view is only created for
/// exactly six faces, unless `force_cube_view` asks for one over the first six.
pub fn create_wic_texture_2d_cube_from_files<P: AsRef<Path>>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    paths: &[P],
    generate_mips: bool,
    force_cube_view: bool,
) -> Result<Cubemap> {
    if paths.len() < CubeFace::COUNT as usize {
        return Err(GfxError::InvalidInput(format!(
            "a cubemap needs at least {} faces, got {}",
            CubeFace::COUNT,
            paths.len()
        ))
        .into());
    }
    let mut faces = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let face = load_rgba(path.as_ref())?;
        if face.width() != face.height() {
            return Err(GfxError::Mismatch {
                index,
                reason: format!("cube face is {}x{}, not square", face.width(), face.height()),
            }
            .into());
        }
        faces.push(face);
    }
    let textures = upload_all(device, queue, faces, generate_mips)?;
    let cube_view = paths.len() == CubeFace::COUNT as usize || force_cube_view;
    build_cubemap(device, queue, &textures, cube_view)
}

fn build_cubemap(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    textures: &[wgpu::Texture],
    cube_view: bool,
) -> Result<Cubemap> {
    let sources: Vec<&wgpu::Texture> = textures.iter().collect();
    let desc = if cube_view {
        TextureArrayDesc::cube(Some("cubemap"))
    } else {
        TextureArrayDesc {
            label: Some("cubemap faces"),
            ..Default::default()
        }
    };
    let mut array = create_texture_2d_array(device, queue, &sources, &desc)?;
    let cube_view = if cube_view { array.view.take() } else { None };
    Ok(Cubemap { array, cube_view })
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let bytes = load_binary(path)?;
    let img = image::load_from_memory(&bytes).map_err(|e| GfxError::decode(path, e))?;
    Ok(img.to_rgba8())
}

fn upload_all(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    images: Vec<RgbaImage>,
    generate_mips: bool,
) -> Result<Vec<wgpu::Texture>> {
    images
        .into_iter()
        .enumerate()
        .map(|(i, img)| {
            let levels = mip_chain(img, generate_mips);
            upload_rgba_levels(device, queue, &levels, Some(&format!("array source {i}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::texture::Texture;

    fn slice(width: u32, format: wgpu::TextureFormat, mips: u32) -> SliceInfo {
        SliceInfo {
            width,
            height: width,
            format,
            mip_level_count: mips,
            usage: Texture::SOURCE_USAGE,
        }
    }

    #[test]
    fn uniform_slices_pass() {
        let s = slice(64, wgpu::TextureFormat::Rgba8UnormSrgb, 7);
        check_uniform(&[s, s, s]).unwrap();
    }

    #[test]
    fn mismatches_name_the_offending_texture() {
        let s = slice(64, wgpu::TextureFormat::Rgba8UnormSrgb, 7);
        let cases = [
            slice(32, wgpu::TextureFormat::Rgba8UnormSrgb, 7),
            slice(64, wgpu::TextureFormat::Rgba8Unorm, 7),
            slice(64, wgpu::TextureFormat::Rgba8UnormSrgb, 1),
        ];
        for bad in cases {
            let err = check_uniform(&[s, s, bad]).unwrap_err();
            match err.downcast_ref::<GfxError>() {
                Some(GfxError::Mismatch { index, .. }) => assert_eq!(*index, 2),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn empty_or_uncopyable_sources_are_rejected() {
        assert!(check_uniform(&[]).is_err());
        let mut s = slice(4, wgpu::TextureFormat::Rgba8Unorm, 1);
        s.usage = wgpu::TextureUsages::TEXTURE_BINDING;
        let err = check_uniform(&[s]).unwrap_err();
        assert!(matches!(err.downcast_ref::<GfxError>(), Some(GfxError::InvalidInput(_))));
    }

    fn error_of(result: Result<()>) -> GfxError {
        result.unwrap_err().downcast::<GfxError>().unwrap()
    }

    #[test]
    fn array_requests_respect_layer_limit() {
        let s = slice(16, wgpu::TextureFormat::Rgba8UnormSrgb, 1);
        check_array_request(&[s; 4], ArrayView::D2Array, 4).unwrap();
        assert!(matches!(
            error_of(check_array_request(&[s; 5], ArrayView::D2Array, 4)),
            GfxError::Device(_)
        ));
    }

    #[test]
    fn cube_requests_need_six_square_layers() {
        let square = slice(16, wgpu::TextureFormat::Rgba8UnormSrgb, 1);
        check_array_request(&[square; 6], ArrayView::Cube, 256).unwrap();
        check_array_request(&[square; 12], ArrayView::Cube, 256).unwrap();
        assert!(matches!(
            error_of(check_array_request(&[square; 5], ArrayView::Cube, 256)),
            GfxError::InvalidInput(_)
        ));

        let wide = SliceInfo { height: 8, ..square };
        assert!(matches!(
            error_of(check_array_request(&[wide; 6], ArrayView::Cube, 256)),
            GfxError::InvalidInput(_)
        ));
        // Non-square layers are fine without a cube view.
        check_array_request(&[wide; 6], ArrayView::D2Array, 256).unwrap();
    }

    #[test]
    fn load_bitmap_leaves_output_untouched_on_failure() {
        let mut bitmap = BitMap {
            width: 1,
            height: 1,
            data: vec![9, 9, 9, 9],
        };
        let before = bitmap.clone();
        assert!(!load_bitmap("no/such/heightmap.png", &mut bitmap));
        assert_eq!(bitmap, before);
    }

    #[test]
    fn load_bitmap_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.png");
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([10, 20, 30, 40]));
        img.save(&path).unwrap();

        let mut bitmap = BitMap::default();
        assert!(load_bitmap(&path, &mut bitmap));
        assert_eq!((bitmap.width, bitmap.height), (3, 2));
        assert_eq!(bitmap.pixel(2, 1), [10, 20, 30, 40]);
    }
}
