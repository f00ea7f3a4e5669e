//! Reading single 2D textures out of DDS containers.
//!
//! Both the legacy header (FourCC and RGB masks) and the DX10 extension are
//! understood. Cube maps, volumes and arrays stored inside one DDS file are
//! rejected: arrays are assembled from several files instead.

use std::path::Path;

use anyhow::Result;
use image::RgbaImage;

use crate::{
    data_structures::texture::{Texture, check_texture_request, mip_chain, mip_level_count},
    error::GfxError,
    resources::load_binary,
};

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: usize = 124;
const DX10_HEADER_SIZE: usize = 20;

const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;
const DX10_MISC_TEXTURECUBE: u32 = 0x4;
const DX10_DIMENSION_TEXTURE2D: u32 = 3;

/// A decoded DDS texture: its format and the bytes of every stored mip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DdsImage {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub levels: Vec<Vec<u8>>,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

fn format_from_fourcc(code: u32) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as F;
    Some(match code {
        c if c == fourcc(b"DXT1") => F::Bc1RgbaUnorm,
        c if c == fourcc(b"DXT2") || c == fourcc(b"DXT3") => F::Bc2RgbaUnorm,
        c if c == fourcc(b"DXT4") || c == fourcc(b"DXT5") => F::Bc3RgbaUnorm,
        c if c == fourcc(b"ATI1") || c == fourcc(b"BC4U") => F::Bc4RUnorm,
        c if c == fourcc(b"BC4S") => F::Bc4RSnorm,
        c if c == fourcc(b"ATI2") || c == fourcc(b"BC5U") => F::Bc5RgUnorm,
        c if c == fourcc(b"BC5S") => F::Bc5RgSnorm,
        // D3DFMT_A16B16G16R16F and D3DFMT_A32B32G32R32F
        113 => F::Rgba16Float,
        116 => F::Rgba32Float,
        _ => return None,
    })
}

fn format_from_dxgi(dxgi: u32) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as F;
    Some(match dxgi {
        2 => F::Rgba32Float,
        10 => F::Rgba16Float,
        28 => F::Rgba8Unorm,
        29 => F::Rgba8UnormSrgb,
        71 => F::Bc1RgbaUnorm,
        72 => F::Bc1RgbaUnormSrgb,
        74 => F::Bc2RgbaUnorm,
        75 => F::Bc2RgbaUnormSrgb,
        77 => F::Bc3RgbaUnorm,
        78 => F::Bc3RgbaUnormSrgb,
        80 => F::Bc4RUnorm,
        81 => F::Bc4RSnorm,
        83 => F::Bc5RgUnorm,
        84 => F::Bc5RgSnorm,
        87 => F::Bgra8Unorm,
        91 => F::Bgra8UnormSrgb,
        98 => F::Bc7RgbaUnorm,
        99 => F::Bc7RgbaUnormSrgb,
        _ => return None,
    })
}

fn format_from_masks(bit_count: u32, masks: [u32; 4]) -> Option<wgpu::TextureFormat> {
    if bit_count != 32 {
        return None;
    }
    match masks {
        [0x0000_00ff, 0x0000_ff00, 0x00ff_0000, _] => Some(wgpu::TextureFormat::Rgba8Unorm),
        [0x00ff_0000, 0x0000_ff00, 0x0000_00ff, _] => Some(wgpu::TextureFormat::Bgra8Unorm),
        _ => None,
    }
}

/// Largest width or height accepted from a file, the D3D11 2D texture limit.
const MAX_DIMENSION: u32 = 16384;

/// Byte size of one mip level of `format` at the given size.
///
/// `None` when the format has no fixed block size or the size overflows.
fn level_size(format: wgpu::TextureFormat, width: u32, height: u32) -> Option<usize> {
    let (bw, bh) = format.block_dimensions();
    let block_bytes = u64::from(format.block_copy_size(None)?);
    let size = u64::from(width.div_ceil(bw))
        .checked_mul(u64::from(height.div_ceil(bh)))?
        .checked_mul(block_bytes)?;
    usize::try_from(size).ok()
}

impl DdsImage {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = load_binary(path)?;
        Ok(Self::decode(&bytes).map_err(|reason| GfxError::decode(path, reason))?)
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < 4 + HEADER_SIZE || &bytes[..4] != MAGIC {
            return Err("missing DDS magic or truncated header".into());
        }
        if read_u32(bytes, 4) as usize != HEADER_SIZE {
            return Err("unexpected DDS header size".into());
        }
        let height = read_u32(bytes, 12);
        let width = read_u32(bytes, 16);
        let declared_mips = read_u32(bytes, 28);
        let pf_flags = read_u32(bytes, 80);
        let pf_fourcc = read_u32(bytes, 84);
        let caps2 = read_u32(bytes, 112);

        if width == 0 || height == 0 {
            return Err("zero sized DDS texture".into());
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(format!(
                "{width}x{height} exceeds the {MAX_DIMENSION} texel limit"
            ));
        }
        // Files may claim more levels than the size allows.
        let mip_count = declared_mips.clamp(1, mip_level_count(width, height));
        if caps2 & (DDSCAPS2_CUBEMAP | DDSCAPS2_VOLUME) != 0 {
            return Err("cube and volume DDS files are not 2D textures".into());
        }

        let mut offset = 4 + HEADER_SIZE;
        let format = if pf_flags & DDPF_FOURCC != 0 && pf_fourcc == fourcc(b"DX10") {
            if bytes.len() < offset + DX10_HEADER_SIZE {
                return Err("truncated DX10 header".into());
            }
            let dxgi = read_u32(bytes, offset);
            let dimension = read_u32(bytes, offset + 4);
            let misc = read_u32(bytes, offset + 8);
            let array_size = read_u32(bytes, offset + 12);
            offset += DX10_HEADER_SIZE;
            if dimension != DX10_DIMENSION_TEXTURE2D || misc & DX10_MISC_TEXTURECUBE != 0 {
                return Err("DX10 resource is not a plain 2D texture".into());
            }
            if array_size > 1 {
                return Err(format!("DDS holds an array of {array_size} textures"));
            }
            format_from_dxgi(dxgi).ok_or_else(|| format!("unsupported DXGI format {dxgi}"))?
        } else if pf_flags & DDPF_FOURCC != 0 {
            format_from_fourcc(pf_fourcc)
                .ok_or_else(|| format!("unsupported FourCC {pf_fourcc:#010x}"))?
        } else if pf_flags & DDPF_RGB != 0 {
            let masks = [
                read_u32(bytes, 92),
                read_u32(bytes, 96),
                read_u32(bytes, 100),
                read_u32(bytes, 104),
            ];
            format_from_masks(read_u32(bytes, 88), masks)
                .ok_or_else(|| "unsupported RGB pixel layout".to_string())?
        } else {
            return Err("unsupported DDS pixel format".into());
        };

        let mut levels = Vec::with_capacity(mip_count as usize);
        for mip in 0..mip_count {
            let w = (width >> mip).max(1);
            let h = (height >> mip).max(1);
            let size = level_size(format, w, h)
                .ok_or_else(|| format!("cannot size mip {mip} of {w}x{h} {format:?}"))?;
            let level = offset
                .checked_add(size)
                .and_then(|end| bytes.get(offset..end))
                .ok_or_else(|| format!("mip {mip} runs past the end of the file"))?;
            levels.push(level.to_vec());
            offset += size;
        }

        Ok(Self {
            width,
            height,
            format,
            levels,
        })
    }

    /// Replace the stored chain by a generated one.
    ///
    /// Only single-level 8 bit per channel data can be filtered on the CPU;
    /// anything else keeps what the file stores.
    pub fn generate_mips(&mut self) -> bool {
        use wgpu::TextureFormat as F;
        let eight_bit = matches!(
            self.format,
            F::Rgba8Unorm | F::Rgba8UnormSrgb | F::Bgra8Unorm | F::Bgra8UnormSrgb
        );
        if !eight_bit || self.levels.len() != 1 {
            return false;
        }
        // Filtering treats channels alike, so BGRA data survives the trip
        // through an RGBA container.
        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.levels[0].clone()) else {
            return false;
        };
        self.levels = mip_chain(base, true)
            .into_iter()
            .map(RgbaImage::into_raw)
            .collect();
        true
    }

    /// Create a texture holding every stored level.
    ///
    /// Fails before touching the device when it lacks the format's features,
    /// the size is over its limit or a block compressed base level is not
    /// made of whole blocks.
    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: Option<&str>,
    ) -> Result<wgpu::Texture> {
        check_texture_request(
            device.features(),
            &device.limits(),
            self.format,
            self.width,
            self.height,
        )?;
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: self.levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: Texture::SOURCE_USAGE,
            view_formats: &[],
        });

        let (bw, bh) = self.format.block_dimensions();
        let block_bytes = self.format.block_copy_size(None).unwrap_or(4);
        for (mip, data) in self.levels.iter().enumerate() {
            let level = size.mip_level_size(mip as u32, wgpu::TextureDimension::D2);
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: mip as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width.div_ceil(bw) * block_bytes),
                    rows_per_image: Some(level.height.div_ceil(bh)),
                },
                level.physical_size(self.format),
            );
        }

        Ok(texture)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal legacy DDS with RGBA8 masks and the given mip payloads.
    pub(crate) fn rgba_dds(width: u32, height: u32, levels: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0u8; 4 + HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        let mut put = |offset: usize, v: u32| out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        put(4, HEADER_SIZE as u32);
        put(12, height);
        put(16, width);
        put(28, levels.len() as u32);
        put(76, 32);
        put(80, DDPF_RGB | 0x1);
        put(88, 32);
        put(92, 0x0000_00ff);
        put(96, 0x0000_ff00);
        put(100, 0x00ff_0000);
        put(104, 0xff00_0000);
        for level in levels {
            out.extend_from_slice(level);
        }
        out
    }

    /// Legacy DDS with RGB masks in the given channel order.
    fn masked_dds(width: u32, height: u32, masks: [u32; 4], payload: usize) -> Vec<u8> {
        let mut out = rgba_dds(width, height, &[]);
        for (i, mask) in masks.iter().enumerate() {
            let offset = 92 + 4 * i;
            out[offset..offset + 4].copy_from_slice(&mask.to_le_bytes());
        }
        out.extend(std::iter::repeat_n(0u8, payload));
        out
    }

    fn fourcc_dds(width: u32, height: u32, code: &[u8; 4], payload: usize) -> Vec<u8> {
        let mut out = vec![0u8; 4 + HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        let mut put = |offset: usize, v: u32| out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        put(4, HEADER_SIZE as u32);
        put(12, height);
        put(16, width);
        put(28, 1);
        put(76, 32);
        put(80, DDPF_FOURCC);
        put(84, fourcc(code));
        out.extend(std::iter::repeat_n(0u8, payload));
        out
    }

    fn dx10_dds(width: u32, height: u32, dxgi: u32, payload: usize) -> Vec<u8> {
        let mut out = vec![0u8; 4 + HEADER_SIZE + DX10_HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        let mut put = |offset: usize, v: u32| out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        put(4, HEADER_SIZE as u32);
        put(12, height);
        put(16, width);
        put(28, 1);
        put(80, DDPF_FOURCC);
        put(84, fourcc(b"DX10"));
        put(128, dxgi);
        put(132, DX10_DIMENSION_TEXTURE2D);
        put(140, 1);
        out.extend(std::iter::repeat_n(0u8, payload));
        out
    }

    #[test]
    fn decodes_uncompressed_mip_chain() {
        let levels = vec![vec![1u8; 4 * 4 * 4], vec![2u8; 2 * 2 * 4], vec![3u8; 4]];
        let dds = DdsImage::decode(&rgba_dds(4, 4, &levels)).unwrap();
        assert_eq!(dds.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!((dds.width, dds.height), (4, 4));
        assert_eq!(dds.levels, levels);
    }

    #[test]
    fn decodes_dx10_block_compressed() {
        // 8x8 BC7 is 2x2 blocks of 16 bytes.
        let dds = DdsImage::decode(&dx10_dds(8, 8, 98, 64)).unwrap();
        assert_eq!(dds.format, wgpu::TextureFormat::Bc7RgbaUnorm);
        assert_eq!(dds.levels[0].len(), 64);
    }

    #[test]
    fn rejects_truncated_payload_and_bad_magic() {
        assert!(DdsImage::decode(&dx10_dds(8, 8, 98, 10)).is_err());
        assert!(DdsImage::decode(b"PNG whatever").is_err());
        assert!(DdsImage::decode(&dx10_dds(8, 8, 9999, 64)).is_err());
    }

    #[test]
    fn generates_mips_only_for_single_level_rgba() {
        let mut dds = DdsImage::decode(&rgba_dds(4, 2, &[vec![7u8; 4 * 2 * 4]])).unwrap();
        assert!(dds.generate_mips());
        let sizes: Vec<_> = dds.levels.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 8, 4]);

        let mut bc = DdsImage::decode(&dx10_dds(8, 8, 98, 64)).unwrap();
        assert!(!bc.generate_mips());
        assert_eq!(bc.levels.len(), 1);
    }

    #[test]
    fn decodes_legacy_fourcc_block_formats() {
        // 8x8 is 2x2 blocks: 8 bytes each for BC1, 16 for BC3 and BC5.
        let cases = [
            (b"DXT1", wgpu::TextureFormat::Bc1RgbaUnorm, 32),
            (b"DXT5", wgpu::TextureFormat::Bc3RgbaUnorm, 64),
            (b"ATI2", wgpu::TextureFormat::Bc5RgUnorm, 64),
        ];
        for (code, format, bytes) in cases {
            let dds = DdsImage::decode(&fourcc_dds(8, 8, code, bytes)).unwrap();
            assert_eq!(dds.format, format);
            assert_eq!(dds.levels, vec![vec![0u8; bytes]]);
        }
        assert!(DdsImage::decode(&fourcc_dds(8, 8, b"DXT1", 31)).is_err());
        assert!(DdsImage::decode(&fourcc_dds(8, 8, b"NOPE", 64)).is_err());
    }

    #[test]
    fn reads_channel_order_from_rgb_masks() {
        let bgra = [0x00ff_0000, 0x0000_ff00, 0x0000_00ff, 0xff00_0000];
        let dds = DdsImage::decode(&masked_dds(2, 2, bgra, 16)).unwrap();
        assert_eq!(dds.format, wgpu::TextureFormat::Bgra8Unorm);

        let rgb565 = [0xf800, 0x07e0, 0x001f, 0];
        assert!(DdsImage::decode(&masked_dds(2, 2, rgb565, 16)).is_err());
    }

    #[test]
    fn oversized_headers_are_decode_errors() {
        let mut huge = rgba_dds(1, 1, &[vec![0u8; 4]]);
        huge[12..16].copy_from_slice(&65536u32.to_le_bytes());
        huge[16..20].copy_from_slice(&65536u32.to_le_bytes());
        assert!(DdsImage::decode(&huge).is_err());

        // 16384^2 RGBA32F is 4 GiB for the base level alone.
        assert!(DdsImage::decode(&dx10_dds(16384, 16384, 2, 0)).is_err());
    }

    #[test]
    fn level_size_does_not_overflow() {
        assert_eq!(level_size(wgpu::TextureFormat::Rgba8Unorm, 4, 4), Some(64));
        assert_eq!(level_size(wgpu::TextureFormat::Bc1RgbaUnorm, 5, 5), Some(32));
        assert_eq!(level_size(wgpu::TextureFormat::Rgba32Float, u32::MAX, u32::MAX), None);
    }
}
