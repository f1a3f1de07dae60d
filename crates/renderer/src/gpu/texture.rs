use image::imageops::{self, FilterType};
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::{ReadbackError, UploadError};
use crate::types::SamplerOptions;

use super::pipeline::{SAMPLER_BINDING, TEXTURE_BINDING};
use super::readback;

const BYTES_PER_PIXEL: u32 = 4;

/// One level of a mip chain, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A sampled 2D texture with a full mip chain and its sampler.
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    mip_level_count: u32,
}

impl Texture {
    /// Uploads RGBA8 pixels, generating every mip level down to 1x1.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: SamplerOptions,
    ) -> Result<Self, UploadError> {
        check_pixels(pixels.len(), width, height)?;
        let max = device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(UploadError::TooLarge { width, height, max });
        }

        let chain = mip_chain(pixels, width, height)?;
        let mip_level_count = chain.len() as u32;
        let data: Vec<u8> = chain.into_iter().flat_map(|level| level.pixels).collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("image texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            &data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let address_mode = options.wrap.address_mode();
        let filter = options.filter.filter_mode();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("image sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            ..Default::default()
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(UploadError::Device(error.to_string()));
        }

        tracing::debug!(width, height, mip_level_count, ?options, "uploaded texture");

        Ok(Self {
            texture,
            view,
            sampler,
            width,
            height,
            mip_level_count,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub(crate) fn bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&self.view),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Reads the base level back as tightly packed RGBA8.
    pub fn read_level0(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<u8>, ReadbackError> {
        let row_bytes = self.width * BYTES_PER_PIXEL;
        let padded = padded_row_bytes(self.width);
        let staging = readback::staging_buffer(device, u64::from(padded) * u64::from(self.height));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let bytes = readback::map_staging(device, &staging)?;
        Ok(bytes
            .chunks_exact(padded as usize)
            .flat_map(|row| &row[..row_bytes as usize])
            .copied()
            .collect())
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mip_level_count", &self.mip_level_count)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_pixels(len: usize, width: u32, height: u32) -> Result<(), UploadError> {
    if width == 0 || height == 0 {
        return Err(UploadError::EmptyDimensions { width, height });
    }
    let expected = width as usize * height as usize * BYTES_PER_PIXEL as usize;
    if len != expected {
        return Err(UploadError::ByteCount {
            width,
            height,
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Base level plus successively halved levels down to 1x1.
pub fn mip_chain(pixels: &[u8], width: u32, height: u32) -> Result<Vec<MipLevel>, UploadError> {
    check_pixels(pixels.len(), width, height)?;
    let base = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(UploadError::ByteCount {
        width,
        height,
        expected: width as usize * height as usize * BYTES_PER_PIXEL as usize,
        actual: pixels.len(),
    })?;

    let levels = 32 - width.max(height).leading_zeros();
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(MipLevel {
        width,
        height,
        pixels: pixels.to_vec(),
    });
    for level in 1..levels {
        let level_width = (width >> level).max(1);
        let level_height = (height >> level).max(1);
        let resized = imageops::resize(&base, level_width, level_height, FilterType::Triangle);
        chain.push(MipLevel {
            width: level_width,
            height: level_height,
            pixels: resized.into_raw(),
        });
    }
    Ok(chain)
}

fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}
