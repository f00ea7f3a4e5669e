use anyhow::{Context as _, Result};

/// Device and queue without a surface.
///
/// The engine brings its own device; this is for tools and tests that need
/// one to build resources offscreen.
#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request an adapter and device. Block compression is enabled when the
    /// adapter has it, so DDS arrays with BC formats can be built.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::PRIMARY),
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::debug!("Using adapter {:?}", adapter.get_info());

        let required_features = adapter.features() & wgpu::Features::TEXTURE_COMPRESSION_BC;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("potato-gfx headless device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .context("failed to create device")?;

        Ok(Self { device, queue })
    }

    pub fn headless_blocking() -> Result<Self> {
        futures::executor::block_on(Self::headless())
    }
}
