use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::error::BootstrapError;
use crate::types::{BackendChoice, VsyncMode, WireframeStrategy};

/// Instance, device and swapchain for one window.
pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub wireframe: WireframeStrategy,
    _instance: wgpu::Instance,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        backend: BackendChoice,
        vsync: VsyncMode,
    ) -> Result<Self, BootstrapError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backend.backends(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| BootstrapError::Surface(format!("no window handle: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| BootstrapError::Surface(format!("no display handle: {err}")))?;

        // The window outlives the surface: both are owned by the window state
        // and the surface is dropped first.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| BootstrapError::Surface(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| BootstrapError::Adapter {
            backend: backend.to_string(),
            reason: err.to_string(),
        })?;

        let info = adapter.get_info();
        tracing::info!(
            name = %info.name,
            backend = ?info.backend,
            driver = %info.driver,
            driver_info = %info.driver_info,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        if width > max_dimension || height > max_dimension {
            return Err(BootstrapError::SurfaceTooLarge {
                max: max_dimension,
                width,
                height,
            });
        }

        let wireframe = WireframeStrategy::for_features(adapter.features());
        let required_features = match wireframe {
            WireframeStrategy::PolygonLine => wgpu::Features::POLYGON_MODE_LINE,
            WireframeStrategy::EdgeList => wgpu::Features::empty(),
        };
        tracing::debug!(?wireframe, "wireframe strategy");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("quadlab device"),
            required_features,
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| BootstrapError::Device(err.to_string()))?;

        // Errors outside a scope mean a resource was misused mid-frame; there
        // is no recovery path, so report and stop.
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "unrecoverable GPU error");
            std::process::abort();
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats).ok_or_else(|| {
            BootstrapError::Surface("surface reports no supported formats".to_string())
        })?;
        let present_mode = pick_present_mode(&caps.present_modes, vsync);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, ?vsync, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size: PhysicalSize::new(width, height),
            wireframe,
            _instance: instance,
        })
    }

    pub(crate) fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        tracing::debug!(width = new_size.width, height = new_size.height, "surface resized");
    }

    /// Re-applies the current configuration after the surface was lost.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Prefers a non-sRGB format so shader colors reach the screen unconverted,
/// matching a default GL framebuffer.
pub(crate) fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    let linear = formats.iter().copied().find(|format| !format.is_srgb());
    if linear.is_none() && !formats.is_empty() {
        tracing::warn!(
            fallback = ?formats[0],
            "no non-sRGB surface format available; colors will be gamma encoded"
        );
    }
    linear.or_else(|| formats.first().copied())
}

/// Fifo when vsync is on. Otherwise Immediate, then Mailbox, then Fifo.
pub(crate) fn pick_present_mode(modes: &[wgpu::PresentMode], vsync: VsyncMode) -> wgpu::PresentMode {
    let has = |wanted: wgpu::PresentMode| modes.contains(&wanted).then_some(wanted);
    match vsync {
        VsyncMode::On => wgpu::PresentMode::Fifo,
        VsyncMode::Off => has(wgpu::PresentMode::Immediate)
            .or_else(|| has(wgpu::PresentMode::Mailbox))
            .unwrap_or(wgpu::PresentMode::Fifo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::{PresentMode, TextureFormat};

    #[test]
    fn non_srgb_format_is_preferred() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Bgra8Unorm));
    }

    #[test]
    fn srgb_only_surface_falls_back() {
        let formats = [TextureFormat::Rgba8UnormSrgb];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Rgba8UnormSrgb));
        assert_eq!(pick_surface_format(&[]), None);
    }

    #[test]
    fn vsync_selects_present_mode() {
        let all = [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate];
        assert_eq!(pick_present_mode(&all, VsyncMode::On), PresentMode::Fifo);
        assert_eq!(pick_present_mode(&all, VsyncMode::Off), PresentMode::Immediate);
        assert_eq!(
            pick_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox], VsyncMode::Off),
            PresentMode::Mailbox
        );
        assert_eq!(pick_present_mode(&[PresentMode::Fifo], VsyncMode::Off), PresentMode::Fifo);
    }
}
