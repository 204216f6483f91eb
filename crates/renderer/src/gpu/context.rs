use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::types::GpuOptions;

/// Most recent backend errors kept for diagnostics.
const WARNING_HISTORY: usize = 16;

/// Collects backend errors that surface outside an error scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuntimeWarnings {
    inner: Arc<Mutex<WarningLog>>,
}

#[derive(Debug, Default)]
struct WarningLog {
    total: usize,
    recent: Vec<String>,
}

impl RuntimeWarnings {
    pub fn push(&self, message: String) {
        if let Ok(mut log) = self.inner.lock() {
            log.total += 1;
            if log.recent.len() == WARNING_HISTORY {
                log.recent.remove(0);
            }
            log.recent.push(message);
        }
    }

    pub fn total(&self) -> usize {
        self.inner.lock().map(|log| log.total).unwrap_or(0)
    }

    pub fn recent(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|log| log.recent.clone())
            .unwrap_or_default()
    }

    /// Routes the device's uncaptured errors into this log.
    pub fn attach(&self, device: &wgpu::Device) {
        let sink = self.clone();
        device.on_uncaptured_error(Box::new(move |error| {
            let message = error.to_string();
            tracing::warn!(error = %message, "gpu runtime warning");
            sink.push(message);
        }));
    }
}

pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

pub(crate) fn request_adapter(
    instance: &wgpu::Instance,
    options: &GpuOptions,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: options.power_preference.into(),
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );
    Ok(adapter)
}

/// Opens a device, enabling timestamp queries when both the adapter and the
/// caller allow it. Returns whether they were enabled.
pub(crate) fn request_device(
    adapter: &wgpu::Adapter,
    options: &GpuOptions,
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue, bool)> {
    let timer_supported = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
    let timer_enabled = options.timer_queries && timer_supported;
    if options.timer_queries && !timer_supported {
        tracing::info!("adapter lacks timestamp queries; gpu timing disabled");
    }

    let mut required_features = wgpu::Features::empty();
    if timer_enabled {
        required_features |= wgpu::Features::TIMESTAMP_QUERY;
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some(label),
        required_features,
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    Ok((device, queue, timer_enabled))
}

/// Device, queue and configured surface for a live render target.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub timer_enabled: bool,
    pub warnings: RuntimeWarnings,
}

impl GpuContext {
    pub(crate) fn new<T>(target: &T, width: u32, height: u32, options: &GpuOptions) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the caller keeps `target` alive until the context is dropped.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, options, Some(&surface))?;
        let max_dimension = adapter.limits().max_texture_dimension_2d;
        let width = width.max(1);
        let height = height.max(1);
        if width > max_dimension || height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            );
        }

        let (device, queue, timer_enabled) = request_device(&adapter, options, "fragscope device")?;
        let warnings = RuntimeWarnings::default();
        warnings.attach(&device);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let requested_mode: wgpu::PresentMode = options.present_mode.into();
        let present_mode = if surface_caps.present_modes.contains(&requested_mode)
            || matches!(
                requested_mode,
                wgpu::PresentMode::AutoVsync | wgpu::PresentMode::AutoNoVsync
            ) {
            requested_mode
        } else {
            tracing::warn!(
                requested = ?requested_mode,
                "present mode not supported by surface; using fifo"
            );
            wgpu::PresentMode::Fifo
        };
        tracing::debug!(?present_mode, ?surface_format, timer_enabled, "configuring surface");

        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            timer_enabled,
            warnings,
        })
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}
