//! Device and queue bootstrap.
//!
//! The renderer draws into frame buffers it owns, so no surface is needed to
//! get going. Windowed applications create their surface from the same
//! instance settings and configure it themselves.

use anyhow::Context as _;

/// Adapter selection knobs, mutated in code before [`Context::headless`].
#[derive(Clone, Debug)]
pub struct ContextSettings {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Prefer a software adapter, useful on CI machines without a GPU.
    pub force_fallback_adapter: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl Context {
    pub async fn headless(settings: &ContextSettings) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: settings.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: settings.force_fallback_adapter,
            })
            .await
            .context("no graphics adapter matches the context settings")?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("dg-engine device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to open the graphics device")?;

        log::info!(
            "graphics context on {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );
        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// [`Context::headless`] driven to completion on the current thread.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn headless_blocking(settings: &ContextSettings) -> anyhow::Result<Self> {
        futures::executor::block_on(Self::headless(settings))
    }

    /// Blocks until every submitted command has finished.
    pub(crate) fn wait_idle(&self) -> anyhow::Result<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .context("device lost while waiting for the queue")?;
        Ok(())
    }
}
