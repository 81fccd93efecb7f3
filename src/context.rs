use anyhow::anyhow;

use crate::state::WgpuState;

/// Device limits the texture manager checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Texture units available to a single shader stage.
    pub max_textures: u32,
    /// Largest width or height of a 2D texture.
    pub max_texture_size: u32,
}

impl Capabilities {
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        Self {
            max_textures: limits.max_sampled_textures_per_shader_stage,
            max_texture_size: limits.max_texture_dimension_2d,
        }
    }

    /// What every WebGL2 device provides.
    pub fn downlevel_webgl2() -> Self {
        Self::from_limits(&wgpu::Limits::downlevel_webgl2_defaults())
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::from_limits(&wgpu::Limits::default())
    }
}

/// Headless device and queue.
///
/// Texture residency needs no surface, so unlike a windowed renderer this only
/// requests an adapter and a device.
#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub capabilities: Capabilities,
}

impl Context {
    pub async fn new() -> anyhow::Result<Self> {
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter: {}", e))?;
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flow-residency device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;

        let capabilities = Capabilities::from_limits(&device.limits());
        log::debug!("{:?}", capabilities);

        Ok(Self {
            device,
            queue,
            capabilities,
        })
    }

    /// Device state for a texture manager. Device and queue are reference counted handles.
    pub fn state(&self) -> WgpuState {
        WgpuState::new(self.device.clone(), self.queue.clone())
    }
}

/// Installs the platform logger. Calling it more than once is harmless.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::warn!("Could not initialize logger: {}", e);
        }
    }
}
