use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::GraphicsContext;
use crate::compile::{naga_stage, validate_glsl};
use crate::types::{ContextApi, FrameUniforms, GpuPowerPreference, PixelSize, StageKind};

use super::pipeline::{build_pipeline, PipelineLayouts};
use super::uniforms::FrameUniformBlock;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// What the selected adapter reported about itself.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterProfile {
    fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    pub fn is_software(&self) -> bool {
        self.device_type == wgpu::DeviceType::Cpu
    }
}

enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        size: PixelSize,
    },
}

/// Compiled shader module for one stage.
pub struct WgpuStage {
    module: wgpu::ShaderModule,
}

/// Linked render pipeline.
pub struct WgpuProgram {
    pipeline: wgpu::RenderPipeline,
}

/// wgpu-backed [`GraphicsContext`] rendering to a window or a texture.
pub struct WgpuContext {
    api: ContextApi,
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    format: wgpu::TextureFormat,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    adapter_profile: AdapterProfile,
}

fn backends_for(api: ContextApi) -> wgpu::Backends {
    match api {
        ContextApi::Modern => wgpu::Backends::PRIMARY,
        ContextApi::Legacy => wgpu::Backends::GL,
    }
}

fn new_instance(api: ContextApi) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: backends_for(api),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn open_device(
    instance: &wgpu::Instance,
    power: GpuPowerPreference,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let power_preference = match power {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    };
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("shaderlens device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    device.on_uncaptured_error(Box::new(|err| {
        tracing::error!(%err, "uncaptured GPU error");
    }));

    Ok((adapter, device, queue))
}

fn offscreen_texture(device: &wgpu::Device, size: PixelSize) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("shaderlens offscreen target"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

impl WgpuContext {
    pub(crate) fn for_window(
        window: Arc<Window>,
        api: ContextApi,
        power: GpuPowerPreference,
    ) -> Result<Self> {
        let instance = new_instance(api);
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create rendering surface")?;
        let (adapter, device, queue) = open_device(&instance, power, Some(&surface))?;

        let caps = surface.get_capabilities(&adapter);
        // Shader output is already display-referred; avoid a second encode.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        };
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self::assemble(
            api,
            instance,
            &adapter,
            device,
            queue,
            RenderTarget::Window { surface, config },
            format,
        ))
    }

    pub(crate) fn offscreen(
        size: PixelSize,
        api: ContextApi,
        power: GpuPowerPreference,
    ) -> Result<Self> {
        let instance = new_instance(api);
        let (adapter, device, queue) = open_device(&instance, power, None)?;

        let max_dimension = adapter.limits().max_texture_dimension_2d;
        if size.width > max_dimension || size.height > max_dimension {
            bail!("GPU max texture dimension is {max_dimension}, requested target is {size}");
        }
        let texture = offscreen_texture(&device, size);

        Ok(Self::assemble(
            api,
            instance,
            &adapter,
            device,
            queue,
            RenderTarget::Offscreen { texture, size },
            OFFSCREEN_FORMAT,
        ))
    }

    fn assemble(
        api: ContextApi,
        instance: wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: RenderTarget,
        format: wgpu::TextureFormat,
    ) -> Self {
        let adapter_profile = AdapterProfile::from_info(&adapter.get_info());
        tracing::debug!(
            %api,
            name = %adapter_profile.name,
            backend = ?adapter_profile.backend,
            device_type = ?adapter_profile.device_type,
            software = adapter_profile.is_software(),
            ?format,
            "selected GPU adapter"
        );

        let layouts = PipelineLayouts::new(&device);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniform buffer"),
            size: FrameUniformBlock::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            api,
            _instance: instance,
            device,
            queue,
            target,
            format,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            adapter_profile,
        }
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.adapter_profile
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Size of the render target as currently configured.
    pub fn target_size(&self) -> PixelSize {
        match &self.target {
            RenderTarget::Window { config, .. } => PixelSize::new(config.width, config.height),
            RenderTarget::Offscreen { size, .. } => *size,
        }
    }

    fn ensure_target_size(&mut self, size: PixelSize) {
        if self.target_size() == size {
            return;
        }
        match &mut self.target {
            RenderTarget::Window { surface, config } => {
                config.width = size.width;
                config.height = size.height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture, size: current } => {
                *texture = offscreen_texture(&self.device, size);
                *current = size;
            }
        }
        tracing::debug!(%size, "render target resized");
    }

    /// Runs `f` inside a validation error scope and reports what it caught.
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn encode_quad(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        program: &WgpuProgram,
        quad: &wgpu::Buffer,
        viewport: PixelSize,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("shaderlens pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_vertex_buffer(0, quad.slice(..));
        render_pass.set_viewport(
            0.0,
            0.0,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        render_pass.draw(0..4, 0..1);
    }

    /// Copies the offscreen target into tightly packed RGBA8 rows, top row
    /// first.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        let RenderTarget::Offscreen { texture, size } = &self.target else {
            bail!("pixel readback requires an offscreen surface");
        };
        let unpadded_row = size.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = unpadded_row.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shaderlens readback"),
            size: u64::from(padded_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shaderlens readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed to wait for readback: {err}"))?;
        receiver
            .recv()
            .context("readback callback dropped")?
            .map_err(|err| anyhow!("failed to map readback buffer: {err}"))?;

        let mut pixels = Vec::with_capacity((unpadded_row * size.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        buffer.unmap();
        Ok(pixels)
    }

    /// Reads the offscreen target back as an image.
    pub fn capture(&self) -> Result<image::RgbaImage> {
        let size = self.target_size();
        let pixels = self.read_pixels()?;
        image::RgbaImage::from_raw(size.width, size.height, pixels)
            .ok_or_else(|| anyhow!("readback size does not match {size}"))
    }
}

impl GraphicsContext for WgpuContext {
    type Stage = WgpuStage;
    type Program = WgpuProgram;
    type Buffer = wgpu::Buffer;

    fn api(&self) -> ContextApi {
        self.api
    }

    fn create_quad(&mut self, vertices: &[[f32; 2]; 4]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("shaderlens quad"),
                contents: bytemuck::cast_slice(&vertices[..]),
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    fn compile_stage(&mut self, kind: StageKind, source: &str) -> Result<WgpuStage, String> {
        // naga reports body-relative locations; wgpu would report the wrapped ones.
        validate_glsl(kind, source)?;
        let module = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kind.label()),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Borrowed(source),
                    stage: naga_stage(kind),
                    defines: &[],
                },
            })
        })?;
        Ok(WgpuStage { module })
    }

    fn release_stage(&mut self, stage: WgpuStage) {
        drop(stage);
    }

    fn link_program(
        &mut self,
        vertex: &WgpuStage,
        fragment: &WgpuStage,
    ) -> Result<WgpuProgram, String> {
        let pipeline = self.scoped(|device| {
            build_pipeline(
                device,
                &self.layouts,
                &vertex.module,
                &fragment.module,
                self.format,
            )
        })?;
        Ok(WgpuProgram { pipeline })
    }

    fn release_program(&mut self, program: WgpuProgram) {
        drop(program);
    }

    fn draw_quad(
        &mut self,
        program: &WgpuProgram,
        quad: &wgpu::Buffer,
        viewport: PixelSize,
        uniforms: &FrameUniforms,
    ) {
        if viewport.is_empty() {
            tracing::trace!("skipping draw on an empty surface");
            return;
        }
        self.ensure_target_size(viewport);
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&FrameUniformBlock::from(uniforms)),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shaderlens frame encoder"),
            });

        match &self.target {
            RenderTarget::Window { surface, config } => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        tracing::warn!("surface lost or outdated; reconfiguring");
                        surface.configure(&self.device, config);
                        return;
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("timed out acquiring surface texture; skipping frame");
                        return;
                    }
                    Err(err) => {
                        tracing::error!(%err, "failed to acquire surface texture");
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.encode_quad(&mut encoder, &view, program, quad, viewport);
                self.queue.submit(Some(encoder.finish()));
                frame.present();
            }
            RenderTarget::Offscreen { texture, .. } => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.encode_quad(&mut encoder, &view, program, quad, viewport);
                self.queue.submit(Some(encoder.finish()));
            }
        }
    }
}
