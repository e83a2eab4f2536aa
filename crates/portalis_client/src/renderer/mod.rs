pub mod mesh;
pub mod pattern;
pub mod portal_targets;
pub mod scene_pipeline;

use std::fmt;
use std::sync::Arc;

use portalis_core::backend::{BackendError, CameraView, RenderBackend};
use portalis_core::frame::FrameState;
use portalis_shared::portal::{PairId, PortalScene, PortalSide, RenderTargetId};
use rustc_hash::FxHashMap;
use tracing::info;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::renderer::pattern::PatternRenderer;
use crate::renderer::portal_targets::{assign_render_targets, PortalTargets};
use crate::renderer::scene_pipeline::{
    create_texture_bind_group, ObjectUniform, ScenePipeline, SceneUniform,
};
use crate::scene::{GeometryRegistry, Material, MeshKind, SceneLighting};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Sizes of the offscreen textures the renderer owns.
#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    pub portal_texture_size: u32,
    pub pattern_texture_size: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderFrameStats {
    pub scene_passes: u32,
    pub draw_calls: u32,
    pub skipped_surfaces: u32,
}

#[derive(Debug)]
struct DepthTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Portalis Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

enum Output {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        _texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// Presentation frame acquired by `bind_default` and released by `present`.
struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Portal(RenderTargetId),
    Default,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug, Clone, Copy)]
enum ObjectTexture {
    Blank,
    Pattern,
    Portal(RenderTargetId),
}

struct GpuObject {
    mesh: MeshKind,
    _uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture: ObjectTexture,
    portal: Option<(PairId, PortalSide)>,
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    output: Output,
    color_format: wgpu::TextureFormat,
    depth_texture: DepthTexture,
    scene_pipeline: ScenePipeline,
    scene_uniform_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    _blank_texture: wgpu::Texture,
    blank_bind_group: wgpu::BindGroup,
    pattern_renderer: PatternRenderer,
    portal_targets: PortalTargets,
    meshes: FxHashMap<MeshKind, GpuMesh>,
    objects: Vec<GpuObject>,
    lighting: SceneLighting,
    background: wgpu::Color,
    options: RendererOptions,
    destination: Option<Destination>,
    clear_color: bool,
    clear_depth: bool,
    frame: Option<AcquiredFrame>,
    frame_time: f32,
    frame_stats: RenderFrameStats,
    last_frame_stats: RenderFrameStats,
}

#[derive(Debug)]
pub enum RendererInitError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RendererInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(err) => write!(f, "failed to create surface: {err}"),
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
            Self::UnsupportedSurface => write!(f, "adapter does not support this surface"),
        }
    }
}

impl std::error::Error for RendererInitError {}

impl Renderer {
    pub fn new(window: Arc<Window>, options: RendererOptions) -> Result<Self, RendererInitError> {
        let instance = create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(RendererInitError::CreateSurface)?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface))?;

        let initial_size = window.inner_size();
        let config = surface
            .get_default_config(&adapter, initial_size.width.max(1), initial_size.height.max(1))
            .ok_or(RendererInitError::UnsupportedSurface)?;
        surface.configure(&device, &config);

        let (width, height, format) = (config.width, config.height, config.format);
        Ok(Self::with_output(
            device,
            queue,
            Output::Surface { surface, config },
            format,
            width,
            height,
            options,
        ))
    }

    /// Renderer whose main view is an offscreen texture instead of a window.
    pub fn new_headless(
        width: u32,
        height: u32,
        options: RendererOptions,
    ) -> Result<Self, RendererInitError> {
        let instance = create_instance();
        let (_adapter, device, queue) = request_device(&instance, None)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Portalis Offscreen Color Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self::with_output(
            device,
            queue,
            Output::Offscreen {
                _texture: texture,
                view,
            },
            OFFSCREEN_FORMAT,
            width,
            height,
            options,
        ))
    }

    fn with_output(
        device: wgpu::Device,
        queue: wgpu::Queue,
        output: Output,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        options: RendererOptions,
    ) -> Self {
        let scene_pipeline = ScenePipeline::new(&device, color_format, DEPTH_FORMAT);
        let lighting = SceneLighting {
            sun_direction: glam::Vec3::Y,
            sun_color: glam::Vec3::ONE,
            points: Vec::new(),
        };

        let initial_uniform = SceneUniform::new(
            glam::Mat4::IDENTITY,
            glam::Vec3::ZERO,
            &lighting,
            0.0,
            options.pattern_texture_size as f32,
        );
        let scene_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Uniform Buffer"),
            contents: bytemuck::bytes_of(&initial_uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Uniform Bind Group"),
            layout: &scene_pipeline.scene_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_uniform_buffer.as_entire_binding(),
            }],
        });

        let (blank_texture, blank_bind_group) =
            create_blank_texture(&device, &queue, &scene_pipeline.texture_bind_group_layout);
        let pattern_renderer = PatternRenderer::new(
            &device,
            options.pattern_texture_size,
            &scene_pipeline.texture_bind_group_layout,
        );
        let portal_targets = PortalTargets::new(
            &device,
            0,
            options.portal_texture_size,
            color_format,
            &scene_pipeline.texture_bind_group_layout,
        );
        let depth_texture = DepthTexture::new(&device, width, height);

        Self {
            device,
            queue,
            output,
            color_format,
            depth_texture,
            scene_pipeline,
            scene_uniform_buffer,
            scene_bind_group,
            _blank_texture: blank_texture,
            blank_bind_group,
            pattern_renderer,
            portal_targets,
            meshes: FxHashMap::default(),
            objects: Vec::new(),
            lighting,
            background: wgpu::Color::BLACK,
            options,
            destination: None,
            clear_color: false,
            clear_depth: false,
            frame: None,
            frame_time: 0.0,
            frame_stats: RenderFrameStats::default(),
            last_frame_stats: RenderFrameStats::default(),
        }
    }

    /// Allocates a render target for every portal surface and uploads the
    /// registry's meshes and materials.
    pub fn prepare_scene(&mut self, portals: &mut PortalScene, registry: &GeometryRegistry) {
        let target_count = assign_render_targets(portals);
        self.portal_targets = PortalTargets::new(
            &self.device,
            target_count,
            self.options.portal_texture_size,
            self.color_format,
            &self.scene_pipeline.texture_bind_group_layout,
        );

        for kind in registry.mesh_kinds() {
            if !self.meshes.contains_key(&kind) {
                let mesh = upload_mesh(&self.device, kind);
                self.meshes.insert(kind, mesh);
            }
        }

        self.objects = registry
            .objects()
            .iter()
            .enumerate()
            .map(|(index, object)| {
                let uniform = ObjectUniform::new(object.model, &object.material);
                let uniform_buffer =
                    self.device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(&format!("Scene Object Uniform Buffer {index}")),
                            contents: bytemuck::bytes_of(&uniform),
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Scene Object Bind Group {index}")),
                    layout: &self.scene_pipeline.object_bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });
                let texture = match object.material {
                    Material::Pattern => ObjectTexture::Pattern,
                    Material::Portal { pair, side } => portals
                        .surface(pair, side)
                        .and_then(|surface| surface.target())
                        .map_or(ObjectTexture::Blank, ObjectTexture::Portal),
                    _ => ObjectTexture::Blank,
                };
                GpuObject {
                    mesh: object.mesh,
                    _uniform_buffer: uniform_buffer,
                    bind_group,
                    texture,
                    portal: object.portal(),
                }
            })
            .collect();

        self.lighting = registry.lighting().clone();
        let background = registry.background();
        self.background = wgpu::Color {
            r: background.x as f64,
            g: background.y as f64,
            b: background.z as f64,
            a: 1.0,
        };

        info!(
            "Prepared scene: {} objects, {} meshes, {} portal targets at {}px",
            self.objects.len(),
            self.meshes.len(),
            self.portal_targets.len(),
            self.portal_targets.size()
        );
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        if let Output::Surface { surface, config } = &mut self.output {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
            self.depth_texture = DepthTexture::new(&self.device, width, height);
        }
    }

    /// Reconfigures the surface at its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.frame = None;
        if let Output::Surface { surface, config } = &self.output {
            surface.configure(&self.device, config);
        }
    }

    pub fn last_frame_stats(&self) -> RenderFrameStats {
        self.last_frame_stats
    }

    fn acquire_frame(&mut self) -> Result<(), BackendError> {
        if self.frame.is_some() {
            return Ok(());
        }
        if let Output::Surface { surface, .. } = &self.output {
            let texture = surface.get_current_texture().map_err(surface_error)?;
            let view = texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.frame = Some(AcquiredFrame { texture, view });
        }
        Ok(())
    }
}

impl RenderBackend for Renderer {
    fn has_target(&self, target: RenderTargetId) -> bool {
        self.portal_targets.contains(target)
    }

    fn bind_target(&mut self, target: RenderTargetId) -> Result<(), BackendError> {
        if !self.portal_targets.contains(target) {
            return Err(BackendError::UnknownTarget(target));
        }
        self.destination = Some(Destination::Portal(target));
        self.clear_color = true;
        self.clear_depth = false;
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.clear_depth = true;
    }

    fn draw_scene(&mut self, scene: &PortalScene, camera: &CameraView) -> Result<(), BackendError> {
        let destination = self.destination.ok_or(BackendError::NoDestination)?;
        let (color_view, depth_view, label) = match destination {
            Destination::Portal(target) => {
                let target = self
                    .portal_targets
                    .get(target)
                    .ok_or(BackendError::UnknownTarget(target))?;
                (&target.color_view, &target.depth_view, "Portal RTT Scene Pass")
            }
            Destination::Default => {
                let view = match (&self.output, &self.frame) {
                    (Output::Offscreen { view, .. }, _) => view,
                    (Output::Surface { .. }, Some(frame)) => &frame.view,
                    (Output::Surface { .. }, None) => return Err(BackendError::NoDestination),
                };
                (view, &self.depth_texture.view, "Main Scene Pass")
            }
        };

        let uniform = SceneUniform::new(
            camera.view_projection(),
            camera.position,
            &self.lighting,
            self.frame_time,
            self.pattern_renderer.size() as f32,
        );
        self.queue
            .write_buffer(&self.scene_uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let color_load = if self.clear_color {
            wgpu::LoadOp::Clear(self.background)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if self.clear_depth {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut draw_calls = 0;
        let mut skipped_surfaces = 0;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Portalis Scene Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(self.scene_pipeline.pipeline());
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);

            for object in &self.objects {
                if let Some((pair, side)) = object.portal {
                    let visible = scene
                        .surface(pair, side)
                        .is_some_and(|surface| surface.is_visible());
                    if !visible {
                        skipped_surfaces += 1;
                        continue;
                    }
                }
                let Some(mesh) = self.meshes.get(&object.mesh) else {
                    continue;
                };
                let texture_bind_group = match object.texture {
                    ObjectTexture::Blank => &self.blank_bind_group,
                    ObjectTexture::Pattern => self.pattern_renderer.sample_bind_group(),
                    ObjectTexture::Portal(target) => self
                        .portal_targets
                        .get(target)
                        .map_or(&self.blank_bind_group, |target| &target.sample_bind_group),
                };

                render_pass.set_bind_group(1, &object.bind_group, &[]);
                render_pass.set_bind_group(2, texture_bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                draw_calls += 1;
            }
        }
        // One submission per pass keeps the shared camera uniform in order.
        self.queue.submit(std::iter::once(encoder.finish()));

        self.clear_color = false;
        self.clear_depth = false;
        self.frame_stats.scene_passes += 1;
        self.frame_stats.draw_calls += draw_calls;
        self.frame_stats.skipped_surfaces += skipped_surfaces;
        Ok(())
    }

    fn bind_default(&mut self) -> Result<(), BackendError> {
        self.acquire_frame()?;
        self.destination = Some(Destination::Default);
        self.clear_color = true;
        self.clear_depth = true;
        Ok(())
    }

    fn run_decorative_passes(&mut self, frame: &FrameState) -> Result<(), BackendError> {
        self.frame_stats = RenderFrameStats::default();
        self.frame_time = frame.shader_time();
        self.pattern_renderer.update(&self.queue, frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pattern Encoder"),
            });
        self.pattern_renderer.render(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if let Some(frame) = self.frame.take() {
            frame.texture.present();
        }
        self.destination = None;
        self.last_frame_stats = self.frame_stats;
        Ok(())
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), RendererInitError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .map_err(RendererInitError::RequestAdapter)?;
    info!("Using graphics adapter {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Portalis Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .map_err(RendererInitError::RequestDevice)?;

    Ok((adapter, device, queue))
}

fn surface_error(err: wgpu::SurfaceError) -> BackendError {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
        wgpu::SurfaceError::Timeout => BackendError::SurfaceTimeout,
        wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
        other => BackendError::Device(other.to_string()),
    }
}

fn upload_mesh(device: &wgpu::Device, kind: MeshKind) -> GpuMesh {
    let data = kind.build();
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{kind:?} Vertex Buffer")),
        contents: bytemuck::cast_slice(&data.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{kind:?} Index Buffer")),
        contents: bytemuck::cast_slice(&data.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuMesh {
        vertex_buffer,
        index_buffer,
        index_count: data.indices.len() as u32,
    }
}

/// 1x1 white texture bound for materials that sample nothing.
fn create_blank_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Blank Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Blank Sampler"),
        ..Default::default()
    });
    let bind_group = create_texture_bind_group(device, layout, &view, &sampler, "Blank Bind Group");
    (texture, bind_group)
}
