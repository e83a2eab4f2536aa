use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::renderer::mesh::MeshVertex;
use crate::scene::{Material, SceneLighting};

pub const MAX_POINT_LIGHTS: usize = 8;

const MATERIAL_BASIC: u32 = 0;
const MATERIAL_STANDARD: u32 = 1;
const MATERIAL_TEXTURED: u32 = 2;
const MATERIAL_GLOW: u32 = 3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    point_positions: [[f32; 4]; MAX_POINT_LIGHTS],
    point_colors: [[f32; 4]; MAX_POINT_LIGHTS],
    params: [f32; 4],
}

impl SceneUniform {
    pub fn new(
        view_proj: Mat4,
        camera_pos: glam::Vec3,
        lighting: &SceneLighting,
        time: f32,
        glow_size: f32,
    ) -> Self {
        let mut point_positions = [[0.0; 4]; MAX_POINT_LIGHTS];
        let mut point_colors = [[0.0; 4]; MAX_POINT_LIGHTS];
        let count = lighting.points.len().min(MAX_POINT_LIGHTS);
        for (index, light) in lighting.points.iter().take(count).enumerate() {
            point_positions[index] = light.position.extend(light.range).to_array();
            point_colors[index] = light.color.extend(light.intensity).to_array();
        }

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: camera_pos.extend(1.0).to_array(),
            sun_direction: lighting.sun_direction.extend(0.0).to_array(),
            sun_color: lighting.sun_color.extend(1.0).to_array(),
            point_positions,
            point_colors,
            params: [time, count as f32, glow_size, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ObjectUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    material: [u32; 4],
}

impl ObjectUniform {
    pub fn new(model: Mat4, material: &Material) -> Self {
        let (color, kind) = match *material {
            Material::Basic { color } => (color, MATERIAL_BASIC),
            Material::Standard { color } => (color, MATERIAL_STANDARD),
            Material::Pattern | Material::Portal { .. } => (glam::Vec3::ONE, MATERIAL_TEXTURED),
            Material::Glow => (glam::Vec3::ONE, MATERIAL_GLOW),
        };
        Self {
            model: model.to_cols_array_2d(),
            color: color.extend(1.0).to_array(),
            material: [kind, 0, 0, 0],
        }
    }
}

#[derive(Debug)]
pub struct ScenePipeline {
    pipeline: wgpu::RenderPipeline,
    pub scene_bind_group_layout: wgpu::BindGroupLayout,
    pub object_bind_group_layout: wgpu::BindGroupLayout,
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
}

impl ScenePipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/scene.wgsl"
                ))
                .into(),
            ),
        });

        let scene_bind_group_layout = uniform_layout(
            device,
            "Scene Uniform Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let object_bind_group_layout = uniform_layout(
            device,
            "Scene Object Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Scene Texture Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[
                &scene_bind_group_layout,
                &object_bind_group_layout,
                &texture_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[MeshVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            scene_bind_group_layout,
            object_bind_group_layout,
            texture_bind_group_layout,
        }
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};
    use portalis_shared::portal::{PairId, PointLight, PortalSide};

    use super::{ObjectUniform, SceneUniform, MAX_POINT_LIGHTS};
    use crate::scene::{Material, SceneLighting};

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 64 + 16 * 3 + 16 * 2 * MAX_POINT_LIGHTS + 16);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 64 + 16 + 16);
    }

    #[test]
    fn point_lights_beyond_capacity_are_dropped() {
        let light = PointLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: Vec3::ONE,
            intensity: 0.5,
            range: 2.0,
        };
        let lighting = SceneLighting {
            sun_direction: Vec3::Y,
            sun_color: Vec3::ONE,
            points: vec![light; MAX_POINT_LIGHTS + 3],
        };
        let uniform = SceneUniform::new(Mat4::IDENTITY, Vec3::ZERO, &lighting, 0.25, 512.0);
        assert_eq!(uniform.params, [0.25, MAX_POINT_LIGHTS as f32, 512.0, 0.0]);
        assert_eq!(uniform.point_positions[0], [1.0, 2.0, 3.0, 2.0]);
        assert_eq!(uniform.point_colors[MAX_POINT_LIGHTS - 1], [1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn textured_materials_share_one_shader_path() {
        let portal = ObjectUniform::new(
            Mat4::IDENTITY,
            &Material::Portal {
                pair: PairId(0),
                side: PortalSide::A,
            },
        );
        let pattern = ObjectUniform::new(Mat4::IDENTITY, &Material::Pattern);
        assert_eq!(portal.material, pattern.material);
        assert_eq!(portal.color, [1.0; 4]);

        let basic = ObjectUniform::new(
            Mat4::IDENTITY,
            &Material::Basic {
                color: Vec3::new(0.0, 1.0, 0.0),
            },
        );
        assert_eq!(basic.color, [0.0, 1.0, 0.0, 1.0]);
        assert_ne!(basic.material, portal.material);
    }
}
