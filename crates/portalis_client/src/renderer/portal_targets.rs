use portalis_shared::portal::{PairId, PortalScene, PortalSide, RenderTargetId};

use crate::renderer::scene_pipeline::create_texture_bind_group;

pub const PORTAL_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Offscreen color and depth for one portal surface.
#[derive(Debug)]
pub struct PortalRenderTarget {
    _color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub sample_bind_group: wgpu::BindGroup,
}

/// One square render target per portal surface, indexed by `RenderTargetId`.
#[derive(Debug)]
pub struct PortalTargets {
    targets: Vec<PortalRenderTarget>,
    size: u32,
}

impl PortalTargets {
    pub fn new(
        device: &wgpu::Device,
        count: u32,
        size: u32,
        color_format: wgpu::TextureFormat,
        texture_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal RTT Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let size = size.max(1);
        let targets = (0..count)
            .map(|index| {
                create_target(
                    device,
                    index,
                    size,
                    color_format,
                    texture_bind_group_layout,
                    &sampler,
                )
            })
            .collect();
        Self { targets, size }
    }

    pub fn get(&self, target: RenderTargetId) -> Option<&PortalRenderTarget> {
        self.targets.get(target.0 as usize)
    }

    pub fn contains(&self, target: RenderTargetId) -> bool {
        (target.0 as usize) < self.targets.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Gives every surface its own target id, `0..2 * pairs` in pair/side order.
/// Returns how many targets the scene needs.
pub fn assign_render_targets(scene: &mut PortalScene) -> u32 {
    let mut next = 0;
    for index in 0..scene.len() {
        let Some(pair) = scene.pair_mut(PairId(index)) else {
            continue;
        };
        for side in PortalSide::ALL {
            pair.surface_mut(side).set_target(RenderTargetId(next));
            next += 1;
        }
    }
    next
}

fn create_target(
    device: &wgpu::Device,
    index: u32,
    size: u32,
    color_format: wgpu::TextureFormat,
    texture_bind_group_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
) -> PortalRenderTarget {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };

    let color_label = format!("Portal RTT Color Texture {index}");
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&color_label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: color_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let depth_label = format!("Portal RTT Depth Texture {index}");
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&depth_label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: PORTAL_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let bind_group_label = format!("Portal RTT Sample Bind Group {index}");
    let sample_bind_group = create_texture_bind_group(
        device,
        texture_bind_group_layout,
        &color_view,
        sampler,
        &bind_group_label,
    );

    PortalRenderTarget {
        _color_texture: color_texture,
        color_view,
        _depth_texture: depth_texture,
        depth_view,
        sample_bind_group,
    }
}
