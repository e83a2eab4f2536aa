use std::collections::{HashMap, HashSet};

use glam::{Affine3A, Mat4, Vec2, Vec3};
use portalis_shared::portal::{
    PairId, PortalPair, PortalPlacement, PortalScene, PortalSide, RenderTargetId,
};

use crate::backend::{BackendError, CameraView, RenderBackend, ViewerCamera};
use crate::frame::FrameState;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Decorative { frame_index: u64 },
    Bind(RenderTargetId),
    ClearDepth,
    Draw {
        target: Option<RenderTargetId>,
        camera_position: Vec3,
        hidden: Vec<(PairId, PortalSide)>,
    },
    BindDefault,
    Present,
}

/// Stands in for the GPU. A target's "texture" is the camera position it
/// was last drawn from.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub allocated: HashSet<RenderTargetId>,
    pub textures: HashMap<RenderTargetId, Vec3>,
    pub fail_bind: HashSet<RenderTargetId>,
    pub fail_draw: HashSet<RenderTargetId>,
    bound: Option<RenderTargetId>,
}

impl RecordingBackend {
    pub fn with_targets(count: u32) -> Self {
        Self {
            allocated: (0..count).map(RenderTargetId).collect(),
            ..Self::default()
        }
    }

    pub fn portal_draws(&self) -> Vec<RenderTargetId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw {
                    target: Some(target),
                    ..
                } => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn main_draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Draw { target: None, .. }))
            .count()
    }
}

impl RenderBackend for RecordingBackend {
    fn has_target(&self, target: RenderTargetId) -> bool {
        self.allocated.contains(&target)
    }

    fn bind_target(&mut self, target: RenderTargetId) -> Result<(), BackendError> {
        self.calls.push(Call::Bind(target));
        if self.fail_bind.contains(&target) {
            return Err(BackendError::Device("simulated bind failure".into()));
        }
        if !self.allocated.contains(&target) {
            return Err(BackendError::UnknownTarget(target));
        }
        self.bound = Some(target);
        Ok(())
    }

    fn clear_depth(&mut self) {
        self.calls.push(Call::ClearDepth);
    }

    fn draw_scene(&mut self, scene: &PortalScene, camera: &CameraView) -> Result<(), BackendError> {
        let hidden = scene
            .surfaces()
            .filter(|(_, _, surface)| !surface.is_visible())
            .map(|(id, side, _)| (id, side))
            .collect();
        self.calls.push(Call::Draw {
            target: self.bound,
            camera_position: camera.position,
            hidden,
        });

        if let Some(target) = self.bound {
            if self.fail_draw.contains(&target) {
                return Err(BackendError::Device("simulated draw failure".into()));
            }
            self.textures.insert(target, camera.position);
        }
        Ok(())
    }

    fn bind_default(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::BindDefault);
        self.bound = None;
        Ok(())
    }

    fn run_decorative_passes(&mut self, frame: &FrameState) -> Result<(), BackendError> {
        self.calls.push(Call::Decorative {
            frame_index: frame.frame_index,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.calls.push(Call::Present);
        Ok(())
    }
}

pub fn viewer_at(position: Vec3) -> ViewerCamera {
    ViewerCamera {
        transform: Affine3A::from_translation(position),
        projection: Mat4::perspective_rh(75f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0),
    }
}

/// Pair whose two surfaces both face +Z, offset along X. A viewer at the
/// origin is in front of both.
pub fn facing_pair(x: f32) -> PortalPair {
    PortalPair::new(
        PortalPlacement::from_position_yaw(Vec3::new(x, 0.0, -10.0), 0.0, Vec2::splat(5.0)),
        PortalPlacement::from_position_yaw(Vec3::new(x, 0.0, -30.0), 0.0, Vec2::splat(5.0)),
    )
}

/// Assigns targets `0, 1, 2, ...` in pair/side order.
pub fn with_sequential_targets(mut pairs: Vec<PortalPair>) -> PortalScene {
    let mut next = 0;
    for pair in &mut pairs {
        for side in PortalSide::ALL {
            pair.surface_mut(side).set_target(RenderTargetId(next));
            next += 1;
        }
    }
    PortalScene::new(pairs)
}
