use glam::{Affine3A, Mat4, Vec3};
use portalis_shared::portal::{PortalScene, RenderTargetId};
use portalis_shared::solver::SolvedCamera;

use crate::frame::FrameState;

/// Everything a backend needs to draw the scene from one viewpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraView {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl From<&SolvedCamera> for CameraView {
    fn from(camera: &SolvedCamera) -> Self {
        Self {
            position: camera.position,
            view: camera.view,
            projection: camera.projection,
        }
    }
}

/// The externally controlled main camera. Only read by the frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerCamera {
    pub transform: Affine3A,
    pub projection: Mat4,
}

impl ViewerCamera {
    pub fn position(&self) -> Vec3 {
        self.transform.translation.into()
    }

    pub fn camera_view(&self) -> CameraView {
        CameraView {
            position: self.position(),
            view: Mat4::from(self.transform.inverse()),
            projection: self.projection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("render target {0:?} is not allocated")]
    UnknownTarget(RenderTargetId),
    #[error("no render destination is bound")]
    NoDestination,
    #[error("presentation surface was lost or is outdated")]
    SurfaceLost,
    #[error("timed out acquiring the presentation surface")]
    SurfaceTimeout,
    #[error("graphics device is out of memory")]
    OutOfMemory,
    #[error("graphics device error: {0}")]
    Device(String),
}

/// Render-target and draw operations the frame loop needs from the graphics
/// layer. Calls arrive strictly sequentially on one thread.
pub trait RenderBackend {
    fn has_target(&self, target: RenderTargetId) -> bool;

    /// Makes `target` the destination of subsequent draws.
    fn bind_target(&mut self, target: RenderTargetId) -> Result<(), BackendError>;

    /// Clears the bound destination's depth with depth writes enabled,
    /// regardless of any auto-clear policy.
    fn clear_depth(&mut self);

    /// Draws the whole scene into the bound destination. Portal surfaces whose
    /// visibility flag is off must be skipped.
    fn draw_scene(&mut self, scene: &PortalScene, camera: &CameraView) -> Result<(), BackendError>;

    /// Makes the presentation surface the destination again.
    fn bind_default(&mut self) -> Result<(), BackendError>;

    /// Offscreen passes whose output scene materials may sample.
    fn run_decorative_passes(&mut self, _frame: &FrameState) -> Result<(), BackendError> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};

    use super::ViewerCamera;

    #[test]
    fn viewer_view_matrix_maps_eye_to_origin() {
        let viewer = ViewerCamera {
            transform: Affine3A::from_rotation_translation(
                Quat::from_rotation_y(0.7),
                Vec3::new(0.0, 2.0, 20.0),
            ),
            projection: Mat4::IDENTITY,
        };
        let view = viewer.camera_view();
        let eye = view.view * Vec4::new(0.0, 2.0, 20.0, 1.0);
        assert!(eye.truncate().length() < 1e-4);
        assert_eq!(view.position, Vec3::new(0.0, 2.0, 20.0));
    }
}
