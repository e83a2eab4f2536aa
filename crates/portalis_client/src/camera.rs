use glam::{Affine3A, Mat4, Vec3};
use portalis_core::backend::ViewerCamera;
use portalis_core::frame::FrameState;
use portalis_core::scheduler::ViewerControls;
use portalis_core::tick::Tick;
use winit::keyboard::KeyCode;

use crate::input::InputState;

pub const DEFAULT_EYE: Vec3 = Vec3::new(0.0, 2.0, 20.0);
const MAX_PITCH: f32 = 89.0_f32.to_radians();
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 400.0;
const KEY_ORBIT_SPEED: f32 = 1.5;

/// Camera circling a target point.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::looking_at(DEFAULT_EYE, Vec3::ZERO)
    }
}

impl OrbitCamera {
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            fov: 75.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32, zoom_step: f32) {
        let factor = (1.0 - zoom_step).powf(steps);
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn world_transform(&self) -> Affine3A {
        Affine3A::look_at_rh(self.position(), self.target, Vec3::Y).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn viewer_camera(&self) -> ViewerCamera {
        ViewerCamera {
            transform: self.world_transform(),
            projection: self.projection_matrix(),
        }
    }
}

/// Mouse-drag orbit and wheel zoom around the scene origin.
#[derive(Debug)]
pub struct OrbitControls {
    pub camera: OrbitCamera,
    pub input: InputState,
    pub sensitivity: f32,
    pub zoom_step: f32,
}

impl OrbitControls {
    pub fn new(camera: OrbitCamera, sensitivity: f32, zoom_step: f32) -> Self {
        Self {
            camera,
            input: InputState::default(),
            sensitivity,
            zoom_step,
        }
    }

    fn apply_input(&mut self, delta_seconds: f32) {
        let input = &self.input;
        let mut delta_yaw = -input.mouse_delta.x * self.sensitivity;
        let mut delta_pitch = input.mouse_delta.y * self.sensitivity;

        let key_step = KEY_ORBIT_SPEED * delta_seconds;
        if input.is_pressed(KeyCode::ArrowLeft) {
            delta_yaw -= key_step;
        }
        if input.is_pressed(KeyCode::ArrowRight) {
            delta_yaw += key_step;
        }
        if input.is_pressed(KeyCode::ArrowUp) {
            delta_pitch += key_step;
        }
        if input.is_pressed(KeyCode::ArrowDown) {
            delta_pitch -= key_step;
        }

        self.camera.orbit(delta_yaw, delta_pitch);
        if input.scroll_delta != 0.0 {
            self.camera.zoom(input.scroll_delta, self.zoom_step);
        }
        self.input.clear_frame();
    }
}

impl ViewerControls for OrbitControls {
    fn update(&mut self, tick: &Tick, _frame: &FrameState) -> ViewerCamera {
        self.apply_input(tick.delta_seconds);
        self.camera.viewer_camera()
    }
}
