//! Virtual camera solving for one portal direction.
//!
//! The viewer is reflected through the near portal into the far portal's
//! frame, then an off-axis frustum is fitted to the far portal's rectangle so
//! the rendered image covers it exactly.

use glam::{Affine3A, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Eye-to-plane distances at or below this collapse the frustum.
pub const MIN_PLANE_DISTANCE: f32 = 1.0e-4;
pub const DEFAULT_PORTAL_FAR: f32 = 500.0;

const MIN_TRANSFORM_DETERMINANT: f32 = 1.0e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DegenerateFrustum {
    #[error("viewer lies on the portal plane")]
    ViewerOnPlane,
    #[error("viewer is behind the portal plane")]
    ViewerBehindPlane,
    #[error("destination portal is beyond the virtual camera's far plane")]
    BeyondFarPlane,
    #[error("portal transform is singular")]
    SingularTransform,
}

/// Lens parameters of a pair's virtual camera. Everything else about the
/// camera is re-solved per direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalLens {
    pub far: f32,
}

impl Default for PortalLens {
    fn default() -> Self {
        Self {
            far: DEFAULT_PORTAL_FAR,
        }
    }
}

/// Frustum bounds measured on the near plane, in camera space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffAxisFrustum {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl OffAxisFrustum {
    /// Right-handed perspective projection with a `[0, 1]` depth range.
    pub fn projection(&self) -> Mat4 {
        let Self {
            left: l,
            right: r,
            bottom: b,
            top: t,
            near: n,
            far: f,
        } = *self;

        Mat4::from_cols(
            Vec4::new(2.0 * n / (r - l), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * n / (t - b), 0.0, 0.0),
            Vec4::new((r + l) / (r - l), (t + b) / (t - b), f / (n - f), -1.0),
            Vec4::new(0.0, 0.0, n * f / (n - f), 0.0),
        )
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// The three corners that define a framed rectangle, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCorners {
    pub bottom_left: Vec3,
    pub bottom_right: Vec3,
    pub top_left: Vec3,
}

/// A fully solved virtual camera. Plain value: solve it, render with it, drop
/// it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolvedCamera {
    pub position: Vec3,
    pub orientation: Quat,
    pub view: Mat4,
    pub projection: Mat4,
    pub frustum: OffAxisFrustum,
}

impl SolvedCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }
}

/// Mirrors a world position through `this` portal's plane and re-expresses
/// it relative to `other`.
pub fn reflect_viewpoint(viewer_position: Vec3, this: &Affine3A, other: &Affine3A) -> Vec3 {
    let local = this.inverse().transform_point3(viewer_position);
    other.transform_point3(Vec3::new(-local.x, local.y, -local.z))
}

/// Corners of a portal rectangle as seen from behind, so left and right are
/// swapped relative to the portal's own facing.
pub fn destination_corners(other: &Affine3A, half_extents: Vec2) -> FrameCorners {
    let Vec2 { x: hx, y: hy } = half_extents;
    FrameCorners {
        bottom_left: other.transform_point3(Vec3::new(hx, -hy, 0.0)),
        bottom_right: other.transform_point3(Vec3::new(-hx, -hy, 0.0)),
        top_left: other.transform_point3(Vec3::new(hx, hy, 0.0)),
    }
}

/// Fits an off-axis frustum from `eye` whose near plane is the rectangle
/// spanned by `corners`.
pub fn frame_corners(
    eye: Vec3,
    corners: &FrameCorners,
    far: f32,
) -> Result<SolvedCamera, DegenerateFrustum> {
    let vr = (corners.bottom_right - corners.bottom_left).normalize_or_zero();
    let vu = (corners.top_left - corners.bottom_left).normalize_or_zero();
    let vn = vr.cross(vu).normalize_or_zero();
    if vn == Vec3::ZERO {
        return Err(DegenerateFrustum::SingularTransform);
    }

    let va = corners.bottom_left - eye;
    let vb = corners.bottom_right - eye;
    let vc = corners.top_left - eye;

    let distance = -va.dot(vn);
    if !distance.is_finite() || distance.abs() <= MIN_PLANE_DISTANCE {
        return Err(DegenerateFrustum::ViewerOnPlane);
    }
    if distance < 0.0 {
        return Err(DegenerateFrustum::ViewerBehindPlane);
    }
    if !(far.is_finite() && distance < far) {
        return Err(DegenerateFrustum::BeyondFarPlane);
    }

    let frustum = OffAxisFrustum {
        left: vr.dot(va),
        right: vr.dot(vb),
        bottom: vu.dot(va),
        top: vu.dot(vc),
        near: distance,
        far,
    };
    if frustum.width() <= MIN_PLANE_DISTANCE || frustum.height() <= MIN_PLANE_DISTANCE {
        return Err(DegenerateFrustum::SingularTransform);
    }

    let orientation = Quat::from_mat3(&Mat3::from_cols(vr, vu, vn)).normalize();
    Ok(SolvedCamera {
        position: eye,
        orientation,
        view: Mat4::look_to_rh(eye, -vn, vu),
        projection: frustum.projection(),
        frustum,
    })
}

/// Solves the camera that renders what a viewer at `viewer` sees through
/// `this` portal, looking out of `other`.
pub fn solve_portal_camera(
    viewer: &Affine3A,
    this: &Affine3A,
    other: &Affine3A,
    half_extents: Vec2,
    lens: &PortalLens,
) -> Result<SolvedCamera, DegenerateFrustum> {
    if this.matrix3.determinant().abs() <= MIN_TRANSFORM_DETERMINANT
        || other.matrix3.determinant().abs() <= MIN_TRANSFORM_DETERMINANT
    {
        return Err(DegenerateFrustum::SingularTransform);
    }

    let eye = reflect_viewpoint(viewer.translation.into(), this, other);
    let corners = destination_corners(other, half_extents);
    frame_corners(eye, &corners, lens.far)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, PI};

    use glam::{Affine3A, Quat, Vec2, Vec3, Vec3A};

    use super::{
        destination_corners, reflect_viewpoint, solve_portal_camera, DegenerateFrustum,
        PortalLens,
    };

    const EPS: f32 = 1.0e-3;

    fn portal(position: Vec3, rotation: Quat) -> Affine3A {
        Affine3A::from_rotation_translation(rotation, position)
    }

    fn viewer_at(position: Vec3) -> Affine3A {
        Affine3A::from_translation(position)
    }

    fn transform_cases() -> [(Affine3A, Affine3A); 3] {
        [
            (
                portal(Vec3::new(0.0, 65.0, -5.0), Quat::IDENTITY),
                portal(Vec3::new(0.0, 2.0, 5.0), Quat::IDENTITY),
            ),
            (
                portal(Vec3::new(0.0, -65.0, -5.0), Quat::IDENTITY),
                portal(Vec3::new(5.0, 2.0, 0.0), Quat::from_rotation_y(FRAC_PI_2)),
            ),
            (
                portal(Vec3::new(12.0, -3.0, 4.0), Quat::from_rotation_y(FRAC_PI_3)),
                portal(
                    Vec3::new(-8.0, 10.0, 30.0),
                    Quat::from_rotation_y(-PI * 0.75) * Quat::from_rotation_x(0.2),
                ),
            ),
        ]
    }

    #[test]
    fn solver_is_bit_identical_across_calls() {
        let (this, other) = transform_cases()[2];
        let viewer = viewer_at(Vec3::new(14.0, -1.0, 12.0));
        let lens = PortalLens::default();
        let first = solve_portal_camera(&viewer, &this, &other, Vec2::splat(5.05), &lens);
        for _ in 0..8 {
            let again = solve_portal_camera(&viewer, &this, &other, Vec2::splat(5.05), &lens);
            assert_eq!(first, again);
        }
        let camera = first.expect("viewer is in front of the portal");
        assert_eq!(
            camera.view.to_cols_array().map(f32::to_bits),
            solve_portal_camera(&viewer, &this, &other, Vec2::splat(5.05), &lens)
                .expect("viewer is in front of the portal")
                .view
                .to_cols_array()
                .map(f32::to_bits)
        );
    }

    #[test]
    fn virtual_camera_sits_at_reflected_local_offset() {
        let offsets = [
            Vec3::new(1.5, 0.5, 15.0),
            Vec3::new(-3.0, 2.0, 4.0),
            Vec3::new(0.25, -1.0, 9.5),
        ];
        for ((this, other), offset) in transform_cases().into_iter().zip(offsets) {
            let viewer = viewer_at(this.transform_point3(offset));
            let camera = solve_portal_camera(
                &viewer,
                &this,
                &other,
                Vec2::splat(5.05),
                &PortalLens::default(),
            )
            .expect("viewer is in front of the portal");
            let expected = other.transform_point3(Vec3::new(-offset.x, offset.y, -offset.z));
            assert!(
                (camera.position - expected).length() < EPS,
                "expected {expected:?}, got {:?}",
                camera.position
            );
        }
    }

    #[test]
    fn framed_corners_land_on_near_plane_boundary() {
        let half_extents = Vec2::new(5.05, 3.0);
        let offsets = [
            Vec3::new(0.0, 0.0, 15.0),
            Vec3::new(4.0, -2.0, 6.0),
            Vec3::new(-7.0, 3.0, 2.5),
        ];
        for ((this, other), offset) in transform_cases().into_iter().zip(offsets) {
            let viewer = viewer_at(this.transform_point3(offset));
            let camera =
                solve_portal_camera(&viewer, &this, &other, half_extents, &PortalLens::default())
                    .expect("viewer is in front of the portal");
            let view_proj = camera.view_projection();
            let corners = destination_corners(&other, half_extents);

            let project = |point: Vec3| {
                let clip = view_proj * point.extend(1.0);
                clip.truncate() / clip.w
            };
            let bl = project(corners.bottom_left);
            let br = project(corners.bottom_right);
            let tl = project(corners.top_left);

            assert!((bl - Vec3::new(-1.0, -1.0, 0.0)).length() < EPS, "bottom-left {bl:?}");
            assert!((br - Vec3::new(1.0, -1.0, 0.0)).length() < EPS, "bottom-right {br:?}");
            assert!((tl - Vec3::new(-1.0, 1.0, 0.0)).length() < EPS, "top-left {tl:?}");
        }
    }

    #[test]
    fn camera_looks_through_destination_away_from_its_front() {
        let (this, other) = transform_cases()[1];
        let viewer = viewer_at(this.transform_point3(Vec3::new(0.0, 0.0, 10.0)));
        let camera = solve_portal_camera(
            &viewer,
            &this,
            &other,
            Vec2::splat(5.05),
            &PortalLens::default(),
        )
        .expect("viewer is in front of the portal");
        let other_normal = other.transform_vector3(Vec3::Z);
        assert!((camera.forward() - other_normal).length() < EPS);
        assert!((camera.frustum.near - 10.0).abs() < EPS);
    }

    #[test]
    fn viewer_on_plane_is_degenerate() {
        let (this, other) = transform_cases()[0];
        let viewer = viewer_at(this.transform_point3(Vec3::new(2.0, 1.0, 0.0)));
        let result = solve_portal_camera(
            &viewer,
            &this,
            &other,
            Vec2::splat(5.05),
            &PortalLens::default(),
        );
        assert_eq!(result, Err(DegenerateFrustum::ViewerOnPlane));
    }

    #[test]
    fn viewer_behind_plane_is_degenerate() {
        let (this, other) = transform_cases()[1];
        let viewer = viewer_at(this.transform_point3(Vec3::new(0.0, 0.0, -3.0)));
        let result = solve_portal_camera(
            &viewer,
            &this,
            &other,
            Vec2::splat(5.05),
            &PortalLens::default(),
        );
        assert_eq!(result, Err(DegenerateFrustum::ViewerBehindPlane));
    }

    #[test]
    fn distant_viewer_beyond_far_plane_is_degenerate() {
        let (this, other) = transform_cases()[0];
        let viewer = viewer_at(this.transform_point3(Vec3::new(0.0, 0.0, 40.0)));
        let lens = PortalLens { far: 20.0 };
        let result = solve_portal_camera(&viewer, &this, &other, Vec2::splat(5.05), &lens);
        assert_eq!(result, Err(DegenerateFrustum::BeyondFarPlane));
    }

    #[test]
    fn non_finite_far_plane_is_degenerate() {
        let (this, other) = transform_cases()[0];
        let viewer = viewer_at(this.transform_point3(Vec3::new(0.0, 0.0, 10.0)));
        for far in [f32::NAN, f32::INFINITY] {
            let result =
                solve_portal_camera(&viewer, &this, &other, Vec2::splat(5.05), &PortalLens { far });
            assert_eq!(result, Err(DegenerateFrustum::BeyondFarPlane));
        }
    }

    #[test]
    fn collapsed_portal_transform_is_rejected() {
        let (this, _) = transform_cases()[0];
        let flat = Affine3A {
            matrix3: glam::Mat3A::from_diagonal(Vec3::new(1.0, 0.0, 1.0)),
            translation: Vec3A::ZERO,
        };
        let viewer = viewer_at(Vec3::new(0.0, 65.0, 10.0));
        let result = solve_portal_camera(
            &viewer,
            &this,
            &flat,
            Vec2::splat(5.05),
            &PortalLens::default(),
        );
        assert_eq!(result, Err(DegenerateFrustum::SingularTransform));
    }

    #[test]
    fn reflection_keeps_vertical_offset() {
        let this = portal(Vec3::ZERO, Quat::IDENTITY);
        let other = portal(Vec3::new(0.0, 100.0, 0.0), Quat::IDENTITY);
        let eye = reflect_viewpoint(Vec3::new(3.0, 4.0, 5.0), &this, &other);
        assert!((eye - Vec3::new(-3.0, 104.0, -5.0)).length() < EPS);
    }
}
