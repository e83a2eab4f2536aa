use glam::Affine3A;
use portalis_shared::portal::{PortalDirection, PortalPair, PortalScene, PortalSurface, RenderTargetId};
use portalis_shared::solver::{DegenerateFrustum, SolvedCamera};

use crate::backend::{BackendError, CameraView, RenderBackend};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error("virtual camera is degenerate: {0}")]
    Degenerate(#[from] DegenerateFrustum),
    #[error("portal surface has no render target")]
    MissingTarget,
    #[error("failed to bind render target {target:?}: {source}")]
    Bind {
        target: RenderTargetId,
        source: BackendError,
    },
    #[error("failed to draw into render target {target:?}: {source}")]
    Draw {
        target: RenderTargetId,
        source: BackendError,
    },
}

/// Draws `scene` from `camera` into `surface`'s render target.
///
/// The target's depth is cleared first and `surface` is hidden for the
/// duration of the draw so it never samples its own texture. Visibility is
/// restored on every exit path. The caller rebinds the default destination.
pub fn render_portal_pass<B>(
    backend: &mut B,
    scene: &PortalScene,
    surface: &PortalSurface,
    camera: &SolvedCamera,
) -> Result<RenderTargetId, PassError>
where
    B: RenderBackend + ?Sized,
{
    let target = surface.target().ok_or(PassError::MissingTarget)?;
    backend
        .bind_target(target)
        .map_err(|source| PassError::Bind { target, source })?;
    backend.clear_depth();

    let _hidden = surface.hide();
    backend
        .draw_scene(scene, &CameraView::from(camera))
        .map_err(|source| PassError::Draw { target, source })?;
    Ok(target)
}

/// Solves `direction` of `pair` for the current viewer and immediately
/// renders it. A degenerate camera skips the draw and leaves the target as it
/// was.
pub fn render_direction<B>(
    backend: &mut B,
    scene: &PortalScene,
    pair: &PortalPair,
    direction: PortalDirection,
    viewer: &Affine3A,
) -> Result<RenderTargetId, PassError>
where
    B: RenderBackend + ?Sized,
{
    let camera = pair.solve(direction, viewer)?;
    render_portal_pass(backend, scene, pair.surface(direction.source()), &camera)
}

#[cfg(test)]
mod tests {
    use glam::{Affine3A, Vec3};
    use portalis_shared::portal::{PairId, PortalDirection, PortalPair, PortalSide, RenderTargetId};
    use portalis_shared::solver::DegenerateFrustum;

    use super::{render_direction, render_portal_pass, PassError};
    use crate::backend::BackendError;
    use crate::testing::{facing_pair, with_sequential_targets, Call, RecordingBackend};

    fn viewer() -> Affine3A {
        Affine3A::from_translation(Vec3::new(1.0, 0.5, 0.0))
    }

    #[test]
    fn source_surface_is_hidden_only_during_its_draw() {
        let scene = with_sequential_targets(vec![facing_pair(0.0)]);
        let pair = scene.pair(PairId(0)).expect("pair exists");
        let mut backend = RecordingBackend::with_targets(2);

        let target = render_direction(&mut backend, &scene, pair, PortalDirection::AToB, &viewer())
            .expect("pass renders");
        assert_eq!(target, RenderTargetId(0));

        assert_eq!(
            backend.calls,
            vec![
                Call::Bind(RenderTargetId(0)),
                Call::ClearDepth,
                Call::Draw {
                    target: Some(RenderTargetId(0)),
                    camera_position: pair
                        .solve(PortalDirection::AToB, &viewer())
                        .expect("viewer in front")
                        .position,
                    hidden: vec![(PairId(0), PortalSide::A)],
                },
            ]
        );
        assert!(pair.surface(PortalSide::A).is_visible());
        assert!(pair.surface(PortalSide::B).is_visible());
    }

    #[test]
    fn visibility_is_restored_when_draw_fails() {
        let scene = with_sequential_targets(vec![facing_pair(0.0)]);
        let pair = scene.pair(PairId(0)).expect("pair exists");
        let mut backend = RecordingBackend::with_targets(2);
        backend.fail_draw.insert(RenderTargetId(1));

        let err = render_direction(&mut backend, &scene, pair, PortalDirection::BToA, &viewer())
            .expect_err("draw fails");
        assert!(matches!(
            err,
            PassError::Draw {
                target: RenderTargetId(1),
                source: BackendError::Device(_),
            }
        ));

        let hidden_during_draw = backend.calls.iter().find_map(|call| match call {
            Call::Draw { hidden, .. } => Some(hidden.clone()),
            _ => None,
        });
        assert_eq!(hidden_during_draw, Some(vec![(PairId(0), PortalSide::B)]));
        assert!(pair.surface(PortalSide::B).is_visible());
    }

    #[test]
    fn bind_failure_skips_draw_and_keeps_visibility() {
        let scene = with_sequential_targets(vec![facing_pair(0.0)]);
        let pair = scene.pair(PairId(0)).expect("pair exists");
        let mut backend = RecordingBackend::with_targets(2);
        backend.fail_bind.insert(RenderTargetId(0));

        let err = render_direction(&mut backend, &scene, pair, PortalDirection::AToB, &viewer())
            .expect_err("bind fails");
        assert!(matches!(err, PassError::Bind { target: RenderTargetId(0), .. }));
        assert_eq!(backend.calls, vec![Call::Bind(RenderTargetId(0))]);
        assert!(pair.surface(PortalSide::A).is_visible());
    }

    #[test]
    fn viewer_on_plane_leaves_previous_texture_untouched() {
        let scene = with_sequential_targets(vec![facing_pair(0.0)]);
        let pair = scene.pair(PairId(0)).expect("pair exists");
        let mut backend = RecordingBackend::with_targets(2);
        let previous = Vec3::new(9.0, 9.0, 9.0);
        backend.textures.insert(RenderTargetId(0), previous);

        let on_plane = Affine3A::from_translation(Vec3::new(2.0, 1.0, -10.0));
        let err = render_direction(&mut backend, &scene, pair, PortalDirection::AToB, &on_plane)
            .expect_err("degenerate");
        assert_eq!(err, PassError::Degenerate(DegenerateFrustum::ViewerOnPlane));
        assert!(backend.calls.is_empty());
        assert_eq!(backend.textures.get(&RenderTargetId(0)), Some(&previous));
    }

    #[test]
    fn surface_without_target_is_reported() {
        let pair = facing_pair(0.0);
        let scene = portalis_shared::portal::PortalScene::default();
        let camera = pair
            .solve(PortalDirection::AToB, &viewer())
            .expect("viewer in front");
        let mut backend = RecordingBackend::default();
        let err = render_portal_pass(&mut backend, &scene, pair.surface(PortalSide::A), &camera)
            .expect_err("no target");
        assert_eq!(err, PassError::MissingTarget);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn pass_camera_comes_from_reflected_viewpoint() {
        let pair: PortalPair = facing_pair(4.0);
        let scene = with_sequential_targets(vec![pair]);
        let pair = scene.pair(PairId(0)).expect("pair exists");
        let mut backend = RecordingBackend::with_targets(2);

        render_direction(&mut backend, &scene, pair, PortalDirection::AToB, &viewer())
            .expect("pass renders");
        // Viewer is 10 in front of A and 3 left of its center; the camera sits
        // mirrored behind B.
        let expected = Vec3::new(4.0 + 3.0, 0.5, -30.0 - 10.0);
        let drawn = backend.textures[&RenderTargetId(0)];
        assert!((drawn - expected).length() < 1e-4, "drawn from {drawn:?}");
    }
}
