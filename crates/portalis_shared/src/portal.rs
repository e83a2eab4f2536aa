use std::cell::Cell;

use glam::{Affine3A, Quat, Vec2, Vec3};

use crate::solver::{solve_portal_camera, DegenerateFrustum, PortalLens, SolvedCamera};

/// Extra margin added around a destination rectangle when framing it, so the
/// rendered texture never shows a background seam along the portal edge.
pub const PORTAL_FRAME_OVERSCAN: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalSide {
    A,
    B,
}

impl PortalSide {
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Which surface of a pair gets its texture refreshed. The source surface is
/// the one being drawn into; the camera looks out through the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalDirection {
    AToB,
    BToA,
}

impl PortalDirection {
    /// Render order within a frame.
    pub const ALL: [Self; 2] = [Self::AToB, Self::BToA];

    pub fn source(self) -> PortalSide {
        match self {
            Self::AToB => PortalSide::A,
            Self::BToA => PortalSide::B,
        }
    }

    pub fn destination(self) -> PortalSide {
        self.source().other()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(pub usize);

/// World placement of a portal rectangle. The rectangle lies in the local XY
/// plane and faces local +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalPlacement {
    pub transform: Affine3A,
    pub half_extents: Vec2,
}

impl PortalPlacement {
    pub fn new(transform: Affine3A, half_extents: Vec2) -> Self {
        Self {
            transform,
            half_extents,
        }
    }

    pub fn from_position_yaw(position: Vec3, yaw: f32, half_extents: Vec2) -> Self {
        Self::new(
            Affine3A::from_rotation_translation(Quat::from_rotation_y(yaw), position),
            half_extents,
        )
    }

    pub fn center(&self) -> Vec3 {
        self.transform.translation.into()
    }

    pub fn normal(&self) -> Vec3 {
        self.transform.transform_vector3(Vec3::Z).normalize_or_zero()
    }

    pub fn frame_half_extents(&self) -> Vec2 {
        self.half_extents + Vec2::splat(PORTAL_FRAME_OVERSCAN)
    }
}

#[derive(Debug)]
pub struct PortalSurface {
    placement: PortalPlacement,
    target: Option<RenderTargetId>,
    visible: Cell<bool>,
}

impl PortalSurface {
    pub fn new(placement: PortalPlacement) -> Self {
        Self {
            placement,
            target: None,
            visible: Cell::new(true),
        }
    }

    pub fn placement(&self) -> &PortalPlacement {
        &self.placement
    }

    pub fn target(&self) -> Option<RenderTargetId> {
        self.target
    }

    pub fn set_target(&mut self, target: RenderTargetId) {
        self.target = Some(target);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Hides the surface until the returned guard is dropped.
    pub fn hide(&self) -> HiddenSurface<'_> {
        let was_visible = self.visible.replace(false);
        HiddenSurface {
            surface: self,
            was_visible,
        }
    }
}

#[must_use = "the surface becomes visible again as soon as the guard is dropped"]
pub struct HiddenSurface<'a> {
    surface: &'a PortalSurface,
    was_visible: bool,
}

impl Drop for HiddenSurface<'_> {
    fn drop(&mut self) {
        self.surface.visible.set(self.was_visible);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

#[derive(Debug)]
pub struct PortalPair {
    surfaces: [PortalSurface; 2],
    pub lens: PortalLens,
    pub light: Option<PointLight>,
}

impl PortalPair {
    pub fn new(a: PortalPlacement, b: PortalPlacement) -> Self {
        Self {
            surfaces: [PortalSurface::new(a), PortalSurface::new(b)],
            lens: PortalLens::default(),
            light: None,
        }
    }

    pub fn with_lens(mut self, lens: PortalLens) -> Self {
        self.lens = lens;
        self
    }

    pub fn with_light(mut self, light: PointLight) -> Self {
        self.light = Some(light);
        self
    }

    pub fn surface(&self, side: PortalSide) -> &PortalSurface {
        &self.surfaces[side.index()]
    }

    pub fn surface_mut(&mut self, side: PortalSide) -> &mut PortalSurface {
        &mut self.surfaces[side.index()]
    }

    /// Solves the virtual camera that refreshes the source surface of
    /// `direction` for a viewer at `viewer`.
    pub fn solve(
        &self,
        direction: PortalDirection,
        viewer: &Affine3A,
    ) -> Result<SolvedCamera, DegenerateFrustum> {
        let this = self.surface(direction.source()).placement();
        let other = self.surface(direction.destination()).placement();
        solve_portal_camera(
            viewer,
            &this.transform,
            &other.transform,
            other.frame_half_extents(),
            &self.lens,
        )
    }
}

/// The portal part of the scene: every pair, fixed for the session.
#[derive(Debug, Default)]
pub struct PortalScene {
    pairs: Vec<PortalPair>,
}

impl PortalScene {
    pub fn new(pairs: Vec<PortalPair>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (PairId, &PortalPair)> {
        self.pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| (PairId(index), pair))
    }

    pub fn pair(&self, id: PairId) -> Option<&PortalPair> {
        self.pairs.get(id.0)
    }

    pub fn pair_mut(&mut self, id: PairId) -> Option<&mut PortalPair> {
        self.pairs.get_mut(id.0)
    }

    pub fn surface(&self, id: PairId, side: PortalSide) -> Option<&PortalSurface> {
        self.pair(id).map(|pair| pair.surface(side))
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (PairId, PortalSide, &PortalSurface)> {
        self.pairs().flat_map(|(id, pair)| {
            PortalSide::ALL
                .into_iter()
                .map(move |side| (id, side, pair.surface(side)))
        })
    }

    pub fn lights(&self) -> impl Iterator<Item = &PointLight> {
        self.pairs.iter().filter_map(|pair| pair.light.as_ref())
    }
}
