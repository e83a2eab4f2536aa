use glam::{Affine3A, Mat4, Vec3};
use portalis_shared::layout::{color_to_vec3, to_vec3, PropMaterial, PropShape, SceneLayout};
use portalis_shared::portal::{PairId, PointLight, PortalScene, PortalSide};

use crate::renderer::mesh::{
    cube_mesh, cylinder_mesh, plane_mesh, room_mesh, sphere_mesh, MeshData,
};

/// Portal quads sit this far in front of their placement so they never
/// z-fight with a wall on the same plane.
pub const PORTAL_SURFACE_OFFSET: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Plane,
    Room,
    Cube,
    Sphere,
    Cylinder,
}

impl MeshKind {
    pub fn build(self) -> MeshData {
        match self {
            Self::Plane => plane_mesh(),
            Self::Room => room_mesh(),
            Self::Cube => cube_mesh(),
            Self::Sphere => sphere_mesh(32, 16),
            Self::Cylinder => cylinder_mesh(32),
        }
    }
}

impl From<PropShape> for MeshKind {
    fn from(shape: PropShape) -> Self {
        match shape {
            PropShape::Sphere => Self::Sphere,
            PropShape::Cube => Self::Cube,
            PropShape::Cylinder => Self::Cylinder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Unlit flat color.
    Basic { color: Vec3 },
    /// Lambert-lit color.
    Standard { color: Vec3 },
    /// Samples the decorative pattern texture.
    Pattern,
    /// Time-driven palette.
    Glow,
    /// Samples the render target of one portal surface.
    Portal { pair: PairId, side: PortalSide },
}

impl From<PropMaterial> for Material {
    fn from(material: PropMaterial) -> Self {
        match material {
            PropMaterial::Basic { color } => Self::Basic {
                color: color_to_vec3(color),
            },
            PropMaterial::Standard { color } => Self::Standard {
                color: color_to_vec3(color),
            },
            PropMaterial::Pattern => Self::Pattern,
            PropMaterial::Glow => Self::Glow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub mesh: MeshKind,
    pub model: Mat4,
    pub material: Material,
}

impl SceneObject {
    pub fn portal(&self) -> Option<(PairId, PortalSide)> {
        match self.material {
            Material::Portal { pair, side } => Some((pair, side)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneLighting {
    /// Unit vector pointing from the scene toward the sun.
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
    pub points: Vec<PointLight>,
}

/// Every drawable in the scene, built once from the layout.
#[derive(Debug, Clone)]
pub struct GeometryRegistry {
    objects: Vec<SceneObject>,
    lighting: SceneLighting,
    background: Vec3,
}

impl GeometryRegistry {
    pub fn from_layout(layout: &SceneLayout, portals: &PortalScene) -> Self {
        let mut objects = Vec::new();

        for room in layout.pairs.iter().filter_map(|pair| pair.room.as_ref()) {
            objects.push(SceneObject {
                mesh: MeshKind::Room,
                model: Mat4::from_scale_rotation_translation(
                    Vec3::splat(room.size),
                    glam::Quat::IDENTITY,
                    to_vec3(room.center),
                ),
                material: Material::Basic {
                    color: color_to_vec3(room.color),
                },
            });
        }

        for (pair, side, surface) in portals.surfaces() {
            let placement = surface.placement();
            let quad = Affine3A::from_translation(Vec3::Z * PORTAL_SURFACE_OFFSET)
                * Affine3A::from_scale((2.0 * placement.half_extents).extend(1.0));
            objects.push(SceneObject {
                mesh: MeshKind::Plane,
                model: Mat4::from(placement.transform * quad),
                material: Material::Portal { pair, side },
            });
        }

        for prop in &layout.props {
            objects.push(SceneObject {
                mesh: prop.shape.into(),
                model: Mat4::from_scale_rotation_translation(
                    Vec3::splat(prop.scale),
                    glam::Quat::IDENTITY,
                    to_vec3(prop.position),
                ),
                material: prop.material.into(),
            });
        }

        let sun_direction = to_vec3(layout.sun.position).try_normalize().unwrap_or(Vec3::Y);
        let lighting = SceneLighting {
            sun_direction,
            sun_color: color_to_vec3(layout.sun.color) * layout.sun.intensity,
            points: portals.lights().copied().collect(),
        };

        Self {
            objects,
            lighting,
            background: color_to_vec3(layout.background),
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn lighting(&self) -> &SceneLighting {
        &self.lighting
    }

    pub fn background(&self) -> Vec3 {
        self.background
    }

    /// Distinct meshes the objects reference, in first-use order.
    pub fn mesh_kinds(&self) -> Vec<MeshKind> {
        let mut kinds = Vec::new();
        for object in &self.objects {
            if !kinds.contains(&object.mesh) {
                kinds.push(object.mesh);
            }
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};
    use portalis_shared::layout::SceneLayout;
    use portalis_shared::portal::{PairId, PortalSide};

    use super::{GeometryRegistry, Material, MeshKind, PORTAL_SURFACE_OFFSET};

    fn default_registry() -> GeometryRegistry {
        let layout = SceneLayout::default();
        let portals = layout.build_portal_scene().expect("default layout is valid");
        GeometryRegistry::from_layout(&layout, &portals)
    }

    #[test]
    fn default_layout_has_rooms_portals_and_props() {
        let registry = default_registry();
        let count = |kind: MeshKind| {
            registry
                .objects()
                .iter()
                .filter(|object| object.mesh == kind)
                .count()
        };
        assert_eq!(count(MeshKind::Room), 3);
        assert_eq!(count(MeshKind::Plane), 6);
        assert_eq!(count(MeshKind::Sphere), 1);
        assert_eq!(count(MeshKind::Cube), 1);
        assert_eq!(count(MeshKind::Cylinder), 1);
        assert_eq!(registry.mesh_kinds().len(), 5);
        assert_eq!(registry.lighting().points.len(), 3);
    }

    #[test]
    fn every_surface_gets_exactly_one_quad() {
        let registry = default_registry();
        for pair in 0..3 {
            for side in PortalSide::ALL {
                let quads = registry
                    .objects()
                    .iter()
                    .filter(|object| object.portal() == Some((PairId(pair), side)))
                    .count();
                assert_eq!(quads, 1, "pair {pair} side {side:?}");
            }
        }
    }

    #[test]
    fn portal_quad_sits_just_in_front_of_its_wall() {
        let registry = default_registry();
        let quad = registry
            .objects()
            .iter()
            .find(|object| object.portal() == Some((PairId(0), PortalSide::A)))
            .expect("quad exists");

        // Pair 0 side A is at (0, 65, -5) facing +Z with size 10.
        let center = quad.model * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((center.truncate() - Vec3::new(0.0, 65.0, -5.0 + PORTAL_SURFACE_OFFSET)).length() < 1e-4);
        let corner = quad.model * Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert!((corner.truncate() - Vec3::new(5.0, 70.0, -5.0 + PORTAL_SURFACE_OFFSET)).length() < 1e-4);
    }

    #[test]
    fn side_facing_quad_follows_yaw() {
        let registry = default_registry();
        let quad = registry
            .objects()
            .iter()
            .find(|object| object.portal() == Some((PairId(1), PortalSide::B)))
            .expect("quad exists");
        let normal = quad.model.transform_vector3(Vec3::Z).normalize();
        assert!((normal - Vec3::X).length() < 1e-4, "normal {normal:?}");
    }

    #[test]
    fn prop_materials_carry_over() {
        let registry = default_registry();
        let materials: Vec<_> = registry
            .objects()
            .iter()
            .filter(|object| matches!(object.mesh, MeshKind::Sphere | MeshKind::Cube | MeshKind::Cylinder))
            .map(|object| object.material)
            .collect();
        assert_eq!(
            materials,
            vec![
                Material::Pattern,
                Material::Glow,
                Material::Standard { color: Vec3::ONE },
            ]
        );
        assert!((registry.lighting().sun_direction.length() - 1.0).abs() < 1e-5);
    }
}
