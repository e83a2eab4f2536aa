use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::portal::{PointLight, PortalPair, PortalPlacement, PortalScene};
use crate::solver::{PortalLens, DEFAULT_PORTAL_FAR};

const MIN_PORTAL_SIZE: f32 = 0.01;
const MIN_PORTAL_FAR: f32 = 1.0;
const MAX_PORTAL_FAR: f32 = 10_000.0;
const MIN_PROP_SCALE: f32 = 0.001;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to read layout {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write layout {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse layout: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize layout: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("portal pair {index} is invalid: {reason}")]
    InvalidPair { index: usize, reason: &'static str },
}

/// On-disk description of the scene: portal pairs plus the props and lights
/// placed around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    #[serde(default = "default_background")]
    pub background: u32,
    #[serde(default = "default_sun")]
    pub sun: SunLayout,
    #[serde(default)]
    pub pairs: Vec<PairLayout>,
    #[serde(default)]
    pub props: Vec<PropLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunLayout {
    pub position: [f32; 3],
    #[serde(default = "default_white")]
    pub color: u32,
    #[serde(default = "default_sun_intensity")]
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalLayout {
    pub position: [f32; 3],
    #[serde(default)]
    pub yaw_degrees: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairLayout {
    #[serde(default = "default_portal_size")]
    pub size: f32,
    pub a: PortalLayout,
    pub b: PortalLayout,
    #[serde(default = "default_portal_far")]
    pub far: f32,
    #[serde(default)]
    pub light: Option<LightLayout>,
    #[serde(default)]
    pub room: Option<RoomLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightLayout {
    pub position: [f32; 3],
    #[serde(default = "default_white")]
    pub color: u32,
    #[serde(default = "default_point_intensity")]
    pub intensity: f32,
    #[serde(default = "default_point_range")]
    pub range: f32,
}

/// A box viewed from the inside that encloses one end of a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomLayout {
    pub center: [f32; 3],
    pub size: f32,
    #[serde(default = "default_room_color")]
    pub color: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropShape {
    Sphere,
    Cube,
    Cylinder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropMaterial {
    Basic { color: u32 },
    Standard { color: u32 },
    Pattern,
    Glow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropLayout {
    pub shape: PropShape,
    pub position: [f32; 3],
    #[serde(default = "default_prop_scale")]
    pub scale: f32,
    pub material: PropMaterial,
}

impl Default for SceneLayout {
    fn default() -> Self {
        let pair = |height: f32, b: PortalLayout| PairLayout {
            size: default_portal_size(),
            a: PortalLayout {
                position: [0.0, height, -5.0],
                yaw_degrees: 0.0,
            },
            b,
            far: default_portal_far(),
            light: Some(LightLayout {
                position: [0.0, height, 0.0],
                color: 0xe7e7e7,
                intensity: default_point_intensity(),
                range: default_point_range(),
            }),
            room: Some(RoomLayout {
                center: [0.0, height, 0.0],
                size: default_portal_size(),
                color: default_room_color(),
            }),
        };

        Self {
            background: default_background(),
            sun: default_sun(),
            pairs: vec![
                pair(
                    65.0,
                    PortalLayout {
                        position: [0.0, 2.0, 5.0],
                        yaw_degrees: 0.0,
                    },
                ),
                pair(
                    -65.0,
                    PortalLayout {
                        position: [5.0, 2.0, 0.0],
                        yaw_degrees: 90.0,
                    },
                ),
                pair(
                    -85.0,
                    PortalLayout {
                        position: [-5.0, 2.0, 0.0],
                        yaw_degrees: -90.0,
                    },
                ),
            ],
            props: vec![
                PropLayout {
                    shape: PropShape::Sphere,
                    position: [0.0, 65.0, 0.0],
                    scale: 2.0,
                    material: PropMaterial::Pattern,
                },
                PropLayout {
                    shape: PropShape::Cube,
                    position: [0.0, -65.0, 0.0],
                    scale: 2.0,
                    material: PropMaterial::Glow,
                },
                PropLayout {
                    shape: PropShape::Cylinder,
                    position: [0.0, -85.0, 0.0],
                    scale: 2.0,
                    material: PropMaterial::Standard { color: 0xffffff },
                },
            ],
        }
    }
}

impl SceneLayout {
    pub fn from_toml_str(contents: &str) -> Result<Self, LayoutError> {
        let parsed = toml::from_str::<Self>(contents)?;
        Ok(parsed.sanitize())
    }

    pub fn to_toml_string(&self) -> Result<String, LayoutError> {
        Ok(toml::to_string_pretty(&self.clone().sanitize())?)
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let contents = fs::read_to_string(path).map_err(|source| LayoutError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let layout = Self::from_toml_str(&contents)?;
        info!(
            "Loaded layout {} ({} portal pairs, {} props)",
            path.display(),
            layout.pairs.len(),
            layout.props.len()
        );
        Ok(layout)
    }

    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        let serialized = self.to_toml_string()?;
        fs::write(path, serialized).map_err(|source| LayoutError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn sanitize(mut self) -> Self {
        for pair in &mut self.pairs {
            pair.size = pair.size.max(MIN_PORTAL_SIZE);
            pair.far = if pair.far.is_finite() {
                pair.far.clamp(MIN_PORTAL_FAR, MAX_PORTAL_FAR)
            } else {
                DEFAULT_PORTAL_FAR
            };
            if let Some(light) = pair.light.as_mut() {
                light.intensity = light.intensity.max(0.0);
                light.range = light.range.max(0.0);
            }
            if let Some(room) = pair.room.as_mut() {
                room.size = room.size.max(MIN_PORTAL_SIZE);
            }
        }
        for prop in &mut self.props {
            prop.scale = prop.scale.max(MIN_PROP_SCALE);
        }
        self.sun.intensity = self.sun.intensity.max(0.0);
        self
    }

    /// Builds the portal pairs. Render targets are left unassigned; the
    /// renderer allocates them.
    pub fn build_portal_scene(&self) -> Result<PortalScene, LayoutError> {
        let mut pairs = Vec::with_capacity(self.pairs.len());
        for (index, layout) in self.pairs.iter().enumerate() {
            let a = to_vec3(layout.a.position);
            let b = to_vec3(layout.b.position);
            if !a.is_finite() || !b.is_finite() || !layout.size.is_finite() {
                return Err(LayoutError::InvalidPair {
                    index,
                    reason: "non-finite placement",
                });
            }
            if a == b && layout.a.yaw_degrees == layout.b.yaw_degrees {
                return Err(LayoutError::InvalidPair {
                    index,
                    reason: "both portals share one placement",
                });
            }

            let half_extents = Vec2::splat(layout.size * 0.5);
            let mut pair = PortalPair::new(
                PortalPlacement::from_position_yaw(
                    a,
                    layout.a.yaw_degrees.to_radians(),
                    half_extents,
                ),
                PortalPlacement::from_position_yaw(
                    b,
                    layout.b.yaw_degrees.to_radians(),
                    half_extents,
                ),
            )
            .with_lens(PortalLens { far: layout.far });
            if let Some(light) = layout.light.as_ref() {
                pair = pair.with_light(PointLight {
                    position: to_vec3(light.position),
                    color: color_to_vec3(light.color),
                    intensity: light.intensity,
                    range: light.range,
                });
            }
            pairs.push(pair);
        }
        Ok(PortalScene::new(pairs))
    }
}

pub fn to_vec3(value: [f32; 3]) -> Vec3 {
    Vec3::from_array(value)
}

/// Converts a `0xRRGGBB` color to linear-ish `[0, 1]` components.
pub fn color_to_vec3(color: u32) -> Vec3 {
    Vec3::new(
        ((color >> 16) & 0xff) as f32 / 255.0,
        ((color >> 8) & 0xff) as f32 / 255.0,
        (color & 0xff) as f32 / 255.0,
    )
}

fn default_background() -> u32 {
    0x443333
}

fn default_white() -> u32 {
    0xffffff
}

fn default_room_color() -> u32 {
    0x00ff00
}

fn default_sun() -> SunLayout {
    SunLayout {
        position: [0.0, 70.0, 1.0],
        color: default_white(),
        intensity: default_sun_intensity(),
    }
}

fn default_sun_intensity() -> f32 {
    1.0
}

fn default_point_intensity() -> f32 {
    0.5
}

fn default_point_range() -> f32 {
    2.0
}

fn default_portal_size() -> f32 {
    10.0
}

fn default_portal_far() -> f32 {
    DEFAULT_PORTAL_FAR
}

fn default_prop_scale() -> f32 {
    1.0
}
