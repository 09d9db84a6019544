//! Per-frame chunk culling and distance LOD.
//!
//! Each chunk gets `floor(blade_factor * instance_budget)` instances, where
//! `blade_factor = min(1, (distance_scale / (distance - near_offset)) ^ falloff)`.
//! Chunks outside the render distance (or the frustum, with manual culling)
//! get none.

use glam::Vec3;

use super::config::{GrassConfig, LodParams};
use crate::core::camera::Camera;
use crate::math::{Aabb, Frustum};

/// Smallest distance the falloff divides by
const MIN_LOD_DISTANCE: f32 = 1e-4;

/// Density multiplier for a chunk `sqr_distance` away. Not clamped below.
pub fn blade_factor(sqr_distance: f32, lod: &LodParams) -> f32 {
    let mut dist = sqr_distance.sqrt() - lod.near_offset;
    if dist <= 0.0 {
        dist = MIN_LOD_DISTANCE;
    }
    let inv_dist = 1.0 / dist;
    (inv_dist * lod.distance_scale).powf(lod.falloff_exponent).min(1.0)
}

/// Instances to draw for a chunk `sqr_distance` away
pub fn instance_count(sqr_distance: f32, lod: &LodParams, max_distance_sqr: f32, budget: u32) -> u32 {
    if sqr_distance > max_distance_sqr {
        return 0;
    }
    (blade_factor(sqr_distance, lod) * budget as f32).floor() as u32
}

/// One chunk draw for this frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawItem {
    /// Index into the surface's chunk list
    pub chunk: usize,
    pub instance_count: u32,
}

/// Frame-constant culling inputs
#[derive(Clone, Copy, Debug)]
pub struct LodView {
    pub camera_position: Vec3,
    /// Set only when manual culling is on
    pub frustum: Option<Frustum>,
    pub lod: LodParams,
    pub max_distance_sqr: f32,
    pub instance_budget: u32,
}

impl LodView {
    /// Frustum planes are extracted here, once per frame
    pub fn new(camera: &Camera, config: &GrassConfig) -> Self {
        Self {
            camera_position: camera.position,
            frustum: config.manual_culling.then(|| camera.frustum()),
            lod: config.lod,
            max_distance_sqr: config.max_render_distance_sqr(),
            instance_budget: config.instance_budget,
        }
    }

    /// Instances for a chunk with these world bounds
    pub fn instance_count(&self, bounds: &Aabb) -> u32 {
        if let Some(frustum) = &self.frustum {
            if !frustum.intersects_aabb(bounds) {
                return 0;
            }
        }
        instance_count(
            bounds.sqr_distance(self.camera_position),
            &self.lod,
            self.max_distance_sqr,
            self.instance_budget,
        )
    }
}

/// Builds the frame's draw list. Reuses its allocation across frames.
#[derive(Default)]
pub struct LodCuller {
    draws: Vec<DrawItem>,
}

impl LodCuller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cull `bounds` (one per chunk) and return the chunks to draw
    pub fn cull<'a>(&mut self, view: &LodView, bounds: impl IntoIterator<Item = &'a Aabb>) -> &[DrawItem] {
        self.draws.clear();
        for (chunk, b) in bounds.into_iter().enumerate() {
            let instance_count = view.instance_count(b);
            if instance_count > 0 {
                self.draws.push(DrawItem { chunk, instance_count });
            }
        }
        &self.draws
    }

    pub fn last_draws(&self) -> &[DrawItem] {
        &self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: f32) -> Aabb {
        Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    }

    fn view(config: &GrassConfig, camera: &Camera) -> LodView {
        LodView::new(camera, config)
    }

    #[test]
    fn test_beyond_max_distance_is_zero() {
        let lod = LodParams {
            distance_scale: 1e6,
            falloff_exponent: 0.0,
            near_offset: 1e6,
        };
        assert_eq!(instance_count(101.0, &lod, 100.0, 50), 0);
        assert_eq!(instance_count(100.0, &lod, 100.0, 50), 50);
    }

    #[test]
    fn test_near_camera_gets_full_budget() {
        let lod = LodParams {
            distance_scale: 10.0,
            falloff_exponent: 1.0,
            near_offset: 0.0,
        };
        assert_eq!(blade_factor(0.0, &lod), 1.0);
        assert_eq!(instance_count(1e-6, &lod, 100.0, 50), 50);
    }

    #[test]
    fn test_zero_falloff_is_constant() {
        let lod = LodParams {
            distance_scale: 1.0,
            falloff_exponent: 0.0,
            near_offset: 0.0,
        };
        for sqr in [1.0, 100.0, 10_000.0] {
            assert_eq!(blade_factor(sqr, &lod), 1.0);
        }
    }

    #[test]
    fn test_falloff_halves_density() {
        let lod = LodParams {
            distance_scale: 10.0,
            falloff_exponent: 1.0,
            near_offset: 0.0,
        };
        // 20 units away with scale 10: factor 0.5
        assert_eq!(instance_count(400.0, &lod, 1e6, 50), 25);
    }

    #[test]
    fn test_near_offset_extends_full_density() {
        let lod = LodParams {
            distance_scale: 1.0,
            falloff_exponent: 1.0,
            near_offset: 30.0,
        };
        assert_eq!(blade_factor(400.0, &lod), 1.0);
    }

    #[test]
    fn test_cull_skips_zero_counts() {
        let config = GrassConfig {
            max_render_distance: 50.0,
            ..Default::default()
        };
        let camera = Camera::new(Vec3::ZERO, 60.0, 1.0);
        let chunks = [unit_box_at(0.0), unit_box_at(500.0), unit_box_at(10.0)];

        let mut culler = LodCuller::new();
        let draws = culler.cull(&view(&config, &camera), chunks.iter());
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0], DrawItem { chunk: 0, instance_count: 50 });
        assert_eq!(draws[1].chunk, 2);
    }

    #[test]
    fn test_empty_surface() {
        let camera = Camera::new(Vec3::ZERO, 60.0, 1.0);
        let mut culler = LodCuller::new();
        assert!(culler.cull(&view(&GrassConfig::default(), &camera), []).is_empty());
    }

    #[test]
    fn test_manual_culling_rejects_behind_camera() {
        let config = GrassConfig {
            manual_culling: true,
            ..Default::default()
        };
        // Default camera looks down -Z
        let camera = Camera::new(Vec3::ZERO, 60.0, 1.0);
        let in_front = Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 4.0), Vec3::new(1.0, 1.0, 6.0));

        let v = view(&config, &camera);
        assert!(v.instance_count(&in_front) > 0);
        assert_eq!(v.instance_count(&behind), 0);

        let unculled = view(&GrassConfig::default(), &camera);
        assert!(unculled.instance_count(&behind) > 0);
    }
}
