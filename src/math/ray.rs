//! Pointer picking rays

use crate::core::camera::Camera;
use crate::core::types::{Vec2, Vec3};
use super::aabb::Aabb;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for the slab test
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Ray from the camera through a point in normalized device coordinates
    /// (x right, y up, both in [-1, 1])
    pub fn from_ndc(camera: &Camera, ndc: Vec2) -> Self {
        let inv = camera.view_projection_inverse();
        let near = inv.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inv.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Self::new(near, (far - near).normalize())
    }

    /// Ray through a window pixel, origin at the top-left
    pub fn from_cursor(camera: &Camera, cursor: Vec2, viewport: Vec2) -> Self {
        let ndc = Vec2::new(
            cursor.x / viewport.x * 2.0 - 1.0,
            1.0 - cursor.y / viewport.y * 2.0,
        );
        Self::from_ndc(camera, ndc)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test. Returns the entry and exit distances.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_near = t_min.max_element();
        let t_far = t_max.min_element();

        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }

    /// Distance to the plane through `point` with `normal`, if hit in front
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (point - self.origin).dot(normal) / denom;
        (t >= 0.0).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_aabb_hit() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 2.0).abs() < 0.001);
        assert!((t_far - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_intersects_aabb_miss() {
        let ray = Ray::new(Vec3::new(-2.0, 5.0, 0.5), Vec3::X);
        assert!(ray.intersects_aabb(&Aabb::new(Vec3::ZERO, Vec3::ONE)).is_none());
    }

    #[test]
    fn test_plane_hit_and_parallel() {
        let down = Ray::new(Vec3::new(3.0, 10.0, -1.0), Vec3::NEG_Y);
        let t = down.intersect_plane(Vec3::ZERO, Vec3::Y).unwrap();
        assert!((down.at(t) - Vec3::new(3.0, 0.0, -1.0)).length() < 1e-5);

        let flat = Ray::new(Vec3::Y, Vec3::X);
        assert!(flat.intersect_plane(Vec3::ZERO, Vec3::Y).is_none());

        let up = Ray::new(Vec3::Y, Vec3::Y);
        assert!(up.intersect_plane(Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn test_center_of_screen_follows_forward() {
        let camera = Camera::new(Vec3::new(0.0, 2.0, 5.0), 60.0, 1.5);
        let ray = Ray::from_cursor(&camera, Vec2::new(400.0, 300.0), Vec2::new(800.0, 600.0));
        assert!(ray.direction.dot(camera.forward()) > 0.999);
    }
}
