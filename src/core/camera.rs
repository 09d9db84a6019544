//! Host camera handed to the grass renderer each frame.
//!
//! The renderer reads three things from it: the view-projection for the
//! camera uniform, the position for LOD distances and the frustum for chunk
//! culling. Orientation is a quaternion, driven by yaw/pitch in the demo.

use crate::core::types::{Mat4, Quat, Vec3};
use crate::math::Frustum;

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Camera at `position` looking down -Z
    pub fn new(position: Vec3, fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.01,
            far: 1000.0,
        }
    }

    /// Camera at `position` facing `target`, Y up
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        let world_to_view = Mat4::look_at_rh(position, target, Vec3::Y);
        let (_, rotation, _) = world_to_view.inverse().to_scale_rotation_translation();
        Self {
            rotation,
            ..Self::new(position, 60.0, 16.0 / 9.0)
        }
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position).inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far) * self.view_matrix()
    }

    /// Clip space back to world space, used for picking rays
    pub fn view_projection_inverse(&self) -> Mat4 {
        self.view_projection().inverse()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Orient from yaw (around Y) then pitch (around the local X), in radians
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.rotation = Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0);
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.aspect = width / height.max(1.0);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), 60.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_faces_neg_z() {
        let camera = Camera::default();
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
        assert!((camera.right() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_view_moves_world_opposite() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(10.0, 0.0, 0.0);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(-10.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_look_at_faces_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 5.0, 10.0), Vec3::new(10.0, 5.0, 10.0));
        assert!((camera.forward() - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_yaw_turns_left() {
        let mut camera = Camera::default();
        camera.set_yaw_pitch(std::f32::consts::FRAC_PI_2, 0.0);
        assert!((camera.forward() - Vec3::NEG_X).length() < 1e-4);
    }

    #[test]
    fn test_frustum_contains_point_ahead() {
        let camera = Camera::default().with_clip(0.1, 100.0);
        let frustum = camera.frustum();
        assert!(frustum.contains_point(camera.position + camera.forward() * 10.0));
        assert!(!frustum.contains_point(camera.position - camera.forward() * 10.0));
    }
}
