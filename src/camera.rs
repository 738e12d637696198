//! Scene cameras.
//!
//! A [`Camera`] only owns a projection. Where it sits in the world comes from
//! the transform of the entity carrying it; the renderer receives
//! `projection × transform⁻¹`.

use cgmath::One;

use crate::math::{self, Mat4};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProjectionType {
    #[default]
    Orthographic,
    Perspective,
}

/// Viewing volume of one projection type.
///
/// `size` is the visible height in world units for orthographic cameras and
/// the vertical field of view in degrees for perspective ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrustum {
    pub size: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraFrustum {
    pub const fn new(size: f32, near: f32, far: f32) -> Self {
        Self { size, near, far }
    }
}

pub const DEFAULT_ORTHOGRAPHIC_FRUSTUM: CameraFrustum = CameraFrustum::new(10.0, -1.0, 1.0);
pub const DEFAULT_PERSPECTIVE_FRUSTUM: CameraFrustum = CameraFrustum::new(45.0, 0.1, 100.0);

/// A projection kept in sync with its parameters.
///
/// Every setter recomputes the projection matrix. Both frustums are kept so
/// switching the projection type back and forth is lossless.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    projection: Mat4,
    projection_type: ProjectionType,
    orthographic: CameraFrustum,
    perspective: CameraFrustum,
    aspect_ratio: f32,
    pub(crate) primary: bool,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            projection: Mat4::one(),
            projection_type: ProjectionType::default(),
            orthographic: DEFAULT_ORTHOGRAPHIC_FRUSTUM,
            perspective: DEFAULT_PERSPECTIVE_FRUSTUM,
            aspect_ratio: 1.0,
            primary: false,
        };
        camera.update_projection();
        camera
    }
}

impl Camera {
    pub fn orthographic(size: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.set_orthographic_frustum(CameraFrustum::new(size, near, far));
        camera
    }

    pub fn perspective(field_of_view_degrees: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            projection_type: ProjectionType::Perspective,
            ..Self::default()
        };
        camera.set_perspective_frustum(CameraFrustum::new(field_of_view_degrees, near, far));
        camera
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn projection_type(&self) -> ProjectionType {
        self.projection_type
    }

    pub fn orthographic_frustum(&self) -> &CameraFrustum {
        &self.orthographic
    }

    pub fn perspective_frustum(&self) -> &CameraFrustum {
        &self.perspective
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_projection_type(&mut self, projection_type: ProjectionType) {
        self.projection_type = projection_type;
        self.update_projection();
    }

    pub fn set_orthographic_frustum(&mut self, frustum: CameraFrustum) {
        self.orthographic = frustum;
        self.update_projection();
    }

    pub fn set_perspective_frustum(&mut self, frustum: CameraFrustum) {
        self.perspective = frustum;
        self.update_projection();
    }

    /// Usually `width / height` of the target the camera renders into.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.update_projection();
    }

    /// Aspect ratio from a target size; zero-height sizes are ignored.
    pub fn fit_to(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    fn update_projection(&mut self) {
        self.projection = match self.projection_type {
            ProjectionType::Orthographic => math::orthographic(
                self.orthographic.size,
                self.aspect_ratio,
                self.orthographic.near,
                self.orthographic.far,
            ),
            ProjectionType::Perspective => math::perspective(
                math::radians(self.perspective.size),
                self.aspect_ratio,
                self.perspective.near,
                self.perspective.far,
            ),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_is_a_ten_unit_orthographic_view() {
        let camera = Camera::default();
        assert_eq!(camera.projection_type(), ProjectionType::Orthographic);
        assert_eq!(*camera.projection(), math::orthographic(10.0, 1.0, -1.0, 1.0));
        // Half the visible height maps to the top clip edge.
        let top = camera.projection() * math::point(0.0, 5.0, 0.0);
        assert!((top.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn setters_recompute_the_projection() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(2.0);
        let right = camera.projection() * math::point(10.0, 0.0, 0.0);
        assert!((right.x - 1.0).abs() < 1e-6);

        camera.set_projection_type(ProjectionType::Perspective);
        assert_eq!(
            *camera.projection(),
            math::perspective(math::radians(45.0), 2.0, 0.1, 100.0)
        );
    }

    #[test]
    fn switching_projection_type_keeps_both_frustums() {
        let mut camera = Camera::orthographic(4.0, -2.0, 2.0);
        camera.set_projection_type(ProjectionType::Perspective);
        camera.set_projection_type(ProjectionType::Orthographic);
        assert_eq!(*camera.orthographic_frustum(), CameraFrustum::new(4.0, -2.0, 2.0));
        assert_eq!(*camera.projection(), math::orthographic(4.0, 1.0, -2.0, 2.0));
    }

    #[test]
    fn fit_to_ignores_zero_height() {
        let mut camera = Camera::default();
        camera.fit_to(1280, 0);
        assert_eq!(camera.aspect_ratio(), 1.0);
        camera.fit_to(1280, 640);
        assert_eq!(camera.aspect_ratio(), 2.0);
    }
}
