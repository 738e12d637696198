//! Geometry and transform helpers on top of `cgmath`.
//!
//! The engine works with `f32` cgmath types throughout. The helpers here follow
//! the engine convention of *pre-multiplying* an existing matrix, so
//! `translate(I, p) * rotate(I, a, z) * scale(I, s)` reads in the same order as
//! it is applied to a vertex (scale first, translation last).

use cgmath::{InnerSpace, Matrix4, Rad, SquareMatrix, Vector3, Vector4};

pub type Vec2 = cgmath::Vector2<f32>;
pub type Vec3 = cgmath::Vector3<f32>;
pub type Vec4 = cgmath::Vector4<f32>;
pub type Mat4 = cgmath::Matrix4<f32>;

/// Positive Z, the rotation axis for 2D quads.
pub const UNIT_Z: Vec3 = Vector3::new(0.0, 0.0, 1.0);

/// Degrees to radians.
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees.to_radians()
}

/// Returns `translation(vector) * matrix`.
pub fn translate(matrix: &Mat4, vector: Vec3) -> Mat4 {
    Matrix4::from_translation(vector) * *matrix
}

/// Returns `rotation(angle, axis) * matrix`. `angle` is in radians, `axis` is
/// normalized before use.
pub fn rotate(matrix: &Mat4, angle: f32, axis: Vec3) -> Mat4 {
    Matrix4::from_axis_angle(axis.normalize(), Rad(angle)) * *matrix
}

/// Returns `scaling(vector) * matrix`.
pub fn scale(matrix: &Mat4, vector: Vec3) -> Mat4 {
    Matrix4::from_nonuniform_scale(vector.x, vector.y, vector.z) * *matrix
}

/// OpenGL-style orthographic projection from explicit clip bounds.
pub fn orthographic_bounds(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    cgmath::ortho(left, right, bottom, top, near, far)
}

/// Centred orthographic projection: `size` is the visible height in world
/// units, the width follows from `aspect_ratio`.
pub fn orthographic(size: f32, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
    let half_height = size * 0.5;
    let half_width = half_height * aspect_ratio;
    orthographic_bounds(-half_width, half_width, -half_height, half_height, near, far)
}

/// OpenGL-style perspective projection. `field_of_view` is the vertical angle
/// in radians.
pub fn perspective(field_of_view: f32, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
    cgmath::perspective(Rad(field_of_view), aspect_ratio, near, far)
}

/// Inverse of `matrix`, `None` when it is singular.
pub fn inverse(matrix: &Mat4) -> Option<Mat4> {
    matrix.invert()
}

/// Projects a homogeneous position back to 3D by dividing through `w`.
///
/// Returns `None` when `w` is zero, the caller decides how to report it.
pub fn dehomogenize(position: Vec4) -> Option<Vec3> {
    if position.w == 0.0 {
        return None;
    }
    Some(position.truncate() / position.w)
}

/// Homogeneous point (`w = 1`).
#[inline]
pub fn point(x: f32, y: f32, z: f32) -> Vec4 {
    Vector4::new(x, y, z, 1.0)
}

/// RGBA colors as `Vec4` with components in `0.0..=1.0`.
pub mod color {
    use super::Vec4;
    use cgmath::Vector4;

    pub const BLACK: Vec4 = Vector4::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Vec4 = Vector4::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Vec4 = Vector4::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Vec4 = Vector4::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Vec4 = Vector4::new(0.0, 0.0, 1.0, 1.0);

    /// 8 bits per channel, each channel clamped to `0..=255`.
    pub fn from_rgba8(red: i32, green: i32, blue: i32, alpha: i32) -> Vec4 {
        let channel = |v: i32| v.clamp(0, 255) as f32 / 255.0;
        Vector4::new(channel(red), channel(green), channel(blue), channel(alpha))
    }

    /// 5 bits per channel, each channel clamped to `0..=31`. Always opaque.
    pub fn from_rgb5(red: i32, green: i32, blue: i32) -> Vec4 {
        let channel = |v: i32| v.clamp(0, 31) as f32 / 31.0;
        Vector4::new(channel(red), channel(green), channel(blue), 1.0)
    }
}
