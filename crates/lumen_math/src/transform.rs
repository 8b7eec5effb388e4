use crate::{Mat4, Quat, Vec3};

/// Translation / rotation / scale components of a node placement.
///
/// Composes into a column-major affine matrix as `T * R * S`: the scale
/// is applied first, then the quaternion rotation, then the translation.
/// Points go through the full affine map (`Mat4::transform_point3`),
/// directions ignore the translation (`Mat4::transform_vector3`).
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Compose into the world matrix.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }
}
