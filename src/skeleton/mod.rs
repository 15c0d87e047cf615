//! 骨骼系统
//!
//! 核心设计思想：
//! - BoneLink: 单个骨骼节点（pivot / tip 两个锚点，绑定姿态空间）
//! - SkeletonModel: 静态骨架 + IK 链描述，加载后只读
//! - PoseBuffer: 每个角色每帧可写的骨骼矩阵与 7 个关键变换

mod bone_link;
mod model;
mod pose;
#[cfg(test)]
pub(crate) mod test_rig;

pub use bone_link::{BoneLink, BonePoint};
pub use model::{ChainKind, IkChain, SkeletonModel, ARM_HINGE_AXIS, ARM_HINGE_FRONT};
pub use pose::{KeySlot, KeyTransforms, PoseBuffer};

use glam::{Mat4, Quat, Vec3};
use std::ops::Mul;

// ============================================================================
// 公共类型定义
// ============================================================================

/// 刚体变换（旋转 + 平移）
///
/// 乘法从右往左作用：`(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`。
/// 旋转始终保持单位四元数。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self { translation, rotation }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, rotation: Quat::IDENTITY }
    }

    #[inline]
    pub fn from_rotation(rotation: Quat) -> Self {
        Self { translation: Vec3::ZERO, rotation }
    }

    /// 绕某点旋转
    #[inline]
    pub fn rotation_about(rotation: Quat, pivot: Vec3) -> Self {
        Self {
            translation: pivot - rotation * pivot,
            rotation,
        }
    }

    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    #[inline]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    #[inline]
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// 平移线性插值、旋转球面插值
    #[inline]
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
        }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// 从矩阵分解（忽略缩放）
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation: rotation.normalize() }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite()
    }
}

impl Mul for BoneTransform {
    type Output = BoneTransform;

    #[inline]
    fn mul(self, rhs: BoneTransform) -> BoneTransform {
        BoneTransform {
            translation: self.rotation * rhs.translation + self.translation,
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}
