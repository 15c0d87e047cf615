//! 逐帧姿态缓冲
//!
//! 每根骨骼一个帧矩阵（绑定空间 → 当前姿态），加 7 个关键变换槽位。
//! 动画混合阶段写入初值，IK 与次级运动按固定顺序原地修改，最后交给蒙皮。

use glam::{Mat4, Vec3};
use std::ops::{Index, IndexMut};

use super::bone_link::BonePoint;
use super::model::SkeletonModel;
use super::BoneTransform;
use crate::math::rotation_between;

// ============================================================================
// 关键变换
// ============================================================================

/// 关键变换槽位
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeySlot {
    Head,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
    Chest,
    Hip,
}

impl KeySlot {
    pub const COUNT: usize = 7;

    pub const ALL: [KeySlot; Self::COUNT] = [
        KeySlot::Head,
        KeySlot::LeftArm,
        KeySlot::RightArm,
        KeySlot::LeftLeg,
        KeySlot::RightLeg,
        KeySlot::Chest,
        KeySlot::Hip,
    ];

    pub const ARMS: [KeySlot; 2] = [KeySlot::LeftArm, KeySlot::RightArm];
    pub const LEGS: [KeySlot; 2] = [KeySlot::LeftLeg, KeySlot::RightLeg];
}

/// 7 个关键变换
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KeyTransforms([BoneTransform; KeySlot::COUNT]);

impl KeyTransforms {
    /// 左乘同一个变换（例如整体平移或父骨骼的增量）
    pub fn premultiply(&mut self, slots: &[KeySlot], delta: BoneTransform) {
        for &slot in slots {
            self[slot] = delta * self[slot];
        }
    }

    pub fn translate(&mut self, slot: KeySlot, offset: Vec3) {
        self[slot].translation += offset;
    }
}

impl Index<KeySlot> for KeyTransforms {
    type Output = BoneTransform;

    #[inline]
    fn index(&self, slot: KeySlot) -> &BoneTransform {
        &self.0[slot as usize]
    }
}

impl IndexMut<KeySlot> for KeyTransforms {
    #[inline]
    fn index_mut(&mut self, slot: KeySlot) -> &mut BoneTransform {
        &mut self.0[slot as usize]
    }
}

// ============================================================================
// 姿态缓冲
// ============================================================================

/// 姿态缓冲
#[derive(Clone, Debug)]
pub struct PoseBuffer {
    /// 每根骨骼的帧矩阵
    pub frame_matrices: Vec<BoneTransform>,
    /// 关键变换
    pub keys: KeyTransforms,
}

impl PoseBuffer {
    /// 绑定姿态
    pub fn new(skeleton: &SkeletonModel) -> Self {
        Self {
            frame_matrices: vec![BoneTransform::IDENTITY; skeleton.bone_count()],
            keys: KeyTransforms::default(),
        }
    }

    /// 从帧矩阵构建，关键变换取自各槽位驱动的骨骼
    pub fn from_frames(skeleton: &SkeletonModel, frame_matrices: Vec<BoneTransform>) -> Self {
        let mut pose = Self {
            frame_matrices,
            keys: KeyTransforms::default(),
        };
        pose.sync_keys_from_frames(skeleton);
        pose
    }

    pub fn sync_keys_from_frames(&mut self, skeleton: &SkeletonModel) {
        for slot in KeySlot::ALL {
            if let Some(bone) = skeleton.key_bone(slot) {
                self.keys[slot] = self.frame_matrices[bone];
            }
        }
    }

    /// 当前姿态下骨骼锚点的位置
    #[inline]
    pub fn bone_point(&self, skeleton: &SkeletonModel, bone: usize, which: BonePoint) -> Vec3 {
        self.frame_matrices[bone].transform_point(skeleton.bone(bone).point(which))
    }

    /// 旋转骨骼，使其静止轴从 `a` 指向 `b`，骨骼中点落在 `a`、`b` 中点
    pub fn rotate_bone_to_match(&mut self, skeleton: &SkeletonModel, a: Vec3, b: Vec3, bone: usize) {
        let link = skeleton.bone(bone);
        let frame = &mut self.frame_matrices[bone];
        let dir = frame.rotation * link.rest_axis();
        let rot = rotation_between(dir, b - a);
        frame.rotation = (rot * frame.rotation).normalize();
        frame.translation = (a + b) * 0.5 - frame.rotation * link.midpoint();
    }

    /// 两根骨骼共同覆盖 `a → c`，按 `weight` 拆分
    ///
    /// `bone` 覆盖 `a → b`，`bone2` 覆盖 `b → c`，其中 `b = mix(a, c, 1 - weight)`；
    /// 两根骨骼获得相同的旋转增量。
    pub fn rotate_bones_to_match(
        &mut self,
        skeleton: &SkeletonModel,
        a: Vec3,
        c: Vec3,
        bone: usize,
        bone2: usize,
        weight: f32,
    ) {
        let b = a.lerp(c, 1.0 - weight);
        let link = skeleton.bone(bone);
        let dir = self.frame_matrices[bone].rotation * link.rest_axis();
        let rot = rotation_between(dir, b - a);

        let frame = &mut self.frame_matrices[bone];
        frame.rotation = (rot * frame.rotation).normalize();
        frame.translation = (a + b) * 0.5 - frame.rotation * link.midpoint();

        let link2 = skeleton.bone(bone2);
        let frame2 = &mut self.frame_matrices[bone2];
        frame2.rotation = (rot * frame2.rotation).normalize();
        frame2.translation = (b + c) * 0.5 - frame2.rotation * link2.midpoint();
    }

    /// 把增量变换左乘到某骨骼的全部后代
    pub fn propagate_to_descendants(&mut self, skeleton: &SkeletonModel, bone: usize, delta: BoneTransform) {
        for &child in skeleton.descendants(bone) {
            self.frame_matrices[child] = delta * self.frame_matrices[child];
        }
    }

    /// 整体变换（帧矩阵 + 关键变换）
    pub fn transform_all(&mut self, delta: BoneTransform) {
        for frame in &mut self.frame_matrices {
            *frame = delta * *frame;
        }
        self.keys.premultiply(&KeySlot::ALL, delta);
    }

    /// 导出蒙皮矩阵
    pub fn write_skinning_matrices(&self, out: &mut [Mat4]) {
        for (dst, frame) in out.iter_mut().zip(&self.frame_matrices) {
            *dst = frame.to_matrix();
        }
    }

    /// 质量加权的骨骼中点平均，粗略估计重心
    pub fn estimate_center_of_mass(&self, skeleton: &SkeletonModel) -> Vec3 {
        let mut total = Vec3::ZERO;
        let mut mass = 0.0;
        for (link, frame) in skeleton.bones().iter().zip(&self.frame_matrices) {
            total += frame.transform_point(link.midpoint()) * link.mass;
            mass += link.mass;
        }
        if mass > 0.0 {
            total / mass
        } else {
            Vec3::ZERO
        }
    }
}
