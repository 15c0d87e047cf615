//! 髋部 IK
//!
//! 脚部贴地之后，两侧髋点按目标腿长拉回到脚附近，由此得到髋部的平移与小幅扭转。

use glam::{Quat, Vec3};

use crate::config::PoseConfig;
use crate::context::FrameContext;
use crate::math::{decay, place_at_distance, EPSILON_SQ};
use crate::skeleton::{BonePoint, BoneTransform, ChainKind, IkChain, KeySlot, PoseBuffer, SkeletonModel};

/// 髋部修正结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HipCorrection {
    /// 平移
    pub offset: Vec3,
    /// 绕 `pivot` 的旋转
    pub rotation: Quat,
    /// 旋转中心（髋骨末端）
    pub pivot: Vec3,
}

impl HipCorrection {
    pub fn transform(&self) -> BoneTransform {
        BoneTransform::from_translation(self.offset) * BoneTransform::rotation_about(self.rotation, self.pivot)
    }

    /// 写回髋部关键变换
    pub fn apply(&self, pose: &mut PoseBuffer) {
        pose.keys[KeySlot::Hip] = self.transform() * pose.keys[KeySlot::Hip];
    }
}

/// 髋部 IK 平滑历史
#[derive(Clone, Debug, Default)]
pub struct HipIk {
    old_offset: Option<Vec3>,
    old_rotation: Option<Quat>,
}

impl HipIk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前关键变换下两条腿的长度（髋根到脚底），作为目标腿长
    pub fn measure_leg_lengths(skeleton: &SkeletonModel, pose: &PoseBuffer) -> [f32; 2] {
        let mut lengths = [0.0; 2];
        for (j, (kind, slot)) in [(ChainKind::LeftLeg, KeySlot::LeftLeg), (ChainKind::RightLeg, KeySlot::RightLeg)]
            .into_iter()
            .enumerate()
        {
            if let Some(leg) = skeleton.chain(kind) {
                let (foot, hip) = leg_anchor_points(skeleton, pose, leg, slot);
                lengths[j] = foot.distance(hip);
            }
        }
        lengths
    }

    pub fn solve(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        target_leg_length: [f32; 2],
    ) -> Option<HipCorrection> {
        let left = skeleton.chain(ChainKind::LeftLeg)?;
        let right = skeleton.chain(ChainKind::RightLeg)?;
        let torso = skeleton.chain(ChainKind::Torso)?;

        let (foot_l, hip_l) = leg_anchor_points(skeleton, pose, left, KeySlot::LeftLeg);
        let (foot_r, hip_r) = leg_anchor_points(skeleton, pose, right, KeySlot::RightLeg);
        let foot = [foot_l, foot_r];
        let orig = [hip_l, hip_r];
        let orig_mid = (orig[0] + orig[1]) * 0.5;
        let mut hip = orig;

        for _ in 0..config.hip_iterations {
            let hip_dist = hip[0].distance(hip[1]);
            for j in 0..2 {
                hip[j] = place_at_distance(foot[j], hip[j], target_leg_length[j]);
            }
            // 水平位置保持不变，只有高度跟随腿长
            let mid = (hip[0] + hip[1]) * 0.5;
            let mid = Vec3::new(orig_mid.x, mid.y, orig_mid.z);
            let dir = ((hip[1] - hip[0]) + (orig[1] - orig[0]) * config.hip_foot_spread_weight).normalize_or_zero();
            hip[0] = mid - dir * (hip_dist * 0.5);
            hip[1] = mid + dir * (hip_dist * 0.5);
        }

        let rotation = twist_between(orig[1] - orig[0], hip[1] - hip[0], ctx, config);

        let hip_root = pose.keys[KeySlot::Hip].transform_point(skeleton.bone(torso.root()).point(BonePoint::Tip));
        let orig_offset = orig_mid - hip_root;
        let new_mid = (hip[0] + hip[1]) * 0.5;
        let raw = new_mid - orig_mid + orig_offset - rotation * orig_offset;
        if !raw.is_finite() {
            log::warn!("[HipIK] 髋部偏移出现 NaN，本帧跳过");
            return None;
        }

        let keep = decay(config.hip_smoothing, ctx.frames);
        let offset = raw.lerp(self.old_offset.unwrap_or(raw), keep);
        let rotation = rotation.slerp(self.old_rotation.unwrap_or(rotation), keep).normalize();
        self.old_offset = Some(offset);
        self.old_rotation = Some(rotation);

        Some(HipCorrection {
            offset,
            rotation,
            pivot: hip_root,
        })
    }

    /// 清空平滑历史（下一帧直接采用新值）
    pub fn reset(&mut self) {
        self.old_offset = None;
        self.old_rotation = None;
    }
}

/// (脚底点, 髋根点)
fn leg_anchor_points(skeleton: &SkeletonModel, pose: &PoseBuffer, leg: &IkChain, slot: KeySlot) -> (Vec3, Vec3) {
    let foot = pose.keys[slot].transform_point(skeleton.bone(leg.bones[0]).pivot);
    let hip = pose.keys[KeySlot::Hip].transform_point(skeleton.bone(leg.root()).pivot);
    (foot, hip)
}

/// 髋线从 `from` 转到 `to` 的扭转，幅度随水平速度减小
fn twist_between(from: Vec3, to: Vec3, ctx: &FrameContext, config: &PoseConfig) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    let axis = from.cross(to);
    if axis.length_squared() < EPSILON_SQ {
        return Quat::IDENTITY;
    }
    let axis = axis.normalize();
    let right = from.cross(axis);
    let angle = (-to.dot(right)).atan2(to.dot(from));

    let flat_speed = Vec3::new(ctx.velocity.x, 0.0, ctx.velocity.z).length();
    let max_angle = (config.hip_max_twist - flat_speed * config.hip_twist_speed_falloff).max(0.0);
    Quat::from_axis_angle(axis, angle.clamp(-max_angle, max_angle))
}
