//! 双骨骼腿部 IK
//!
//! 腿链（从末端开始）：
//! 0 = 脚掌，1 = 脚背（踝 → 脚底），2/3 = 小腿两段，4/5 = 大腿两段。
//! 先把动画中的整条腿旋转缩放到新的髋 → 脚方向，再松弛膝盖，
//! 最后逐根骨骼对齐到修正后的关节点。

use glam::Vec3;

use crate::config::PoseConfig;
use crate::math::{place_at_distance, rotation_between, split_symmetric, two_bone_joint};
use crate::skeleton::{BonePoint, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

/// 求解后的关节点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegJoints {
    pub hip: Vec3,
    pub knee: Vec3,
    pub ankle: Vec3,
    pub foot_base: Vec3,
    pub foot_tip: Vec3,
}

/// 腿部 IK
pub struct LegSolver;

impl LegSolver {
    /// 用髋部与脚部关键变换求解一条腿，写回腿链上的帧矩阵
    pub fn solve(
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        config: &PoseConfig,
        kind: ChainKind,
    ) -> Option<LegJoints> {
        let leg = skeleton.chain(kind)?;
        let slot = if kind == ChainKind::RightLeg { KeySlot::RightLeg } else { KeySlot::LeftLeg };
        let e = &leg.bones;
        let len = &leg.rest_lengths;

        let upper_foot_length = len[1];
        let lower_leg_length = len[2] + len[3];
        let upper_leg_length = len[4] + len[5];
        let lower_leg_weight = len[2] / lower_leg_length;
        let upper_leg_weight = len[4] / upper_leg_length;

        // 动画姿态中的关节
        let old_hip = pose.bone_point(skeleton, e[5], BonePoint::Pivot);
        let mut knee = pose.bone_point(skeleton, e[3], BonePoint::Pivot);
        let mut ankle = pose.bone_point(skeleton, e[1], BonePoint::Pivot);
        let old_foot_base = pose.bone_point(skeleton, e[0], BonePoint::Pivot);

        let hip = pose.keys[KeySlot::Hip].transform_point(skeleton.bone(e[5]).pivot);
        let foot_key = pose.keys[slot];
        let foot_base = foot_key.transform_point(skeleton.bone(e[0]).pivot);
        let foot_tip = foot_key.transform_point(skeleton.bone(e[0]).tip);

        // 整条腿旋转到新方向，再按长度缩放
        let rotate = rotation_between(old_foot_base - old_hip, foot_base - hip);
        knee = hip + rotate * (knee - old_hip);
        ankle = hip + rotate * (ankle - old_hip);
        let old_length = old_foot_base.distance(old_hip);
        if old_length > 1e-6 {
            let scale = foot_base.distance(hip) / old_length;
            knee = hip + (knee - hip) * scale;
            ankle = hip + (ankle - hip) * scale;
        }

        for _ in 0..config.leg_iterations {
            knee = place_at_distance(hip, knee, upper_leg_length);
            ankle = place_at_distance(foot_base, ankle, upper_foot_length);
            (knee, ankle) = split_symmetric(knee, ankle, lower_leg_length);
        }
        // 踝点先落在脚背长度上，再由髋部精确求膝盖；够不到时腿伸直，脚背被拉长
        ankle = place_at_distance(foot_base, ankle, upper_foot_length);
        knee = two_bone_joint(hip, ankle, knee, upper_leg_length, lower_leg_length);
        ankle = place_at_distance(knee, ankle, lower_leg_length);

        pose.frame_matrices[e[0]] = foot_key;
        pose.rotate_bone_to_match(skeleton, foot_base, foot_tip, e[0]);
        pose.rotate_bone_to_match(skeleton, ankle, foot_base, e[1]);
        pose.rotate_bones_to_match(skeleton, knee, ankle, e[3], e[2], lower_leg_weight);
        pose.rotate_bones_to_match(skeleton, hip, knee, e[5], e[4], upper_leg_weight);

        Some(LegJoints {
            hip,
            knee,
            ankle,
            foot_base,
            foot_tip,
        })
    }
}
