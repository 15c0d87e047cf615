//! 躯干与头部绘制
//!
//! 关键变换确定之后，把躯干链（胸 / 腹 / 髋）和头部链（头 / 颈）
//! 对齐到修正后的关节点，再把增量传给尾巴和头上的子骨骼。

use glam::Vec3;

use crate::config::PoseConfig;
use crate::context::FrameContext;
use crate::skeleton::{BoneTransform, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

/// 呼吸时头部移动方向（胸部空间，略向下向前）
const HEAD_BREATH_DIR: Vec3 = Vec3::new(0.0, -0.3, 1.0);

/// 躯干传播
pub struct BodyPropagation;

impl BodyPropagation {
    /// 重建颈部与头部骨骼，头部增量传给头上的全部子骨骼
    ///
    /// 返回头部骨骼的增量变换。
    pub fn draw_head(
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
    ) -> Option<BoneTransform> {
        let head = skeleton.chain(ChainKind::Head)?;
        let (head_bone, neck_bone) = (head.bones[0], head.bones[1]);
        let head_key = pose.keys[KeySlot::Head];
        let chest_key = pose.keys[KeySlot::Chest];
        let old_head = pose.frame_matrices[head_bone];

        let link = skeleton.bone(head_bone);
        let mut crown = head_key.transform_point(link.tip);
        let mut skull = head_key.transform_point(link.pivot);
        let neck = chest_key.transform_point(skeleton.bone(neck_bone).pivot);

        let breathe_dir = chest_key.rotation * HEAD_BREATH_DIR.normalize();
        let breath = ctx.breath_amount * ctx.char_scale;
        skull += breathe_dir * (breath * config.skull_breath_lift);
        crown += breathe_dir * (breath * config.crown_breath_lift);

        pose.frame_matrices[head_bone] = head_key;
        pose.rotate_bone_to_match(skeleton, neck, skull, neck_bone);
        pose.rotate_bone_to_match(skeleton, skull, crown, head_bone);

        let head_rel = pose.frame_matrices[head_bone] * old_head.inverse();
        pose.propagate_to_descendants(skeleton, head_bone, head_rel);
        Some(head_rel)
    }

    /// 重建躯干：腹部取髋 / 胸各一半，髋部增量传给尾巴
    ///
    /// 返回髋部骨骼的增量变换。
    pub fn propagate(skeleton: &SkeletonModel, pose: &mut PoseBuffer) -> Option<BoneTransform> {
        let torso = skeleton.chain(ChainKind::Torso)?;
        let (chest_bone, abdomen_bone, hip_bone) = (torso.bones[0], torso.bones[1], torso.bones[2]);
        let hip_key = pose.keys[KeySlot::Hip];
        let chest_key = pose.keys[KeySlot::Chest];
        let old_hip = pose.frame_matrices[hip_bone];

        let collarbone = chest_key.transform_point(skeleton.bone(chest_bone).tip);
        let ribs = chest_key.transform_point(skeleton.bone(chest_bone).pivot);
        let stomach = hip_key.transform_point(skeleton.bone(abdomen_bone).pivot);
        let hips = hip_key.transform_point(skeleton.bone(hip_bone).pivot);

        pose.frame_matrices[chest_bone] = chest_key;
        pose.frame_matrices[abdomen_bone] = hip_key.lerp(&chest_key, 0.5);
        pose.frame_matrices[hip_bone] = hip_key;

        pose.rotate_bone_to_match(skeleton, ribs, collarbone, chest_bone);
        pose.rotate_bone_to_match(skeleton, stomach, ribs, abdomen_bone);
        pose.rotate_bone_to_match(skeleton, hips, stomach, hip_bone);

        let hip_rel = pose.frame_matrices[hip_bone] * old_hip.inverse();
        if let Some(tail) = skeleton.chain(ChainKind::Tail) {
            for &bone in &tail.bones {
                pose.frame_matrices[bone] = hip_rel * pose.frame_matrices[bone];
            }
        }
        Some(hip_rel)
    }
}
