//! 手臂次级运动
//!
//! 每条手臂三个质点（肩 / 肘 / 腕）。先用解析 IK 得到目标姿态，
//! 再让质点带着速度惯性向目标收拢，加上骨长与肘部铰链约束，最后回写骨骼。
//!
//! 手臂链（从末端开始）：0 = 手，1/2 = 前臂两段，3/4 = 上臂两段，5 = 锁骨。

use glam::{Quat, Vec3};

use super::point_chain::PointMassChain;
use crate::config::PoseConfig;
use crate::context::{FrameContext, IdleType, LocomotionFlags};
use crate::math::{approach, decay, place_at_distance, rotation_between, split_symmetric, two_bone_joint};
use crate::skeleton::{BonePoint, BoneTransform, ChainKind, IkChain, KeySlot, PoseBuffer, SkeletonModel};

const ARMS: [(ChainKind, KeySlot); 2] = [
    (ChainKind::LeftArm, KeySlot::LeftArm),
    (ChainKind::RightArm, KeySlot::RightArm),
];

/// 解析姿态下的手臂关键点
#[derive(Clone, Copy, Debug)]
struct ArmPose {
    shoulder: Vec3,
    elbow: Vec3,
    wrist: Vec3,
    hand: Vec3,
    collar: Vec3,
    collar_tip: Vec3,
}

/// 回写后的手臂关节
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArmJoints {
    pub shoulder: Vec3,
    pub elbow: Vec3,
    pub wrist: Vec3,
    pub hand: Vec3,
}

/// 手臂次级运动状态
#[derive(Clone, Debug, Default)]
pub struct ArmMotion {
    /// 左右手臂的质点链
    pub chains: [PointMassChain; 2],
}

impl ArmMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空质点，下一帧从解析姿态重新开始
    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset(&[]);
        }
    }

    /// 模拟双臂并写回手臂骨骼（需在胸部关键变换确定之后调用）
    pub fn step(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
    ) -> [Option<ArmJoints>; 2] {
        let mut out = [None; 2];
        let Some(torso) = skeleton.chain(ChainKind::Torso) else {
            return out;
        };
        let rel_mat = pose.keys[KeySlot::Chest] * pose.frame_matrices[torso.bones[0]].inverse();
        let loose = arm_looseness(ctx, config);
        let stiffness = config.arm_stiffness_tight + (config.arm_stiffness_loose - config.arm_stiffness_tight) * loose;

        for (j, (kind, slot)) in ARMS.into_iter().enumerate() {
            let Some(arm) = skeleton.chain(kind) else {
                continue;
            };
            let upper = arm.rest_lengths[3] + arm.rest_lengths[4];
            let lower = arm.rest_lengths[1] + arm.rest_lengths[2];
            let analytic = analytic_arm(skeleton, pose, ctx, config, arm, slot, &rel_mat, upper, lower);
            let targets = [analytic.shoulder, analytic.elbow, analytic.wrist];

            let chain = &mut self.chains[j];
            let mut softness = ctx.arm_softness[j].clamp(0.0, 1.0);
            if ctx.has(LocomotionFlags::ON_LEDGE) {
                softness = 1.0;
            }
            if !chain.is_initialized(3) || ctx.has(LocomotionFlags::RESET_SECONDARY) {
                chain.reset(&targets);
            } else {
                let moved = analytic.wrist.distance(chain.points[2]);
                if moved > config.teleport_distance || !moved.is_finite() {
                    log::debug!("[ArmPhysics] {:?} 单帧位移 {:.2}，质点回到解析姿态", kind, moved);
                    chain.reset(&targets);
                }
            }

            // 上臂在铰链约束里用到的朝向（绑定空间 → 当前）
            let upper_rotation = rel_mat.rotation * pose.frame_matrices[arm.bones[3]].rotation;
            simulate_arm(chain, ctx, config, arm, &analytic, upper_rotation, stiffness, softness, upper, lower);

            out[j] = Some(write_arm(skeleton, pose, arm, slot, &rel_mat, &analytic, &self.chains[j], upper, lower));
        }
        out
    }
}

/// 手臂松弛程度 [0, 1]：越快越紧，战斗 / 空翻时最紧
fn arm_looseness(ctx: &FrameContext, config: &PoseConfig) -> f32 {
    let max_speed = if ctx.max_speed > 0.0 { ctx.max_speed } else { ctx.true_max_speed };
    let mut loose = if max_speed > 0.0 {
        1.0 - ctx.velocity.length() / max_speed
    } else {
        1.0
    };
    if ctx.idle == IdleType::Combat {
        loose = 0.0;
    }
    if !ctx.has(LocomotionFlags::ON_GROUND) {
        loose = config.arm_loose_airborne;
    }
    if ctx.has(LocomotionFlags::FLIPPING) {
        loose = 0.0;
    }
    (loose - ctx.threat_amount.max(0.0)).clamp(0.0, 1.0)
}

/// 解析 IK：肩膀跟随胸部，手腕跟随手部关键变换，肘部按骨长求解
#[allow(clippy::too_many_arguments)]
fn analytic_arm(
    skeleton: &SkeletonModel,
    pose: &PoseBuffer,
    ctx: &FrameContext,
    config: &PoseConfig,
    arm: &IkChain,
    slot: KeySlot,
    rel_mat: &BoneTransform,
    upper: f32,
    lower: f32,
) -> ArmPose {
    let e = &arm.bones;
    let old_shoulder = rel_mat.transform_point(pose.bone_point(skeleton, e[4], BonePoint::Pivot));
    let old_elbow = rel_mat.transform_point(pose.bone_point(skeleton, e[2], BonePoint::Pivot));
    let old_wrist = rel_mat.transform_point(pose.bone_point(skeleton, e[0], BonePoint::Pivot));

    let breathe_dir = pose.keys[KeySlot::Chest].rotation * Vec3::Y;
    let shoulder = old_shoulder + breathe_dir * (ctx.breath_amount * config.arm_breath_lift * ctx.char_scale);

    let hand_key = pose.keys[slot];
    let wrist = hand_key.transform_point(skeleton.bone(e[0]).pivot);
    let hand = hand_key.transform_point(skeleton.bone(e[0]).tip);

    // 动画中的肘部转到新方向，作为弯曲提示
    let hint = shoulder + rotation_between(old_wrist - old_shoulder, wrist - shoulder) * (old_elbow - old_shoulder);
    let elbow = two_bone_joint(shoulder, wrist, hint, upper, lower);

    ArmPose {
        shoulder,
        elbow,
        wrist,
        hand,
        collar: rel_mat.transform_point(pose.bone_point(skeleton, e[5], BonePoint::Pivot)),
        collar_tip: rel_mat.transform_point(pose.bone_point(skeleton, e[5], BonePoint::Tip)),
    }
}

/// 质点模拟：速度惯性 → 向目标收拢 → 柔软度混合 → 骨长 / 铰链约束
#[allow(clippy::too_many_arguments)]
fn simulate_arm(
    chain: &mut PointMassChain,
    ctx: &FrameContext,
    config: &PoseConfig,
    arm: &IkChain,
    analytic: &ArmPose,
    upper_rotation: Quat,
    stiffness: f32,
    softness: f32,
    upper: f32,
    lower: f32,
) {
    chain.begin_step();
    chain.points[0] = analytic.shoulder;

    // 惯性：相对角色整体运动的速度按阻力衰减
    let full_offset = ctx.velocity * ctx.elapsed();
    let drag = decay(config.arm_drag, ctx.frames);
    for i in 1..3 {
        let offset = (chain.velocity(i) - full_offset) * drag + full_offset;
        chain.points[i] += offset;
    }

    let pull = approach(stiffness, ctx.frames);
    let elbow_pull = (analytic.elbow - chain.points[1]) * pull;
    chain.points[1] += elbow_pull;
    let swing = rotation_between(analytic.elbow - analytic.shoulder, chain.points[1] - analytic.shoulder);
    let rotated_tip = swing * (analytic.wrist - analytic.elbow) + chain.points[1];
    let wrist_pull = (rotated_tip - chain.points[2]) * pull;
    chain.points[2] += wrist_pull;

    chain.blend_toward(&[analytic.shoulder, analytic.elbow, analytic.wrist], softness);

    let strength = config.arm_constraint_strength * (1.0 - softness);
    if strength > 0.0 {
        let (p0, p1, p2) = (chain.points[0], chain.points[1], chain.points[2]);
        let (elbow_fix, wrist_fix) = split_symmetric(p1, p2, lower);
        let mut elbow_offset = (place_at_distance(p0, p1, upper) - p1) + (elbow_fix - p1);
        let mut wrist_offset = wrist_fix - p2;

        // 肘部铰链：去掉沿铰链轴的分量，禁止反向弯曲
        let axis = (swing * upper_rotation * arm.hinge_axis).normalize_or_zero();
        let front = (swing * upper_rotation * arm.hinge_front).normalize_or_zero();
        let forearm = p2 - p1;
        let mut hinge = axis * axis.dot(forearm);
        let front_amount = front.dot(forearm);
        if front_amount < 0.0 {
            hinge += front * front_amount;
        }
        elbow_offset += hinge * 0.5;
        wrist_offset -= hinge * 0.5;

        chain.points[1] += elbow_offset * strength;
        chain.points[2] += wrist_offset * strength;
    }

    chain.enforce_lengths_forward(&[upper, lower]);
    chain.end_step();
}

/// 从质点回写骨骼，手部增量传给手指
#[allow(clippy::too_many_arguments)]
fn write_arm(
    skeleton: &SkeletonModel,
    pose: &mut PoseBuffer,
    arm: &IkChain,
    slot: KeySlot,
    rel_mat: &BoneTransform,
    analytic: &ArmPose,
    chain: &PointMassChain,
    upper: f32,
    lower: f32,
) -> ArmJoints {
    let e = &arm.bones;
    let len = &arm.rest_lengths;
    let (p0, p1, p2) = (chain.points[0], chain.points[1], chain.points[2]);

    let hand_rotation = rotation_between(analytic.elbow - analytic.wrist, p1 - p2);
    let elbow = place_at_distance(p0, p1, upper);
    let wrist = elbow + (p2 - p1).normalize_or_zero() * lower;
    let hand = wrist + hand_rotation * (analytic.hand - analytic.wrist);

    // 只有上臂根段和锁骨（及更上层的骨骼）随胸部旋转，其余骨骼各自对齐
    for &bone in &e[4..] {
        pose.frame_matrices[bone] = *rel_mat * pose.frame_matrices[bone];
    }
    let mid_upper = p0.lerp(elbow, len[4] / upper);
    let mid_lower = elbow.lerp(wrist, len[2] / lower);
    pose.rotate_bone_to_match(skeleton, analytic.collar, analytic.collar_tip, e[5]);
    pose.rotate_bone_to_match(skeleton, p0, mid_upper, e[4]);
    pose.rotate_bone_to_match(skeleton, mid_upper, elbow, e[3]);
    pose.rotate_bone_to_match(skeleton, elbow, mid_lower, e[2]);
    pose.rotate_bone_to_match(skeleton, mid_lower, wrist, e[1]);

    let old_hand = pose.frame_matrices[e[0]];
    pose.frame_matrices[e[0]] = pose.keys[slot];
    pose.rotate_bone_to_match(skeleton, wrist, hand, e[0]);
    let hand_rel = pose.frame_matrices[e[0]] * old_hand.inverse();
    pose.propagate_to_descendants(skeleton, e[0], hand_rel);

    ArmJoints {
        shoulder: p0,
        elbow,
        wrist,
        hand,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::test_rig;

    fn segment_lengths(joints: &ArmJoints) -> (f32, f32) {
        (joints.shoulder.distance(joints.elbow), joints.elbow.distance(joints.wrist))
    }

    #[test]
    fn test_arm_rest_pose_stays() {
        // 静止且无外力：手臂保持解析姿态
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let ctx = FrameContext::default();
        let mut arms = ArmMotion::new();

        let mut joints = [None; 2];
        for _ in 0..60 {
            let mut pose = test_rig::bind_pose(&skeleton);
            joints = arms.step(&skeleton, &mut pose, &ctx, &config);
        }
        let left = joints[0].unwrap();
        assert!((left.elbow - Vec3::new(0.18, 1.12, -0.015)).length() < 1e-3);
        assert!((left.wrist - Vec3::new(0.18, 0.88, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_arm_lengths_after_swing() {
        // 胸部左右晃动，手臂滞后但骨长不变
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let ctx = FrameContext::default();
        let arm = skeleton.chain(ChainKind::LeftArm).unwrap();
        let upper = arm.rest_lengths[3] + arm.rest_lengths[4];
        let lower = arm.rest_lengths[1] + arm.rest_lengths[2];
        let mut arms = ArmMotion::new();

        for tick in 0..120 {
            let mut pose = test_rig::bind_pose(&skeleton);
            let sway = BoneTransform::from_translation(Vec3::new((tick as f32 * 0.2).sin() * 0.3, 0.0, 0.0));
            pose.transform_all(sway);
            let joints = arms.step(&skeleton, &mut pose, &ctx, &config);
            for j in joints.iter().flatten() {
                let (u, l) = segment_lengths(j);
                assert!((u - upper).abs() < 1e-3);
                assert!((l - lower).abs() < 1e-3);
            }
            let state = &arms.chains[0];
            assert!((state.segment_length(0) - upper).abs() < 1e-3);
            assert!((state.segment_length(1) - lower).abs() < 1e-3);
        }
    }

    #[test]
    fn test_arm_teleport_guard() {
        // 单帧移动 20：本帧完全回到解析姿态，不拉长
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let ctx = FrameContext::default();
        let mut arms = ArmMotion::new();
        for _ in 0..5 {
            let mut pose = test_rig::bind_pose(&skeleton);
            arms.step(&skeleton, &mut pose, &ctx, &config);
        }

        let offset = Vec3::new(20.0, 0.0, 0.0);
        let mut pose = test_rig::bind_pose(&skeleton);
        pose.transform_all(BoneTransform::from_translation(offset));
        let joints = arms.step(&skeleton, &mut pose, &ctx, &config);
        let left = joints[0].unwrap();
        assert!((left.wrist - (Vec3::new(0.18, 0.88, 0.0) + offset)).length() < 1e-3);
        assert!((left.elbow - (Vec3::new(0.18, 1.12, -0.015) + offset)).length() < 1e-3);
    }

    #[test]
    fn test_arm_softness_follows_analytic() {
        // 手被突然抬到胸前：柔软度为 1 时手腕比纯物理更贴近目标
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let target = Vec3::new(0.18, 1.08, 0.15);

        let mut errors = [0.0; 2];
        for (i, softness) in [0.0, 1.0].into_iter().enumerate() {
            let mut ctx = FrameContext::default();
            ctx.arm_softness = [softness; 2];
            let mut arms = ArmMotion::new();
            let mut pose = test_rig::bind_pose(&skeleton);
            arms.step(&skeleton, &mut pose, &ctx, &config);

            let mut pose = test_rig::bind_pose(&skeleton);
            pose.keys[KeySlot::LeftArm] = BoneTransform::from_translation(Vec3::new(0.0, 0.2, 0.15));
            let joints = arms.step(&skeleton, &mut pose, &ctx, &config);
            errors[i] = joints[0].unwrap().wrist.distance(target);
        }
        assert!(errors[1] < errors[0]);
        assert!(errors[1] < 0.05);
    }

    /// 骨骼相对绑定姿态、绕自身轴的扭转角
    fn twist_angle(skeleton: &SkeletonModel, pose: &PoseBuffer, bone: usize) -> f32 {
        let q = pose.frame_matrices[bone].rotation;
        let axis = skeleton.bone(bone).rest_axis();
        let swing = rotation_between(axis, q * axis);
        (swing.inverse() * q).angle_between(Quat::IDENTITY)
    }

    #[test]
    fn test_arm_chest_twist_only_on_upper_root() {
        // 胸部绕 Y 转 0.5：上臂根段带上扭转，前臂和上臂末段只做最小对齐
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let ctx = FrameContext::default();
        let arm = skeleton.chain(ChainKind::LeftArm).unwrap();
        let upper = arm.rest_lengths[3] + arm.rest_lengths[4];
        let lower = arm.rest_lengths[1] + arm.rest_lengths[2];
        let mut arms = ArmMotion::new();

        let mut pose = test_rig::bind_pose(&skeleton);
        let turn = BoneTransform::from_rotation(Quat::from_rotation_y(0.5));
        pose.keys[KeySlot::Chest] = turn * pose.keys[KeySlot::Chest];
        let joints = arms.step(&skeleton, &mut pose, &ctx, &config)[0].unwrap();

        let e = &arm.bones;
        for &bone in &e[1..4] {
            assert!(twist_angle(&skeleton, &pose, bone) < 1e-3);
        }
        assert!(twist_angle(&skeleton, &pose, e[4]) > 0.3);

        // 骨骼端点与质点一致
        let mid_upper = pose.bone_point(&skeleton, e[4], BonePoint::Tip);
        assert!(pose.bone_point(&skeleton, e[4], BonePoint::Pivot).distance(joints.shoulder) < 1e-3);
        assert!(pose.bone_point(&skeleton, e[3], BonePoint::Pivot).distance(mid_upper) < 1e-3);
        assert!(pose.bone_point(&skeleton, e[3], BonePoint::Tip).distance(joints.elbow) < 1e-3);
        assert!(pose.bone_point(&skeleton, e[1], BonePoint::Tip).distance(joints.wrist) < 1e-3);
        let (u, l) = segment_lengths(&joints);
        assert!((u - upper).abs() < 1e-3);
        assert!((l - lower).abs() < 1e-3);
    }

    #[test]
    fn test_arm_frame_rate_independent() {
        // 手部关键变换前移后保持：2 帧一步与逐帧两步，稳定后手腕位置一致（误差 5e-3）
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let run = |ctx: FrameContext, ticks: usize| {
            let mut arms = ArmMotion::new();
            let mut pose = test_rig::bind_pose(&skeleton);
            arms.step(&skeleton, &mut pose, &ctx, &config);
            let mut joints = None;
            for _ in 0..ticks {
                let mut pose = test_rig::bind_pose(&skeleton);
                pose.keys[KeySlot::LeftArm] = BoneTransform::from_translation(Vec3::new(0.0, 0.05, 0.1));
                joints = arms.step(&skeleton, &mut pose, &ctx, &config)[0];
            }
            joints.unwrap()
        };
        let single = run(FrameContext::default(), 240);
        let double = run(FrameContext::new(1.0 / 120.0, 2), 120);
        assert!(single.wrist.distance(double.wrist) < 5e-3);
        assert!(single.elbow.distance(double.elbow) < 5e-3);
    }

    #[test]
    fn test_arm_looseness() {
        let config = PoseConfig::default();
        let mut ctx = FrameContext::default();
        assert!((arm_looseness(&ctx, &config) - 1.0).abs() < 1e-6);
        ctx.idle = IdleType::Combat;
        assert_eq!(arm_looseness(&ctx, &config), 0.0);
        ctx.idle = IdleType::Stand;
        ctx.flags = LocomotionFlags::empty();
        assert!((arm_looseness(&ctx, &config) - 0.7).abs() < 1e-6);
        ctx.threat_amount = 0.5;
        assert!((arm_looseness(&ctx, &config) - 0.2).abs() < 1e-6);
    }
}
