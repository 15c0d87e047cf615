//! 躯干注视 IK
//!
//! 胸部关键变换绕腹部两端各转半个修正角，看起来像是从腰部扭转。
//! 胸部的增量同时带动头部（以及非坐 / 睡状态下的双臂）关键变换。

use glam::Vec2;
use rand::Rng;

use super::look::{dialogue_bob, hysteresis, raw_look, LookBasis};
use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags};
use crate::math::{decay, jitter};
use crate::skeleton::{BonePoint, BoneTransform, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

/// 躯干注视状态
#[derive(Clone, Debug, Default)]
pub struct ChestIk {
    /// 平滑后的 (偏航, 俯仰)
    pub angle: Vec2,
    pub velocity: Vec2,
    /// 上一帧的目标
    pub target: Vec2,
    /// 上一帧的原始偏航（迟滞与奇异点回退用）
    old_yaw: f32,
}

impl ChestIk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solve<R: Rng>(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        look: glam::Vec3,
        rng: &mut R,
    ) {
        let Some(torso) = skeleton.chain(ChainKind::Torso) else {
            return;
        };
        let basis = LookBasis::from_rotation(pose.keys[KeySlot::Chest].rotation);
        let raw = raw_look(look, &basis, self.old_yaw, config.chest_tilt_offset);

        let yaw = hysteresis(raw.yaw, self.old_yaw, config.chest_yaw_range, config.look_hysteresis_threshold);
        self.old_yaw = yaw;

        let range = Vec2::new(config.chest_yaw_range, config.chest_pitch_range);
        let mut target = Vec2::new(yaw * raw.amount, ctx.idle_stance_amount * raw.pitch * raw.amount);
        target.x += jitter(rng, config.chest_jitter);
        target.y += jitter(rng, config.chest_jitter);
        self.target = target.clamp(-range, range);

        if ctx.has(LocomotionFlags::RESET_SECONDARY) {
            self.angle = self.target;
            self.velocity = Vec2::ZERO;
        } else {
            let frames = ctx.frames as f32;
            self.velocity *= decay(config.chest_damping, ctx.frames);
            self.velocity += (self.target - self.angle) * config.chest_stiffness * frames;
            self.angle += self.velocity * ctx.timestep * frames;
            self.angle = self.angle.clamp(-range, range);
        }
        if !self.angle.is_finite() {
            log::warn!("[ChestIK] 角度出现 NaN，已重置");
            self.angle = Vec2::ZERO;
            self.velocity = Vec2::ZERO;
        }

        let mut shown = self.angle;
        if ctx.has(LocomotionFlags::DIALOGUE) {
            let bob = (0.1 * ctx.talking_amount + 0.02) * 0.1;
            shown += dialogue_bob(ctx.time, [5.5, 9.5, 4.5, 7.5], bob);
        }

        let half = glam::Quat::IDENTITY.slerp(basis.rotation(shown), 0.5);
        let abdomen = torso.bones[1];
        let abdomen_top = pose.bone_point(skeleton, abdomen, BonePoint::Tip);
        let abdomen_bottom = pose.bone_point(skeleton, abdomen, BonePoint::Pivot);

        let old_chest = pose.keys[KeySlot::Chest];
        let new_chest = BoneTransform::rotation_about(half, abdomen_bottom)
            * BoneTransform::rotation_about(half, abdomen_top)
            * old_chest;
        let offset = new_chest * old_chest.inverse();
        pose.keys[KeySlot::Chest] = new_chest;

        if !ctx.has(LocomotionFlags::SITTING) && !ctx.has(LocomotionFlags::ASLEEP) {
            pose.keys.premultiply(&KeySlot::ARMS, offset);
        }
        pose.keys.premultiply(&[KeySlot::Head], offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::test_rig;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (SkeletonModel, PoseConfig, Pcg32) {
        (test_rig::skeleton(), PoseConfig::default().without_jitter(), Pcg32::seed_from_u64(7))
    }

    #[test]
    fn test_chest_converges_to_target() {
        // 持续看向左前方，角度收敛到目标且不再振荡
        let (skeleton, config, mut rng) = setup();
        let ctx = FrameContext::default();
        let look = Vec3::new(0.5, 0.0, 1.0).normalize();
        let mut chest = ChestIk::new();

        let mut last = Vec2::ZERO;
        for _ in 0..600 {
            let mut pose = test_rig::bind_pose(&skeleton);
            chest.solve(&skeleton, &mut pose, &ctx, &config, look, &mut rng);
            last = chest.angle;
        }
        let expected = 0.5f32.atan2(1.0);
        assert!((last.x - expected).abs() < 0.01);
        assert!(chest.velocity.length() < 0.01);
    }

    #[test]
    fn test_chest_range_for_any_input() {
        // 零向量、竖直向上、正后方都不越界
        let (skeleton, config, mut rng) = setup();
        let ctx = FrameContext::default();
        let mut chest = ChestIk::new();
        let looks = [Vec3::ZERO, Vec3::Y, -Vec3::Y, -Vec3::Z, Vec3::new(-1.0, 0.0, -0.01), Vec3::new(1.0, 0.0, -0.01)];

        for look in looks.iter().cycle().take(600) {
            let mut pose = test_rig::bind_pose(&skeleton);
            chest.solve(&skeleton, &mut pose, &ctx, &config, *look, &mut rng);
            assert!(chest.angle.x.abs() <= config.chest_yaw_range + 1e-5);
            assert!(chest.angle.y.abs() <= config.chest_pitch_range + 1e-5);
            assert!(pose.keys[KeySlot::Chest].is_finite());
        }
    }

    #[test]
    fn test_chest_frame_rate_independent() {
        // 2 帧一步与逐帧两步：过程中相差不超过 0.1，稳定后相差不超过 1e-3
        let (skeleton, config, _) = setup();
        let look = Vec3::new(0.5, 0.0, 1.0).normalize();
        let run = |ctx: FrameContext, steps: usize| {
            let mut rng = Pcg32::seed_from_u64(7);
            let mut chest = ChestIk::new();
            for _ in 0..steps {
                let mut pose = test_rig::bind_pose(&skeleton);
                chest.solve(&skeleton, &mut pose, &ctx, &config, look, &mut rng);
            }
            chest.angle
        };
        let double_ctx = FrameContext::new(1.0 / 120.0, 2);
        assert!((run(FrameContext::default(), 30) - run(double_ctx.clone(), 15)).length() < 0.1);
        assert!((run(FrameContext::default(), 240) - run(double_ctx, 120)).length() < 1e-3);
    }

    #[test]
    fn test_chest_drags_head_and_arms() {
        let (skeleton, config, mut rng) = setup();
        let mut ctx = FrameContext::default();
        ctx.flags |= LocomotionFlags::RESET_SECONDARY;
        let mut chest = ChestIk::new();
        let mut pose = test_rig::bind_pose(&skeleton);
        chest.solve(&skeleton, &mut pose, &ctx, &config, Vec3::X, &mut rng);

        // 头与手臂随胸部一起旋转
        let chest_rot = pose.keys[KeySlot::Chest].rotation;
        assert!(chest_rot.dot(glam::Quat::IDENTITY).abs() < 0.9999);
        assert!(pose.keys[KeySlot::Head].rotation.dot(chest_rot).abs() > 0.9999);
        assert!(pose.keys[KeySlot::LeftArm].rotation.dot(chest_rot).abs() > 0.9999);

        // 坐着时手臂不动
        ctx.flags |= LocomotionFlags::SITTING;
        let mut pose = test_rig::bind_pose(&skeleton);
        chest.solve(&skeleton, &mut pose, &ctx, &config, Vec3::X, &mut rng);
        assert_eq!(pose.keys[KeySlot::LeftArm], BoneTransform::IDENTITY);
    }
}
