//! 头部注视 IK
//!
//! 与躯干类似，但加速度经过一次低通滤波，避免头部突然甩动；
//! 颈部骨骼分到一半的修正，头部关键变换绕颈部转动。

use glam::{Quat, Vec2, Vec3};
use rand::Rng;

use super::look::{dialogue_bob, hysteresis, raw_look, LookBasis};
use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags, Species};
use crate::math::{decay, jitter, move_towards, safe_asin};
use crate::skeleton::{BonePoint, BoneTransform, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

/// 头部注视状态
#[derive(Clone, Debug, Default)]
pub struct HeadIk {
    pub angle: Vec2,
    pub velocity: Vec2,
    pub accel: Vec2,
    pub target: Vec2,
    old_yaw: f32,
    /// 上一帧头部朝向（用于空翻时的朝向补偿）
    old_facing: Option<Vec3>,
}

impl HeadIk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 物种对应的 (偏航, 俯仰) 范围
    pub fn range(config: &PoseConfig, species: Species) -> Vec2 {
        let yaw = if species == Species::Rabbit {
            config.head_yaw_range
        } else {
            config.head_yaw_range * config.head_range_scale_non_rabbit
        };
        Vec2::new(yaw, config.head_pitch_range)
    }

    pub fn solve<R: Rng>(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        look: Vec3,
        rng: &mut R,
    ) {
        let (Some(head), Some(torso)) = (skeleton.chain(ChainKind::Head), skeleton.chain(ChainKind::Torso)) else {
            return;
        };
        let basis = LookBasis::from_rotation(pose.keys[KeySlot::Head].rotation);

        // 上一帧朝向在当前基下的角度：动画本身带来的转头量
        let mut facing_change = Vec2::ZERO;
        if let Some(old_facing) = self.old_facing {
            facing_change.x = basis.yaw_of(old_facing).unwrap_or(0.0);
            facing_change.y = safe_asin(old_facing.normalize_or_zero().dot(basis.up));
        }
        self.old_facing = Some(basis.dir);

        let range = Self::range(config, ctx.species);
        let raw = raw_look(look, &basis, self.old_yaw, 0.0);
        let yaw = hysteresis(raw.yaw, self.old_yaw, range.x, config.look_hysteresis_threshold);
        let pitch = (raw.pitch + config.head_tilt_offset).clamp(-range.y, range.y);
        self.old_yaw = yaw;

        let mut target = Vec2::new(yaw, pitch) * raw.amount;
        target.x += jitter(rng, config.head_jitter);
        target.y += jitter(rng, config.head_jitter);
        self.target = target.clamp(-range, range);

        if ctx.has(LocomotionFlags::RESET_SECONDARY) {
            self.angle = self.target;
            self.velocity = Vec2::ZERO;
            self.accel = Vec2::ZERO;
        } else {
            let frames = ctx.frames as f32;
            self.velocity *= decay(config.head_damping, ctx.frames);
            self.accel *= decay(config.head_accel_damping, ctx.frames);
            let pull = (self.target - self.angle) * config.head_stiffness;
            self.accel = pull.lerp(self.accel, decay(config.head_accel_inertia, ctx.frames));
            if !self.accel.is_finite() {
                self.accel = Vec2::ZERO;
            }
            self.velocity += self.accel * frames;
            self.velocity = self.velocity.clamp(Vec2::splat(-config.head_max_velocity), Vec2::splat(config.head_max_velocity));
            self.angle += self.velocity * ctx.timestep * frames;
        }

        // 动画带头部反向转动时，追赶目标以抵消
        let old_offset = facing_change * (1.0 - ctx.flip_ik_fade);
        for axis in 0..2 {
            let (angle, target, offset) = (self.angle[axis], self.target[axis], old_offset[axis]);
            if (angle > target && offset < 0.0) || (angle < target && offset > 0.0) {
                self.angle[axis] = move_towards(angle, target, offset.abs());
            }
        }
        self.angle = self.angle.clamp(-range, range);
        if !self.angle.is_finite() {
            log::warn!("[HeadIK] 角度出现 NaN，已重置");
            self.angle = Vec2::ZERO;
            self.velocity = Vec2::ZERO;
            self.accel = Vec2::ZERO;
        }

        let mut shown = self.angle;
        if ctx.has(LocomotionFlags::DIALOGUE) {
            let bob = (0.3 * ctx.talking_amount + 0.02) * 0.7;
            let wobble = dialogue_bob(ctx.time, [4.0, 10.0, 5.0, 12.0], bob);
            shown += wobble;
        }

        let neck_bone = head.bones[1];
        let chest_bone = torso.bones[0];
        let rel_mat = pose.keys[KeySlot::Chest] * pose.frame_matrices[chest_bone].inverse();
        let neck = rel_mat.transform_point(pose.bone_point(skeleton, neck_bone, BonePoint::Pivot));

        let half = Quat::IDENTITY.slerp(basis.rotation(shown), 0.5);
        let about_neck = BoneTransform::rotation_about(half, neck);
        pose.frame_matrices[neck_bone] = about_neck * rel_mat * pose.frame_matrices[neck_bone];

        // 头部位置随颈部转一半，朝向转满
        let mut head_key = about_neck * pose.keys[KeySlot::Head];
        head_key.rotation = (half * head_key.rotation).normalize();
        pose.keys[KeySlot::Head] = head_key;
    }
}
