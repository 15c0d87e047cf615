//! 脚部贴地 IK
//!
//! 每条腿向下扫掠一个小球找地面，把脚放到地面高度并按地面法线倾斜。
//! 平衡模式下改为绕平衡点径向探测，把脚限制在窄边上。

use glam::{Quat, Vec3};

use crate::collision::{CollisionProbe, GroundProbeResult};
use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags};
use crate::math::{decay, rotation_between};
use crate::skeleton::{BoneTransform, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

const LEGS: [(ChainKind, KeySlot); 2] = [
    (ChainKind::LeftLeg, KeySlot::LeftLeg),
    (ChainKind::RightLeg, KeySlot::RightLeg),
];

/// 单条腿的输入
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootTarget {
    /// IK 权重（0 表示关闭）
    pub weight: f32,
    /// 动画中脚中心离动画地面的高度（已含穿透余量），抬脚时增大
    pub anim_height: f32,
    /// 脚部附加偏移（探测点水平偏移 + 高度）
    pub placement_offset: Vec3,
}

impl FootTarget {
    pub fn new(weight: f32, anim_height: f32) -> Self {
        Self {
            weight,
            anim_height,
            placement_offset: Vec3::ZERO,
        }
    }

    /// 从当前关键变换推算：假设动画地面位于 y = 0
    pub fn from_pose(skeleton: &SkeletonModel, pose: &PoseBuffer, slot: KeySlot, config: &PoseConfig) -> Self {
        let kind = if slot == KeySlot::RightLeg { ChainKind::RightLeg } else { ChainKind::LeftLeg };
        let height = skeleton
            .chain(kind)
            .map(|leg| pose.keys[slot].transform_point(skeleton.bone(leg.bones[0]).midpoint()).y)
            .unwrap_or(0.0);
        Self::new(1.0, height + config.foot_ground_margin)
    }
}

/// 单帧结果
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FootIkReport {
    /// 每条腿施加的平移
    pub offsets: [Vec3; 2],
    /// 是否找到地面
    pub grounded: [bool; 2],
}

/// 脚部 IK 状态
#[derive(Clone, Debug)]
pub struct FootIk {
    /// 上一帧的地面高度
    old_ground: [Option<f32>; 2],
    /// 上一帧的地面倾斜
    old_rotation: [Quat; 2],
    /// 本帧有腿没找到地面
    pub ik_failed: bool,
}

impl Default for FootIk {
    fn default() -> Self {
        Self {
            old_ground: [None; 2],
            old_rotation: [Quat::IDENTITY; 2],
            ik_failed: false,
        }
    }
}

impl FootIk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solve(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        targets: &[FootTarget; 2],
        probe: &dyn CollisionProbe,
    ) -> FootIkReport {
        let mut report = FootIkReport::default();
        let balancing = ctx.has(LocomotionFlags::BALANCING);
        let mut balance_offset = Vec3::ZERO;
        let radius = config.foot_probe_radius;
        self.ik_failed = false;

        for (j, (kind, slot)) in LEGS.into_iter().enumerate() {
            let Some(leg) = skeleton.chain(kind) else {
                continue;
            };
            let target = &targets[j];
            let weight = target.weight * (1.0 - ctx.roll_ik_fade);
            if weight <= 0.0 {
                continue;
            }

            let center = skeleton.bone(leg.bones[0]).midpoint();
            let pos = pose.keys[slot].transform_point(center);
            let check = pos + target.placement_offset;

            let (surface, contact) = if balancing {
                (ctx.balance_point.y, None)
            } else {
                let down = probe.sweep_sphere(
                    check + Vec3::Y * config.foot_probe_up,
                    check - Vec3::Y * config.foot_probe_down,
                    radius,
                );
                if !down.hit {
                    if config.debug_log {
                        log::debug!("[FootIK] {:?} 未找到地面", kind);
                    }
                    self.ik_failed = true;
                    continue;
                }
                (down.position.y - radius, Some(down))
            };
            let surface = self.smooth_ground(j, surface, ctx, config);

            let mut new_pos = pos;
            new_pos.y = surface + target.anim_height - config.foot_ground_margin + target.placement_offset.y;
            if balancing {
                new_pos = self.clamp_to_ledge(new_pos, ctx.balance_point, config, probe);
                new_pos.x += target.placement_offset.x;
                new_pos.z += target.placement_offset.z;
            }

            let offset = (new_pos - pos) * weight;
            pose.keys.translate(slot, offset);
            report.offsets[j] = offset;
            report.grounded[j] = true;

            if balancing {
                balance_offset += offset * 0.5;
            } else if let Some(contact) = contact {
                let rotation = self.ground_rotation(j, &contact, ctx, config, probe);
                let lift = (target.anim_height - config.foot_lift_threshold) * config.foot_lift_fade;
                let rotate_weight = (1.0 - lift).clamp(0.0, 1.0);
                let applied = Quat::IDENTITY.slerp(rotation, weight * rotate_weight);
                let foot_center = pose.keys[slot].transform_point(center);
                pose.keys[slot] = BoneTransform::rotation_about(applied, foot_center) * pose.keys[slot];
            }
        }

        // 一只脚着地另一只没有时，两脚一起移动
        for (from, to) in [(0, 1), (1, 0)] {
            if report.grounded[from] && !report.grounded[to] && targets[to].weight > 0.0 {
                let lift = Vec3::new(0.0, report.offsets[from].y, 0.0);
                pose.keys.translate(LEGS[to].1, lift);
            }
        }

        if balancing {
            pose.keys.translate(KeySlot::Hip, balance_offset * config.balance_hip_weight);
            pose.keys.translate(KeySlot::Chest, balance_offset * config.balance_chest_weight);
            pose.keys.translate(KeySlot::Head, balance_offset * config.balance_head_weight);
            pose.keys.translate(KeySlot::LeftArm, balance_offset * config.balance_arm_weight);
            pose.keys.translate(KeySlot::RightArm, balance_offset * config.balance_arm_weight);
        }

        report
    }

    /// 地面高度平滑：先限制单帧变化，再指数混合
    fn smooth_ground(&mut self, leg: usize, ground: f32, ctx: &FrameContext, config: &PoseConfig) -> f32 {
        let smoothed = match self.old_ground[leg] {
            Some(old) => {
                let old = old.clamp(ground - config.foot_height_clamp, ground + config.foot_height_clamp);
                ground + (old - ground) * decay(config.foot_height_smoothing, ctx.frames)
            }
            None => ground,
        };
        self.old_ground[leg] = Some(smoothed);
        smoothed
    }

    /// 径向探测，找到最近的阻挡后把脚往里收
    fn clamp_to_ledge(&self, mut pos: Vec3, balance: Vec3, config: &PoseConfig, probe: &dyn CollisionProbe) -> Vec3 {
        let radius = config.foot_probe_radius;
        let count = config.balance_probe_directions.max(1);
        let step = std::f32::consts::TAU / count as f32;
        for k in 0..count {
            let dir = Quat::from_rotation_y(step * k as f32) * Vec3::X;
            let result = probe.sweep_sphere(balance + dir * config.balance_probe_reach, balance, radius);
            if !result.hit {
                continue;
            }
            let limit = result.position.dot(dir) - radius;
            let current = pos.dot(dir);
            if limit < current {
                pos += dir * (limit - current);
            }
        }
        pos
    }

    /// 接触点下方再探一次取法线，转成相对 +Y 的旋转并平滑
    fn ground_rotation(
        &mut self,
        leg: usize,
        contact: &GroundProbeResult,
        ctx: &FrameContext,
        config: &PoseConfig,
        probe: &dyn CollisionProbe,
    ) -> Quat {
        let below = probe.sphere_contact(contact.position - Vec3::Y * 0.01, config.foot_probe_radius);
        let normal = if below.hit { below.normal } else { contact.normal };
        let rotation = rotation_between(Vec3::Y, normal)
            .slerp(self.old_rotation[leg], decay(config.foot_rotate_smoothing, ctx.frames))
            .normalize();
        self.old_rotation[leg] = rotation;
        rotation
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
