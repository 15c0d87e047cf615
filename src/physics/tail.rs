//! 尾巴次级运动
//!
//! N 根骨骼、N+1 个点：第 i 点为第 i 根骨骼的尖端，第 N 点为尾根。
//! 每帧：阻尼 + 重力 → 根部 / 形状修正 → 成对松弛 → 扫掠碰撞。
//! 绘制时另从根部按骨长重建一份点，模拟状态本身保留碰撞后的位置。

use glam::Vec3;

use super::point_chain::PointMassChain;
use crate::collision::CollisionProbe;
use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags};
use crate::math::{approach, decay, place_at_distance, rotation_between};
use crate::skeleton::{BonePoint, ChainKind, PoseBuffer, SkeletonModel};

/// 尾巴次级运动状态
#[derive(Clone, Debug, Default)]
pub struct TailMotion {
    pub chain: PointMassChain,

    // --- 预分配缓冲区（避免每帧堆分配） ---
    /// 动画姿态中的点
    analytic: Vec<Vec3>,
    /// 每个点的修正量
    correction: Vec<Vec3>,
    /// 按骨长重建、用于写回骨骼的点
    drawn: Vec<Vec3>,
}

impl TailMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.chain.reset(&[]);
        self.drawn.clear();
    }

    /// 最近一次写回骨骼的点（与 `chain.points` 同序，段长等于骨长）
    pub fn drawn_points(&self) -> &[Vec3] {
        &self.drawn
    }

    /// 松弛迭代次数，追帧越多迭代越多
    pub fn iteration_count(config: &PoseConfig, frames: u32) -> usize {
        let scaled = (frames as f32 * config.tail_iterations_per_frame) as usize;
        scaled.max(config.tail_min_iterations)
    }

    /// 模拟尾巴并写回尾巴骨骼（需在身体传播之后调用）
    pub fn step(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        probe: &dyn CollisionProbe,
    ) {
        let Some(tail) = skeleton.chain(ChainKind::Tail) else {
            return;
        };
        let n = tail.len();
        let lengths = &tail.rest_lengths;

        self.analytic.clear();
        self.analytic
            .extend(tail.bones.iter().map(|&b| pose.bone_point(skeleton, b, BonePoint::Tip)));
        let root = pose.bone_point(skeleton, tail.bones[n - 1], BonePoint::Pivot);
        self.analytic.push(root);
        self.correction.clear();
        self.correction.resize(n + 1, Vec3::ZERO);

        if !self.chain.is_initialized(n + 1) || ctx.has(LocomotionFlags::RESET_SECONDARY) {
            self.chain.reset(&self.analytic);
        } else {
            let moved = root.distance(self.chain.points[n]);
            if moved > config.teleport_distance || !moved.is_finite() {
                log::debug!("[TailPhysics] 单帧位移 {:.2}，质点回到解析姿态", moved);
                self.chain.reset(&self.analytic);
            }
        }

        self.simulate(ctx, config, probe, lengths);

        // 从根部按骨长重建，尾巴不会被拉长；模拟状态不受影响
        self.drawn.clear();
        self.drawn.extend_from_slice(&self.chain.points);
        self.drawn[n] = root;
        for i in (0..n).rev() {
            self.drawn[i] = place_at_distance(self.drawn[i + 1], self.drawn[i], lengths[i]);
        }

        let points = &self.drawn;
        for (i, &bone) in tail.bones.iter().enumerate() {
            pose.rotate_bone_to_match(skeleton, points[i + 1], points[i], bone);
        }
    }

    fn simulate(&mut self, ctx: &FrameContext, config: &PoseConfig, probe: &dyn CollisionProbe, lengths: &[f32]) {
        let chain = &mut self.chain;
        let analytic = &self.analytic;
        let correction = &mut self.correction;
        let n = lengths.len();

        chain.begin_step();
        chain.points[n] = analytic[n];

        let fall = ctx.elapsed() * config.tail_gravity;
        let retention = decay(config.tail_velocity_retention, ctx.frames);
        let shape = approach(1.0 - config.tail_shape_strength, ctx.frames);
        for i in 0..n {
            let velocity = chain.velocity(i);
            chain.points[i] += velocity * retention;
            chain.points[i].y -= fall;
        }

        // 第一段拉回动画位置，其余各段保持动画中的相对形状
        correction[n - 1] = (analytic[n - 1] - chain.points[n - 1]) * approach(config.tail_root_damping, ctx.frames);
        for i in (0..n.saturating_sub(1)).rev() {
            let offset = analytic[i] - analytic[i + 1];
            let rotation = rotation_between(analytic[i + 1] - analytic[i + 2], chain.points[i + 1] - chain.points[i + 2]);
            correction[i] = (chain.points[i + 1] + rotation * offset - chain.points[i]) * shape;
            let shift = correction[i];
            correction[i + 1] -= shift;
        }
        for i in 0..n {
            chain.points[i] += correction[i];
        }

        let pair = config.tail_pair_weight;
        for j in 0..TailMotion::iteration_count(config, ctx.frames) {
            correction.fill(Vec3::ZERO);
            for i in 0..n {
                let (a, b) = (chain.points[i], chain.points[i + 1]);
                let mid = (a + b) * 0.5;
                let dir = (a - b).normalize_or_zero();
                let half = lengths[i] * 0.5;
                correction[i] += (mid + dir * half - a) * pair;
                correction[i + 1] += (mid - dir * half - b) * (1.0 - pair);
            }
            let strength = (0.5 + j as f32 * 0.125).min(1.0);
            for i in 0..n {
                chain.points[i] += correction[i] * strength;
            }
        }

        for i in (0..n).rev() {
            chain.points[i] = probe
                .sweep_sphere(chain.points[i + 1], chain.points[i], config.tail_collision_radius)
                .position;
        }

        chain.end_step();
    }
}
