//! 耳朵次级运动
//!
//! 耳链：0 = 耳尖骨骼，1 = 耳根骨骼。三个质点依次为耳根、耳中、耳尖。

use glam::{Quat, Vec3};
use rand::Rng;

use super::point_chain::PointMassChain;
use crate::collision::CollisionProbe;
use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags, Species};
use crate::math::{approach, decay, place_at_distance, random_range, rotation_between, split_symmetric};
use crate::skeleton::{BonePoint, BoneTransform, ChainKind, PoseBuffer, SkeletonModel};

const EARS: [ChainKind; 2] = [ChainKind::LeftEar, ChainKind::RightEar];

/// 单只耳朵的抖动状态
#[derive(Clone, Copy, Debug, Default)]
struct Twitch {
    /// 当前扭转角
    twist: f32,
    target: f32,
    /// 下次换目标的游戏时间
    next_change: f32,
}

impl Twitch {
    fn update<R: Rng>(&mut self, ctx: &FrameContext, config: &PoseConfig, rng: &mut R) {
        if self.next_change < ctx.time {
            self.target = random_range(rng, config.ear_twist_min, config.ear_twist_max);
            self.next_change = ctx.time + random_range(rng, config.ear_twitch_interval_min, config.ear_twitch_interval_max);
        }
        let keep = decay(config.ear_twist_smoothing, ctx.frames);
        self.twist = self.target + (self.twist - self.target) * keep;
    }
}

/// 耳朵次级运动状态
#[derive(Clone, Debug, Default)]
pub struct EarMotion {
    /// 左右耳的质点链
    pub chains: [PointMassChain; 2],
    twitch: [Twitch; 2],
}

impl EarMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset(&[]);
        }
        self.twitch = Default::default();
    }

    /// 当前扭转角（左, 右），未做镜像与物种缩放
    pub fn twist(&self) -> [f32; 2] {
        [self.twitch[0].twist, self.twitch[1].twist]
    }

    /// 模拟双耳并写回耳朵骨骼（需在头部绘制之后调用）
    pub fn step<R: Rng>(
        &mut self,
        skeleton: &SkeletonModel,
        pose: &mut PoseBuffer,
        ctx: &FrameContext,
        config: &PoseConfig,
        probe: &dyn CollisionProbe,
        rng: &mut R,
    ) {
        for (j, kind) in EARS.into_iter().enumerate() {
            let Some(ear) = skeleton.chain(kind) else {
                continue;
            };
            let (tip_bone, base_bone) = (ear.bones[0], ear.bones[1]);
            let animated_tip_frame = pose.frame_matrices[tip_bone];

            self.twitch[j].update(ctx, config, rng);
            let mut twist = self.twitch[j].twist;
            if kind == ChainKind::RightEar {
                twist = -twist;
            }
            if ctx.species != Species::Rabbit {
                twist *= config.ear_twist_scale_non_rabbit;
            }

            // 绕耳根、沿耳朵方向扭转；耳尖扭两倍
            let base = pose.bone_point(skeleton, base_bone, BonePoint::Pivot);
            let middle = pose.bone_point(skeleton, tip_bone, BonePoint::Pivot);
            let axis = (middle - base).normalize_or_zero();
            if twist != 0.0 && axis != Vec3::ZERO {
                let rot = Quat::from_axis_angle(axis, twist);
                pose.frame_matrices[base_bone] = BoneTransform::rotation_about(rot, base) * pose.frame_matrices[base_bone];
                pose.frame_matrices[tip_bone] = BoneTransform::rotation_about(rot * rot, base) * pose.frame_matrices[tip_bone];
            }
            let middle = pose.bone_point(skeleton, tip_bone, BonePoint::Pivot);
            let tip = pose.bone_point(skeleton, tip_bone, BonePoint::Tip);

            let low = ear.rest_lengths[1];
            let high = ear.rest_lengths[0];
            let analytic = [base, middle, tip];

            let chain = &mut self.chains[j];
            if !chain.is_initialized(3) || ctx.has(LocomotionFlags::RESET_SECONDARY) {
                chain.reset(&analytic);
            } else {
                let moved = base.distance(chain.points[0]);
                if moved > config.teleport_distance || !moved.is_finite() {
                    log::debug!("[EarPhysics] {:?} 单帧位移 {:.2}，质点回到解析姿态", kind, moved);
                    chain.reset(&analytic);
                }
            }

            simulate_ear(chain, ctx, config, probe, &analytic, low, high);

            let p = &self.chains[j].points;
            pose.rotate_bone_to_match(skeleton, p[0], p[1], base_bone);
            pose.rotate_bone_to_match(skeleton, p[1], p[2], tip_bone);

            // 耳朵上的饰品跟随耳尖
            let tip_delta = pose.frame_matrices[tip_bone] * animated_tip_frame.inverse();
            pose.propagate_to_descendants(skeleton, tip_bone, tip_delta);
        }
    }
}

fn simulate_ear(
    chain: &mut PointMassChain,
    ctx: &FrameContext,
    config: &PoseConfig,
    probe: &dyn CollisionProbe,
    analytic: &[Vec3; 3],
    low: f32,
    high: f32,
) {
    let [base, middle, tip] = *analytic;
    chain.begin_step();
    chain.points[0] = base;

    let full_offset = ctx.velocity * ctx.elapsed();
    let drag = decay(config.ear_damping, ctx.frames);
    let settle = config.ear_damping * config.ear_damping;
    for i in 1..3 {
        let offset = ((chain.velocity(i) - full_offset) * drag + full_offset) * settle;
        chain.points[i] += offset;
    }

    let swing = rotation_between(middle - base, chain.points[1] - base);
    let rotated_tip = swing * (tip - middle) + chain.points[1];
    let tip_pull = (rotated_tip - chain.points[2]) * approach(config.ear_high_damping, ctx.frames);
    chain.points[2] += tip_pull;
    let middle_pull = (middle - chain.points[1]) * approach(config.ear_low_damping, ctx.frames);
    chain.points[1] += middle_pull;

    for _ in 0..config.ear_relax_iterations {
        chain.points[1] = place_at_distance(base, chain.points[1], low);
        let (p1, p2) = split_symmetric(chain.points[1], chain.points[2], high);
        chain.points[1] = p1;
        chain.points[2] = p2;
    }
    chain.enforce_lengths_forward(&[low, high]);

    if ctx.has(LocomotionFlags::FLIPPING) && ctx.has(LocomotionFlags::ON_GROUND) {
        let r = config.ear_collision_radius;
        let fallback = [
            (chain.points[1] - chain.points[0]).normalize_or_zero(),
            (chain.points[2] - chain.points[1]).normalize_or_zero(),
        ];
        chain.points[1] = probe.sweep_sphere(chain.points[0], chain.points[1], r).position;
        chain.points[2] = probe.sweep_sphere(chain.points[1], chain.points[2], r).position;

        // 扫掠会截短耳段：交替恢复骨长和推出地面，耳朵顺着地面摊开
        for _ in 0..config.ear_relax_iterations {
            restore_lengths(chain, &fallback, low, high);
            for i in 1..3 {
                chain.points[i] = probe.sphere_contact(chain.points[i], r).position;
            }
        }
        restore_lengths(chain, &fallback, low, high);
    }

    chain.end_step();
}

/// 从耳根开始恢复两段骨长；被压成一点的段沿碰撞前的方向展开
fn restore_lengths(chain: &mut PointMassChain, fallback: &[Vec3; 2], low: f32, high: f32) {
    for (i, len) in [low, high].into_iter().enumerate() {
        let from = chain.points[i];
        let mut dir = (chain.points[i + 1] - from).normalize_or_zero();
        if dir == Vec3::ZERO {
            dir = fallback[i];
        }
        chain.points[i + 1] = from + dir * len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{FlatGround, NoCollision};
    use crate::skeleton::test_rig;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn quiet_config() -> PoseConfig {
        PoseConfig::default().without_jitter()
    }

    #[test]
    fn test_ear_settles_at_rest() {
        // 无外力、无抖耳：质点停在解析姿态
        let skeleton = test_rig::skeleton();
        let config = quiet_config();
        let mut ctx = FrameContext::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut ears = EarMotion::new();

        for _ in 0..60 {
            let mut pose = test_rig::bind_pose(&skeleton);
            ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);
            ctx.advance();
        }
        let left = &ears.chains[0].points;
        assert!((left[0] - Vec3::new(0.05, 1.65, 0.0)).length() < 1e-4);
        assert!((left[1] - Vec3::new(0.07, 1.8, 0.0)).length() < 1e-4);
        assert!((left[2] - Vec3::new(0.09, 1.95, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_ear_lags_and_keeps_length() {
        // 头部上下移动，耳尖滞后但骨长不变
        let skeleton = test_rig::skeleton();
        let config = PoseConfig::default();
        let mut ctx = FrameContext::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut ears = EarMotion::new();
        let ear = skeleton.chain(ChainKind::LeftEar).unwrap();
        let (high, low) = (ear.rest_lengths[0], ear.rest_lengths[1]);

        let mut lagged = false;
        for tick in 0..90 {
            let mut pose = test_rig::bind_pose(&skeleton);
            let bob = (tick as f32 * 0.3).sin() * 0.1;
            pose.transform_all(BoneTransform::from_translation(Vec3::new(0.0, bob, 0.0)));
            ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);
            ctx.advance();

            let chain = &ears.chains[0];
            assert!((chain.segment_length(0) - low).abs() < 1e-4);
            assert!((chain.segment_length(1) - high).abs() < 1e-4);
            let tip = pose.bone_point(&skeleton, ear.bones[0], BonePoint::Tip);
            assert!((tip - chain.points[2]).length() < 1e-3);
            if (chain.points[2] - Vec3::new(0.09, 1.95 + bob, 0.0)).length() > 1e-3 {
                lagged = true;
            }
        }
        assert!(lagged);
    }

    #[test]
    fn test_ear_twitch_mirrored() {
        // 抖耳：左右镜像，非兔子幅度乘 0.3
        let skeleton = test_rig::skeleton();
        let mut config = PoseConfig::default();
        config.ear_twist_min = 0.5;
        config.ear_twist_max = 0.5;
        let mut ctx = FrameContext::default();
        ctx.time = 1.0;
        ctx.flags |= LocomotionFlags::RESET_SECONDARY;

        for (species, amount) in [(Species::Rabbit, 0.5), (Species::Wolf, 0.15)] {
            ctx.species = species;
            let mut rng = Pcg32::seed_from_u64(1);
            let mut ears = EarMotion::new();
            let mut pose = test_rig::bind_pose(&skeleton);
            for _ in 0..200 {
                pose.frame_matrices.fill(BoneTransform::IDENTITY);
                ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);
            }
            assert!((ears.twist()[0] - 0.5).abs() < 1e-3);

            for (kind, sign) in [(ChainKind::LeftEar, 1.0), (ChainKind::RightEar, -1.0)] {
                let base_bone = skeleton.chain(kind).unwrap().bones[1];
                let axis = skeleton.bone(base_bone).rest_axis();
                let expected = Quat::from_axis_angle(axis, sign * amount);
                let actual = pose.frame_matrices[base_bone].rotation;
                assert!(actual.dot(expected).abs() > 0.9999);
            }
        }
    }

    #[test]
    fn test_ear_collision_when_flipping() {
        // 空翻着地时耳朵贴着地面摊开：不穿地，骨长不变
        let skeleton = test_rig::skeleton();
        let config = quiet_config();
        let mut ctx = FrameContext::default();
        ctx.flags = LocomotionFlags::ON_GROUND;
        let mut rng = Pcg32::seed_from_u64(3);
        let mut ears = EarMotion::new();
        let ear = skeleton.chain(ChainKind::LeftEar).unwrap();
        let (high, low) = (ear.rest_lengths[0], ear.rest_lengths[1]);
        let mut pose = test_rig::bind_pose(&skeleton);
        ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);

        // 整个角色倒立，耳朵指向地面以下
        ctx.flags = LocomotionFlags::ON_GROUND | LocomotionFlags::FLIPPING;
        let flip = BoneTransform::rotation_about(Quat::from_rotation_z(std::f32::consts::PI), Vec3::new(0.0, 0.9, 0.0));
        let ground = FlatGround::new(0.0);
        for _ in 0..30 {
            let mut pose = test_rig::bind_pose(&skeleton);
            pose.transform_all(flip);
            ears.step(&skeleton, &mut pose, &ctx, &config, &ground, &mut rng);
            ctx.advance();

            let chain = &ears.chains[0];
            assert!((chain.segment_length(0) - low).abs() < 1e-4);
            assert!((chain.segment_length(1) - high).abs() < 1e-4);
            for p in &chain.points[1..] {
                assert!(p.y > -config.ear_collision_radius);
            }
        }
    }

    #[test]
    fn test_ear_no_collision_without_ground_contact() {
        // 空翻但未着地：不做碰撞，耳尖跟着倒立的头穿到地面以下
        let skeleton = test_rig::skeleton();
        let config = quiet_config();
        let mut ctx = FrameContext::default();
        ctx.flags = LocomotionFlags::FLIPPING;
        let mut rng = Pcg32::seed_from_u64(3);
        let mut ears = EarMotion::new();
        let flip = BoneTransform::rotation_about(Quat::from_rotation_z(std::f32::consts::PI), Vec3::new(0.0, 0.9, 0.0));
        let ground = FlatGround::new(0.0);
        for _ in 0..120 {
            let mut pose = test_rig::bind_pose(&skeleton);
            pose.transform_all(flip);
            ears.step(&skeleton, &mut pose, &ctx, &config, &ground, &mut rng);
            ctx.advance();
        }
        assert!(ears.chains[0].points[2].y < -0.1);
    }

    #[test]
    fn test_ear_frame_rate_independent() {
        // 头部上移后保持：2 帧一步与逐帧两步，稳定后耳尖位置一致（误差 5e-3）
        let skeleton = test_rig::skeleton();
        let config = quiet_config();
        let run = |mut ctx: FrameContext, ticks: usize| {
            let mut rng = Pcg32::seed_from_u64(5);
            let mut ears = EarMotion::new();
            let mut pose = test_rig::bind_pose(&skeleton);
            ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);
            for _ in 0..ticks {
                let mut pose = test_rig::bind_pose(&skeleton);
                pose.transform_all(BoneTransform::from_translation(Vec3::new(0.0, 0.1, 0.05)));
                ears.step(&skeleton, &mut pose, &ctx, &config, &NoCollision, &mut rng);
                ctx.advance();
            }
            ears.chains[0].points.clone()
        };
        let single = run(FrameContext::default(), 240);
        let double = run(FrameContext::new(1.0 / 120.0, 2), 120);
        for (a, b) in single.iter().zip(&double) {
            assert!(a.distance(*b) < 5e-3);
        }
    }
}
