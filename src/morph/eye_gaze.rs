//! 眼球注视 → 表情 Morph 权重
//!
//! 目标点变换到头部绑定空间后，与标定的参考方向比较角度，
//! 得到上下、左右（侧眼物种为前后）三个带符号比例，再拆成一组命名权重。

use glam::Vec3;
use rand::Rng;

use crate::config::PoseConfig;
use crate::context::{FrameContext, LocomotionFlags};
use crate::math::{random_range, safe_asin};
use crate::skeleton::BoneTransform;

/// 注视 Morph 目标
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GazeTarget {
    LookRight,
    LookLeft,
    LookUp,
    LookDown,
    LookFront,
    LookBack,
    LookUpLeft,
    LookUpRight,
    LookDownLeft,
    LookDownRight,
    LookFrontRight,
    LookBackRight,
    LookFrontLeft,
    LookBackLeft,
}

impl GazeTarget {
    pub const COUNT: usize = 14;

    pub const ALL: [GazeTarget; Self::COUNT] = [
        GazeTarget::LookRight,
        GazeTarget::LookLeft,
        GazeTarget::LookUp,
        GazeTarget::LookDown,
        GazeTarget::LookFront,
        GazeTarget::LookBack,
        GazeTarget::LookUpLeft,
        GazeTarget::LookUpRight,
        GazeTarget::LookDownLeft,
        GazeTarget::LookDownRight,
        GazeTarget::LookFrontRight,
        GazeTarget::LookBackRight,
        GazeTarget::LookFrontLeft,
        GazeTarget::LookBackLeft,
    ];

    /// 模型里的 Morph 名
    pub fn name(self) -> &'static str {
        match self {
            GazeTarget::LookRight => "look_r",
            GazeTarget::LookLeft => "look_l",
            GazeTarget::LookUp => "look_u",
            GazeTarget::LookDown => "look_d",
            GazeTarget::LookFront => "look_f",
            GazeTarget::LookBack => "look_b",
            GazeTarget::LookUpLeft => "look_u_l",
            GazeTarget::LookUpRight => "look_u_r",
            GazeTarget::LookDownLeft => "look_d_l",
            GazeTarget::LookDownRight => "look_d_r",
            GazeTarget::LookFrontRight => "look_f_r",
            GazeTarget::LookBackRight => "look_b_r",
            GazeTarget::LookFrontLeft => "look_f_l",
            GazeTarget::LookBackLeft => "look_b_l",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// 一组注视权重，全部在 [0, 1] 内
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlendWeights([f32; GazeTarget::COUNT]);

impl BlendWeights {
    /// 通过 Morph 名获取权重
    pub fn get(&self, name: &str) -> Option<f32> {
        GazeTarget::from_name(name).map(|t| self[t])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        GazeTarget::ALL.iter().map(move |&t| (t.name(), self[t]))
    }

    /// 平坦化，顺序同 [`GazeTarget::ALL`]
    pub fn to_flat_floats(&self) -> [f32; GazeTarget::COUNT] {
        self.0
    }

    fn set(&mut self, target: GazeTarget, weight: f32) {
        self.0[target as usize] = weight.clamp(0.0, 1.0);
    }

    /// 带符号方向拆成正负两半
    fn set_pair(&mut self, positive: GazeTarget, negative: GazeTarget, value: f32) {
        self.set(positive, value.max(0.0));
        self.set(negative, (-value).max(0.0));
    }
}

impl std::ops::Index<GazeTarget> for BlendWeights {
    type Output = f32;

    fn index(&self, target: GazeTarget) -> &f32 {
        &self.0[target as usize]
    }
}

/// 标定线段：瞳孔从 `start` 看向 `end`（头部绑定空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GazeSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl GazeSegment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        (self.end - self.start).normalize_or_zero()
    }

    fn mirrored(&self) -> Self {
        let flip = |v: Vec3| Vec3::new(-v.x, v.y, v.z);
        Self::new(flip(self.start), flip(self.end))
    }
}

/// 单只眼睛（右眼）的标定，左眼取 X 镜像
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeCalibration {
    pub center: GazeSegment,
    pub up: GazeSegment,
    pub down: GazeSegment,
    pub left: GazeSegment,
    pub right: GazeSegment,
    /// 侧眼物种用
    pub front: GazeSegment,
    pub back: GazeSegment,
}

impl EyeCalibration {
    /// 没有 Morph 元数据时，用眼睛位置、朝向和最大转角合成标定
    ///
    /// `vertical` 为上下最大角，`horizontal` 为左右 / 前后最大角（弧度）。
    pub fn from_angles(eye: Vec3, forward: Vec3, vertical: f32, horizontal: f32) -> Self {
        let forward = forward.normalize_or_zero();
        let segment = |axis: Vec3, angle: f32| GazeSegment::new(eye, eye + tilt_toward(forward, axis, angle));
        Self {
            center: GazeSegment::new(eye, eye + forward),
            up: segment(Vec3::Y, vertical),
            down: segment(Vec3::NEG_Y, vertical),
            left: segment(Vec3::X, horizontal),
            right: segment(Vec3::NEG_X, horizontal),
            front: segment(Vec3::Z, horizontal),
            back: segment(Vec3::NEG_Z, horizontal),
        }
    }

    pub fn mirrored(&self) -> Self {
        Self {
            center: self.center.mirrored(),
            up: self.up.mirrored(),
            down: self.down.mirrored(),
            left: self.left.mirrored(),
            right: self.right.mirrored(),
            front: self.front.mirrored(),
            back: self.back.mirrored(),
        }
    }

    /// 目标点相对标定的带符号比例：正向参考为 +1，负向参考为 -1
    fn axis_ratio(&self, target: Vec3, positive: &GazeSegment, negative: &GazeSegment) -> f32 {
        let base = &self.center;
        let normal = (negative.end - base.start)
            .cross(positive.end - base.start)
            .normalize_or_zero();
        let side = normal.cross(base.direction()).normalize_or_zero();
        if side == Vec3::ZERO {
            return 0.0;
        }
        let projected = target - normal * normal.dot(target - base.start);
        let target_angle = safe_asin((projected - base.start).normalize_or_zero().dot(side));
        if target_angle > 0.0 {
            ratio(target_angle, safe_asin(positive.direction().dot(side)))
        } else {
            -ratio(target_angle, safe_asin(negative.direction().dot(side)))
        }
    }
}

/// `forward` 朝 `axis` 偏转 `angle`
fn tilt_toward(forward: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let side = (axis - forward * forward.dot(axis)).normalize_or_zero();
    forward * angle.cos() + side * angle.sin()
}

fn ratio(angle: f32, reference: f32) -> f32 {
    if reference.abs() < 1e-4 {
        0.0
    } else {
        (angle / reference).min(1.0)
    }
}

/// 注视目标
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GazeInput {
    /// 注视点（模型空间）
    pub target: Vec3,
    /// 观察者位置，侧眼物种据此选择面向观察者的那只眼睛
    pub viewer: Vec3,
}

/// 眼球注视映射
#[derive(Clone, Debug, Default)]
pub struct EyeGazeMapper {
    /// 随机偏移，保持待机时眼球微动
    offset: Vec3,
    offset_time: f32,
    weights: BlendWeights,
}

impl EyeGazeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &BlendWeights {
        &self.weights
    }

    /// 计算本帧注视权重；昏迷时保持上一帧结果
    pub fn update<R: Rng>(
        &mut self,
        calibration: &EyeCalibration,
        head_frame: &BoneTransform,
        gaze: &GazeInput,
        ctx: &FrameContext,
        config: &PoseConfig,
        rng: &mut R,
    ) -> &BlendWeights {
        if ctx.has(LocomotionFlags::KNOCKED_OUT) {
            return &self.weights;
        }
        let to_head = head_frame.inverse();
        let target = to_head.transform_point(gaze.target);

        // 侧眼物种：用面向观察者的那只眼睛
        let mut eye = *calibration;
        if ctx.species.is_side_eyed() {
            let viewer = to_head.transform_point(gaze.viewer);
            if viewer.x * calibration.center.start.x < 0.0 {
                eye = calibration.mirrored();
            }
        }

        let mut eye_dir = Vec3::ZERO;
        eye_dir.y = eye.axis_ratio(target, &eye.up, &eye.down);
        if ctx.species.is_side_eyed() {
            eye_dir.z = eye.axis_ratio(target, &eye.front, &eye.back);
        } else {
            eye_dir.x = -eye.axis_ratio(target, &eye.left, &eye.right);
        }

        if self.offset_time < ctx.time {
            let range = config.gaze_offset_range;
            self.offset = Vec3::new(
                random_range(rng, -range, range),
                random_range(rng, -range, range),
                random_range(rng, -range, range),
            );
            self.offset_time = ctx.time + random_range(rng, config.gaze_interval_min, config.gaze_interval_max);
        }

        self.write_weights(eye_dir + self.offset);
        &self.weights
    }

    fn write_weights(&mut self, dir: Vec3) {
        use GazeTarget::*;
        let w = &mut self.weights;
        w.set_pair(LookRight, LookLeft, dir.x);
        w.set_pair(LookUp, LookDown, dir.y);
        w.set_pair(LookFront, LookBack, dir.z);
        w.set_pair(LookUpLeft, LookDownLeft, dir.y);
        w.set_pair(LookUpRight, LookDownRight, dir.y);
        w.set_pair(LookFrontRight, LookBackRight, dir.z);
        w.set_pair(LookFrontLeft, LookBackLeft, dir.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Species;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const EYE: Vec3 = Vec3::new(-0.03, 1.62, 0.08);

    fn front_eyes() -> EyeCalibration {
        EyeCalibration::from_angles(EYE, Vec3::Z, 0.5, 0.4)
    }

    fn gaze_at(dir: Vec3) -> GazeInput {
        GazeInput {
            target: EYE + dir * 2.0,
            viewer: Vec3::new(0.0, 1.6, 5.0),
        }
    }

    fn map(species: Species, calibration: &EyeCalibration, gaze: &GazeInput) -> BlendWeights {
        let config = PoseConfig::default().without_jitter();
        let mut ctx = FrameContext::default();
        ctx.species = species;
        let mut rng = Pcg32::seed_from_u64(0);
        let mut mapper = EyeGazeMapper::new();
        *mapper.update(calibration, &BoneTransform::IDENTITY, gaze, &ctx, &config, &mut rng)
    }

    #[test]
    fn test_gaze_straight_ahead() {
        // 正前方：所有权重为 0
        let weights = map(Species::Wolf, &front_eyes(), &gaze_at(Vec3::Z));
        for (_, w) in weights.iter() {
            assert!(w.abs() < 1e-4);
        }
    }

    #[test]
    fn test_gaze_left_and_up() {
        // 左转 0.2（最大 0.4）→ look_l = 0.5；上抬 0.25（最大 0.5）→ look_u = 0.5
        let calibration = front_eyes();
        let weights = map(Species::Dog, &calibration, &gaze_at(Vec3::new(0.2f32.sin(), 0.0, 0.2f32.cos())));
        assert!((weights[GazeTarget::LookLeft] - 0.5).abs() < 1e-3);
        assert_eq!(weights[GazeTarget::LookRight], 0.0);

        let weights = map(Species::Dog, &calibration, &gaze_at(Vec3::new(0.0, 0.25f32.sin(), 0.25f32.cos())));
        assert!((weights[GazeTarget::LookUp] - 0.5).abs() < 1e-3);
        assert!((weights.get("look_u_l").unwrap() - 0.5).abs() < 1e-3);
        assert!((weights.get("look_u_r").unwrap() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_gaze_clamped() {
        // 超出标定范围时夹到 1
        let weights = map(Species::Cat, &front_eyes(), &gaze_at(Vec3::new(0.0, -1.0, 0.3).normalize()));
        assert!((weights[GazeTarget::LookDown] - 1.0).abs() < 1e-5);
        assert_eq!(weights[GazeTarget::LookUp], 0.0);
    }

    #[test]
    fn test_side_eyed_front_back() {
        // 兔子：眼睛朝侧面，水平方向映射到前 / 后
        let eye = Vec3::new(-0.05, 1.62, 0.05);
        let calibration = EyeCalibration::from_angles(eye, Vec3::NEG_X, 0.5, 0.6);
        let dir = Vec3::new(-0.3f32.cos(), 0.0, 0.3f32.sin());
        let gaze = GazeInput {
            target: eye + dir * 2.0,
            viewer: Vec3::new(-5.0, 1.6, 0.0),
        };
        let weights = map(Species::Rabbit, &calibration, &gaze);
        assert!((weights[GazeTarget::LookFront] - 0.5).abs() < 1e-3);
        assert!((weights[GazeTarget::LookFrontLeft] - 0.5).abs() < 1e-3);
        assert_eq!(weights[GazeTarget::LookLeft], 0.0);

        // 观察者在另一侧：换用左眼，目标在左眼正前方偏前
        let mirrored_dir = Vec3::new(-dir.x, dir.y, dir.z);
        let gaze = GazeInput {
            target: Vec3::new(-eye.x, eye.y, eye.z) + mirrored_dir * 2.0,
            viewer: Vec3::new(5.0, 1.6, 0.0),
        };
        let weights = map(Species::Rabbit, &calibration, &gaze);
        assert!((weights[GazeTarget::LookFront] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_knocked_out_keeps_weights() {
        let config = PoseConfig::default().without_jitter();
        let calibration = front_eyes();
        let mut ctx = FrameContext::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let mut mapper = EyeGazeMapper::new();
        let up = gaze_at(Vec3::new(0.0, 0.25f32.sin(), 0.25f32.cos()));
        let before = *mapper.update(&calibration, &BoneTransform::IDENTITY, &up, &ctx, &config, &mut rng);

        ctx.flags |= LocomotionFlags::KNOCKED_OUT;
        let after = *mapper.update(&calibration, &BoneTransform::IDENTITY, &gaze_at(Vec3::Z), &ctx, &config, &mut rng);
        assert_eq!(before, after);
    }

    #[test]
    fn test_idle_offset_refresh() {
        // 随机偏移只在间隔到期后刷新
        let config = PoseConfig::default();
        let calibration = front_eyes();
        let mut ctx = FrameContext::default();
        ctx.species = Species::Wolf;
        let mut rng = Pcg32::seed_from_u64(5);
        let mut mapper = EyeGazeMapper::new();
        let gaze = gaze_at(Vec3::Z);

        ctx.time = 0.01;
        let first = *mapper.update(&calibration, &BoneTransform::IDENTITY, &gaze, &ctx, &config, &mut rng);
        ctx.time = 0.1;
        let second = *mapper.update(&calibration, &BoneTransform::IDENTITY, &gaze, &ctx, &config, &mut rng);
        assert_eq!(first, second);
        for (_, w) in first.iter() {
            assert!(w <= config.gaze_offset_range + 1e-6);
        }

        ctx.time = 2.0;
        let third = *mapper.update(&calibration, &BoneTransform::IDENTITY, &gaze, &ctx, &config, &mut rng);
        assert_ne!(first, third);
    }

    #[test]
    fn test_target_names() {
        assert_eq!(GazeTarget::from_name("look_b_l"), Some(GazeTarget::LookBackLeft));
        assert_eq!(GazeTarget::from_name("blink"), None);
        assert_eq!(BlendWeights::default().to_flat_floats().len(), GazeTarget::COUNT);
    }
}
