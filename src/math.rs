//! 数学工具
//!
//! 逐帧求解里反复出现的小函数：安全归一化、向量间旋转、帧率无关衰减等。

use glam::{Quat, Vec3};
use rand::Rng;

/// 长度平方低于此值的向量视为零向量
pub const EPSILON_SQ: f32 = 1e-8;

/// 把 `from` 旋转到 `to` 的最短弧旋转
///
/// 任一向量退化为零时返回单位旋转。
#[inline]
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// 帧率无关的保留系数：`factor^frames`
#[inline]
pub fn decay(factor: f32, frames: u32) -> f32 {
    factor.powi(frames as i32)
}

/// 帧率无关的趋近比例：`1 - factor^frames`
#[inline]
pub fn approach(factor: f32, frames: u32) -> f32 {
    1.0 - decay(factor, frames)
}

/// 两点之间按约束长度对称摆放
///
/// 返回 (靠近 `a` 的点, 靠近 `b` 的点)，二者中点不变、间距为 `length`。
#[inline]
pub fn split_symmetric(a: Vec3, b: Vec3, length: f32) -> (Vec3, Vec3) {
    let mid = (a + b) * 0.5;
    let dir = (a - b).normalize_or_zero();
    (mid + dir * (length * 0.5), mid - dir * (length * 0.5))
}

/// 沿 `from → target` 方向以固定长度放置
#[inline]
pub fn place_at_distance(from: Vec3, target: Vec3, length: f32) -> Vec3 {
    from + (target - from).normalize_or_zero() * length
}

/// 两骨骼关节位置（余弦定理）
///
/// 关节落在 `root → target` 与 `hint` 张成的平面内、`hint` 一侧；
/// 目标超出可达范围时沿直线伸直。
pub fn two_bone_joint(root: Vec3, target: Vec3, hint: Vec3, upper: f32, lower: f32) -> Vec3 {
    let span = target - root;
    let dist = span.length();
    if dist * dist < EPSILON_SQ {
        return place_at_distance(root, hint, upper);
    }
    let dir = span / dist;
    let dist = dist.clamp((upper - lower).abs(), upper + lower);
    let along = (upper * upper - lower * lower + dist * dist) / (2.0 * dist);
    let height = (upper * upper - along * along).max(0.0).sqrt();

    let side = hint - root;
    let mut bend = (side - dir * side.dot(dir)).normalize_or_zero();
    if bend == Vec3::ZERO {
        bend = dir.any_orthonormal_vector();
    }
    root + dir * along + bend * height
}

/// 标量向目标移动不超过 `step`
#[inline]
pub fn move_towards(value: f32, target: f32, step: f32) -> f32 {
    if (target - value).abs() <= step {
        target
    } else {
        value + step.copysign(target - value)
    }
}

/// 在 [lo, hi) 内取随机数，区间为空时返回 `lo`
#[inline]
pub fn random_range<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// 对称抖动：[-amount, amount)
#[inline]
pub fn jitter<R: Rng>(rng: &mut R, amount: f32) -> f32 {
    random_range(rng, -amount, amount)
}

/// 安全 asin：先夹紧到 [-1, 1]
#[inline]
pub fn safe_asin(value: f32) -> f32 {
    value.clamp(-1.0, 1.0).asin()
}
