//! 注视求解的公共部分：局部基、原始偏航 / 俯仰、迟滞

use glam::{Quat, Vec2, Vec3};

use crate::math::safe_asin;

/// 身体部位的局部基（前 / 上 / 右）
#[derive(Clone, Copy, Debug)]
pub(crate) struct LookBasis {
    pub dir: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl LookBasis {
    pub fn from_rotation(rotation: Quat) -> Self {
        let dir = rotation * Vec3::Z;
        let up = rotation * Vec3::Y;
        Self {
            dir,
            up,
            right: dir.cross(up),
        }
    }

    /// 偏航绕上轴、俯仰绕右轴
    pub fn rotation(&self, angle: Vec2) -> Quat {
        let up = self.up.normalize_or_zero();
        let right = self.right.normalize_or_zero();
        if up == Vec3::ZERO || right == Vec3::ZERO {
            return Quat::IDENTITY;
        }
        Quat::from_axis_angle(up, angle.x) * Quat::from_axis_angle(right, angle.y)
    }

    /// 方向相对本基的偏航；接近上轴时返回 `None`
    pub fn yaw_of(&self, v: Vec3) -> Option<f32> {
        let n = v.normalize_or_zero();
        if n == Vec3::ZERO || n.dot(self.up).abs() > 0.9 {
            return None;
        }
        Some((-n.dot(self.right)).atan2(n.dot(self.dir)))
    }
}

/// 原始注视角
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RawLook {
    pub yaw: f32,
    pub pitch: f32,
    /// 注视强度（输入向量长度）
    pub amount: f32,
}

/// 把注视向量投影到局部基
///
/// 零向量或 NaN 视为"无目标"，强度为 0；接近上轴时偏航沿用 `old_yaw`。
pub(crate) fn raw_look(look: Vec3, basis: &LookBasis, old_yaw: f32, tilt_offset: f32) -> RawLook {
    if !look.is_finite() {
        log::warn!("[LookIK] 注视向量含 NaN，按无目标处理");
        return RawLook { yaw: old_yaw, ..RawLook::default() };
    }
    let amount = look.length();
    if amount < 1e-4 {
        return RawLook { yaw: old_yaw, ..RawLook::default() };
    }
    let n = look / amount;
    RawLook {
        yaw: basis.yaw_of(n).unwrap_or(old_yaw),
        pitch: safe_asin(n.dot(basis.up) + tilt_offset),
        amount: amount.min(1.0),
    }
}

/// 迟滞：角度被推到一侧极限后，原始目标必须回到阈值以内才能翻到另一侧
#[inline]
pub(crate) fn hysteresis(angle: f32, old: f32, range: f32, threshold: f32) -> f32 {
    let angle = if angle > threshold && old <= -range {
        -range
    } else if angle < -threshold && old >= range {
        range
    } else {
        angle
    };
    angle.clamp(-range, range)
}

/// 对话时的头部摆动
#[inline]
pub(crate) fn dialogue_bob(time: f32, freqs: [f32; 4], amount: f32) -> Vec2 {
    Vec2::new(
        ((time * freqs[0]).sin() + (time * freqs[1]).sin()) * 0.1 * amount,
        ((time * freqs[2]).sin() + (time * freqs[3]).sin()) * 0.1 * amount,
    )
}
