//! 质点链
//!
//! 次级运动的公共状态：当前点 + 上一帧点（差分得到速度）。
//! 首次使用时从解析姿态初始化，之后跨帧保留；缓冲区预分配，逐帧不再分配内存。

use glam::Vec3;

use crate::math::place_at_distance;

/// 质点链
#[derive(Clone, Debug, Default)]
pub struct PointMassChain {
    /// 当前位置
    pub points: Vec<Vec3>,
    /// 上一帧位置
    pub old_points: Vec<Vec3>,

    // --- 预分配缓冲区（避免每帧堆分配） ---
    /// 本帧开始时的位置，结束时写入 old_points
    scratch: Vec<Vec3>,
}

impl PointMassChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 点数与期望一致才算初始化过
    #[inline]
    pub fn is_initialized(&self, count: usize) -> bool {
        self.points.len() == count
    }

    /// 用解析姿态重置（速度清零）
    pub fn reset(&mut self, analytic: &[Vec3]) {
        for buf in [&mut self.points, &mut self.old_points, &mut self.scratch] {
            buf.clear();
            buf.extend_from_slice(analytic);
        }
    }

    /// 记录本帧起点
    #[inline]
    pub fn begin_step(&mut self) {
        self.scratch.copy_from_slice(&self.points);
    }

    /// 本帧起点成为下一帧的"上一帧"
    #[inline]
    pub fn end_step(&mut self) {
        self.old_points.copy_from_slice(&self.scratch);
    }

    /// 差分速度（每次模拟的位移）
    #[inline]
    pub fn velocity(&self, i: usize) -> Vec3 {
        self.points[i] - self.old_points[i]
    }

    /// 向解析姿态混合（0 = 不动，1 = 完全解析）
    pub fn blend_toward(&mut self, analytic: &[Vec3], t: f32) {
        for (p, a) in self.points.iter_mut().zip(analytic) {
            *p = p.lerp(*a, t);
        }
    }

    /// 从第 0 点向后逐段恢复静止长度
    pub fn enforce_lengths_forward(&mut self, lengths: &[f32]) {
        for i in 0..self.points.len().saturating_sub(1) {
            self.points[i + 1] = place_at_distance(self.points[i], self.points[i + 1], lengths[i]);
        }
    }

    #[inline]
    pub fn segment_length(&self, i: usize) -> f32 {
        self.points[i].distance(self.points[i + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_bookkeeping() {
        // 一次模拟之后，速度等于本帧位移
        let mut chain = PointMassChain::new();
        chain.reset(&[Vec3::ZERO, Vec3::X]);
        assert!(chain.is_initialized(2));
        chain.begin_step();
        chain.points[1] += Vec3::Y * 0.5;
        chain.end_step();
        assert!((chain.velocity(1) - Vec3::Y * 0.5).length() < 1e-6);
    }

    #[test]
    fn test_enforce_lengths() {
        let mut chain = PointMassChain::new();
        chain.reset(&[Vec3::ZERO, Vec3::X * 3.0, Vec3::new(3.0, 4.0, 0.0)]);
        chain.enforce_lengths_forward(&[1.0, 1.0]);
        assert!((chain.segment_length(0) - 1.0).abs() < 1e-5);
        assert!((chain.segment_length(1) - 1.0).abs() < 1e-5);
        assert_eq!(chain.points[0], Vec3::ZERO);
    }
}
