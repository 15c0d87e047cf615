//! 骨骼节点
//!
//! BoneLink 是骨架的最小单元：父子关系 + 绑定姿态下的两个锚点。
//! 运行时按索引访问，名字只用于调试输出。

use glam::Vec3;

/// 骨骼锚点
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BonePoint {
    /// 靠近父骨骼的一端
    Pivot,
    /// 远离父骨骼的一端
    Tip,
}

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct BoneLink {
    /// 骨骼名称（仅调试）
    pub name: String,
    /// 父骨骼索引（-1 表示无父骨骼）
    pub parent_index: i32,
    /// 绑定姿态下的起点
    pub pivot: Vec3,
    /// 绑定姿态下的终点
    pub tip: Vec3,
    /// 质量（重心估计用）
    pub mass: f32,
}

impl BoneLink {
    pub fn new(name: impl Into<String>, parent_index: i32, pivot: Vec3, tip: Vec3) -> Self {
        Self {
            name: name.into(),
            parent_index,
            pivot,
            tip,
            mass: 1.0,
        }
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// 获取父骨骼索引
    #[inline]
    pub fn parent(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn point(&self, which: BonePoint) -> Vec3 {
        match which {
            BonePoint::Pivot => self.pivot,
            BonePoint::Tip => self.tip,
        }
    }

    #[inline]
    pub fn midpoint(&self) -> Vec3 {
        (self.pivot + self.tip) * 0.5
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.pivot.distance(self.tip)
    }

    /// 绑定姿态下的骨骼方向（pivot → tip）
    #[inline]
    pub fn rest_axis(&self) -> Vec3 {
        (self.tip - self.pivot).normalize_or_zero()
    }
}
