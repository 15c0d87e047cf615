//! 碰撞探测接口
//!
//! 世界几何由宿主提供，这里只定义球体探测的接口与两个最简单的实现。
//! 探测必须是同步、无副作用的；未命中时返回确定的 miss，而不是错误。

use glam::Vec3;

/// 探测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundProbeResult {
    /// 是否命中
    pub hit: bool,
    /// 无碰撞的球心位置：扫掠时为接触点（未命中则为终点），静态时为推出后的位置
    pub position: Vec3,
    /// 接触法线（未命中时为 +Y）
    pub normal: Vec3,
}

impl GroundProbeResult {
    #[inline]
    pub fn miss(position: Vec3) -> Self {
        Self {
            hit: false,
            position,
            normal: Vec3::Y,
        }
    }

    #[inline]
    pub fn contact(position: Vec3, normal: Vec3) -> Self {
        Self {
            hit: true,
            position,
            normal,
        }
    }
}

/// 球体探测
pub trait CollisionProbe {
    /// 球从 `from` 扫到 `to`，返回第一次接触
    fn sweep_sphere(&self, from: Vec3, to: Vec3, radius: f32) -> GroundProbeResult;

    /// 静态球：若与几何重叠则推出
    fn sphere_contact(&self, point: Vec3, radius: f32) -> GroundProbeResult;
}

/// 空世界，永远不命中
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCollision;

impl CollisionProbe for NoCollision {
    fn sweep_sphere(&self, _from: Vec3, to: Vec3, _radius: f32) -> GroundProbeResult {
        GroundProbeResult::miss(to)
    }

    fn sphere_contact(&self, point: Vec3, _radius: f32) -> GroundProbeResult {
        GroundProbeResult::miss(point)
    }
}

/// 无限大水平地面，`height` 以下为实体
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatGround {
    pub height: f32,
}

impl FlatGround {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl CollisionProbe for FlatGround {
    fn sweep_sphere(&self, from: Vec3, to: Vec3, radius: f32) -> GroundProbeResult {
        let rest = self.height + radius;
        if from.y < rest {
            // 起点已在地面以下
            return GroundProbeResult::contact(Vec3::new(from.x, rest, from.z), Vec3::Y);
        }
        if to.y >= rest {
            return GroundProbeResult::miss(to);
        }
        let t = (from.y - rest) / (from.y - to.y);
        let mut position = from.lerp(to, t);
        position.y = rest;
        GroundProbeResult::contact(position, Vec3::Y)
    }

    fn sphere_contact(&self, point: Vec3, radius: f32) -> GroundProbeResult {
        let rest = self.height + radius;
        if point.y < rest {
            GroundProbeResult::contact(Vec3::new(point.x, rest, point.z), Vec3::Y)
        } else {
            GroundProbeResult::miss(point)
        }
    }
}
