//! 每帧上下文
//!
//! 运动状态、物种、时间步长等只读输入，显式传给每个求解器。

use bitflags::bitflags;
use glam::Vec3;

bitflags! {
    /// 运动 / 行为标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LocomotionFlags: u32 {
        /// 着地
        const ON_GROUND = 1 << 0;
        /// 空翻中
        const FLIPPING = 1 << 1;
        /// 攀爬边缘
        const ON_LEDGE = 1 << 2;
        /// 坐着
        const SITTING = 1 << 3;
        /// 睡着
        const ASLEEP = 1 << 4;
        /// 窄边平衡
        const BALANCING = 1 << 5;
        /// 对话中
        const DIALOGUE = 1 << 6;
        /// 重置次级动画（弹簧直接跳到目标，质点链重新初始化）
        const RESET_SECONDARY = 1 << 7;
        /// 昏迷
        const KNOCKED_OUT = 1 << 8;
    }
}

/// 物种
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Species {
    #[default]
    Rabbit,
    Wolf,
    Dog,
    Rat,
    Cat,
}

impl Species {
    /// 眼睛长在头两侧的物种
    #[inline]
    pub fn is_side_eyed(self) -> bool {
        matches!(self, Species::Rabbit | Species::Rat)
    }
}

/// 待机类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdleType {
    #[default]
    Stand,
    Active,
    Combat,
}

/// 每帧上下文
#[derive(Clone, Debug)]
pub struct FrameContext {
    /// 单帧时长（秒）
    pub timestep: f32,
    /// 本次经过的模拟帧数（追帧时大于 1）
    pub frames: u32,
    /// 游戏时间（秒）
    pub time: f32,
    pub species: Species,
    pub idle: IdleType,
    pub flags: LocomotionFlags,

    // ========================================
    // 运动
    // ========================================
    /// 当前速度
    pub velocity: Vec3,
    /// 当前最大速度（为 0 时回退到 true_max_speed）
    pub max_speed: f32,
    pub true_max_speed: f32,
    /// 威胁程度 [0, 1]
    pub threat_amount: f32,

    // ========================================
    // 姿态修饰
    // ========================================
    /// 待机姿态俯仰参与程度
    pub idle_stance_amount: f32,
    /// 说话程度（对话时头部晃动）
    pub talking_amount: f32,
    /// 呼吸程度
    pub breath_amount: f32,
    /// 角色缩放
    pub char_scale: f32,
    /// 翻滚时脚部 IK 淡出 [0, 1]
    pub roll_ik_fade: f32,
    /// 空翻时头部朝向补偿淡出 [0, 1]
    pub flip_ik_fade: f32,
    /// 平衡参考点
    pub balance_point: Vec3,
    /// 左右手臂的柔软度覆盖（0 = 完全物理，1 = 完全解析）
    pub arm_softness: [f32; 2],
}

impl FrameContext {
    pub fn new(timestep: f32, frames: u32) -> Self {
        Self {
            timestep,
            frames,
            time: 0.0,
            species: Species::default(),
            idle: IdleType::default(),
            flags: LocomotionFlags::ON_GROUND,
            velocity: Vec3::ZERO,
            max_speed: 0.0,
            true_max_speed: 8.0,
            threat_amount: 0.0,
            idle_stance_amount: 1.0,
            talking_amount: 0.0,
            breath_amount: 0.0,
            char_scale: 1.0,
            roll_ik_fade: 0.0,
            flip_ik_fade: 0.0,
            balance_point: Vec3::ZERO,
            arm_softness: [0.0; 2],
        }
    }

    /// 本次经过的总时长
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.timestep * self.frames as f32
    }

    #[inline]
    pub fn has(&self, flag: LocomotionFlags) -> bool {
        self.flags.contains(flag)
    }

    /// 推进一次（时间累加）
    pub fn advance(&mut self) {
        self.time += self.elapsed();
    }
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new(1.0 / 120.0, 1)
    }
}
