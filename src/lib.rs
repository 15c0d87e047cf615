//! 程序化姿态修正引擎
//!
//! 在动画混合之后、蒙皮之前逐帧修正角色骨骼：
//! - 躯干 / 头部注视 IK（`ik::ChestIk`、`ik::HeadIk`）
//! - 髋部平衡、脚部贴地、双骨骼腿部 IK（`ik::HipIk`、`ik::FootIk`、`ik::LegSolver`）
//! - 手臂 / 耳朵 / 尾巴的次级运动（`physics`）
//! - 躯干传播与眼球注视权重（`body`、`morph`）
//!
//! 入口是 [`pipeline::PosePipeline`]，每个角色持有一份 [`character::CharacterState`]。

pub mod body;
pub mod character;
pub mod collision;
pub mod config;
pub mod context;
pub mod ik;
pub mod math;
pub mod morph;
pub mod physics;
pub mod pipeline;
pub mod skeleton;

pub use character::CharacterState;
pub use collision::{CollisionProbe, GroundProbeResult};
pub use config::{get_config, reset_config, set_config, PoseConfig};
pub use context::{FrameContext, IdleType, LocomotionFlags, Species};
pub use pipeline::{FrameInputs, PosePipeline};
pub use skeleton::{BoneTransform, ChainKind, KeySlot, PoseBuffer, SkeletonModel};

use thiserror::Error;

/// 骨架构建错误
///
/// 只在构建 [`SkeletonModel`] 时产生，逐帧流水线本身不会失败。
#[derive(Debug, Error)]
pub enum PoseError {
    #[error("IK 链 {chain:?} 引用了越界骨骼 {index}（共 {bone_count} 根）")]
    BoneIndex {
        chain: ChainKind,
        index: usize,
        bone_count: usize,
    },

    #[error("IK 链 {chain:?} 长度不足：需要至少 {expected}，实际 {actual}")]
    ChainTooShort {
        chain: ChainKind,
        expected: usize,
        actual: usize,
    },

    #[error("缺少必需的 IK 链 {0:?}")]
    MissingChain(ChainKind),

    #[error("骨骼 {bone} 的父骨骼 {parent} 无效（必须排在子骨骼之前）")]
    InvalidParent { bone: usize, parent: i32 },

    #[error("骨骼 {0} 的 pivot 与 tip 重合")]
    DegenerateBone(usize),
}

pub type Result<T> = std::result::Result<T, PoseError>;
