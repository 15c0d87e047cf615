//! 次级运动 - 解析姿态之上的质点链模拟
//!
//! 核心设计思想：
//! - PointMassChain: 当前点 + 上一帧点，差分得到速度
//! - ArmMotion: 肩 / 肘 / 腕三点，带肘部铰链
//! - EarMotion: 耳根 / 耳中 / 耳尖三点，带随机抖耳
//! - TailMotion: N 根骨骼 N+1 个点的位置动力学

mod arm;
mod ear;
mod point_chain;
mod tail;

pub use arm::{ArmJoints, ArmMotion};
pub use ear::EarMotion;
pub use point_chain::PointMassChain;
pub use tail::TailMotion;
