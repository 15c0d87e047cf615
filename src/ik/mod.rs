//! 解析 IK
//!
//! - ChestIk / HeadIk: 注视（偏航 + 俯仰弹簧）
//! - FootIk: 脚部贴地
//! - HipIk: 髋部平衡
//! - LegSolver: 双骨骼腿部 IK

mod chest;
mod foot;
mod head;
mod hip;
mod leg;
mod look;

pub use chest::ChestIk;
pub use foot::{FootIk, FootIkReport, FootTarget};
pub use head::HeadIk;
pub use hip::{HipCorrection, HipIk};
pub use leg::{LegJoints, LegSolver};
