//! 每个角色的可变状态
//!
//! 姿态缓冲 + 所有跨帧历史（弹簧、平滑、质点链、抖耳计时、眼球偏移、随机数）。
//! 骨架本身只读，可被多个角色共享。

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::ik::{ChestIk, FootIk, HeadIk, HipIk};
use crate::morph::{EyeCalibration, EyeGazeMapper};
use crate::physics::{ArmMotion, EarMotion, TailMotion};
use crate::skeleton::{PoseBuffer, SkeletonModel};

/// 角色状态
#[derive(Clone, Debug)]
pub struct CharacterState {
    /// 本帧姿态（动画混合结果写入这里，流水线原地修改）
    pub pose: PoseBuffer,

    pub chest: ChestIk,
    pub head: HeadIk,
    pub foot: FootIk,
    pub hip: HipIk,

    pub arms: ArmMotion,
    pub ears: EarMotion,
    pub tail: TailMotion,

    pub gaze: EyeGazeMapper,
    /// 眼睛标定，没有时跳过注视映射
    pub eye_calibration: Option<EyeCalibration>,

    /// 抖动、抖耳、眼球微动共用的随机数
    pub rng: Pcg32,
}

impl CharacterState {
    /// 绑定姿态起步，`seed` 决定随机序列（便于复现）
    pub fn new(skeleton: &SkeletonModel, seed: u64) -> Self {
        let mut pose = PoseBuffer::new(skeleton);
        pose.sync_keys_from_frames(skeleton);
        Self {
            pose,
            chest: ChestIk::new(),
            head: HeadIk::new(),
            foot: FootIk::new(),
            hip: HipIk::new(),
            arms: ArmMotion::new(),
            ears: EarMotion::new(),
            tail: TailMotion::new(),
            gaze: EyeGazeMapper::new(),
            eye_calibration: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn with_eye_calibration(mut self, calibration: EyeCalibration) -> Self {
        self.eye_calibration = Some(calibration);
        self
    }

    /// 清空所有跨帧历史（换模型、瞬移到新场景等）
    pub fn reset_history(&mut self) {
        self.chest = ChestIk::new();
        self.head = HeadIk::new();
        self.foot.reset();
        self.hip.reset();
        self.arms.reset();
        self.ears.reset();
        self.tail.reset();
        log::debug!("[Pipeline] 角色历史状态已清空");
    }
}
