//! 逐帧姿态修正流水线
//!
//! 调用顺序是正确性的一部分：
//! 1. `pre_pass`：脚部 IK → 髋部 IK → 胸部 IK → 头部 IK（只改关键变换）
//! 2. `final_pass`：左腿 → 右腿 → 手臂 → 头部绘制 → 躯干传播 → 耳朵 → 尾巴（写帧矩阵）
//! 3. 眼球注视（只读头部帧矩阵）
//!
//! 宿主在两遍之间可以读取修正后的关键变换（例如放置手持物体）。

use glam::Vec3;
use rayon::prelude::*;

use crate::body::BodyPropagation;
use crate::character::CharacterState;
use crate::collision::CollisionProbe;
use crate::config::{get_config, PoseConfig};
use crate::context::FrameContext;
use crate::ik::{FootIkReport, FootTarget, HipIk, LegSolver};
use crate::morph::GazeInput;
use crate::skeleton::{ChainKind, KeySlot, PoseBuffer, SkeletonModel};

/// 每帧由宿主提供的输入
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs {
    /// 躯干注视方向（模型空间）
    pub torso_look: Vec3,
    /// 头部注视方向（模型空间）
    pub head_look: Vec3,
    /// 左、右脚
    pub feet: [FootTarget; 2],
    /// 目标腿长；`None` 时在脚部 IK 之前从动画姿态测量
    pub leg_lengths: Option<[f32; 2]>,
    /// 眼球注视目标
    pub gaze: Option<GazeInput>,
}

impl FrameInputs {
    /// 看向正前方，脚部目标取自当前动画姿态
    pub fn from_pose(skeleton: &SkeletonModel, pose: &PoseBuffer, config: &PoseConfig) -> Self {
        Self {
            torso_look: Vec3::Z,
            head_look: Vec3::Z,
            feet: [
                FootTarget::from_pose(skeleton, pose, KeySlot::LeftLeg, config),
                FootTarget::from_pose(skeleton, pose, KeySlot::RightLeg, config),
            ],
            leg_lengths: None,
            gaze: None,
        }
    }

    pub fn with_look(mut self, look: Vec3) -> Self {
        self.torso_look = look;
        self.head_look = look;
        self
    }

    pub fn with_gaze(mut self, gaze: GazeInput) -> Self {
        self.gaze = Some(gaze);
        self
    }
}

/// 姿态流水线
///
/// 骨架与参数只读，可在多个角色之间共享；角色自己的历史在 [`CharacterState`] 里。
#[derive(Clone, Debug)]
pub struct PosePipeline<'a> {
    skeleton: &'a SkeletonModel,
    config: PoseConfig,
}

impl<'a> PosePipeline<'a> {
    /// 使用全局配置的快照
    pub fn new(skeleton: &'a SkeletonModel) -> Self {
        Self::with_config(skeleton, get_config())
    }

    pub fn with_config(skeleton: &'a SkeletonModel, config: PoseConfig) -> Self {
        log::info!(
            "[Pipeline] 创建流水线: {} 根骨骼, 耳朵={}, 尾巴={}",
            skeleton.bone_count(),
            skeleton.chain(ChainKind::LeftEar).is_some(),
            skeleton.chain(ChainKind::Tail).is_some()
        );
        Self { skeleton, config }
    }

    pub fn skeleton(&self) -> &SkeletonModel {
        self.skeleton
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// 第一遍：修正关键变换
    pub fn pre_pass(
        &self,
        state: &mut CharacterState,
        ctx: &FrameContext,
        inputs: &FrameInputs,
        probe: &dyn CollisionProbe,
    ) -> FootIkReport {
        let skeleton = self.skeleton;
        let config = &self.config;

        // 腿长必须在脚部 IK 移动脚之前测量
        let leg_lengths = inputs
            .leg_lengths
            .unwrap_or_else(|| HipIk::measure_leg_lengths(skeleton, &state.pose));

        let report = state
            .foot
            .solve(skeleton, &mut state.pose, ctx, config, &inputs.feet, probe);

        if let Some(correction) = state.hip.solve(skeleton, &state.pose, ctx, config, leg_lengths) {
            correction.apply(&mut state.pose);
        }

        state
            .chest
            .solve(skeleton, &mut state.pose, ctx, config, inputs.torso_look, &mut state.rng);
        state
            .head
            .solve(skeleton, &mut state.pose, ctx, config, inputs.head_look, &mut state.rng);

        if config.debug_log {
            log::debug!(
                "[Pipeline] pre_pass: 脚偏移 {:?}, 胸 {:?}, 头 {:?}",
                report.offsets,
                state.chest.angle,
                state.head.angle
            );
        }
        report
    }

    /// 第二遍：按关键变换重建帧矩阵并运行次级运动
    pub fn final_pass(&self, state: &mut CharacterState, ctx: &FrameContext, probe: &dyn CollisionProbe) {
        let skeleton = self.skeleton;
        let config = &self.config;
        let pose = &mut state.pose;

        LegSolver::solve(skeleton, pose, config, ChainKind::LeftLeg);
        LegSolver::solve(skeleton, pose, config, ChainKind::RightLeg);
        state.arms.step(skeleton, pose, ctx, config);
        BodyPropagation::draw_head(skeleton, pose, ctx, config);
        BodyPropagation::propagate(skeleton, pose);
        state.ears.step(skeleton, pose, ctx, config, probe, &mut state.rng);
        state.tail.step(skeleton, pose, ctx, config, probe);
    }

    /// 完整的一帧
    pub fn step(
        &self,
        state: &mut CharacterState,
        ctx: &FrameContext,
        inputs: &FrameInputs,
        probe: &dyn CollisionProbe,
    ) -> FootIkReport {
        let report = self.pre_pass(state, ctx, inputs, probe);
        self.final_pass(state, ctx, probe);

        if let (Some(calibration), Some(gaze)) = (&state.eye_calibration, &inputs.gaze) {
            if let Some(head) = self.skeleton.chain(ChainKind::Head) {
                let head_frame = state.pose.frame_matrices[head.bones[0]];
                state
                    .gaze
                    .update(calibration, &head_frame, gaze, ctx, &self.config, &mut state.rng);
            }
        }
        report
    }

    /// 并行推进多个角色，每个角色一个任务
    ///
    /// 三个切片按下标对应；长度不一致时只处理公共部分。
    pub fn step_batch(
        &self,
        states: &mut [CharacterState],
        contexts: &[FrameContext],
        inputs: &[FrameInputs],
        probe: &(dyn CollisionProbe + Sync),
    ) -> Vec<FootIkReport> {
        if states.len() != contexts.len() || states.len() != inputs.len() {
            log::warn!(
                "[Pipeline] 批量长度不一致: 角色 {}, 上下文 {}, 输入 {}",
                states.len(),
                contexts.len(),
                inputs.len()
            );
        }
        states
            .par_iter_mut()
            .zip(contexts.par_iter())
            .zip(inputs.par_iter())
            .map(|((state, ctx), inputs)| self.step(state, ctx, inputs, probe))
            .collect()
    }
}
