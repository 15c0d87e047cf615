//! 表情 Morph 权重
//!
//! 目前只有眼球注视：把注视点映射为 `look_*` 系列 Morph 的权重，由宿主写入模型。

mod eye_gaze;

pub use eye_gaze::{BlendWeights, EyeCalibration, EyeGazeMapper, GazeInput, GazeSegment, GazeTarget};
