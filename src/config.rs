//! 姿态修正配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 流水线创建时拷贝一份快照，求解器只读快照，不直接访问全局实例。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 姿态修正配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct PoseConfig {
    // ========== 躯干注视 ==========
    /// 躯干角速度阻尼（按帧数取幂），默认 0.9
    pub chest_damping: f32,
    /// 躯干弹簧刚度，默认 0.3
    pub chest_stiffness: f32,
    /// 躯干偏航范围（弧度），默认 1.0
    pub chest_yaw_range: f32,
    /// 躯干俯仰范围（弧度），默认 1.0
    pub chest_pitch_range: f32,
    /// 躯干俯仰偏置，默认 0.0
    pub chest_tilt_offset: f32,
    /// 躯干目标抖动幅度，默认 0.005
    pub chest_jitter: f32,

    // ========== 头部注视 ==========
    /// 头部角速度阻尼，默认 0.9
    pub head_damping: f32,
    /// 头部加速度阻尼，默认 0.9
    pub head_accel_damping: f32,
    /// 头部加速度惯性（低通滤波系数），默认 0.5
    pub head_accel_inertia: f32,
    /// 头部弹簧刚度，默认 0.3
    pub head_stiffness: f32,
    /// 头部偏航范围（兔子），默认 1.3
    pub head_yaw_range: f32,
    /// 非兔子物种的头部范围缩放，默认 0.7
    pub head_range_scale_non_rabbit: f32,
    /// 头部俯仰范围，默认 0.8
    pub head_pitch_range: f32,
    /// 头部俯仰偏置，默认 0.0
    pub head_tilt_offset: f32,
    /// 头部最大角速度，默认 15.0
    pub head_max_velocity: f32,
    /// 头部目标抖动幅度，默认 0.001
    pub head_jitter: f32,

    /// 迟滞阈值：角度被推到极限后，原始目标需回到阈值以内才允许翻越
    pub look_hysteresis_threshold: f32,

    // ========== 脚部贴地 ==========
    /// 探测球半径，默认 0.05
    pub foot_probe_radius: f32,
    /// 探测起点高于脚的距离，默认 0.2
    pub foot_probe_up: f32,
    /// 探测终点低于脚的距离，默认 0.6
    pub foot_probe_down: f32,
    /// 贴地穿透余量，默认 0.01
    pub foot_ground_margin: f32,
    /// 每帧地面高度变化上限，默认 0.1
    pub foot_height_clamp: f32,
    /// 地面高度平滑（按帧数取幂），默认 0.8
    pub foot_height_smoothing: f32,
    /// 地面法线旋转平滑，默认 0.8
    pub foot_rotate_smoothing: f32,
    /// 抬脚时旋转权重衰减斜率，默认 4.0
    pub foot_lift_fade: f32,
    /// 抬脚高度起始阈值，默认 0.05
    pub foot_lift_threshold: f32,
    /// 平衡模式径向探测距离，默认 0.4
    pub balance_probe_reach: f32,
    /// 平衡模式径向探测方向数，默认 8
    pub balance_probe_directions: usize,
    /// 平衡偏移分配到髋 / 胸 / 头 / 手臂的权重
    pub balance_hip_weight: f32,
    pub balance_chest_weight: f32,
    pub balance_head_weight: f32,
    pub balance_arm_weight: f32,

    // ========== 髋部 ==========
    /// 髋部距离约束迭代次数，默认 2
    pub hip_iterations: usize,
    /// 髋部偏移平滑，默认 0.95
    pub hip_smoothing: f32,
    /// 静止时最大扭转角，默认 0.2
    pub hip_max_twist: f32,
    /// 每单位水平速度扭转角衰减，默认 0.2
    pub hip_twist_speed_falloff: f32,
    /// 方向修正中脚部位移的权重，默认 3.0
    pub hip_foot_spread_weight: f32,

    // ========== 腿部 ==========
    /// 双骨骼松弛迭代次数，默认 2
    pub leg_iterations: usize,

    // ========== 手臂次级运动 ==========
    /// 速度拖拽（按帧数取幂），默认 0.92
    pub arm_drag: f32,
    /// 紧绷 / 放松时的吸引刚度
    pub arm_stiffness_tight: f32,
    pub arm_stiffness_loose: f32,
    /// 空中时的放松程度，默认 0.7
    pub arm_loose_airborne: f32,
    /// 长度 / 铰链约束强度，默认 0.75
    pub arm_constraint_strength: f32,
    /// 呼吸时肩膀抬起幅度，默认 0.005
    pub arm_breath_lift: f32,

    // ========== 耳朵次级运动 ==========
    /// 速度阻尼，默认 0.95
    pub ear_damping: f32,
    /// 中点回弹阻尼，默认 0.9
    pub ear_low_damping: f32,
    /// 耳尖回弹阻尼，默认 0.92
    pub ear_high_damping: f32,
    /// 长度松弛次数，默认 3
    pub ear_relax_iterations: usize,
    /// 碰撞球半径，默认 0.03
    pub ear_collision_radius: f32,
    /// 随机扭转范围
    pub ear_twist_min: f32,
    pub ear_twist_max: f32,
    /// 随机扭转间隔（秒）
    pub ear_twitch_interval_min: f32,
    pub ear_twitch_interval_max: f32,
    /// 扭转平滑，默认 0.9
    pub ear_twist_smoothing: f32,
    /// 非兔子物种扭转缩放，默认 0.3
    pub ear_twist_scale_non_rabbit: f32,

    // ========== 尾巴次级运动 ==========
    /// 速度保留系数，默认 0.95
    pub tail_velocity_retention: f32,
    /// 重力（每帧下沉量 = 重力 × 时长），默认 0.1
    pub tail_gravity: f32,
    /// 根节点回弹阻尼，默认 0.9
    pub tail_root_damping: f32,
    /// 形状保持强度，默认 0.1
    pub tail_shape_strength: f32,
    /// 松弛最少迭代次数，默认 5
    pub tail_min_iterations: usize,
    /// 每帧追加的松弛次数，默认 1.5
    pub tail_iterations_per_frame: f32,
    /// 成对松弛时靠尖端一侧的权重，默认 0.75
    pub tail_pair_weight: f32,
    /// 碰撞球半径，默认 0.03
    pub tail_collision_radius: f32,

    // ========== 头部绘制 ==========
    /// 呼吸时头骨 / 头顶抬起幅度
    pub skull_breath_lift: f32,
    pub crown_breath_lift: f32,

    // ========== 眼球注视 ==========
    /// 随机注视偏移幅度，默认 0.2
    pub gaze_offset_range: f32,
    /// 随机偏移刷新间隔（秒）
    pub gaze_interval_min: f32,
    pub gaze_interval_max: f32,

    // ========== 安全 ==========
    /// 单帧位移超过此值视为瞬移，默认 10.0
    pub teleport_distance: f32,

    // ========== 调试 ==========
    /// 是否输出逐帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            // ====== 躯干注视 ======
            // 阻尼 0.9 + 刚度 0.3 在 120Hz 下接近临界阻尼
            chest_damping: 0.9,
            chest_stiffness: 0.3,
            chest_yaw_range: 1.0,
            chest_pitch_range: 1.0,
            chest_tilt_offset: 0.0,
            chest_jitter: 0.005,

            // ====== 头部注视 ======
            head_damping: 0.9,
            head_accel_damping: 0.9,
            head_accel_inertia: 0.5,
            head_stiffness: 0.3,
            head_yaw_range: 1.3,
            head_range_scale_non_rabbit: 0.7,
            head_pitch_range: 0.8,
            head_tilt_offset: 0.0,
            head_max_velocity: 15.0,
            head_jitter: 0.001,

            // 约 97°，超过即认为目标在身后
            look_hysteresis_threshold: 1.7,

            // ====== 脚部贴地 ======
            foot_probe_radius: 0.05,
            foot_probe_up: 0.2,
            foot_probe_down: 0.6,
            foot_ground_margin: 0.01,
            foot_height_clamp: 0.1,
            foot_height_smoothing: 0.8,
            foot_rotate_smoothing: 0.8,
            foot_lift_fade: 4.0,
            foot_lift_threshold: 0.05,
            balance_probe_reach: 0.4,
            balance_probe_directions: 8,
            balance_hip_weight: 0.7,
            balance_chest_weight: 0.5,
            balance_head_weight: 0.4,
            balance_arm_weight: 1.0,

            // ====== 髋部 ======
            hip_iterations: 2,
            hip_smoothing: 0.95,
            hip_max_twist: 0.2,
            hip_twist_speed_falloff: 0.2,
            hip_foot_spread_weight: 3.0,

            // ====== 腿部 ======
            leg_iterations: 2,

            // ====== 手臂 ======
            arm_drag: 0.92,
            arm_stiffness_tight: 0.9,
            arm_stiffness_loose: 0.97,
            arm_loose_airborne: 0.7,
            arm_constraint_strength: 0.75,
            arm_breath_lift: 0.005,

            // ====== 耳朵 ======
            ear_damping: 0.95,
            ear_low_damping: 0.9,
            ear_high_damping: 0.92,
            ear_relax_iterations: 3,
            ear_collision_radius: 0.03,
            ear_twist_min: -0.4,
            ear_twist_max: 0.8,
            ear_twitch_interval_min: 0.7,
            ear_twitch_interval_max: 4.0,
            ear_twist_smoothing: 0.9,
            ear_twist_scale_non_rabbit: 0.3,

            // ====== 尾巴 ======
            tail_velocity_retention: 0.95,
            tail_gravity: 0.1,
            tail_root_damping: 0.9,
            tail_shape_strength: 0.1,
            // 链越长越需要松弛，迭代次数随帧数增长
            tail_min_iterations: 5,
            tail_iterations_per_frame: 1.5,
            tail_pair_weight: 0.75,
            tail_collision_radius: 0.03,

            // ====== 头部绘制 ======
            skull_breath_lift: 0.005,
            crown_breath_lift: 0.002,

            // ====== 眼球注视 ======
            gaze_offset_range: 0.2,
            gaze_interval_min: 0.2,
            gaze_interval_max: 1.0,

            // ====== 安全 ======
            teleport_distance: 10.0,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl PoseConfig {
    /// 关闭所有随机抖动（测试与回放用）
    pub fn without_jitter(mut self) -> Self {
        self.chest_jitter = 0.0;
        self.head_jitter = 0.0;
        self.gaze_offset_range = 0.0;
        self.ear_twist_min = 0.0;
        self.ear_twist_max = 0.0;
        self
    }
}

/// 全局配置实例
static POSE_CONFIG: Lazy<RwLock<PoseConfig>> = Lazy::new(|| {
    RwLock::new(PoseConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> PoseConfig {
    POSE_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: PoseConfig) {
    *POSE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *POSE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = PoseConfig::default();
}
