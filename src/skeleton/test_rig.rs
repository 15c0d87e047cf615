//! 测试用骨架：直立、双臂下垂、带耳朵和尾巴

use glam::Vec3;

use super::{BoneLink, ChainKind, PoseBuffer, SkeletonModel};

fn mirror(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, v.y, v.z)
}

pub(crate) fn bones() -> Vec<BoneLink> {
    let v = Vec3::new;
    let mut bones = vec![
        BoneLink::new("hip", -1, v(0.0, 0.95, 0.0), v(0.0, 1.05, 0.0)).with_mass(3.0),
        BoneLink::new("abdomen", 0, v(0.0, 1.05, 0.0), v(0.0, 1.2, 0.0)).with_mass(2.0),
        BoneLink::new("chest", 1, v(0.0, 1.2, 0.0), v(0.0, 1.4, 0.0)).with_mass(3.0),
        BoneLink::new("neck", 2, v(0.0, 1.4, 0.0), v(0.0, 1.5, 0.0)),
        BoneLink::new("head", 3, v(0.0, 1.5, 0.0), v(0.0, 1.7, 0.0)).with_mass(2.0),
    ];

    // 左臂 5..=11，右臂 12..=18
    // 肘部略微后收，决定弯曲方向
    let arm = [
        ("collar", v(0.03, 1.38, 0.0), v(0.18, 1.38, 0.0)),
        ("upper_arm_a", v(0.18, 1.38, 0.0), v(0.18, 1.25, -0.0075)),
        ("upper_arm_b", v(0.18, 1.25, -0.0075), v(0.18, 1.12, -0.015)),
        ("forearm_a", v(0.18, 1.12, -0.015), v(0.18, 1.0, -0.0075)),
        ("forearm_b", v(0.18, 1.0, -0.0075), v(0.18, 0.88, 0.0)),
        ("hand", v(0.18, 0.88, 0.0), v(0.18, 0.78, 0.0)),
        ("finger", v(0.18, 0.78, 0.0), v(0.18, 0.73, 0.0)),
    ];
    for (side, flip) in [("l", false), ("r", true)] {
        let start = bones.len() as i32;
        for (i, (name, pivot, tip)) in arm.iter().enumerate() {
            let parent = if i == 0 { 2 } else { start + i as i32 - 1 };
            let (pivot, tip) = if flip { (mirror(*pivot), mirror(*tip)) } else { (*pivot, *tip) };
            bones.push(BoneLink::new(format!("{}_{}", name, side), parent, pivot, tip));
        }
    }

    // 左腿 19..=24，右腿 25..=30
    // 膝盖略微前屈，决定弯曲方向
    let shin_mid_z = 0.03 * 0.23 / 0.43;
    let leg = [
        ("thigh_a", v(0.1, 0.95, 0.0), v(0.1, 0.75, 0.015)),
        ("thigh_b", v(0.1, 0.75, 0.015), v(0.1, 0.55, 0.03)),
        ("shin_a", v(0.1, 0.55, 0.03), v(0.1, 0.35, shin_mid_z)),
        ("shin_b", v(0.1, 0.35, shin_mid_z), v(0.1, 0.12, 0.0)),
        ("ankle", v(0.1, 0.12, 0.0), v(0.1, 0.05, 0.05)),
        ("foot", v(0.1, 0.05, 0.05), v(0.1, 0.02, 0.17)),
    ];
    for (side, flip) in [("l", false), ("r", true)] {
        let start = bones.len() as i32;
        for (i, (name, pivot, tip)) in leg.iter().enumerate() {
            let parent = if i == 0 { 0 } else { start + i as i32 - 1 };
            let (pivot, tip) = if flip { (mirror(*pivot), mirror(*tip)) } else { (*pivot, *tip) };
            bones.push(BoneLink::new(format!("{}_{}", name, side), parent, pivot, tip).with_mass(1.5));
        }
    }

    // 耳朵 31..=34
    bones.push(BoneLink::new("ear_base_l", 4, v(0.05, 1.65, 0.0), v(0.07, 1.8, 0.0)).with_mass(0.1));
    bones.push(BoneLink::new("ear_tip_l", 31, v(0.07, 1.8, 0.0), v(0.09, 1.95, 0.0)).with_mass(0.1));
    bones.push(BoneLink::new("ear_base_r", 4, v(-0.05, 1.65, 0.0), v(-0.07, 1.8, 0.0)).with_mass(0.1));
    bones.push(BoneLink::new("ear_tip_r", 33, v(-0.07, 1.8, 0.0), v(-0.09, 1.95, 0.0)).with_mass(0.1));

    // 尾巴 35..=37
    bones.push(BoneLink::new("tail_a", 0, v(0.0, 1.0, -0.08), v(0.0, 0.95, -0.25)).with_mass(0.2));
    bones.push(BoneLink::new("tail_b", 35, v(0.0, 0.95, -0.25), v(0.0, 0.9, -0.42)).with_mass(0.2));
    bones.push(BoneLink::new("tail_c", 36, v(0.0, 0.9, -0.42), v(0.0, 0.85, -0.6)).with_mass(0.2));

    bones
}

pub(crate) fn chains() -> Vec<(ChainKind, Vec<usize>)> {
    vec![
        (ChainKind::LeftArm, vec![10, 9, 8, 7, 6, 5]),
        (ChainKind::RightArm, vec![17, 16, 15, 14, 13, 12]),
        (ChainKind::LeftLeg, vec![24, 23, 22, 21, 20, 19]),
        (ChainKind::RightLeg, vec![30, 29, 28, 27, 26, 25]),
        (ChainKind::Head, vec![4, 3]),
        (ChainKind::LeftEar, vec![32, 31]),
        (ChainKind::RightEar, vec![34, 33]),
        (ChainKind::Torso, vec![2, 1, 0]),
        (ChainKind::Tail, vec![37, 36, 35]),
    ]
}

pub(crate) fn skeleton() -> SkeletonModel {
    SkeletonModel::new(bones(), chains()).expect("test rig is valid")
}

/// 绑定姿态，关键变换同步自帧矩阵
pub(crate) fn bind_pose(skeleton: &SkeletonModel) -> PoseBuffer {
    let mut pose = PoseBuffer::new(skeleton);
    pose.sync_keys_from_frames(skeleton);
    pose
}
