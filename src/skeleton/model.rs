//! 静态骨架模型
//!
//! 骨骼列表 + 各肢体的 IK 链（从末端到根部排列）。构建时校验一次，运行时只读。

use glam::Vec3;

use super::bone_link::BoneLink;
use super::pose::KeySlot;
use crate::{PoseError, Result};

/// 手臂肘部铰链轴的默认值（绑定空间）
pub const ARM_HINGE_AXIS: Vec3 = Vec3::X;
/// 手臂肘部"前方"的默认值（绑定空间），前臂不能向反方向弯折
pub const ARM_HINGE_FRONT: Vec3 = Vec3::Z;

// ============================================================================
// IK 链
// ============================================================================

/// IK 链类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainKind {
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
    Head,
    LeftEar,
    RightEar,
    Torso,
    Tail,
}

impl ChainKind {
    pub const COUNT: usize = 9;

    pub const ALL: [ChainKind; Self::COUNT] = [
        ChainKind::LeftArm,
        ChainKind::RightArm,
        ChainKind::LeftLeg,
        ChainKind::RightLeg,
        ChainKind::Head,
        ChainKind::LeftEar,
        ChainKind::RightEar,
        ChainKind::Torso,
        ChainKind::Tail,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 最少骨骼数
    pub fn min_len(self) -> usize {
        match self {
            ChainKind::LeftArm | ChainKind::RightArm => 6,
            ChainKind::LeftLeg | ChainKind::RightLeg => 6,
            ChainKind::Head => 2,
            ChainKind::LeftEar | ChainKind::RightEar => 2,
            ChainKind::Torso => 3,
            ChainKind::Tail => 1,
        }
    }

    /// 耳朵和尾巴可以缺省
    pub fn is_required(self) -> bool {
        !matches!(self, ChainKind::LeftEar | ChainKind::RightEar | ChainKind::Tail)
    }
}

/// IK 链
///
/// `bones[0]` 是末端骨骼（手、脚、耳尖、尾尖……），最后一个是根部。
#[derive(Clone, Debug)]
pub struct IkChain {
    pub kind: ChainKind,
    pub bones: Vec<usize>,
    /// 每根骨骼的静止长度，与 `bones` 一一对应
    pub rest_lengths: Vec<f32>,
    /// 肘部铰链轴（仅手臂使用）
    pub hinge_axis: Vec3,
    /// 肘部前方（仅手臂使用）
    pub hinge_front: Vec3,
}

impl IkChain {
    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.bones[self.bones.len() - 1]
    }
}

// ============================================================================
// 骨架
// ============================================================================

/// 静态骨架
#[derive(Clone, Debug)]
pub struct SkeletonModel {
    bones: Vec<BoneLink>,
    chains: [Option<IkChain>; ChainKind::COUNT],
    /// 每根骨骼的全部后代（先序）
    descendants: Vec<Vec<usize>>,
}

impl SkeletonModel {
    /// 构建并校验骨架
    pub fn new(bones: Vec<BoneLink>, chains: Vec<(ChainKind, Vec<usize>)>) -> Result<Self> {
        let bone_count = bones.len();

        for (i, bone) in bones.iter().enumerate() {
            if bone.parent_index >= i as i32 || bone.parent_index < -1 {
                return Err(PoseError::InvalidParent { bone: i, parent: bone.parent_index });
            }
            if bone.length() < 1e-6 {
                return Err(PoseError::DegenerateBone(i));
            }
        }

        let mut chain_slots: [Option<IkChain>; ChainKind::COUNT] = Default::default();
        for (kind, chain_bones) in chains {
            if chain_bones.len() < kind.min_len() {
                return Err(PoseError::ChainTooShort {
                    chain: kind,
                    expected: kind.min_len(),
                    actual: chain_bones.len(),
                });
            }
            if let Some(&index) = chain_bones.iter().find(|&&b| b >= bone_count) {
                return Err(PoseError::BoneIndex { chain: kind, index, bone_count });
            }
            let rest_lengths = chain_bones.iter().map(|&b| bones[b].length()).collect();
            chain_slots[kind.index()] = Some(IkChain {
                kind,
                bones: chain_bones,
                rest_lengths,
                hinge_axis: ARM_HINGE_AXIS,
                hinge_front: ARM_HINGE_FRONT,
            });
        }

        if let Some(kind) = ChainKind::ALL
            .iter()
            .copied()
            .find(|k| k.is_required() && chain_slots[k.index()].is_none())
        {
            return Err(PoseError::MissingChain(kind));
        }

        // 子骨骼缓存，再展开为后代列表
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); bone_count];
        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent() {
                children[parent].push(i);
            }
        }
        let descendants = (0..bone_count)
            .map(|i| {
                let mut out = Vec::new();
                collect_descendants(&children, i, &mut out);
                out
            })
            .collect();

        let chain_count = chain_slots.iter().filter(|c| c.is_some()).count();
        log::info!("[Skeleton] 骨架构建完成: {} 根骨骼, {} 条 IK 链", bone_count, chain_count);

        Ok(Self {
            bones,
            chains: chain_slots,
            descendants,
        })
    }

    /// 设置手臂肘部铰链（绑定空间）
    pub fn with_arm_hinge(mut self, kind: ChainKind, axis: Vec3, front: Vec3) -> Self {
        if let Some(chain) = self.chains[kind.index()].as_mut() {
            chain.hinge_axis = axis.normalize_or_zero();
            chain.hinge_front = front.normalize_or_zero();
        }
        self
    }

    #[inline]
    pub fn bones(&self) -> &[BoneLink] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: usize) -> &BoneLink {
        &self.bones[index]
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn chain(&self, kind: ChainKind) -> Option<&IkChain> {
        self.chains[kind.index()].as_ref()
    }

    #[inline]
    pub fn descendants(&self, bone: usize) -> &[usize] {
        &self.descendants[bone]
    }

    /// 关键变换槽位所驱动的骨骼
    pub fn key_bone(&self, slot: KeySlot) -> Option<usize> {
        let (kind, element) = match slot {
            KeySlot::Head => (ChainKind::Head, 0),
            KeySlot::LeftArm => (ChainKind::LeftArm, 0),
            KeySlot::RightArm => (ChainKind::RightArm, 0),
            KeySlot::LeftLeg => (ChainKind::LeftLeg, 0),
            KeySlot::RightLeg => (ChainKind::RightLeg, 0),
            KeySlot::Chest => (ChainKind::Torso, 0),
            KeySlot::Hip => (ChainKind::Torso, 2),
        };
        self.chain(kind).map(|c| c.bones[element])
    }
}

fn collect_descendants(children: &[Vec<usize>], bone: usize, out: &mut Vec<usize>) {
    for &child in &children[bone] {
        out.push(child);
        collect_descendants(children, child, out);
    }
}
