//! 物理链 - 粒子数组与构建
//!
//! 粒子按深度优先顺序存放，父粒子总在子粒子之前；
//! 父子关系用数组索引表示，拓扑变化时整体重建。

use glam::{Quat, Vec3};

use crate::skeleton::{ForwardAxis, PoseSource, ReferenceSkeleton};

use super::settings::PhysicsSettings;
use super::shapes::PhysicsAsset;

/// 单个模拟粒子
#[derive(Clone, Debug)]
pub struct Particle {
    /// 骨骼索引，虚拟粒子为 `None`
    pub bone_index: Option<usize>,
    /// 父粒子索引，根粒子为 `None`
    pub parent: Option<usize>,
    /// 子粒子索引（按构建顺序）
    pub children: Vec<usize>,

    // ========== 模拟状态 ==========
    pub location: Vec3,
    pub prev_location: Vec3,
    /// 本帧重新估计的朝向
    pub rotation: Quat,
    pub prev_rotation: Quat,

    // ========== 姿态目标（每帧刷新）==========
    pub pose_location: Vec3,
    pub pose_rotation: Quat,
    pub pose_scale: Vec3,
    /// 本帧姿态是否可用（骨骼可能被 LOD 剔除）
    pub pose_valid: bool,

    pub settings: PhysicsSettings,
    /// 参考姿态下沿链到根的累计长度
    pub length_from_root: f32,
    /// 形状碰撞用的刚体索引
    pub body: Option<usize>,
}

impl Particle {
    fn new(bone_index: Option<usize>, parent: Option<usize>, location: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            bone_index,
            parent,
            children: Vec::new(),
            location,
            prev_location: location,
            rotation,
            prev_rotation: rotation,
            pose_location: location,
            pose_rotation: rotation,
            pose_scale: scale,
            pose_valid: true,
            settings: PhysicsSettings::default(),
            length_from_root: 0.0,
            body: None,
        }
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.bone_index.is_none()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 线性链测试用：骨骼索引取父索引 + 1
    #[cfg(test)]
    pub(crate) fn test_new(parent: Option<usize>, location: Vec3) -> Self {
        let bone_index = parent.map_or(0, |p| p + 1);
        Self::new(Some(bone_index), parent, location, Quat::IDENTITY, Vec3::ONE)
    }
}

/// 同时可变借用父粒子与粒子本身
///
/// 根粒子或索引越界时返回 `None`。父索引必小于自身索引。
pub fn split_parent(particles: &mut [Particle], index: usize) -> Option<(&mut Particle, &mut Particle)> {
    let parent = particles.get(index)?.parent?;
    if parent >= index {
        return None;
    }
    let (head, tail) = particles.split_at_mut(index);
    Some((&mut head[parent], &mut tail[0]))
}

/// 构建参数
#[derive(Clone, Copy, Debug)]
pub struct ChainLayout<'a> {
    pub root_bone: &'a str,
    pub exclude_bones: &'a [String],
    pub dummy_bone_length: f32,
    pub forward_axis: ForwardAxis,
    pub shape_asset: Option<&'a PhysicsAsset>,
}

/// 物理链
#[derive(Clone, Debug, Default)]
pub struct Chain {
    pub particles: Vec<Particle>,
    /// 所有粒子到根长度的最大值
    pub total_length: f32,
}

impl Chain {
    /// 从根骨骼向下构建
    ///
    /// 根骨骼不存在或不在姿态中时返回空链。
    pub fn build(skeleton: &ReferenceSkeleton, pose: &dyn PoseSource, layout: &ChainLayout) -> Chain {
        let mut chain = Chain::default();
        let Some(root) = skeleton.find_bone(layout.root_bone) else {
            return chain;
        };
        chain.add_bone(skeleton, pose, layout, root, None);
        chain.total_length = chain
            .particles
            .iter()
            .map(|p| p.length_from_root)
            .fold(0.0, f32::max);
        chain
    }

    fn add_bone(
        &mut self,
        skeleton: &ReferenceSkeleton,
        pose: &dyn PoseSource,
        layout: &ChainLayout,
        bone_index: usize,
        parent: Option<usize>,
    ) {
        let Some(bone) = skeleton.bone(bone_index) else {
            return;
        };
        if layout.exclude_bones.iter().any(|name| *name == bone.name) {
            return;
        }
        let Some(cs) = pose.component_space_transform(bone_index) else {
            return;
        };

        let mut particle = Particle::new(Some(bone_index), parent, cs.translation, cs.rotation, cs.scale);
        particle.length_from_root = match parent {
            Some(p) => self.particles[p].length_from_root + skeleton.reference_length(bone_index),
            None => 0.0,
        };
        particle.body = layout.shape_asset.and_then(|asset| asset.find_body(&bone.name));

        let index = self.particles.len();
        self.particles.push(particle);
        if let Some(p) = parent {
            self.particles[p].children.push(index);
        }

        let children = skeleton.children_of(bone_index);
        if children.is_empty() && layout.dummy_bone_length > 0.0 {
            self.add_dummy(index, layout);
        }
        for child in children {
            self.add_bone(skeleton, pose, layout, child, Some(index));
        }
    }

    fn add_dummy(&mut self, parent: usize, layout: &ChainLayout) {
        let owner = &self.particles[parent];
        let location = dummy_location(owner, layout.forward_axis, layout.dummy_bone_length);
        let mut dummy = Particle::new(None, Some(parent), location, owner.pose_rotation, owner.pose_scale);
        dummy.length_from_root = owner.length_from_root + layout.dummy_bone_length;

        let index = self.particles.len();
        self.particles.push(dummy);
        self.particles[parent].children.push(index);
    }

    /// 从本帧姿态刷新所有粒子的姿态目标
    pub fn refresh_pose(&mut self, pose: &dyn PoseSource, forward_axis: ForwardAxis, dummy_bone_length: f32) {
        for i in 0..self.particles.len() {
            let bone_index = self.particles[i].bone_index;
            match bone_index {
                Some(bone_index) => {
                    let particle = &mut self.particles[i];
                    match pose.component_space_transform(bone_index) {
                        Some(cs) => {
                            particle.pose_location = cs.translation;
                            particle.pose_rotation = cs.rotation;
                            particle.pose_scale = cs.scale;
                            particle.pose_valid = true;
                        }
                        None => particle.pose_valid = false,
                    }
                }
                None => {
                    // 虚拟粒子的父粒子必在前面
                    let Some(parent) = self.particles[i].parent else {
                        continue;
                    };
                    let owner = &self.particles[parent];
                    let location = dummy_location(owner, forward_axis, dummy_bone_length);
                    let (rotation, scale, valid) = (owner.pose_rotation, owner.pose_scale, owner.pose_valid);

                    let dummy = &mut self.particles[i];
                    dummy.pose_location = location;
                    dummy.pose_rotation = rotation;
                    dummy.pose_scale = scale;
                    dummy.pose_valid = valid;
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn dummy_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_dummy()).count()
    }
}

/// 沿父粒子前向轴外推
#[inline]
fn dummy_location(parent: &Particle, forward_axis: ForwardAxis, length: f32) -> Vec3 {
    parent.pose_location + forward_axis.forward_vector(parent.pose_rotation) * length
}
