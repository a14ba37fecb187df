//! 组件空间姿态输入

use super::{BoneTransform, ReferenceSkeleton};

/// 宿主每帧提供的组件空间姿态
///
/// 返回 `None` 表示该骨骼在当前求值上下文中不可用（例如被 LOD 剔除）。
pub trait PoseSource {
    fn component_space_transform(&self, bone_index: usize) -> Option<BoneTransform>;
}

/// 基于 Vec 的组件空间姿态
#[derive(Clone, Debug, Default)]
pub struct ComponentPose {
    transforms: Vec<Option<BoneTransform>>,
}

impl ComponentPose {
    pub fn new(transforms: Vec<Option<BoneTransform>>) -> Self {
        Self { transforms }
    }

    /// 由骨骼局部变换做正向运动学得到组件空间姿态
    ///
    /// `locals` 长度不足时使用参考姿态补齐。
    pub fn from_local(skeleton: &ReferenceSkeleton, locals: &[BoneTransform]) -> Self {
        let mut transforms: Vec<Option<BoneTransform>> = Vec::with_capacity(skeleton.len());
        for (index, bone) in skeleton.bones().iter().enumerate() {
            let local = locals.get(index).copied().unwrap_or(bone.reference_local);
            let cs = match bone.parent.and_then(|p| transforms[p]) {
                Some(parent) => parent.compose(&local),
                None => local,
            };
            transforms.push(Some(cs));
        }
        Self { transforms }
    }

    /// 参考姿态
    pub fn reference(skeleton: &ReferenceSkeleton) -> Self {
        Self::from_local(skeleton, &[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn set(&mut self, bone_index: usize, transform: Option<BoneTransform>) {
        if bone_index >= self.transforms.len() {
            self.transforms.resize(bone_index + 1, None);
        }
        self.transforms[bone_index] = transform;
    }

    /// 标记骨骼不可用
    pub fn strip(&mut self, bone_index: usize) {
        self.set(bone_index, None);
    }
}

impl PoseSource for ComponentPose {
    fn component_space_transform(&self, bone_index: usize) -> Option<BoneTransform> {
        self.transforms.get(bone_index).copied().flatten()
    }
}
