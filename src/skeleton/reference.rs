//! 参考骨骼 - 骨骼层级与参考姿态
//!
//! 骨骼按拓扑顺序存储：父骨骼索引总是小于子骨骼索引。

use std::collections::HashMap;

use crate::{ChainError, Result};

use super::BoneTransform;

/// 单根骨骼的静态数据
#[derive(Clone, Debug)]
pub struct SkeletonBone {
    /// 骨骼名称
    pub name: String,
    /// 父骨骼索引（`None` 表示根骨骼）
    pub parent: Option<usize>,
    /// 参考姿态下相对父骨骼的变换
    pub reference_local: BoneTransform,
}

impl SkeletonBone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, reference_local: BoneTransform) -> Self {
        Self {
            name: name.into(),
            parent,
            reference_local,
        }
    }
}

/// 参考骨骼
#[derive(Clone, Debug, Default)]
pub struct ReferenceSkeleton {
    bones: Vec<SkeletonBone>,
    name_to_index: HashMap<String, usize>,
}

impl ReferenceSkeleton {
    /// 创建参考骨骼，校验层级顺序与名称唯一性
    pub fn new(bones: Vec<SkeletonBone>) -> Result<Self> {
        let mut name_to_index = HashMap::with_capacity(bones.len());

        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(ChainError::InvalidHierarchy(format!(
                        "bone '{}' (#{}) has parent #{} which does not precede it",
                        bone.name, index, parent
                    )));
                }
            }
            if name_to_index.insert(bone.name.clone(), index).is_some() {
                return Err(ChainError::DuplicateBone(bone.name.clone()));
            }
        }

        Ok(Self { bones, name_to_index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn bone(&self, index: usize) -> Option<&SkeletonBone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    /// 按名称查找骨骼索引
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    #[inline]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    /// 直接子骨骼（按索引升序）
    ///
    /// 子骨骼必然在父骨骼之后，只需扫描后续骨骼。
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .skip(index + 1)
            .filter(|(_, b)| b.parent == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    /// 参考姿态下到父骨骼的距离
    #[inline]
    pub fn reference_length(&self, index: usize) -> f32 {
        self.bones
            .get(index)
            .map(|b| b.reference_local.translation.length())
            .unwrap_or(0.0)
    }
}

// ============================================================================
// 骨骼引用
// ============================================================================

/// 按名称引用的骨骼，索引在初始化时缓存
///
/// 链重建时需要重新初始化，旧索引随之失效。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoneRef {
    pub name: String,
    index: Option<usize>,
}

impl BoneRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// 解析并缓存骨骼索引
    pub fn initialize(&mut self, skeleton: &ReferenceSkeleton) -> Option<usize> {
        self.index = skeleton.find_bone(&self.name);
        self.index
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn bone(name: &str, parent: Option<usize>) -> SkeletonBone {
        SkeletonBone::new(
            name,
            parent,
            BoneTransform::from_rotation_translation(Default::default(), Vec3::new(0.0, -10.0, 0.0)),
        )
    }

    #[test]
    fn test_children_and_lookup() {
        let skeleton = ReferenceSkeleton::new(vec![
            bone("root", None),
            bone("a", Some(0)),
            bone("b", Some(0)),
            bone("a1", Some(1)),
        ])
        .unwrap();

        assert_eq!(skeleton.children_of(0), vec![1, 2]);
        assert_eq!(skeleton.children_of(1), vec![3]);
        assert!(skeleton.children_of(3).is_empty());
        assert_eq!(skeleton.find_bone("a1"), Some(3));
        assert_eq!(skeleton.find_bone("missing"), None);
        assert!((skeleton.reference_length(3) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_forward_parent() {
        let result = ReferenceSkeleton::new(vec![bone("root", Some(1)), bone("a", None)]);
        assert!(matches!(result, Err(ChainError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = ReferenceSkeleton::new(vec![bone("root", None), bone("root", Some(0))]);
        assert!(matches!(result, Err(ChainError::DuplicateBone(_))));
    }

    #[test]
    fn test_bone_ref() {
        let skeleton = ReferenceSkeleton::new(vec![bone("root", None), bone("a", Some(0))]).unwrap();
        let mut r = BoneRef::new("a");
        assert!(!r.is_resolved());
        assert_eq!(r.initialize(&skeleton), Some(1));
        let mut missing = BoneRef::new("zzz");
        assert_eq!(missing.initialize(&skeleton), None);
    }
}
