//! 碰撞限制图元（球、胶囊、平面）
//!
//! 每个图元有作者设定的局部偏移和可选的驱动骨骼；
//! 每帧根据驱动骨骼的姿态重新计算组件空间下的实际位置。

use glam::{Quat, Vec3};

use crate::skeleton::{BoneRef, BoneTransform, PoseSource, ReferenceSkeleton};

use super::geometry::Plane;

// ============================================================================
// 锚点
// ============================================================================

/// 图元的驱动骨骼、局部偏移与本帧位置
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LimitAnchor {
    /// 驱动骨骼，`None` 表示偏移直接位于组件空间（静态限制）
    pub driving_bone: Option<BoneRef>,
    pub offset_location: Vec3,
    pub offset_rotation: Quat,
    /// 本帧组件空间位置
    pub location: Vec3,
    /// 本帧组件空间旋转
    pub rotation: Quat,
}

impl LimitAnchor {
    /// 静态锚点
    pub fn fixed(location: Vec3, rotation: Quat) -> Self {
        Self {
            driving_bone: None,
            offset_location: location,
            offset_rotation: rotation,
            location,
            rotation,
        }
    }

    /// 挂在骨骼上的锚点，偏移在骨骼的父空间中施加
    pub fn attached(bone_name: impl Into<String>, offset_location: Vec3, offset_rotation: Quat) -> Self {
        Self {
            driving_bone: Some(BoneRef::new(bone_name)),
            offset_location,
            offset_rotation,
            location: offset_location,
            rotation: offset_rotation,
        }
    }

    fn initialize(&mut self, skeleton: &ReferenceSkeleton) {
        if let Some(bone) = self.driving_bone.as_mut() {
            if bone.initialize(skeleton).is_none() {
                log::warn!("限制图元的驱动骨骼 '{}' 不存在，按静态限制处理", bone.name);
            }
        }
    }

    /// 根据驱动骨骼姿态刷新位置
    ///
    /// 驱动骨骼不可用或缩放退化时按静态限制处理。
    pub fn update(&mut self, skeleton: &ReferenceSkeleton, pose: &dyn PoseSource) {
        let driven = self
            .driving_bone
            .as_ref()
            .and_then(BoneRef::index)
            .and_then(|index| {
                let bone_cs = pose.component_space_transform(index)?;
                let parent_cs = skeleton
                    .parent_of(index)
                    .and_then(|p| pose.component_space_transform(p))
                    .unwrap_or(BoneTransform::IDENTITY);
                (!bone_cs.is_singular() && !parent_cs.is_singular()).then_some((bone_cs, parent_cs))
            });

        match driven {
            Some((bone_cs, parent_cs)) => {
                // 组件空间 → 骨骼空间，施加偏移，再转回组件空间
                let mut local = bone_cs.relative_to(&parent_cs);
                local.rotation = self.offset_rotation * local.rotation;
                local.translation += self.offset_location;
                let cs = parent_cs.compose(&local);

                self.location = cs.translation;
                self.rotation = cs.rotation.normalize();
            }
            None => {
                self.location = self.offset_location;
                self.rotation = self.offset_rotation.normalize();
            }
        }
    }
}

// ============================================================================
// 图元
// ============================================================================

/// 球限制类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SphericalLimitType {
    /// 障碍物：粒子保持在球外
    #[default]
    Outer,
    /// 容器：粒子保持在球内
    Inner,
}

/// 球限制
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SphericalLimit {
    pub anchor: LimitAnchor,
    pub radius: f32,
    pub limit_type: SphericalLimitType,
}

impl SphericalLimit {
    pub fn new(anchor: LimitAnchor, radius: f32, limit_type: SphericalLimitType) -> Self {
        Self { anchor, radius, limit_type }
    }

    #[inline]
    pub fn location(&self) -> Vec3 {
        self.anchor.location
    }
}

/// 胶囊限制，核心线段沿本地 Z 轴
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapsuleLimit {
    pub anchor: LimitAnchor,
    pub radius: f32,
    pub length: f32,
}

impl CapsuleLimit {
    pub fn new(anchor: LimitAnchor, radius: f32, length: f32) -> Self {
        Self { anchor, radius, length }
    }

    /// 核心线段端点
    pub fn segment(&self) -> (Vec3, Vec3) {
        let half = self.anchor.rotation * Vec3::Z * (self.length * 0.5);
        (self.anchor.location + half, self.anchor.location - half)
    }
}

/// 平面限制，粒子保持在本地 Z 轴（上方向）一侧
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanarLimit {
    pub anchor: LimitAnchor,
    /// 本帧平面
    pub plane: Plane,
}

impl PlanarLimit {
    pub fn new(anchor: LimitAnchor) -> Self {
        let plane = Plane::from_point_normal(anchor.location, anchor.rotation * Vec3::Z);
        Self { anchor, plane }
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.anchor.rotation * Vec3::Z
    }
}

// ============================================================================
// 限制集合
// ============================================================================

/// 共享限制资源
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LimitsAsset {
    pub spherical_limits: Vec<SphericalLimit>,
    pub capsule_limits: Vec<CapsuleLimit>,
    pub planar_limits: Vec<PlanarLimit>,
}

/// 一组限制图元
#[derive(Clone, Debug, Default)]
pub struct LimitGroup {
    pub spheres: Vec<SphericalLimit>,
    pub capsules: Vec<CapsuleLimit>,
    pub planes: Vec<PlanarLimit>,
}

impl LimitGroup {
    fn assign(
        &mut self,
        spheres: &[SphericalLimit],
        capsules: &[CapsuleLimit],
        planes: &[PlanarLimit],
        skeleton: &ReferenceSkeleton,
    ) {
        self.spheres.clear();
        self.spheres.extend_from_slice(spheres);
        self.capsules.clear();
        self.capsules.extend_from_slice(capsules);
        self.planes.clear();
        self.planes.extend_from_slice(planes);

        self.spheres.iter_mut().for_each(|s| s.anchor.initialize(skeleton));
        self.capsules.iter_mut().for_each(|c| c.anchor.initialize(skeleton));
        self.planes.iter_mut().for_each(|p| p.anchor.initialize(skeleton));
    }

    fn update(&mut self, skeleton: &ReferenceSkeleton, pose: &dyn PoseSource) {
        for sphere in &mut self.spheres {
            sphere.anchor.update(skeleton, pose);
        }
        for capsule in &mut self.capsules {
            capsule.anchor.update(skeleton, pose);
        }
        for planar in &mut self.planes {
            planar.anchor.update(skeleton, pose);
            planar.plane = Plane::from_point_normal(planar.anchor.location, planar.up());
        }
    }

    fn clear(&mut self) {
        self.spheres.clear();
        self.capsules.clear();
        self.planes.clear();
    }
}

/// 运行时限制集合：内联列表 + 共享资源列表，拼接而不合并
#[derive(Clone, Debug, Default)]
pub struct LimitSet {
    pub inline: LimitGroup,
    pub asset: LimitGroup,
}

impl LimitSet {
    /// 重新载入两组限制并解析驱动骨骼
    pub fn apply(
        &mut self,
        spheres: &[SphericalLimit],
        capsules: &[CapsuleLimit],
        planes: &[PlanarLimit],
        asset: Option<&LimitsAsset>,
        skeleton: &ReferenceSkeleton,
    ) {
        self.inline.assign(spheres, capsules, planes, skeleton);
        match asset {
            Some(asset) => self.asset.assign(
                &asset.spherical_limits,
                &asset.capsule_limits,
                &asset.planar_limits,
                skeleton,
            ),
            None => self.asset.clear(),
        }
    }

    /// 刷新所有图元本帧的组件空间位置
    pub fn update(&mut self, skeleton: &ReferenceSkeleton, pose: &dyn PoseSource) {
        self.inline.update(skeleton, pose);
        self.asset.update(skeleton, pose);
    }

    pub fn spheres(&self) -> impl Iterator<Item = &SphericalLimit> {
        self.inline.spheres.iter().chain(self.asset.spheres.iter())
    }

    pub fn capsules(&self) -> impl Iterator<Item = &CapsuleLimit> {
        self.inline.capsules.iter().chain(self.asset.capsules.iter())
    }

    pub fn planes(&self) -> impl Iterator<Item = &PlanarLimit> {
        self.inline.planes.iter().chain(self.asset.planes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{ComponentPose, SkeletonBone};
    use std::f32::consts::FRAC_PI_2;

    fn skeleton() -> ReferenceSkeleton {
        ReferenceSkeleton::new(vec![
            SkeletonBone::new(
                "root",
                None,
                BoneTransform::from_rotation_translation(Quat::IDENTITY, Vec3::new(0.0, 0.0, 100.0)),
            ),
            SkeletonBone::new(
                "head",
                Some(0),
                BoneTransform::from_rotation_translation(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 0.0, 50.0)),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_static_anchor_uses_offset() {
        let skeleton = skeleton();
        let pose = ComponentPose::reference(&skeleton);
        let mut anchor = LimitAnchor::fixed(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        anchor.location = Vec3::ZERO;
        anchor.update(&skeleton, &pose);
        assert_eq!(anchor.location, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_driven_anchor_offset_in_parent_space() {
        let skeleton = skeleton();
        let pose = ComponentPose::reference(&skeleton);
        let mut anchor = LimitAnchor::attached("head", Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY);
        anchor.initialize(&skeleton);
        anchor.update(&skeleton, &pose);

        // head 位于 (0,0,150)，偏移在父空间（root 无旋转）中施加
        assert!(anchor.location.abs_diff_eq(Vec3::new(10.0, 0.0, 150.0), 1e-4));
        assert!(anchor.rotation.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_2), 1e-4));
    }

    #[test]
    fn test_unresolved_driver_falls_back_to_static() {
        let skeleton = skeleton();
        let pose = ComponentPose::reference(&skeleton);
        let mut anchor = LimitAnchor::attached("missing", Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY);
        anchor.initialize(&skeleton);
        anchor.update(&skeleton, &pose);
        assert_eq!(anchor.location, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_scale_driver_falls_back_to_static() {
        let skeleton = skeleton();
        let mut anchor = LimitAnchor::attached("head", Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY);
        anchor.initialize(&skeleton);

        // 驱动骨骼缩放为零，矩阵不可逆
        let mut pose = ComponentPose::reference(&skeleton);
        pose.set(1, Some(BoneTransform::new(Vec3::new(0.0, 0.0, 150.0), Quat::IDENTITY, Vec3::ZERO)));
        anchor.update(&skeleton, &pose);
        assert!(anchor.location.is_finite());
        assert_eq!(anchor.location, Vec3::new(10.0, 0.0, 0.0));
        assert!(anchor.rotation.is_finite());

        // 父骨骼缩放为零同样退回静态偏移
        let mut pose = ComponentPose::reference(&skeleton);
        pose.set(0, Some(BoneTransform::new(Vec3::new(0.0, 0.0, 100.0), Quat::IDENTITY, Vec3::ZERO)));
        anchor.update(&skeleton, &pose);
        assert_eq!(anchor.location, Vec3::new(10.0, 0.0, 0.0));

        // 恢复正常姿态后重新跟随驱动骨骼
        anchor.update(&skeleton, &ComponentPose::reference(&skeleton));
        assert!(anchor.location.abs_diff_eq(Vec3::new(10.0, 0.0, 150.0), 1e-4));
    }

    #[test]
    fn test_plane_and_capsule_geometry() {
        let skeleton = skeleton();
        let pose = ComponentPose::reference(&skeleton);
        let mut set = LimitSet::default();
        let asset = LimitsAsset {
            planar_limits: vec![PlanarLimit::new(LimitAnchor::fixed(
                Vec3::new(0.0, 0.0, 5.0),
                Quat::from_rotation_x(FRAC_PI_2),
            ))],
            ..LimitsAsset::default()
        };
        set.apply(
            &[],
            &[CapsuleLimit::new(LimitAnchor::fixed(Vec3::ZERO, Quat::IDENTITY), 1.0, 10.0)],
            &[],
            Some(&asset),
            &skeleton,
        );
        set.update(&skeleton, &pose);

        let (start, end) = set.capsules().next().unwrap().segment();
        assert!(start.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-6));
        assert!(end.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-6));

        let plane = &set.planes().next().unwrap().plane;
        // 绕 X 转 90°，上方向变为 -Y
        assert!(plane.normal.abs_diff_eq(Vec3::NEG_Y, 1e-6));
        assert_eq!(set.planes().count(), 1);
    }
}
