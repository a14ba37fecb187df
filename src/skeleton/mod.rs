//! 骨骼系统 - 物理链的外部协作层
//!
//! 核心设计思想：
//! - ReferenceSkeleton: 骨骼层级与参考姿态（名称、父子关系）
//! - PoseSource: 每帧由宿主提供的组件空间姿态
//! - BoneTransform: 平移/旋转/缩放三元组

mod pose;
mod reference;

pub use pose::{ComponentPose, PoseSource};
pub use reference::{BoneRef, ReferenceSkeleton, SkeletonBone};

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { translation, rotation, scale }
    }

    /// 无缩放变换
    #[inline]
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    /// 局部点 → 当前空间
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.translation
    }

    /// 当前空间点 → 局部
    #[inline]
    pub fn inverse_transform_position(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) * safe_reciprocal(self.scale)
    }

    /// 当前空间方向 → 局部
    #[inline]
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        (self.rotation.inverse() * vector) * safe_reciprocal(self.scale)
    }

    /// 当前空间旋转 → 局部
    #[inline]
    pub fn inverse_transform_rotation(&self, rotation: Quat) -> Quat {
        self.rotation.inverse() * rotation
    }

    /// 相对于 `parent` 的局部变换（parent⁻¹ · self）
    pub fn relative_to(&self, parent: &BoneTransform) -> BoneTransform {
        Self::from_matrix(parent.to_matrix().inverse() * self.to_matrix())
    }

    /// 将局部变换 `local` 挂到 self 之下（self · local）
    pub fn compose(&self, local: &BoneTransform) -> BoneTransform {
        Self::from_matrix(self.to_matrix() * local.to_matrix())
    }

    /// 缩放分量绝对值的最大值（形状按统一缩放处理）
    #[inline]
    pub fn max_abs_scale(&self) -> f32 {
        self.scale.abs().max_element()
    }

    /// 缩放的行列式接近零，矩阵不可逆
    #[inline]
    pub fn is_singular(&self) -> bool {
        (self.scale.x * self.scale.y * self.scale.z).abs() < 1.0e-8
    }

    /// 去掉缩放
    #[inline]
    pub fn without_scale(&self) -> BoneTransform {
        Self::from_rotation_translation(self.rotation, self.translation)
    }
}

#[inline]
fn safe_reciprocal(v: Vec3) -> Vec3 {
    let r = |x: f32| if x == 0.0 { 0.0 } else { 1.0 / x };
    Vec3::new(r(v.x), r(v.y), r(v.z))
}

// ============================================================================
// 骨骼轴约定
// ============================================================================

/// 骨骼朝向子骨骼的本地轴
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForwardAxis {
    #[default]
    XPositive,
    XNegative,
    YPositive,
    YNegative,
    ZPositive,
    ZNegative,
}

impl ForwardAxis {
    /// 本地空间中的带符号单位轴
    #[inline]
    pub fn local_vector(self) -> Vec3 {
        match self {
            ForwardAxis::XPositive => Vec3::X,
            ForwardAxis::XNegative => Vec3::NEG_X,
            ForwardAxis::YPositive => Vec3::Y,
            ForwardAxis::YNegative => Vec3::NEG_Y,
            ForwardAxis::ZPositive => Vec3::Z,
            ForwardAxis::ZNegative => Vec3::NEG_Z,
        }
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            ForwardAxis::XNegative | ForwardAxis::YNegative | ForwardAxis::ZNegative
        )
    }

    /// 给定旋转下的前向方向
    #[inline]
    pub fn forward_vector(self, rotation: Quat) -> Vec3 {
        rotation * self.local_vector()
    }
}

/// 平面约束轴（相对父骨骼的姿态旋转）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlanarAxis {
    #[default]
    None,
    X,
    Y,
    Z,
}

impl PlanarAxis {
    /// 约束平面法线，`None` 表示不约束
    pub fn normal(self, rotation: Quat) -> Option<Vec3> {
        match self {
            PlanarAxis::None => None,
            PlanarAxis::X => Some(rotation * Vec3::X),
            PlanarAxis::Y => Some(rotation * Vec3::Y),
            PlanarAxis::Z => Some(rotation * Vec3::Z),
        }
    }
}
