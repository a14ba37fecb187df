//! 外部物理资源的碰撞形状
//!
//! 形状按骨骼名称挂在刚体设置上。目前只有球与胶囊参与推出，
//! 盒、凸包、锥形胶囊能被识别但不做处理。

use glam::{Quat, Vec3};

use crate::skeleton::BoneTransform;

/// 形状类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeCategory {
    Sphere,
    Capsule,
    Box,
    Convex,
    TaperedCapsule,
}

/// 形状几何
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    /// 核心线段沿本地 Z 轴
    Capsule { radius: f32, length: f32 },
    Box { extent: Vec3 },
    Convex { vertices: Vec<Vec3> },
    TaperedCapsule { radius0: f32, radius1: f32, length: f32 },
}

/// 挂在骨骼上的单个形状
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeElement {
    /// 骨骼空间中心（未缩放）
    pub center: Vec3,
    pub rotation: Quat,
    pub kind: ShapeKind,
}

/// 放到组件空间后的形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolvedShape {
    Sphere { center: Vec3, radius: f32 },
    Capsule { start: Vec3, end: Vec3, radius: f32 },
    /// 尚未实现推出的类别
    Unsupported(ShapeCategory),
}

impl ShapeElement {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            rotation: Quat::IDENTITY,
            kind: ShapeKind::Sphere { radius },
        }
    }

    pub fn capsule(center: Vec3, rotation: Quat, radius: f32, length: f32) -> Self {
        Self {
            center,
            rotation,
            kind: ShapeKind::Capsule { radius, length },
        }
    }

    pub fn category(&self) -> ShapeCategory {
        match self.kind {
            ShapeKind::Sphere { .. } => ShapeCategory::Sphere,
            ShapeKind::Capsule { .. } => ShapeCategory::Capsule,
            ShapeKind::Box { .. } => ShapeCategory::Box,
            ShapeKind::Convex { .. } => ShapeCategory::Convex,
            ShapeKind::TaperedCapsule { .. } => ShapeCategory::TaperedCapsule,
        }
    }

    /// 尺寸为零的球/胶囊不参与碰撞
    pub fn is_degenerate(&self) -> bool {
        match self.kind {
            ShapeKind::Sphere { radius } => radius <= 0.0,
            ShapeKind::Capsule { radius, length } => radius <= 0.0 || length <= 0.0,
            _ => false,
        }
    }

    /// 放到骨骼变换之下
    ///
    /// `bone` 不带缩放；`scale` 只作用于形状中心的平移，半径与长度保持原值。
    pub fn resolve(&self, bone: &BoneTransform, scale: f32) -> ResolvedShape {
        let center = bone.rotation * (self.center * scale) + bone.translation;
        match self.kind {
            ShapeKind::Sphere { radius } => ResolvedShape::Sphere { center, radius },
            ShapeKind::Capsule { radius, length } => {
                let axis = (bone.rotation * self.rotation) * Vec3::Z;
                let half = axis * (length * 0.5);
                ResolvedShape::Capsule {
                    start: center + half,
                    end: center - half,
                    radius,
                }
            }
            ShapeKind::Box { .. } | ShapeKind::Convex { .. } | ShapeKind::TaperedCapsule { .. } => {
                ResolvedShape::Unsupported(self.category())
            }
        }
    }
}

/// 单根骨骼的刚体设置
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodySetup {
    pub bone_name: String,
    pub elements: Vec<ShapeElement>,
}

impl BodySetup {
    pub fn new(bone_name: impl Into<String>, elements: Vec<ShapeElement>) -> Self {
        Self {
            bone_name: bone_name.into(),
            elements,
        }
    }

    /// 解析全部形状，返回指定类别中第一个非退化形状
    ///
    /// 单次迭代无法同时满足多个形状的推出，每类只处理一个。
    /// 盒、凸包、锥形胶囊同样被解析，计入 `skipped` 后跳过。
    pub fn resolve_first(
        &self,
        category: ShapeCategory,
        bone: &BoneTransform,
        scale: f32,
        skipped: &mut usize,
    ) -> Option<ResolvedShape> {
        let mut found = None;
        for element in self.elements.iter().filter(|e| !e.is_degenerate()) {
            match element.resolve(bone, scale) {
                ResolvedShape::Unsupported(_) => *skipped += 1,
                shape if found.is_none() && element.category() == category => found = Some(shape),
                _ => {}
            }
        }
        found
    }
}

/// 物理资源
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicsAsset {
    pub bodies: Vec<BodySetup>,
}

impl PhysicsAsset {
    pub fn new(bodies: Vec<BodySetup>) -> Self {
        Self { bodies }
    }

    /// 按骨骼名称查找刚体设置（每根骨骼只取第一个）
    pub fn find_body(&self, bone_name: &str) -> Option<usize> {
        self.bodies.iter().position(|b| b.bone_name == bone_name)
    }

    #[inline]
    pub fn body(&self, index: usize) -> Option<&BodySetup> {
        self.bodies.get(index)
    }
}
