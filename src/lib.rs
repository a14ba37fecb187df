//! 骨骼链二次运动引擎
//!
//! 为头发、马尾、布条、挂件等骨骼链计算每帧的二次运动（惯性、摆动、碰撞）。
//!
//! 模块划分：
//! - `skeleton`: 骨骼层级、姿态输入、变换类型
//! - `curve`: 参数响应曲线
//! - `physics`: 链构建、积分、约束求解、结果合成、帧控制

pub mod curve;
pub mod physics;
pub mod skeleton;

use thiserror::Error;

pub use curve::{BezierCurve, KeyedCurve, ResponseCurve};
pub use physics::{
    BodySetup, BoneTransformOutput, CapsuleLimit, ChainConfig, ChainSimulation, FrameContext,
    GravityMethod, LimitAnchor, LimitsAsset, ParameterCurves, PhysicsAsset, PhysicsSettings, PlanarLimit,
    ShapeElement, ShapeKind, SphereLimitMethod, SphericalLimit, SphericalLimitType, WindField,
};
pub use skeleton::{BoneTransform, ComponentPose, ForwardAxis, PlanarAxis, PoseSource, ReferenceSkeleton};

/// 引擎错误类型
///
/// 只在构建/校验阶段返回；每帧求值从不失败，而是降级为跳过。
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid bone hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Duplicate bone name: {0}")]
    DuplicateBone(String),

    #[error("Invalid curve: {0}")]
    InvalidCurve(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
