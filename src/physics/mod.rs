//! 物理系统 - 骨骼链二次运动
//!
//! 核心设计思想：
//! - Chain: 根骨骼向下的粒子数组，父粒子索引总小于子粒子
//! - 积分与约束逐粒子单遍完成，不做迭代
//! - ChainSimulation: 每个实例独占自己的链、限制与历史状态

mod chain;
mod compositor;
mod config;
mod geometry;
mod integrator;
mod limits;
mod settings;
mod shapes;
mod simulation;
mod solver;
mod wind;

pub use chain::{Chain, ChainLayout, Particle};
pub use compositor::BoneTransformOutput;
pub use config::{get_config, reset_config, set_config, ChainConfig, GravityMethod, SphereLimitMethod};
pub use geometry::Plane;
pub use limits::{
    CapsuleLimit, LimitAnchor, LimitGroup, LimitSet, LimitsAsset, PlanarLimit, SphericalLimit, SphericalLimitType,
};
pub use settings::{ParameterCurves, PhysicsSettings};
pub use shapes::{BodySetup, PhysicsAsset, ResolvedShape, ShapeCategory, ShapeElement, ShapeKind};
pub use simulation::{ChainSimulation, FrameContext, TopologyChange};
pub use solver::{Collider, Obstacle};
pub use wind::{ConstantGust, DirectionalWind, GustSampler, RandomGust, WindField, WindSample};
