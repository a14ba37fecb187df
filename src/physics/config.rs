//! 骨骼链物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 全局实例只是新模拟实例的默认模板：`ChainSimulation::new()` 创建时复制一份，
//! 之后实例只读取自己的配置。

use std::sync::{Arc, RwLock};

use glam::Vec3;
use once_cell::sync::Lazy;

use crate::skeleton::{ForwardAxis, PlanarAxis};
use crate::{ChainError, Result};

use super::limits::{CapsuleLimit, LimitsAsset, PlanarLimit, SphericalLimit};
use super::settings::{ParameterCurves, PhysicsSettings};
use super::shapes::PhysicsAsset;

/// 重力积分方式（版本兼容开关）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GravityMethod {
    /// 位移 = 0.5 · g · dt²
    #[default]
    Current,
    /// 位移 = g · dt（旧版本行为）
    Legacy,
}

/// 内侧球限制的推回方式（版本兼容开关）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SphereLimitMethod {
    /// 推回到 (球半径 - 粒子半径)
    #[default]
    Current,
    /// 推回到球半径（旧版本行为）
    Legacy,
}

/// 骨骼链物理配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct ChainConfig {
    // ========== 链拓扑 ==========
    /// 根骨骼名称
    pub root_bone: String,
    /// 排除的骨骼（连同其子树）
    pub exclude_bones: Vec<String>,
    /// 叶骨骼末端追加的虚拟骨骼长度，0 表示不追加
    pub dummy_bone_length: f32,
    /// 骨骼指向子骨骼的本地轴
    pub bone_forward_axis: ForwardAxis,
    /// 平面约束轴
    pub planar_constraint: PlanarAxis,

    // ========== 物理参数 ==========
    /// 基础物理参数
    pub physics_settings: PhysicsSettings,
    /// 各参数沿链分布的响应曲线
    pub curves: ParameterCurves,
    /// 每帧重新分布参数（实时调参用），默认只在首帧分布一次
    pub update_settings_in_game: bool,
    /// 目标帧率，刚度与风力按此归一化，默认 60
    pub target_framerate: f32,
    /// 重力（世界空间），默认为零
    pub gravity: Vec3,

    // ========== 风 ==========
    pub enable_wind: bool,
    pub wind_scale: f32,

    // ========== 瞬移检测 ==========
    /// 组件单帧位移超过此距离视为瞬移，默认 300
    pub teleport_distance_threshold: f32,
    /// 组件单帧旋转超过此角度（度）视为瞬移，负数表示不检测，默认 10
    pub teleport_rotation_threshold: f32,

    // ========== 碰撞限制 ==========
    pub spherical_limits: Vec<SphericalLimit>,
    pub capsule_limits: Vec<CapsuleLimit>,
    pub planar_limits: Vec<PlanarLimit>,
    /// 共享限制资源，与内联列表拼接使用
    pub limits_asset: Option<Arc<LimitsAsset>>,

    // ========== 物理资源 ==========
    /// 用骨骼自身的形状代替粒子点参与碰撞
    pub use_physics_asset_as_shapes: bool,
    pub physics_asset_as_shapes: Option<Arc<PhysicsAsset>>,
    /// 把物理资源中的刚体形状当作外侧障碍物
    pub use_physics_asset_as_limits: bool,
    pub physics_asset_as_limits: Option<Arc<PhysicsAsset>>,

    // ========== 版本兼容 ==========
    pub gravity_method: GravityMethod,
    pub sphere_limit_method: SphereLimitMethod,

    // ========== 调试 ==========
    /// 是否输出逐帧调试日志，默认 false
    pub debug_log: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            root_bone: String::new(),
            exclude_bones: Vec::new(),
            dummy_bone_length: 0.0,
            bone_forward_axis: ForwardAxis::XPositive,
            planar_constraint: PlanarAxis::None,

            physics_settings: PhysicsSettings::default(),
            curves: ParameterCurves::default(),
            update_settings_in_game: false,
            // 越高 → 同样的刚度拉得越快
            target_framerate: 60.0,
            gravity: Vec3::ZERO,

            enable_wind: false,
            wind_scale: 1.0,

            teleport_distance_threshold: 300.0,
            teleport_rotation_threshold: 10.0,

            spherical_limits: Vec::new(),
            capsule_limits: Vec::new(),
            planar_limits: Vec::new(),
            limits_asset: None,

            use_physics_asset_as_shapes: false,
            physics_asset_as_shapes: None,
            use_physics_asset_as_limits: false,
            physics_asset_as_limits: None,

            gravity_method: GravityMethod::Current,
            sphere_limit_method: SphereLimitMethod::Current,

            debug_log: false,
        }
    }
}

impl ChainConfig {
    /// 指定根骨骼的默认配置
    pub fn with_root(root_bone: impl Into<String>) -> Self {
        Self {
            root_bone: root_bone.into(),
            ..Self::default()
        }
    }

    /// 校验数值参数
    pub fn validate(&self) -> Result<()> {
        if !(self.target_framerate.is_finite() && self.target_framerate > 0.0) {
            return Err(ChainError::InvalidConfig(format!(
                "target_framerate must be positive, got {}",
                self.target_framerate
            )));
        }
        if !(self.dummy_bone_length.is_finite() && self.dummy_bone_length >= 0.0) {
            return Err(ChainError::InvalidConfig(format!(
                "dummy_bone_length must be non-negative, got {}",
                self.dummy_bone_length
            )));
        }
        if !self.gravity.is_finite() {
            return Err(ChainError::InvalidConfig("gravity must be finite".to_string()));
        }
        if !self.wind_scale.is_finite()
            || !self.teleport_distance_threshold.is_finite()
            || !self.teleport_rotation_threshold.is_finite()
        {
            return Err(ChainError::InvalidConfig(
                "wind scale and teleport thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// 实际生效的形状资源（开关关闭时为 None）
    pub fn shape_asset(&self) -> Option<&Arc<PhysicsAsset>> {
        if self.use_physics_asset_as_shapes {
            self.physics_asset_as_shapes.as_ref()
        } else {
            None
        }
    }

    /// 实际生效的限制用物理资源（开关关闭时为 None）
    pub fn limit_asset(&self) -> Option<&Arc<PhysicsAsset>> {
        if self.use_physics_asset_as_limits {
            self.physics_asset_as_limits.as_ref()
        } else {
            None
        }
    }
}

/// 全局默认配置
static CHAIN_CONFIG: Lazy<RwLock<ChainConfig>> = Lazy::new(|| RwLock::new(ChainConfig::default()));

/// 获取当前默认配置（只读）
pub fn get_config() -> ChainConfig {
    CHAIN_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置默认配置（只影响之后创建的实例）
pub fn set_config(config: ChainConfig) {
    *CHAIN_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *CHAIN_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = ChainConfig::default();
}
