//! 骨骼链物理模拟实例
//!
//! 每次求值的流程：
//! [必要时重建链] → 参数分布 → 限制更新 → 积分 + 约束（逐粒子）→ 输出
//!
//! 实例独占自己的链与限制数组，不跨实例共享，也不需要加锁。

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Quat, Vec3};

use crate::skeleton::{BoneTransform, PoseSource, ReferenceSkeleton};
use crate::Result;

use super::chain::{Chain, ChainLayout, Particle};
use super::compositor::{compose_output, BoneTransformOutput};
use super::config::{get_config, ChainConfig};
use super::integrator::{integrate_particle, StepInput, WindInput};
use super::limits::{LimitSet, LimitsAsset};
use super::settings::distribute_settings;
use super::shapes::PhysicsAsset;
use super::solver::{solve_particle, ObstacleSet, SolverContext};
use super::wind::{GustSampler, RandomGust, WindField};

/// 单次求值的外部输入
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub skeleton: &'a ReferenceSkeleton,
    /// 本帧组件空间姿态
    pub pose: &'a dyn PoseSource,
    /// 组件的世界变换
    pub component_transform: BoneTransform,
    /// 距上次求值的时间（秒）
    pub delta_time: f32,
    pub wind: Option<&'a dyn WindField>,
}

bitflags! {
    /// 需要整体重建链的配置变化
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TopologyChange: u8 {
        const ROOT_BONE = 1 << 0;
        const EXCLUDE_BONES = 1 << 1;
        const DUMMY_LENGTH = 1 << 2;
        /// 形状碰撞开关或资源
        const SHAPE_ASSET = 1 << 3;
    }
}

#[inline]
fn same_arc<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// 构建链时的拓扑相关配置
#[derive(Clone, Debug)]
struct TopologySnapshot {
    root_bone: String,
    exclude_bones: Vec<String>,
    dummy_bone_length: f32,
    shape_asset: Option<Arc<PhysicsAsset>>,
}

impl TopologySnapshot {
    fn capture(config: &ChainConfig) -> Self {
        Self {
            root_bone: config.root_bone.clone(),
            exclude_bones: config.exclude_bones.clone(),
            dummy_bone_length: config.dummy_bone_length,
            shape_asset: config.shape_asset().cloned(),
        }
    }

    fn diff(&self, config: &ChainConfig) -> TopologyChange {
        let mut changes = TopologyChange::empty();
        if self.root_bone != config.root_bone {
            changes |= TopologyChange::ROOT_BONE;
        }
        if self.exclude_bones != config.exclude_bones {
            changes |= TopologyChange::EXCLUDE_BONES;
        }
        if self.dummy_bone_length != config.dummy_bone_length {
            changes |= TopologyChange::DUMMY_LENGTH;
        }
        if !same_arc(self.shape_asset.as_ref(), config.shape_asset()) {
            changes |= TopologyChange::SHAPE_ASSET;
        }
        changes
    }
}

/// 骨骼链物理模拟
pub struct ChainSimulation {
    config: ChainConfig,
    chain: Chain,
    limits: LimitSet,
    /// 当前链对应的拓扑配置，`None` 表示尚未构建
    topology: Option<TopologySnapshot>,
    /// 已载入的共享限制资源
    applied_limits_asset: Option<Arc<LimitsAsset>>,
    limits_dirty: bool,
    settings_applied: bool,
    /// 上一帧组件世界变换
    prev_component: Option<BoneTransform>,
    /// 上一帧时间步长，用于速度估计
    delta_time_old: f32,
    gust: Box<dyn GustSampler>,
    /// 已警告过的缺失根骨骼名
    warned_root: Option<String>,
    /// 上一次模拟中跳过的不支持形状数
    skipped_shapes: usize,
}

impl Default for ChainSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainSimulation {
    /// 以全局默认配置创建（复制一份，之后不再读取全局配置）
    pub fn new() -> Self {
        let config = get_config();
        match config.validate() {
            Ok(()) => Self::from_valid_config(config),
            Err(e) => {
                log::warn!("全局默认配置无效（{}），改用内置默认值", e);
                Self::from_valid_config(ChainConfig::default())
            }
        }
    }

    /// 以指定配置创建
    pub fn with_config(config: ChainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ChainConfig) -> Self {
        let delta_time_old = 1.0 / config.target_framerate;
        Self {
            config,
            chain: Chain::default(),
            limits: LimitSet::default(),
            topology: None,
            applied_limits_asset: None,
            limits_dirty: true,
            settings_applied: false,
            prev_component: None,
            delta_time_old,
            gust: Box::new(RandomGust::from_entropy()),
            warned_root: None,
            skipped_shapes: 0,
        }
    }

    /// 替换阵风倍率来源
    pub fn with_gust_sampler(mut self, sampler: impl GustSampler + 'static) -> Self {
        self.gust = Box::new(sampler);
        self
    }

    pub fn set_gust_sampler(&mut self, sampler: impl GustSampler + 'static) {
        self.gust = Box::new(sampler);
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// 运行时修改配置
    ///
    /// 拓扑相关的修改在下次求值时触发重建；内联限制列表在下次求值时重新载入。
    /// 数值不做校验，需要校验时使用 [`ChainSimulation::set_config`]。
    pub fn config_mut(&mut self) -> &mut ChainConfig {
        self.limits_dirty = true;
        self.settings_applied = false;
        &mut self.config
    }

    /// 校验后整体替换配置
    pub fn set_config(&mut self, config: ChainConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.limits_dirty = true;
        self.settings_applied = false;
        Ok(())
    }

    /// 丢弃链与历史状态，下次求值时从当前姿态重新构建
    pub fn reset(&mut self) {
        self.chain = Chain::default();
        self.topology = None;
        self.limits_dirty = true;
        self.settings_applied = false;
        self.prev_component = None;
        self.delta_time_old = 1.0 / self.config.target_framerate;
        if self.config.debug_log {
            log::debug!("骨骼链 '{}' 已重置", self.config.root_bone);
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.chain.particles
    }

    pub fn total_length(&self) -> f32 {
        self.chain.total_length
    }

    pub fn limits(&self) -> &LimitSet {
        &self.limits
    }

    /// 上一次模拟中跳过的盒、凸包、锥形胶囊形状数（限制与形状碰撞合计）
    pub fn skipped_shapes(&self) -> usize {
        self.skipped_shapes
    }

    pub fn is_built(&self) -> bool {
        self.topology.is_some() && !self.chain.is_empty()
    }

    /// 求值一帧
    ///
    /// 链为空（根骨骼不可用）时返回空列表；`delta_time <= 0` 时跳过积分但照常输出。
    pub fn evaluate(&mut self, ctx: &FrameContext) -> Vec<BoneTransformOutput> {
        let changes = match &self.topology {
            Some(snapshot) => snapshot.diff(&self.config),
            None => TopologyChange::all(),
        };
        if self.chain.is_empty() || !changes.is_empty() {
            if self.topology.is_some() && !changes.is_empty() {
                log::debug!("骨骼链拓扑变化 {:?}，重建", changes);
            }
            self.rebuild(ctx);
        }
        if self.chain.is_empty() {
            return Vec::new();
        }

        if !self.settings_applied || self.config.update_settings_in_game {
            distribute_settings(&mut self.chain, &self.config.physics_settings, &self.config.curves);
            self.settings_applied = true;
        }

        let asset_changed = !same_arc(self.applied_limits_asset.as_ref(), self.config.limits_asset.as_ref());
        if self.limits_dirty || asset_changed {
            self.limits.apply(
                &self.config.spherical_limits,
                &self.config.capsule_limits,
                &self.config.planar_limits,
                self.config.limits_asset.as_deref(),
                ctx.skeleton,
            );
            self.applied_limits_asset = self.config.limits_asset.clone();
            self.limits_dirty = false;
        }
        self.limits.update(ctx.skeleton, ctx.pose);

        self.chain
            .refresh_pose(ctx.pose, self.config.bone_forward_axis, self.config.dummy_bone_length);

        let (move_vector, move_rotation) = self.component_motion(ctx.component_transform);

        if ctx.delta_time > 0.0 {
            self.simulate(ctx, move_vector, move_rotation);
            self.delta_time_old = ctx.delta_time;
        }

        compose_output(&mut self.chain.particles, self.config.bone_forward_axis)
    }

    fn rebuild(&mut self, ctx: &FrameContext) {
        let layout = ChainLayout {
            root_bone: &self.config.root_bone,
            exclude_bones: &self.config.exclude_bones,
            dummy_bone_length: self.config.dummy_bone_length,
            forward_axis: self.config.bone_forward_axis,
            shape_asset: self.config.shape_asset().map(Arc::as_ref),
        };
        self.chain = Chain::build(ctx.skeleton, ctx.pose, &layout);
        self.topology = Some(TopologySnapshot::capture(&self.config));
        self.settings_applied = false;
        self.limits_dirty = true;
        self.prev_component = Some(ctx.component_transform);

        if self.chain.is_empty() {
            if self.warned_root.as_deref() != Some(self.config.root_bone.as_str()) {
                log::warn!("根骨骼 '{}' 不存在或不可用，物理链为空", self.config.root_bone);
                self.warned_root = Some(self.config.root_bone.clone());
            }
            return;
        }
        self.warned_root = None;

        let assets = [self.config.shape_asset(), self.config.limit_asset()];
        for body in assets.into_iter().flatten().flat_map(|asset| asset.bodies.iter()) {
            if ctx.skeleton.find_bone(&body.bone_name).is_none() {
                log::warn!("物理资源刚体引用的骨骼 '{}' 不存在", body.bone_name);
            }
        }

        log::info!(
            "骨骼链 '{}' 构建完成: {} 个粒子（虚拟 {}），总长度 {:.3}",
            self.config.root_bone,
            self.chain.len(),
            self.chain.dummy_count(),
            self.chain.total_length
        );
    }

    /// 组件本帧的平移/旋转增量，超过阈值视为瞬移
    fn component_motion(&mut self, current: BoneTransform) -> (Vec3, Quat) {
        let prev = self.prev_component.unwrap_or(current);
        self.prev_component = Some(current);

        let mut move_vector = current.inverse_transform_position(prev.translation);
        let distance_threshold = self.config.teleport_distance_threshold;
        if move_vector.length_squared() > distance_threshold * distance_threshold {
            log::debug!("组件位移 {:.1} 超过瞬移阈值，忽略平移跟随", move_vector.length());
            move_vector = Vec3::ZERO;
        }

        let mut move_rotation = current.inverse_transform_rotation(prev.rotation);
        let rotation_threshold = self.config.teleport_rotation_threshold;
        if rotation_threshold >= 0.0 {
            let angle = move_rotation.angle_between(Quat::IDENTITY).to_degrees();
            if angle > rotation_threshold {
                log::debug!("组件旋转 {:.1}° 超过瞬移阈值，忽略旋转跟随", angle);
                move_rotation = Quat::IDENTITY;
            }
        }

        (move_vector, move_rotation)
    }

    fn simulate(&mut self, ctx: &FrameContext, move_vector: Vec3, move_rotation: Quat) {
        let config = &self.config;
        let wind = match (config.enable_wind, ctx.wind) {
            (true, Some(field)) => Some(WindInput {
                field,
                scale: config.wind_scale,
            }),
            _ => None,
        };
        let step = StepInput {
            component: ctx.component_transform,
            move_vector,
            move_rotation,
            gravity: ctx.component_transform.inverse_transform_vector(config.gravity),
            delta_time: ctx.delta_time,
            delta_time_old: self.delta_time_old,
            target_framerate: config.target_framerate,
            gravity_method: config.gravity_method,
            forward_axis: config.bone_forward_axis,
            wind,
        };

        let obstacles = ObstacleSet::gather(
            &self.limits,
            config.limit_asset().map(Arc::as_ref),
            ctx.skeleton,
            ctx.pose,
        );
        let solver = SolverContext {
            obstacles: &obstacles,
            shapes: config.shape_asset().map(Arc::as_ref),
            sphere_limit_method: config.sphere_limit_method,
            planar_constraint: config.planar_constraint,
        };

        let mut skipped = obstacles.unsupported_count();
        let particles = &mut self.chain.particles;
        for i in 0..particles.len() {
            if !particles[i].pose_valid {
                continue;
            }
            integrate_particle(particles, i, &step, self.gust.as_mut());
            if !particles[i].is_root() {
                skipped += solve_particle(particles, i, &solver);
            }
        }
        self.skipped_shapes = skipped;

        if config.debug_log {
            log::debug!(
                "骨骼链 '{}': dt={:.4}, 障碍物 {} 个（跳过 {} 个不支持的形状）",
                config.root_bone,
                ctx.delta_time,
                obstacles.len(),
                skipped
            );
        }
    }
}
