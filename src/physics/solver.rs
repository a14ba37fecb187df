//! 约束求解 - 单遍顺序松弛
//!
//! 每个粒子积分后立即依次处理：碰撞推出 → 角度限制 → 平面约束 → 长度恢复。
//! 后面的步骤不会回头重新检查前面的约束。

use glam::Vec3;

use crate::skeleton::{BoneTransform, PlanarAxis, PoseSource, ReferenceSkeleton};

use super::chain::{split_parent, Particle};
use super::config::SphereLimitMethod;
use super::geometry::{closest_point_on_segment, rotate_angle_axis, segment_closest_points, Plane};
use super::limits::{LimitSet, SphericalLimitType};
use super::shapes::{PhysicsAsset, ResolvedShape, ShapeCategory};

const EPSILON: f32 = 1.0e-8;

// ============================================================================
// 障碍物与碰撞体
// ============================================================================

/// 本帧组件空间中的障碍物
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Obstacle {
    Sphere {
        center: Vec3,
        radius: f32,
        limit_type: SphericalLimitType,
    },
    Capsule {
        start: Vec3,
        end: Vec3,
        radius: f32,
    },
    /// 法线即上方向
    Plane { plane: Plane },
}

/// 被推出的一方
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collider {
    /// 粒子本身或骨骼上的球形状；`trail` 为上一帧位置，用于平面穿透检测
    Sphere { center: Vec3, radius: f32, trail: Vec3 },
    Capsule { start: Vec3, end: Vec3, radius: f32 },
}

impl Collider {
    fn translate(&mut self, offset: Vec3) {
        match self {
            Collider::Sphere { center, .. } => *center += offset,
            Collider::Capsule { start, end, .. } => {
                *start += offset;
                *end += offset;
            }
        }
    }

    fn from_shape(shape: ResolvedShape, trail_offset: Vec3) -> Option<Self> {
        match shape {
            ResolvedShape::Sphere { center, radius } => Some(Collider::Sphere {
                center,
                radius,
                trail: center + trail_offset,
            }),
            ResolvedShape::Capsule { start, end, radius } => Some(Collider::Capsule { start, end, radius }),
            ResolvedShape::Unsupported(_) => None,
        }
    }
}

/// 内侧球的推回边界
///
/// 粒子半径大于球半径时球内没有合法位置，边界取 0，粒子被拉到球心。
#[inline]
fn inner_boundary(sphere_radius: f32, collider_radius: f32, method: SphereLimitMethod) -> f32 {
    match method {
        SphereLimitMethod::Current => (sphere_radius - collider_radius).max(0.0),
        SphereLimitMethod::Legacy => sphere_radius,
    }
}

/// 沿 `offset` 方向把距离推到 `limit`；方向无法确定时不推
#[inline]
fn separate(offset: Vec3, limit: f32) -> Option<Vec3> {
    let dist_sq = offset.length_squared();
    if dist_sq >= limit * limit || dist_sq < EPSILON {
        return None;
    }
    let dist = dist_sq.sqrt();
    Some(offset / dist * (limit - dist))
}

/// 计算碰撞体离开障碍物所需的位移
pub fn push_out(collider: &Collider, obstacle: &Obstacle, method: SphereLimitMethod) -> Option<Vec3> {
    match (*collider, *obstacle) {
        (
            Collider::Sphere { center, radius, .. },
            Obstacle::Sphere {
                center: sphere_center,
                radius: sphere_radius,
                limit_type,
            },
        ) => {
            let offset = center - sphere_center;
            match limit_type {
                SphericalLimitType::Outer => separate(offset, radius + sphere_radius),
                SphericalLimitType::Inner => {
                    let boundary = inner_boundary(sphere_radius, radius, method);
                    if offset.length_squared() < boundary * boundary {
                        return None;
                    }
                    let target = sphere_center + offset.normalize_or_zero() * boundary;
                    Some(target - center)
                }
            }
        }

        (Collider::Sphere { center, radius, .. }, Obstacle::Capsule { start, end, radius: capsule_radius }) => {
            let closest = closest_point_on_segment(center, start, end);
            separate(center - closest, radius + capsule_radius)
        }

        (Collider::Sphere { center, radius, trail }, Obstacle::Plane { plane }) => {
            let on_plane = plane.project_point(center);
            let dist_sq = (center - on_plane).length_squared();
            if dist_sq < radius * radius || plane.segment_intersection(center, trail).is_some() {
                Some(on_plane + plane.normal * radius - center)
            } else {
                None
            }
        }

        (
            Collider::Capsule { start, end, radius },
            Obstacle::Sphere {
                center: sphere_center,
                radius: sphere_radius,
                limit_type,
            },
        ) => match limit_type {
            SphericalLimitType::Outer => {
                let closest = closest_point_on_segment(sphere_center, start, end);
                separate(closest - sphere_center, radius + sphere_radius)
            }
            SphericalLimitType::Inner => {
                // 胶囊放不进球时不处理
                if sphere_radius * 2.0 <= radius * 2.0 + (end - start).length() {
                    return None;
                }
                let boundary = inner_boundary(sphere_radius, radius, method);
                let start_sq = (start - sphere_center).length_squared();
                let end_sq = (end - sphere_center).length_squared();
                let (far, far_sq) = if start_sq >= end_sq { (start, start_sq) } else { (end, end_sq) };
                if far_sq <= boundary * boundary {
                    return None;
                }
                let target = sphere_center + (far - sphere_center).normalize_or_zero() * boundary;
                Some(target - far)
            }
        },

        (Collider::Capsule { start, end, radius }, Obstacle::Capsule { start: other_start, end: other_end, radius: other_radius }) => {
            let (on_self, on_other) = segment_closest_points(start, end, other_start, other_end);
            separate(on_self - on_other, radius + other_radius)
        }

        (Collider::Capsule { start, end, radius }, Obstacle::Plane { plane }) => {
            // 取更深的一端，沿上方向推出
            let depth = plane.signed_distance(start).min(plane.signed_distance(end));
            if depth < radius {
                Some(plane.normal * (radius - depth))
            } else {
                None
            }
        }
    }
}

/// 本帧所有障碍物，按处理顺序排列
#[derive(Clone, Debug, Default)]
pub struct ObstacleSet {
    obstacles: Vec<Obstacle>,
    /// 本帧跳过的形状（盒、凸包、锥形胶囊）
    unsupported: usize,
}

impl ObstacleSet {
    /// 收集限制图元与物理资源刚体
    ///
    /// 顺序：球（内联、资源）→ 胶囊（内联、资源）→ 平面（内联、资源）→ 物理资源刚体。
    pub fn gather(
        limits: &LimitSet,
        bodies: Option<&PhysicsAsset>,
        skeleton: &ReferenceSkeleton,
        pose: &dyn PoseSource,
    ) -> Self {
        let mut set = ObstacleSet::default();

        set.obstacles.extend(limits.spheres().filter(|s| s.radius > 0.0).map(|s| Obstacle::Sphere {
            center: s.location(),
            radius: s.radius,
            limit_type: s.limit_type,
        }));
        set.obstacles.extend(
            limits
                .capsules()
                .filter(|c| c.radius > 0.0 && c.length > 0.0)
                .map(|c| {
                    let (start, end) = c.segment();
                    Obstacle::Capsule { start, end, radius: c.radius }
                }),
        );
        set.obstacles.extend(limits.planes().map(|p| Obstacle::Plane { plane: p.plane }));

        if let Some(asset) = bodies {
            for body in &asset.bodies {
                let Some(cs) = skeleton
                    .find_bone(&body.bone_name)
                    .and_then(|index| pose.component_space_transform(index))
                else {
                    continue;
                };
                set.add_body_shapes(body.elements.iter().map(|e| (e.is_degenerate(), e.resolve(&cs.without_scale(), cs.max_abs_scale()))));
            }
        }
        set
    }

    fn add_body_shapes(&mut self, shapes: impl Iterator<Item = (bool, ResolvedShape)>) {
        let mut spheres = Vec::new();
        let mut capsules = Vec::new();
        for (degenerate, shape) in shapes {
            if degenerate {
                continue;
            }
            match shape {
                ResolvedShape::Sphere { center, radius } => spheres.push(Obstacle::Sphere {
                    center,
                    radius,
                    limit_type: SphericalLimitType::Outer,
                }),
                ResolvedShape::Capsule { start, end, radius } => {
                    capsules.push(Obstacle::Capsule { start, end, radius })
                }
                // 盒、凸包、锥形胶囊尚无推出实现
                ResolvedShape::Unsupported(_) => self.unsupported += 1,
            }
        }
        self.obstacles.extend(spheres);
        self.obstacles.extend(capsules);
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    #[inline]
    pub fn unsupported_count(&self) -> usize {
        self.unsupported
    }
}

// ============================================================================
// 求解
// ============================================================================

/// 约束求解输入
#[derive(Clone, Copy)]
pub struct SolverContext<'a> {
    pub obstacles: &'a ObstacleSet,
    /// 形状碰撞用的物理资源，`None` 表示按粒子点碰撞
    pub shapes: Option<&'a PhysicsAsset>,
    pub sphere_limit_method: SphereLimitMethod,
    pub planar_constraint: PlanarAxis,
}

/// 对一个非根粒子施加全部约束
///
/// 返回形状碰撞中跳过的不支持形状数。
pub fn solve_particle(particles: &mut [Particle], index: usize, ctx: &SolverContext) -> usize {
    let skipped = match ctx.shapes {
        Some(asset) => collide_shapes(particles, index, asset, ctx),
        None => {
            collide_point(particles, index, ctx);
            0
        }
    };

    if let Some((parent, particle)) = split_parent(particles, index) {
        apply_angle_limit(particle, parent);
        apply_planar_constraint(particle, parent, ctx.planar_constraint);
        restore_length(particle, parent);
    }
    skipped
}

fn collide_point(particles: &mut [Particle], index: usize, ctx: &SolverContext) {
    let Some(particle) = particles.get_mut(index) else {
        return;
    };
    let mut collider = Collider::Sphere {
        center: particle.location,
        radius: particle.settings.radius,
        trail: particle.prev_location,
    };
    for obstacle in ctx.obstacles.iter() {
        if let Some(push) = push_out(&collider, obstacle, ctx.sphere_limit_method) {
            collider.translate(push);
        }
    }
    if let Collider::Sphere { center, .. } = collider {
        particle.location = center;
    }
}

/// 形状碰撞所用的骨骼变换（不带缩放）与缩放
#[inline]
fn shape_frame(particle: &Particle) -> (BoneTransform, f32) {
    (
        BoneTransform::from_rotation_translation(particle.rotation, particle.location),
        particle.pose_scale.abs().max_element(),
    )
}

/// 骨骼形状碰撞
///
/// 粒子自身的第一个球形状被推出时只移动粒子；
/// 父骨骼的第一个胶囊形状被推出时父子一起移动（根粒子除外）。
/// 返回跳过的不支持形状数。
fn collide_shapes(particles: &mut [Particle], index: usize, asset: &PhysicsAsset, ctx: &SolverContext) -> usize {
    let Some((parent, particle)) = split_parent(particles, index) else {
        return 0;
    };
    let mut skipped = 0;

    let mut own_sphere = particle.body.and_then(|b| asset.body(b)).and_then(|body| {
        let (frame, scale) = shape_frame(particle);
        let shape = body.resolve_first(ShapeCategory::Sphere, &frame, scale, &mut skipped)?;
        Collider::from_shape(shape, particle.prev_location - particle.location)
    });

    let mut parent_capsule = parent.body.and_then(|b| asset.body(b)).and_then(|body| {
        let (frame, scale) = shape_frame(parent);
        let shape = body.resolve_first(ShapeCategory::Capsule, &frame, scale, &mut skipped)?;
        Collider::from_shape(shape, Vec3::ZERO)
    });
    let parent_movable = !parent.is_root();

    for obstacle in ctx.obstacles.iter() {
        if let Some(sphere) = own_sphere.as_mut() {
            if let Some(push) = push_out(sphere, obstacle, ctx.sphere_limit_method) {
                sphere.translate(push);
                particle.location += push;
            }
        }
        if let Some(capsule) = parent_capsule.as_mut() {
            if let Some(push) = push_out(capsule, obstacle, ctx.sphere_limit_method) {
                capsule.translate(push);
                // 父粒子的长度恢复已经完成，这里的位移不再回头修正
                if parent_movable {
                    parent.location += push;
                }
                particle.location += push;
            }
        }
    }
    skipped
}

/// 角度限制：模拟方向偏离姿态方向超过上限时转回
fn apply_angle_limit(particle: &mut Particle, parent: &Particle) {
    let limit = particle.settings.limit_angle;
    if limit <= 0.0 {
        return;
    }

    let bone_vector = particle.location - parent.location;
    let bone_dir = bone_vector.normalize_or_zero();
    let pose_dir = (particle.pose_location - parent.pose_location).normalize_or_zero();
    let axis = pose_dir.cross(bone_dir);
    let angle = axis.length().atan2(pose_dir.dot(bone_dir)).to_degrees();
    let over = angle - limit;
    if over <= 0.0 {
        return;
    }

    // 反向共线时任取一条垂直轴
    let axis = if axis.length_squared() < EPSILON {
        pose_dir.any_orthonormal_vector()
    } else {
        axis
    };
    let bone_dir = rotate_angle_axis(bone_dir, -over, axis);
    particle.location = parent.location + bone_dir * bone_vector.length();
}

/// 平面约束：投影到过父粒子、法线为父骨骼姿态轴的平面上
fn apply_planar_constraint(particle: &mut Particle, parent: &Particle, axis: PlanarAxis) {
    if let Some(normal) = axis.normal(parent.pose_rotation) {
        particle.location = Plane::from_point_normal(parent.location, normal).project_point(particle.location);
    }
}

/// 恢复到姿态中的骨骼长度
fn restore_length(particle: &mut Particle, parent: &Particle) {
    let pose_vector = particle.pose_location - parent.pose_location;
    let mut dir = (particle.location - parent.location).normalize_or_zero();
    if dir == Vec3::ZERO {
        dir = pose_vector.normalize_or_zero();
    }
    particle.location = parent.location + dir * pose_vector.length();
}
