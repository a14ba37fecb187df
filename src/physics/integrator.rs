//! 积分器 - 惯性、阻尼、风、跟随组件运动、重力、刚度
//!
//! 每个粒子按链顺序推进一次，父粒子总在子粒子之前完成。

use glam::{Quat, Vec3};

use crate::skeleton::{BoneTransform, ForwardAxis};

use super::chain::{split_parent, Particle};
use super::config::GravityMethod;
use super::geometry::find_between_vectors;
use super::wind::{GustSampler, WindField};

/// 风场输入
#[derive(Clone, Copy)]
pub struct WindInput<'a> {
    pub field: &'a dyn WindField,
    pub scale: f32,
}

/// 单帧积分所需的全部输入（组件空间）
#[derive(Clone, Copy)]
pub struct StepInput<'a> {
    /// 本帧组件世界变换
    pub component: BoneTransform,
    /// 上一帧组件位置在本帧组件空间中的坐标（瞬移时为零）
    pub move_vector: Vec3,
    /// 组件旋转增量（瞬移时为单位旋转）
    pub move_rotation: Quat,
    /// 组件空间重力
    pub gravity: Vec3,
    pub delta_time: f32,
    pub delta_time_old: f32,
    pub target_framerate: f32,
    pub gravity_method: GravityMethod,
    pub forward_axis: ForwardAxis,
    pub wind: Option<WindInput<'a>>,
}

/// 推进一个粒子
///
/// 根粒子直接吸附到姿态位置，不参与动力学。
pub fn integrate_particle(
    particles: &mut [Particle],
    index: usize,
    input: &StepInput,
    gust: &mut dyn GustSampler,
) {
    let Some((parent, particle)) = split_parent(particles, index) else {
        if let Some(root) = particles.get_mut(index) {
            root.prev_location = root.location;
            root.location = root.pose_location;
        }
        return;
    };

    let settings = particle.settings;
    let dt = input.delta_time;

    // 惯性与阻尼
    let mut velocity = (particle.location - particle.prev_location) / input.delta_time_old;
    particle.prev_location = particle.location;
    velocity *= 1.0 - settings.damping;

    if let Some(wind) = input.wind {
        let world = input.component.transform_point(particle.pose_location);
        if let Some(sample) = wind.field.sample(world) {
            let direction = input.component.inverse_transform_vector(sample.direction);
            let wind_velocity = direction * sample.speed * wind.scale * gust.next_gust();
            velocity += wind_velocity * input.target_framerate;
        }
    }
    particle.location += velocity * dt;

    // 跟随组件平移与旋转
    particle.location += input.move_vector * (1.0 - settings.world_damping_location);
    let prev = particle.prev_location;
    particle.location += (input.move_rotation * prev - prev) * (1.0 - settings.world_damping_rotation);

    particle.location += match input.gravity_method {
        GravityMethod::Current => 0.5 * input.gravity * dt * dt,
        GravityMethod::Legacy => input.gravity * dt,
    };

    // 刚度：按目标帧率归一化的指数拉回
    let base = parent.location + (particle.pose_location - parent.pose_location);
    let exponent = input.target_framerate * dt;
    particle.location += (base - particle.location) * (1.0 - (1.0 - settings.stiffness).powf(exponent));

    // 碰撞前先估计父骨骼朝向，形状碰撞会用到
    parent.rotation = parent.pose_rotation;
    if !parent.is_dummy() {
        if let Some(rotation) = estimate_parent_rotation(parent, particle, input.forward_axis) {
            parent.rotation = rotation;
        }
    }
}

/// 由父→子的模拟方向重新估计父骨骼朝向
///
/// 模拟方向与姿态方向一致时返回 `None`。
pub fn estimate_parent_rotation(parent: &Particle, child: &Particle, forward_axis: ForwardAxis) -> Option<Quat> {
    let mut pose_vector = child.pose_location - parent.pose_location;
    let mut sim_vector = child.location - parent.location;
    if pose_vector.normalize_or_zero() == sim_vector.normalize_or_zero() {
        return None;
    }
    if forward_axis.is_negative() {
        pose_vector = -pose_vector;
        sim_vector = -sim_vector;
    }
    Some(find_between_vectors(pose_vector, sim_vector) * parent.pose_rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::chain::Particle;
    use crate::physics::settings::PhysicsSettings;
    use crate::physics::wind::{ConstantGust, DirectionalWind};
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn pair(child_offset: Vec3) -> Vec<Particle> {
        let mut root = Particle::test_new(None, Vec3::ZERO);
        root.children.push(1);
        let child = Particle::test_new(Some(0), child_offset);
        vec![root, child]
    }

    fn input() -> StepInput<'static> {
        StepInput {
            component: BoneTransform::IDENTITY,
            move_vector: Vec3::ZERO,
            move_rotation: Quat::IDENTITY,
            gravity: Vec3::ZERO,
            delta_time: 1.0 / 60.0,
            delta_time_old: 1.0 / 60.0,
            target_framerate: 60.0,
            gravity_method: GravityMethod::Current,
            forward_axis: ForwardAxis::XPositive,
            wind: None,
        }
    }

    fn still(settings: PhysicsSettings) -> PhysicsSettings {
        PhysicsSettings {
            stiffness: 0.0,
            world_damping_location: 1.0,
            world_damping_rotation: 1.0,
            ..settings
        }
    }

    #[test]
    fn test_root_snaps_to_pose() {
        let mut particles = pair(Vec3::X);
        particles[0].location = Vec3::new(5.0, 5.0, 5.0);
        particles[0].pose_location = Vec3::new(1.0, 0.0, 0.0);
        integrate_particle(&mut particles, 0, &input(), &mut ConstantGust(1.0));
        assert_eq!(particles[0].location, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(particles[0].prev_location, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_inertia_with_damping() {
        let mut particles = pair(Vec3::X);
        particles[1].settings = still(PhysicsSettings {
            damping: 0.5,
            ..PhysicsSettings::default()
        });
        particles[1].prev_location = Vec3::new(1.0, -1.0, 0.0);
        let step = input();
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(1.0));
        // 速度 = 1/dt，阻尼一半，走 0.5
        assert!(particles[1].location.abs_diff_eq(Vec3::new(1.0, 0.5, 0.0), 1e-5));
        assert_eq!(particles[1].prev_location, Vec3::X);
    }

    #[test]
    fn test_gravity_methods() {
        let mut step = input();
        step.gravity = Vec3::new(0.0, 0.0, -980.0);
        step.delta_time = 0.1;
        step.delta_time_old = 0.1;

        let mut particles = pair(Vec3::X);
        particles[1].settings = still(PhysicsSettings::default());
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(1.0));
        assert_relative_eq!(particles[1].location.z, -4.9, epsilon = 1e-4);

        let mut particles = pair(Vec3::X);
        particles[1].settings = still(PhysicsSettings::default());
        step.gravity_method = GravityMethod::Legacy;
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(1.0));
        assert_relative_eq!(particles[1].location.z, -98.0, epsilon = 1e-3);
    }

    #[test]
    fn test_full_stiffness_reaches_pose() {
        let mut particles = pair(Vec3::X);
        particles[1].location = Vec3::new(0.0, 3.0, 0.0);
        particles[1].prev_location = particles[1].location;
        particles[1].settings = PhysicsSettings {
            stiffness: 1.0,
            damping: 0.0,
            ..still(PhysicsSettings::default())
        };
        integrate_particle(&mut particles, 1, &input(), &mut ConstantGust(1.0));
        assert!(particles[1].location.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_stiffness_is_frame_rate_independent() {
        let settings = PhysicsSettings {
            stiffness: 0.3,
            damping: 1.0,
            ..still(PhysicsSettings::default())
        };
        let start = Vec3::new(0.0, 4.0, 0.0);

        // 一个 1/30 步
        let mut coarse = pair(Vec3::X);
        coarse[1].location = start;
        coarse[1].prev_location = start;
        coarse[1].settings = settings;
        let mut step = input();
        step.delta_time = 1.0 / 30.0;
        integrate_particle(&mut coarse, 1, &step, &mut ConstantGust(1.0));

        // 两个 1/60 步
        let mut fine = pair(Vec3::X);
        fine[1].location = start;
        fine[1].prev_location = start;
        fine[1].settings = settings;
        let step = input();
        integrate_particle(&mut fine, 1, &step, &mut ConstantGust(1.0));
        integrate_particle(&mut fine, 1, &step, &mut ConstantGust(1.0));

        assert!(coarse[1].location.abs_diff_eq(fine[1].location, 1e-4));
    }

    #[test]
    fn test_component_follow_and_rotation() {
        let mut particles = pair(Vec3::X);
        particles[1].settings = PhysicsSettings {
            world_damping_location: 0.5,
            world_damping_rotation: 0.0,
            stiffness: 0.0,
            damping: 0.0,
            ..PhysicsSettings::default()
        };
        let mut step = input();
        step.move_vector = Vec3::new(0.0, 0.0, 10.0);
        step.move_rotation = Quat::from_rotation_z(FRAC_PI_2);
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(1.0));
        // X → Y 的旋转跟随，加上一半平移跟随
        assert!(particles[1].location.abs_diff_eq(Vec3::new(0.0, 1.0, 5.0), 1e-5));
    }

    #[test]
    fn test_wind_uses_injected_gust() {
        let wind = DirectionalWind::new(Vec3::Y, 2.0);
        let mut step = input();
        step.wind = Some(WindInput { field: &wind, scale: 0.5 });

        let mut particles = pair(Vec3::X);
        particles[1].settings = still(PhysicsSettings {
            damping: 0.0,
            ..PhysicsSettings::default()
        });
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(1.5));
        // 风速 = 1 · 2 · 0.5 · 1.5 = 1.5，乘目标帧率再乘 dt
        assert_relative_eq!(particles[1].location.y, 1.5, epsilon = 1e-5);

        let mut particles = pair(Vec3::X);
        particles[1].settings = still(PhysicsSettings {
            damping: 0.0,
            ..PhysicsSettings::default()
        });
        integrate_particle(&mut particles, 1, &step, &mut ConstantGust(0.0));
        assert_relative_eq!(particles[1].location.y, 0.0);
    }

    #[test]
    fn test_parent_rotation_estimate() {
        let mut particles = pair(Vec3::X);
        particles[1].location = Vec3::Y;
        let rotation = estimate_parent_rotation(&particles[0], &particles[1], ForwardAxis::XPositive).unwrap();
        assert!((rotation * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));

        particles[1].location = Vec3::new(2.0, 0.0, 0.0);
        assert!(estimate_parent_rotation(&particles[0], &particles[1], ForwardAxis::XPositive).is_none());

        // 负轴：两个向量取反后求出的旋转相同
        particles[1].location = Vec3::Y;
        let negative = estimate_parent_rotation(&particles[0], &particles[1], ForwardAxis::XNegative).unwrap();
        assert!((negative * Vec3::NEG_X).abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
