//! 物理参数与沿链分布

use std::sync::Arc;

use crate::curve::ResponseCurve;

use super::chain::Chain;

/// 单个粒子的物理参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsSettings {
    /// 速度阻尼 [0, 1]
    pub damping: f32,
    /// 对组件平移的跟随阻尼 [0, 1]
    pub world_damping_location: f32,
    /// 对组件旋转的跟随阻尼 [0, 1]
    pub world_damping_rotation: f32,
    /// 回到姿态位置的刚度 [0, 1]
    pub stiffness: f32,
    /// 碰撞半径 ≥ 0
    pub radius: f32,
    /// 相对姿态方向的最大偏角（度），0 表示不限制
    pub limit_angle: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            damping: 0.1,
            world_damping_location: 0.8,
            world_damping_rotation: 0.8,
            stiffness: 0.05,
            radius: 3.0,
            limit_angle: 0.0,
        }
    }
}

type CurveHandle = Option<Arc<dyn ResponseCurve>>;

/// 各参数的响应曲线，输入为归一化的到根长度
#[derive(Clone, Debug, Default)]
pub struct ParameterCurves {
    pub damping: CurveHandle,
    pub world_damping_location: CurveHandle,
    pub world_damping_rotation: CurveHandle,
    pub stiffness: CurveHandle,
    pub radius: CurveHandle,
    pub limit_angle: CurveHandle,
}

/// 曲线系数，无曲线或曲线无数据时为 1
#[inline]
fn curve_factor(curve: &CurveHandle, ratio: f32) -> f32 {
    match curve {
        Some(curve) if curve.has_data() => curve.sample(ratio),
        _ => 1.0,
    }
}

impl PhysicsSettings {
    /// 在链上 `ratio` 处的参数：基础值 × 曲线系数，再做范围钳制
    pub fn distributed(&self, curves: &ParameterCurves, ratio: f32) -> PhysicsSettings {
        PhysicsSettings {
            damping: (self.damping * curve_factor(&curves.damping, ratio)).clamp(0.0, 1.0),
            world_damping_location: (self.world_damping_location
                * curve_factor(&curves.world_damping_location, ratio))
            .clamp(0.0, 1.0),
            world_damping_rotation: (self.world_damping_rotation
                * curve_factor(&curves.world_damping_rotation, ratio))
            .clamp(0.0, 1.0),
            stiffness: (self.stiffness * curve_factor(&curves.stiffness, ratio)).clamp(0.0, 1.0),
            radius: (self.radius * curve_factor(&curves.radius, ratio)).max(0.0),
            limit_angle: (self.limit_angle * curve_factor(&curves.limit_angle, ratio)).max(0.0),
        }
    }
}

/// 按到根长度为每个粒子分布物理参数
pub fn distribute_settings(chain: &mut Chain, base: &PhysicsSettings, curves: &ParameterCurves) {
    let total = chain.total_length;
    for particle in chain.particles.iter_mut() {
        let ratio = if total > 0.0 {
            particle.length_from_root / total
        } else {
            0.0
        };
        particle.settings = base.distributed(curves, ratio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{BezierCurve, KeyedCurve};
    use crate::physics::chain::Particle;
    use glam::{Vec2, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_no_curves_keeps_base() {
        let base = PhysicsSettings::default();
        let result = base.distributed(&ParameterCurves::default(), 0.7);
        assert_eq!(result, base);
    }

    #[test]
    fn test_curve_scales_and_clamps() {
        let base = PhysicsSettings {
            damping: 0.5,
            stiffness: 0.8,
            radius: 2.0,
            limit_angle: 30.0,
            ..PhysicsSettings::default()
        };
        let ramp: Arc<dyn ResponseCurve> =
            Arc::new(KeyedCurve::from_pairs(&[(0.0, 0.0), (1.0, 4.0)]).unwrap());
        let negative: Arc<dyn ResponseCurve> =
            Arc::new(KeyedCurve::from_pairs(&[(0.0, -1.0), (1.0, -1.0)]).unwrap());
        let curves = ParameterCurves {
            damping: Some(ramp.clone()),
            stiffness: Some(ramp.clone()),
            radius: Some(negative.clone()),
            limit_angle: Some(ramp),
            ..ParameterCurves::default()
        };

        let result = base.distributed(&curves, 0.5);
        // 0.5 × 2 = 1.0
        assert_relative_eq!(result.damping, 1.0);
        // 0.8 × 2 = 1.6 → 钳制到 1
        assert_relative_eq!(result.stiffness, 1.0);
        assert_relative_eq!(result.radius, 0.0);
        assert_relative_eq!(result.limit_angle, 60.0);
    }

    #[test]
    fn test_empty_curve_is_identity() {
        let empty: Arc<dyn ResponseCurve> = Arc::new(KeyedCurve::default());
        let curves = ParameterCurves {
            damping: Some(empty),
            ..ParameterCurves::default()
        };
        let base = PhysicsSettings::default();
        assert_relative_eq!(base.distributed(&curves, 0.3).damping, base.damping);
    }

    #[test]
    fn test_bezier_radius_along_chain() {
        let mut chain = Chain::default();
        for (i, length) in [0.0, 5.0, 10.0].into_iter().enumerate() {
            let mut particle = Particle::test_new(i.checked_sub(1), Vec3::new(0.0, 0.0, -length));
            particle.length_from_root = length;
            chain.particles.push(particle);
        }
        chain.total_length = 10.0;

        // 缓入：根部细、末端粗
        let ease_in: Arc<dyn ResponseCurve> = Arc::new(BezierCurve::new(Vec2::new(0.42, 0.0), Vec2::ONE, 64));
        let curves = ParameterCurves {
            radius: Some(ease_in),
            ..ParameterCurves::default()
        };
        let base = PhysicsSettings {
            radius: 4.0,
            ..PhysicsSettings::default()
        };
        distribute_settings(&mut chain, &base, &curves);

        let radii: Vec<f32> = chain.particles.iter().map(|p| p.settings.radius).collect();
        assert_relative_eq!(radii[0], 0.0, epsilon = 1e-4);
        assert!(radii[1] < 2.0);
        assert_relative_eq!(radii[2], 4.0, epsilon = 1e-4);
        assert_eq!(chain.particles[2].settings.damping, base.damping);
    }
}
