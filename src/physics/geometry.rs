//! 几何工具
//!
//! 碰撞推出与约束求解用到的最近点、平面投影等基础运算。
//! 零长度方向统一按零向量处理，不产生 NaN。

use glam::{Quat, Vec3};

const EPSILON: f32 = 1.0e-8;

/// 线段上离 `point` 最近的点
pub fn closest_point_on_segment(point: Vec3, start: Vec3, end: Vec3) -> Vec3 {
    let segment = end - start;
    let len_sq = segment.length_squared();
    if len_sq < EPSILON {
        return start;
    }
    let t = ((point - start).dot(segment) / len_sq).clamp(0.0, 1.0);
    start + segment * t
}

/// 两线段之间的最近点对 `(在 a 上, 在 b 上)`
///
/// 任一线段退化为点时同样成立。
pub fn segment_closest_points(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> (Vec3, Vec3) {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a < EPSILON && e < EPSILON {
        return (a0, b0);
    }

    let (s, t) = if a < EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e < EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                // 平行线段，任取一端
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    (a0 + d1 * s, b0 + d2 * t)
}

// ============================================================================
// 平面
// ============================================================================

/// 平面：`normal · x = w`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub w: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self { normal: Vec3::Z, w: 0.0 }
    }
}

impl Plane {
    /// 由平面上一点与法线构造，法线会被归一化
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self { normal, w: normal.dot(point) }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.w
    }

    /// 点在平面上的投影
    #[inline]
    pub fn project_point(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    /// 线段与平面的交点（含端点）
    pub fn segment_intersection(&self, start: Vec3, end: Vec3) -> Option<Vec3> {
        let denom = self.normal.dot(end - start);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = (self.w - self.normal.dot(start)) / denom;
        if (0.0..=1.0).contains(&t) {
            Some(start + (end - start) * t)
        } else {
            None
        }
    }
}

// ============================================================================
// 旋转
// ============================================================================

/// 将 `from` 方向转到 `to` 方向的最短旋转；任一为零向量时返回单位旋转
pub fn find_between_vectors(from: Vec3, to: Vec3) -> Quat {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// 绕轴旋转（角度单位：度），轴会被归一化
pub fn rotate_angle_axis(vector: Vec3, angle_degrees: f32, axis: Vec3) -> Vec3 {
    let axis = axis.normalize_or_zero();
    if axis == Vec3::ZERO {
        return vector;
    }
    Quat::from_axis_angle(axis, angle_degrees.to_radians()) * vector
}
