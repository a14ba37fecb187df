//! 贝塞尔曲线 - 端点固定在 (0,0) 与 (1,1) 的三次缓动曲线

use glam::Vec2;

use super::ResponseCurve;

/// 三次贝塞尔曲线，构造时按参数均匀采样成折线
#[derive(Debug, Clone, PartialEq)]
pub struct BezierCurve {
    /// 采样点，按 X 升序
    samples: Vec<Vec2>,
}

impl BezierCurve {
    /// `c0`、`c1` 为两个控制点，`segments` 为采样段数（至少 1）
    pub fn new(c0: Vec2, c1: Vec2, segments: u32) -> Self {
        let segments = segments.max(1);
        let mut samples: Vec<Vec2> = (0..=segments)
            .map(|i| de_casteljau(c0, c1, i as f32 / segments as f32))
            .collect();
        samples.sort_unstable_by(|a, b| a.x.total_cmp(&b.x));
        Self { samples }
    }
}

/// 端点 (0,0)、(1,1) 的三次贝塞尔在 `t` 处的点
#[inline]
fn de_casteljau(c0: Vec2, c1: Vec2, t: f32) -> Vec2 {
    let a = Vec2::ZERO.lerp(c0, t);
    let b = c0.lerp(c1, t);
    let c = c1.lerp(Vec2::ONE, t);
    a.lerp(b, t).lerp(b.lerp(c, t), t)
}

impl ResponseCurve for BezierCurve {
    fn sample(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        // 采样点至少两个
        let upper = self
            .samples
            .partition_point(|p| p.x <= t)
            .clamp(1, self.samples.len() - 1);
        let (lo, hi) = (self.samples[upper - 1], self.samples[upper]);
        let span = hi.x - lo.x;
        if span <= f32::EPSILON {
            lo.y
        } else {
            lo.y + (hi.y - lo.y) * (t - lo.x) / span
        }
    }
}
