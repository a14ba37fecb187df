//! 风场接口与阵风倍率
//!
//! 风场由宿主提供；阵风倍率每个粒子每帧抽取一次，
//! 默认随机，可注入固定值以便测试。

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 某个世界位置的风
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindSample {
    /// 世界空间方向（单位向量）
    pub direction: Vec3,
    pub speed: f32,
}

/// 宿主风场
pub trait WindField {
    /// 无风时返回 `None`
    fn sample(&self, world_position: Vec3) -> Option<WindSample>;
}

/// 全局均匀风
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalWind {
    pub direction: Vec3,
    pub speed: f32,
}

impl DirectionalWind {
    pub fn new(direction: Vec3, speed: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            speed,
        }
    }
}

impl WindField for DirectionalWind {
    fn sample(&self, _world_position: Vec3) -> Option<WindSample> {
        if self.speed == 0.0 || self.direction == Vec3::ZERO {
            return None;
        }
        Some(WindSample {
            direction: self.direction,
            speed: self.speed,
        })
    }
}

/// 阵风倍率来源，取值范围 [0, 2)
pub trait GustSampler: Send {
    fn next_gust(&mut self) -> f32;
}

/// 随机阵风
#[derive(Debug)]
pub struct RandomGust {
    rng: StdRng,
}

impl RandomGust {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// 固定种子，结果可复现
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomGust {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl GustSampler for RandomGust {
    fn next_gust(&mut self) -> f32 {
        self.rng.gen_range(0.0..2.0)
    }
}

/// 固定阵风倍率
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantGust(pub f32);

impl Default for ConstantGust {
    fn default() -> Self {
        Self(1.0)
    }
}

impl GustSampler for ConstantGust {
    fn next_gust(&mut self) -> f32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_gust_range() {
        let mut gust = RandomGust::seeded(7);
        for _ in 0..1000 {
            let g = gust.next_gust();
            assert!((0.0..2.0).contains(&g));
        }
    }

    #[test]
    fn test_seeded_gust_reproducible() {
        let mut a = RandomGust::seeded(42);
        let mut b = RandomGust::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.next_gust(), b.next_gust());
        }
    }

    #[test]
    fn test_directional_wind() {
        let wind = DirectionalWind::new(Vec3::new(0.0, 3.0, 0.0), 5.0);
        let sample = wind.sample(Vec3::ZERO).unwrap();
        assert_eq!(sample.direction, Vec3::Y);
        assert_eq!(sample.speed, 5.0);
        assert!(DirectionalWind::new(Vec3::X, 0.0).sample(Vec3::ZERO).is_none());
        assert_eq!(ConstantGust::default().next_gust(), 1.0);
    }
}
