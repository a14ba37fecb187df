//! 关键帧曲线 - 分段线性

use crate::{ChainError, Result};

use super::ResponseCurve;

/// 曲线关键点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

impl CurveKey {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// 分段线性曲线，区间外取端点值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedCurve {
    keys: Vec<CurveKey>,
}

impl KeyedCurve {
    /// 创建曲线，关键点时间必须严格递增且有限
    pub fn new(keys: Vec<CurveKey>) -> Result<Self> {
        for key in &keys {
            if !key.time.is_finite() || !key.value.is_finite() {
                return Err(ChainError::InvalidCurve(format!(
                    "non-finite key ({}, {})",
                    key.time, key.value
                )));
            }
        }
        if let Some(pair) = keys.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(ChainError::InvalidCurve(format!(
                "key times must increase: {} then {}",
                pair[0].time, pair[1].time
            )));
        }
        Ok(Self { keys })
    }

    /// 由 (time, value) 对创建
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Result<Self> {
        Self::new(pairs.iter().map(|&(t, v)| CurveKey::new(t, v)).collect())
    }
}

impl ResponseCurve for KeyedCurve {
    fn sample(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 1.0,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // 第一个时间大于 t 的关键点，必定存在且不是首个
        let upper = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let alpha = (t - a.time) / (b.time - a.time);
        a.value + (b.value - a.value) * alpha
    }

    fn has_data(&self) -> bool {
        !self.keys.is_empty()
    }
}
