//! 参数响应曲线
//!
//! 物理参数沿骨骼链的分布由设计师曲线决定：输入为归一化的到根长度，
//! 输出为乘到基础参数上的系数。

mod bezier;
mod keyed;

pub use bezier::BezierCurve;
pub use keyed::{CurveKey, KeyedCurve};

use std::fmt::Debug;

/// 曲线 trait
pub trait ResponseCurve: Debug + Send + Sync {
    /// 在 `t` 处求值
    fn sample(&self, t: f32) -> f32;

    /// 曲线是否有数据；无数据的曲线视为常数 1
    fn has_data(&self) -> bool {
        true
    }
}
