//! # Fusion
//!
//! 手部关键点 + 热源轮廓 → 单一接近距离。
//!
//! - 有符号点到多边形距离 (内负外正)
//! - 取最深穿透 (最小有符号距离) 的一对
//! - 像素 → cm 缩放
//! - 可选深度估计

mod engine;
pub mod geometry;

pub use engine::{FusionEngine, NearestPair};
