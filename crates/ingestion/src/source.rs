//! 观测源 trait

use contracts::{Observation, SensorFault, SourceId};

/// 观测源
///
/// 每次 `observe` 完成一次 采集 → 检测，返回本 tick 的观测。
/// 只在所属采集线程上调用。
pub trait ObservationSource: Send {
    /// 所属屏障槽位
    fn source_id(&self) -> SourceId;

    /// 采集并检测一帧 (阻塞)
    fn observe(&mut self) -> Result<Observation, SensorFault>;
}

impl<S: ObservationSource + ?Sized> ObservationSource for Box<S> {
    fn source_id(&self) -> SourceId {
        (**self).source_id()
    }

    fn observe(&mut self) -> Result<Observation, SensorFault> {
        (**self).observe()
    }
}
