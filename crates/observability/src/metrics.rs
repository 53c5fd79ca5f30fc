//! EyeCan 指标收集模块
//!
//! 记录融合报告、传感器故障与链路会话的运行指标。

use contracts::{HazardSignal, ProximityReport, SourceId};
use metrics::{counter, gauge, histogram};

/// 记录一次融合报告
///
/// 每个 tick 融合完成后调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_report;
///
/// let report = engine.fuse_snapshot(&snapshot);
/// record_report(&report, snapshot.tick);
/// ```
pub fn record_report(report: &ProximityReport, tick: u64) {
    let signal = match report.signal {
        HazardSignal::Clear => "clear",
        HazardSignal::Present => "present",
    };
    counter!("eyecan_reports_total", "signal" => signal).increment(1);
    gauge!("eyecan_last_tick").set(tick as f64);

    if report.is_present() {
        gauge!("eyecan_distance_cm").set(report.distance_cm);
        histogram!("eyecan_distance_cm_hist").record(report.distance_cm);

        if report.distance_cm <= report.inner_threshold_cm {
            counter!("eyecan_inner_threshold_reports_total").increment(1);
        } else if report.distance_cm <= report.outer_threshold_cm {
            counter!("eyecan_outer_threshold_reports_total").increment(1);
        }
    }
}

/// 记录传感器故障 (fault 为故障种类, 如 "no_data")
pub fn record_sensor_fault(source: SourceId, fault: &str) {
    counter!(
        "eyecan_sensor_faults_total",
        "source" => source.as_str(),
        "fault" => fault.to_string()
    )
    .increment(1);
}

/// 记录单个源的观测数量
pub fn record_observation(source: SourceId, count: usize) {
    counter!("eyecan_observations_total", "source" => source.as_str()).increment(1);
    gauge!("eyecan_observation_count", "source" => source.as_str()).set(count as f64);
}

/// 记录会话阶段切换
pub fn record_session_state(phase: &str) {
    counter!(
        "eyecan_session_transitions_total",
        "phase" => phase.to_string()
    )
    .increment(1);
}

/// 记录连接尝试
pub fn record_connect_attempt(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("eyecan_connect_attempts_total", "status" => status).increment(1);
}

/// 记录已写出的帧
pub fn record_frame_sent(bytes: usize) {
    counter!("eyecan_frames_sent_total").increment(1);
    counter!("eyecan_frame_bytes_total").increment(bytes as u64);
}

/// 记录被丢弃的报告 (reason: "not_connected", "superseded", "stale", ...)
pub fn record_report_discarded(reason: &str) {
    counter!(
        "eyecan_reports_discarded_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录 tick 延迟 (从配对完成到释放)
pub fn record_tick_latency_ms(latency_ms: f64) {
    histogram!("eyecan_tick_latency_ms").record(latency_ms);
}

/// 融合指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ProximityAggregator {
    /// 总 tick 数
    pub total_ticks: u64,

    /// Present 报告数
    pub present_reports: u64,

    /// 进入内阈值的报告数
    pub inner_reports: u64,

    /// 未发送的报告数
    pub discarded_reports: u64,

    /// 距离统计 (仅 Present)
    pub distance_stats: RunningStats,

    /// tick 延迟统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl ProximityAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &ProximityReport, latency_ms: f64) {
        self.total_ticks += 1;
        self.latency_stats.push(latency_ms);

        if report.is_present() {
            self.present_reports += 1;
            self.distance_stats.push(report.distance_cm);
            if report.distance_cm <= report.inner_threshold_cm {
                self.inner_reports += 1;
            }
        }
    }

    /// 记录一次未发送
    pub fn record_discarded(&mut self) {
        self.discarded_reports += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            present_reports: self.present_reports,
            inner_reports: self.inner_reports,
            discarded_reports: self.discarded_reports,
            present_rate: if self.total_ticks > 0 {
                self.present_reports as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            },
            distance_cm: StatsSummary::from(&self.distance_stats),
            tick_latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub present_reports: u64,
    pub inner_reports: u64,
    pub discarded_reports: u64,
    pub present_rate: f64,
    pub distance_cm: StatsSummary,
    pub tick_latency_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Proximity Summary ===")?;
        writeln!(f, "Total ticks: {}", self.total_ticks)?;
        writeln!(
            f,
            "Present reports: {} ({:.2}%)",
            self.present_reports, self.present_rate
        )?;
        writeln!(f, "Inside inner threshold: {}", self.inner_reports)?;
        writeln!(f, "Discarded reports: {}", self.discarded_reports)?;
        writeln!(f, "Distance (cm): {}", self.distance_cm)?;
        writeln!(f, "Tick latency (ms): {}", self.tick_latency_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = ProximityAggregator::new();

        aggregator.update(&ProximityReport::present(3.0, 10.0, 5.0), 1.5);
        aggregator.update(&ProximityReport::present(8.0, 10.0, 5.0), 2.5);
        aggregator.update(&ProximityReport::clear(10.0, 5.0), 0.5);
        aggregator.record_discarded();

        let summary = aggregator.summary();
        assert_eq!(summary.total_ticks, 3);
        assert_eq!(summary.present_reports, 2);
        assert_eq!(summary.inner_reports, 1);
        assert_eq!(summary.discarded_reports, 1);
        assert_eq!(summary.distance_cm.count, 2);
        assert!((summary.distance_cm.mean - 5.5).abs() < 1e-10);
        assert!((summary.tick_latency_ms.max - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = ProximityAggregator::new().summary();
        let text = summary.to_string();
        assert!(text.contains("Total ticks: 0"));
        assert!(text.contains("Distance (cm): N/A"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_report(&ProximityReport::present(-2.16, 10.0, 5.0), 0);
        record_sensor_fault(SourceId::Thermal, "no_data");
        record_session_state("connected");
        record_connect_attempt(false);
        record_frame_sent(14);
        record_report_discarded("not_connected");
        record_tick_latency_ms(0.3);
    }
}
