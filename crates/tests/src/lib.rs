//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载 → 校验
//! - 模拟 e2e 测试（无需硬件）
//! - 回放录制直到两个源退役
//! - 链路断开后的重连

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::thread::JoinHandle;

    use contracts::DeviceBlueprint;
    use ingestion::{
        build_thermal_source, build_visual_source, spawn_capture_thread, CaptureExit,
        CaptureMetrics, CaptureOptions,
    };
    use sync_engine::SyncBarrier;

    pub struct Captures {
        pub barrier: Arc<SyncBarrier>,
        pub visual_metrics: Arc<CaptureMetrics>,
        pub thermal_metrics: Arc<CaptureMetrics>,
        handles: Vec<JoinHandle<CaptureExit>>,
    }

    impl Captures {
        /// Build both sources from the blueprint and start their capture threads
        pub fn start(blueprint: &DeviceBlueprint) -> Self {
            let (barrier, visual_port, thermal_port) = SyncBarrier::with_ports();
            let visual_metrics = Arc::new(CaptureMetrics::new());
            let thermal_metrics = Arc::new(CaptureMetrics::new());

            let visual = spawn_capture_thread(
                build_visual_source(blueprint).unwrap(),
                visual_port,
                CaptureOptions {
                    max_consecutive_faults: blueprint.sources.visual.max_consecutive_faults,
                },
                Arc::clone(&visual_metrics),
            )
            .unwrap();
            let thermal = spawn_capture_thread(
                build_thermal_source(blueprint).unwrap(),
                thermal_port,
                CaptureOptions {
                    max_consecutive_faults: blueprint.sources.thermal.max_consecutive_faults,
                },
                Arc::clone(&thermal_metrics),
            )
            .unwrap();

            Self {
                barrier,
                visual_metrics,
                thermal_metrics,
                handles: vec![visual, thermal],
            }
        }

        /// Shut the barrier down and join both threads (visual, thermal)
        pub fn stop(self) -> Vec<CaptureExit> {
            self.barrier.shutdown();
            self.handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        }
    }

    pub fn fast_blueprint() -> DeviceBlueprint {
        let mut blueprint = DeviceBlueprint::default();
        blueprint.simulation.frame_interval_ms = 0;
        blueprint
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use config_loader::ConfigLoader;
    use contracts::{ContractError, TransportKind};

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_device_config_loads_from_file() {
        let file = write_toml(
            r#"
[fusion]
scale_factor = 1.08
outer_threshold_cm = 12.0
inner_threshold_cm = 6.0

[link]
transport = "tcp_bridge"
peer_name_filter = "BLE-Server-EyeCan"
peers = ["127.0.0.1:7878"]
settle_ms = 250
"#,
        );

        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(blueprint.fusion.outer_threshold_cm, 12.0);
        assert_eq!(blueprint.link.transport, TransportKind::TcpBridge);
        assert_eq!(blueprint.link.settle_ms, 250);
        // untouched sections keep their defaults
        assert_eq!(blueprint.sources.thermal.max_hazards, 9);
        assert_eq!(blueprint.fusion.hazard_height_offset_cm, 10.0);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let file = write_toml(
            r#"
[link]
transport = "tcp_bridge"
"#,
        );
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(
            matches!(err, ContractError::ConfigValidation { ref field, .. } if field == "link.peers"),
            "got: {err}"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{wire, HazardSignal};
    use dispatcher::{
        ConsumerExit, SessionHandle, SessionManager, SessionPhase, SessionPolicy, TickConsumer,
    };
    use fusion::FusionEngine;
    use ingestion::CaptureExit;
    use link::{MockTransport, MockTransportConfig};
    use tokio::sync::watch;

    use crate::support::{fast_blueprint, Captures};

    /// End-to-end test: simulated sources -> barrier -> fusion -> session -> mock link
    ///
    /// 每个 tick 都恰好计入一次：发送、丢弃、被覆盖或过期。
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_simulated_pipeline() {
        let blueprint = fast_blueprint();
        let captures = Captures::start(&blueprint);

        let transport = MockTransport::new();
        let probe = transport.probe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = SessionManager::new(
            transport,
            SessionPolicy::from(&blueprint.link),
            shutdown_rx.clone(),
        );
        let session = SessionHandle::spawn(manager, shutdown_rx.clone());

        let engine = Arc::new(FusionEngine::new(blueprint.fusion.clone()));
        let consumer = TickConsumer::new(Arc::clone(&captures.barrier), engine, shutdown_rx)
            .with_max_ticks(Some(60));
        let report = consumer.run(&session).await.unwrap();

        assert_eq!(report.exit, ConsumerExit::MaxTicks);
        assert_eq!(report.ticks, 60);
        assert_eq!(report.summary.total_ticks, 60);
        assert_eq!(report.summary.present_reports, 60);

        let metrics = Arc::clone(session.metrics());
        assert_eq!(session.shutdown().await, SessionPhase::Closed);
        shutdown_tx.send_replace(true);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot.frames_sent
                + snapshot.discarded_count
                + snapshot.dropped_count
                + snapshot.stale_count,
            60
        );
        assert_eq!(probe.frame_count() as u64, snapshot.frames_sent);
        for frame in probe.frames() {
            let decoded = wire::parse_bytes(&frame).unwrap();
            assert_eq!(decoded.outer_threshold_cm, 10.0);
            assert_eq!(decoded.inner_threshold_cm, 5.0);
        }

        let visual_published = captures.visual_metrics.snapshot().published;
        let thermal_published = captures.thermal_metrics.snapshot().published;
        let exits = captures.stop();
        assert_eq!(exits, vec![CaptureExit::Shutdown, CaptureExit::Shutdown]);
        // lockstep: neither source runs more than one tick ahead
        assert!(visual_published.abs_diff(thermal_published) <= 1);
        assert!(visual_published >= 60);
    }

    /// Replay recordings until both sources retire
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_replay_until_exhausted() {
        use std::io::Write;

        let mut thermal_file = tempfile::NamedTempFile::new().unwrap();
        let mut hand_file = tempfile::NamedTempFile::new().unwrap();
        let (width, height) = (80usize, 62usize);
        let hand_positions = [[0.5, 0.5], [0.05, 0.05], [0.5, 0.5]];

        for (n, [x, y]) in hand_positions.iter().enumerate() {
            let mut temperatures = vec![22.0f32; width * height];
            for row in 26..=36 {
                for col in 34..=46 {
                    temperatures[row * width + col] = 70.0;
                }
            }
            let frame = serde_json::json!({
                "header": { "frame_counter": n as u64 + 1, "timestamp_ms": (n as u64 + 1) * 50 },
                "width": width,
                "height": height,
                "temperatures": temperatures,
            });
            writeln!(thermal_file, "{frame}").unwrap();
            writeln!(hand_file, r#"{{"hands": [[{{"x": {x}, "y": {y}}}]]}}"#).unwrap();
        }

        let mut blueprint = fast_blueprint();
        // paced so the worker writes each report before the next one
        blueprint.simulation.frame_interval_ms = 20;
        blueprint.fusion.depth.enabled = false;
        blueprint.sources.visual.driver = contracts::SourceDriver::Replay;
        blueprint.sources.visual.replay_path = Some(hand_file.path().to_path_buf());
        blueprint.sources.thermal.driver = contracts::SourceDriver::Replay;
        blueprint.sources.thermal.replay_path = Some(thermal_file.path().to_path_buf());

        let captures = Captures::start(&blueprint);
        let transport = MockTransport::new();
        let probe = transport.probe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = SessionManager::new(transport, SessionPolicy::default(), shutdown_rx.clone());
        let session = SessionHandle::spawn(manager, shutdown_rx.clone());

        // wait for the link so no report is dropped as stale
        while !probe.is_connected() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let engine = Arc::new(FusionEngine::new(blueprint.fusion.clone()));
        let consumer = TickConsumer::new(Arc::clone(&captures.barrier), engine, shutdown_rx);
        let report = consumer.run(&session).await.unwrap();

        assert_eq!(report.exit, ConsumerExit::Exhausted);
        assert_eq!(report.ticks, 3);
        // a hand and a hazard in every tick
        assert_eq!(report.summary.present_reports, 3);

        assert_eq!(session.shutdown().await, SessionPhase::Closed);
        shutdown_tx.send_replace(true);

        let reports: Vec<_> = probe
            .frames()
            .iter()
            .map(|frame| wire::parse_bytes(frame).unwrap())
            .collect();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].signal, HazardSignal::Present);
        assert_eq!(reports[1].signal, HazardSignal::Present);
        assert_eq!(reports[2].signal, HazardSignal::Present);
        // hand inside the rectangle: negative distance, 5 px to the nearest edge
        assert!((reports[0].distance_cm + 5.0 * 1.08).abs() < 1e-6);
        // hand outside the rectangle: positive distance
        assert!(reports[1].distance_cm > 0.0);

        let exits = captures.stop();
        assert!(exits
            .iter()
            .all(|exit| matches!(exit, CaptureExit::Retired { .. })));
    }

    /// The link drops every few frames; the session keeps reconnecting
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_reconnects_after_link_loss() {
        let mut blueprint = fast_blueprint();
        blueprint.simulation.frame_interval_ms = 2;
        let captures = Captures::start(&blueprint);

        let transport = MockTransport::with_config(MockTransportConfig {
            drop_after_writes: Some(10),
            ..Default::default()
        });
        let probe = transport.probe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = SessionPolicy {
            backoff: Duration::from_millis(5),
            scan_retry: Duration::from_millis(5),
            ..SessionPolicy::default()
        };
        let manager = SessionManager::new(transport, policy, shutdown_rx.clone());
        let session = SessionHandle::spawn(manager, shutdown_rx.clone());

        let engine = Arc::new(FusionEngine::new(blueprint.fusion.clone()));
        let consumer = TickConsumer::new(Arc::clone(&captures.barrier), engine, shutdown_rx)
            .with_max_ticks(Some(100));
        let report = consumer.run(&session).await.unwrap();
        assert_eq!(report.ticks, 100);

        let metrics = Arc::clone(session.metrics());
        session.shutdown().await;
        shutdown_tx.send_replace(true);
        captures.stop();

        let snapshot = metrics.snapshot();
        assert!(snapshot.link_losses >= 1, "{snapshot:?}");
        assert!(probe.connects() >= 2, "connects: {}", probe.connects());
        assert!(snapshot.frames_sent > 10);
        assert_eq!(
            snapshot.frames_sent
                + snapshot.discarded_count
                + snapshot.dropped_count
                + snapshot.stale_count,
            100
        );
    }
}
