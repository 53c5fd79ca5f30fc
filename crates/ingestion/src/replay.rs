//! Replay drivers - 从 JSONL 录制文件回放传感器数据
//!
//! 热成像: 每行一个 `ThermalFrame`。
//! 手部检测: 每行一个 `{"hands": [[{"x":..,"y":..}, ...], ...]}`。
//! 文件结束时按 `loop_playback` 循环，否则报告断开 (源随之退役)。

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use contracts::{
    DetectedHand, HandDetector, Image, SensorFault, SourceId, ThermalCamera, ThermalFrame,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::error::{IngestionError, Result};

/// 逐行解析 JSONL，跳过空行
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| IngestionError::replay(path, e.to_string()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IngestionError::replay(path, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| IngestionError::replay(path, format!("line {}: {e}", line_no + 1)))?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(IngestionError::replay(path, "recording is empty"));
    }
    Ok(records)
}

/// 回放游标
#[derive(Debug)]
struct Cursor<T> {
    records: Vec<T>,
    next: usize,
    loop_playback: bool,
}

impl<T: Clone> Cursor<T> {
    fn advance(&mut self) -> Option<T> {
        if self.next >= self.records.len() {
            if !self.loop_playback {
                return None;
            }
            self.next = 0;
        }
        let record = self.records.get(self.next).cloned();
        self.next += 1;
        record
    }
}

/// 回放热成像帧
#[derive(Debug)]
pub struct ReplayThermalCamera {
    cursor: Cursor<ThermalFrame>,
    interval: Duration,
    stopped: bool,
}

impl ReplayThermalCamera {
    pub fn open(path: &Path, loop_playback: bool, interval: Duration) -> Result<Self> {
        let records = load_jsonl(path)?;
        info!(path = %path.display(), frames = records.len(), "loaded thermal recording");
        Ok(Self {
            cursor: Cursor {
                records,
                next: 0,
                loop_playback,
            },
            interval,
            stopped: false,
        })
    }

    pub fn len(&self) -> usize {
        self.cursor.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.records.is_empty()
    }
}

impl ThermalCamera for ReplayThermalCamera {
    fn read_frame(&mut self) -> std::result::Result<ThermalFrame, SensorFault> {
        if self.stopped {
            return Err(SensorFault::disconnected(SourceId::Thermal, "replay stopped"));
        }
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        self.cursor
            .advance()
            .ok_or_else(|| SensorFault::disconnected(SourceId::Thermal, "end of recording"))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HandRecord {
    #[serde(default)]
    hands: Vec<DetectedHand>,
}

/// 回放手部检测结果 (与帧内容无关，每次调用取下一行)
#[derive(Debug)]
pub struct ReplayHandDetector {
    cursor: Cursor<HandRecord>,
}

impl ReplayHandDetector {
    pub fn open(path: &Path, loop_playback: bool) -> Result<Self> {
        let records = load_jsonl(path)?;
        info!(path = %path.display(), frames = records.len(), "loaded hand recording");
        Ok(Self {
            cursor: Cursor {
                records,
                next: 0,
                loop_playback,
            },
        })
    }
}

impl HandDetector for ReplayHandDetector {
    fn detect_hand_landmarks(
        &mut self,
        _image: &Image,
        max_hands: usize,
    ) -> std::result::Result<Vec<DetectedHand>, SensorFault> {
        let mut record = self
            .cursor
            .advance()
            .ok_or_else(|| SensorFault::disconnected(SourceId::Visual, "end of recording"))?;
        record.hands.truncate(max_hands);
        Ok(record.hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::FrameHeader;
    use std::io::Write;

    fn write_lines(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn image() -> Image {
        Image {
            width: 1,
            height: 1,
            sequence: 0,
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_thermal_replay_ends_with_disconnect() {
        let frames: Vec<String> = (1..=2)
            .map(|n| {
                serde_json::to_string(&ThermalFrame {
                    header: FrameHeader {
                        frame_counter: n,
                        timestamp_ms: n * 100,
                    },
                    width: 2,
                    height: 1,
                    temperatures: vec![20.0, 50.0],
                })
                .unwrap()
            })
            .collect();
        let file = write_lines(&frames);

        let mut camera = ReplayThermalCamera::open(file.path(), false, Duration::ZERO).unwrap();
        assert_eq!(camera.len(), 2);
        assert_eq!(camera.read_frame().unwrap().header.frame_counter, 1);
        assert_eq!(camera.read_frame().unwrap().header.frame_counter, 2);
        assert!(camera.read_frame().unwrap_err().is_fatal());
    }

    #[test]
    fn test_hand_replay_loops() {
        let file = write_lines(&[
            r#"{"hands": [[{"x": 0.5, "y": 0.5}], [{"x": 0.1, "y": 0.1}]]}"#.to_string(),
            String::new(),
            r#"{"hands": []}"#.to_string(),
        ]);
        let mut detector = ReplayHandDetector::open(file.path(), true).unwrap();

        assert_eq!(detector.detect_hand_landmarks(&image(), 1).unwrap().len(), 1);
        assert!(detector.detect_hand_landmarks(&image(), 1).unwrap().is_empty());
        assert_eq!(detector.detect_hand_landmarks(&image(), 4).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let file = write_lines(&[r#"{"hands": []}"#.to_string(), "not json".to_string()]);
        let err = ReplayHandDetector::open(file.path(), false).unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {err}");
    }

    #[test]
    fn test_empty_recording_rejected() {
        let file = write_lines(&[]);
        assert!(ReplayThermalCamera::open(file.path(), false, Duration::ZERO).is_err());
    }
}
