//! Thermal hazard source

use contracts::{
    HazardDetector, HazardObservation, Observation, SensorFault, SourceId, ThermalCamera,
    ThermalSourceConfig,
};
use tracing::{debug, trace};

use crate::ObservationSource;

/// Thermal array → hazard contours above the configured temperature
pub struct ThermalHazardSource<T: ThermalCamera, D: HazardDetector> {
    camera: T,
    detector: D,
    config: ThermalSourceConfig,
}

impl<T: ThermalCamera, D: HazardDetector> ThermalHazardSource<T, D> {
    pub fn new(camera: T, detector: D, config: ThermalSourceConfig) -> Self {
        debug!(
            hazard_temp_c = config.hazard_temp_c,
            max_hazards = config.max_hazards,
            "thermal source created"
        );
        Self {
            camera,
            detector,
            config,
        }
    }

    pub fn config(&self) -> &ThermalSourceConfig {
        &self.config
    }
}

impl<T: ThermalCamera, D: HazardDetector> ObservationSource for ThermalHazardSource<T, D> {
    fn source_id(&self) -> SourceId {
        SourceId::Thermal
    }

    fn observe(&mut self) -> Result<Observation, SensorFault> {
        let frame = self.camera.read_frame()?;
        if !frame.is_consistent() {
            return Err(SensorFault::detector(
                SourceId::Thermal,
                format!(
                    "frame {} is {}x{} but carries {} values",
                    frame.header.frame_counter,
                    frame.width,
                    frame.height,
                    frame.temperatures.len()
                ),
            ));
        }

        let contours = self
            .detector
            .detect_hazard_contours(&frame, self.config.hazard_temp_c)?
            .into_iter()
            .filter(|polygon| polygon.area() > self.config.min_contour_area)
            .collect();
        let observation = HazardObservation::with_capacity_limit(contours, self.config.max_hazards);

        trace!(
            frame = frame.header.frame_counter,
            hazards = observation.count(),
            "hazard observation"
        );
        Ok(observation.into())
    }
}

impl<T: ThermalCamera, D: HazardDetector> Drop for ThermalHazardSource<T, D> {
    fn drop(&mut self) {
        self.camera.stop();
        debug!("thermal source stopped");
    }
}
