//! Sources built from the device blueprint

use contracts::{
    DeviceBlueprint, FrameCamera, HandDetector, HazardDetector, SourceDriver, ThermalCamera,
};
use tracing::info;

use crate::error::{IngestionError, Result};
use crate::replay::{ReplayHandDetector, ReplayThermalCamera};
use crate::sim::{SimulatedCamera, SimulatedHandDetector, SimulatedThermalCamera};
use crate::{BlobHazardDetector, ThermalHazardSource, VisualHandSource};

pub type DynVisualSource = VisualHandSource<Box<dyn FrameCamera>, Box<dyn HandDetector>>;
pub type DynThermalSource = ThermalHazardSource<Box<dyn ThermalCamera>, Box<dyn HazardDetector>>;

/// Hand tracker source for the configured driver
pub fn build_visual_source(blueprint: &DeviceBlueprint) -> Result<DynVisualSource> {
    let config = &blueprint.sources.visual;
    let simulation = &blueprint.simulation;
    let camera: Box<dyn FrameCamera> = Box::new(SimulatedCamera::new(simulation.frame_interval()));

    let detector: Box<dyn HandDetector> = match config.driver {
        SourceDriver::Simulated => Box::new(SimulatedHandDetector::from_config(simulation)),
        SourceDriver::Replay => {
            let path = config.replay_path.as_deref().ok_or_else(|| {
                IngestionError::replay("<unset>", "sources.visual.replay_path is required")
            })?;
            Box::new(ReplayHandDetector::open(path, config.replay_loop)?)
        }
    };

    info!(driver = ?config.driver, "visual source ready");
    Ok(VisualHandSource::new(camera, detector, config.clone()))
}

/// Thermal hazard source for the configured driver
pub fn build_thermal_source(blueprint: &DeviceBlueprint) -> Result<DynThermalSource> {
    let config = &blueprint.sources.thermal;
    let simulation = &blueprint.simulation;

    let camera: Box<dyn ThermalCamera> = match config.driver {
        SourceDriver::Simulated => Box::new(SimulatedThermalCamera::from_config(
            simulation,
            blueprint.sources.visual.frame_width as usize,
            blueprint.sources.visual.frame_height as usize,
        )),
        SourceDriver::Replay => {
            let path = config.replay_path.as_deref().ok_or_else(|| {
                IngestionError::replay("<unset>", "sources.thermal.replay_path is required")
            })?;
            Box::new(ReplayThermalCamera::open(
                path,
                config.replay_loop,
                simulation.frame_interval(),
            )?)
        }
    };

    info!(driver = ?config.driver, "thermal source ready");
    Ok(ThermalHazardSource::new(
        camera,
        Box::new(BlobHazardDetector::new()),
        config.clone(),
    ))
}
