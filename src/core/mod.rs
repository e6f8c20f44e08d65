//! Core module - the simulation loop

mod simulation;

pub use simulation::{jittered, CycleReport, SimulationLoop};
