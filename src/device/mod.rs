pub mod interface;
pub mod simulator;

pub use interface::{select, Session, StgInterface};
pub use simulator::{SimulatedStg, SimulatorConfig, StagedWaveform};
