pub mod btag;
pub mod config;
pub mod dnn;
pub mod error;
pub mod event;
pub mod isolation;
pub mod jets;
pub mod kinematics;
pub mod leptons;
pub mod momentum;
pub mod neutrino;
pub mod objects;
pub mod record;
pub mod resonance;
pub mod truth;
pub mod weights;

pub use crate::config::Configuration;
pub use crate::error::{ConfigError, Error, ReadError, Result};
pub use crate::event::{Reconstruction, RecordState, Session, Tools};
pub use crate::momentum::FourMomentum;
pub use crate::record::{Column, MemorySource, Record, RecordSource};
pub use crate::weights::Systematic;

/// Reconstruct a single record
///
/// Fields required by the configuration are checked before anything
/// is reconstructed. For more than one record, set up a
/// [`Reconstruction`] once and reuse it.
pub fn build_record(config: Configuration, tools: Tools, record: &Record) -> Result<RecordState> {
    let reco = Reconstruction::new(config, tools)?;
    reco.check_record(record)?;
    Ok(reco.build_record(0, record)?)
}
