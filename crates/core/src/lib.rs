//! Domain model and pure engine logic for the gated video course: watch
//! tracking, unlock/stage calculation, survey validation and scoring, and
//! report aggregation. Nothing here touches storage or the network.

#![forbid(unsafe_code)]

pub mod answer_key;
pub mod error;
pub mod model;
pub mod report;
pub mod scoring;
pub mod settings;
pub mod time;
pub mod tracker;
pub mod unlock;

pub use error::Error;
pub use settings::EngineSettings;
pub use time::Clock;
