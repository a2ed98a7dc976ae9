pub mod config;
pub mod model;
pub mod observation;
pub mod report;
pub mod sample_size;
pub mod simulation;
pub mod stats;
