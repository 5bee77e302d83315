//! # Gatecheck Gate
//!
//! The gate admission application: configuration, metrics exporter,
//! presentation adapter and the admission desk driven by the `gatecheck`
//! binary.
//!
//! ## Example
//!
//! ```ignore
//! use gatecheck_gate::{admission::AdmissionDesk, config::Config};
//!
//! let config = Config::from_env();
//! let desk = AdmissionDesk::new(service, config.gate.event_gate(), config.gate.operator());
//! println!("{}", desk.handle_command(GateCommand::Scan(line)).await?);
//! ```

pub mod admission;
pub mod config;
pub mod demo;
pub mod metrics;
pub mod presentation;

pub use admission::{AdmissionDesk, AdmissionSummary, GateCommand, run_nfc_admission};
pub use config::Config;
