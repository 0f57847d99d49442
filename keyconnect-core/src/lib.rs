//! Request methods for hardware signing devices
//!
//! Parses caller requests into typed methods, checks them before any device
//! contact, and runs them against the active device with PIN retry, referenced
//! transaction lookups and bundled progress reporting.

pub mod backend;
pub mod bundle;
pub mod coin;
pub mod config;
pub mod error;
pub mod executor;
pub mod identity;
pub mod methods;
pub mod params;
pub mod path;
pub mod resolver;
pub mod response;
pub mod signtx;
pub mod tx;

pub use backend::{AccountInfo, Backend, BackendFactory, BackendTransaction, HttpBackends};
pub use bundle::{Bundle, ProgressSender};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::Executor;
pub use identity::Identity;
pub use methods::{Contract, Method, Permission};
pub use response::{BUNDLE_PROGRESS, BundleProgress, Request, Response};

// Re-export the device layer for front ends
pub use keyconnect_device;
