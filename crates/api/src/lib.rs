//! Entry points of the fulfillment core: configuration, service wiring and
//! request/response mapping.

pub mod config;
pub mod dto;
pub mod errors;
pub mod services;

pub use config::{AppConfig, ConfigError};
pub use errors::ApiError;
pub use services::{FulfillmentService, Stores};
