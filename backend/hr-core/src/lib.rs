// src/lib.rs

pub mod api;
pub mod api_client;
pub mod attendance;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod entity;
pub mod error;
pub mod fixtures;
pub mod memory_store;
pub mod models;
pub mod query;
pub mod remote_store;
pub mod service;
pub mod store;

mod api_tests;

pub use config::Settings;
pub use error::{HrError, Result};
pub use service::{HrService, TransitionPolicy};
pub use store::{Backend, EntityStore, Stores};
