//! # Formbase API Library
//!
//! Core functionality for the Formbase service: a multi-tenant form-template
//! engine serving a fixed set of physical tables through one generic REST
//! API, plus the auxiliary account/notice/GPS/tree/report/auth surfaces.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateways;
pub mod handlers;
pub mod idgen;
pub mod models;
pub mod pagination;
pub mod repositories;
pub mod server;
pub mod tasks;
pub mod telemetry;
pub use migration;
