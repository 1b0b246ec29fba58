//! # Repositories
//!
//! This module contains repository implementations that encapsulate SeaORM
//! operations for the structured tables, plus plan compilation for the
//! template engine.

pub mod account;
pub mod gps;
pub mod notice;
pub mod report;
pub mod system_log;
pub mod template;
pub mod tree;
pub mod user;

pub use account::AccountRepository;
pub use gps::GpsRepository;
pub use notice::NoticeRepository;
pub use report::ReportRepository;
pub use system_log::SystemLogRepository;
pub use template::TemplateRepository;
pub use tree::TreeRepository;
pub use user::UserRepository;
