//! Core types and services for taskx.
//!
//! This crate holds everything that does not depend on a particular provider:
//! - `task` / `user` documents and the `store` traits that persist them
//! - `calendar::CalendarConnector`, mirroring task deadlines to a calendar
//! - `reminder::ReminderDispatcher`, the email/SMS deadline reminder job
//! - `tasks::TaskService`, task mutations that keep the calendar in step

pub mod calendar;
pub mod config;
pub mod error;
pub mod identity;
pub mod reminder;
pub mod store;
pub mod task;
pub mod tasks;
pub mod user;

#[cfg(any(test, feature = "mocks"))]
pub mod mock;

pub use error::{TaskxError, TaskxResult};
