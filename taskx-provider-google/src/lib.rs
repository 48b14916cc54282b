//! Google implementations of the taskx provider traits.
//!
//! - [`GoogleCalendar`]: OAuth consent/exchange/refresh and the dedicated
//!   calendar's events, through the `google-calendar` client
//! - [`IdentityToolkit`]: bearer identity token verification

mod calendar;
mod identity;
mod oauth;
mod to_google;

pub use identity::IdentityToolkit;
pub use oauth::{GoogleCalendar, SCOPES};
