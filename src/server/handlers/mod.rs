//! Request handlers, grouped by API area.

pub mod accounts;
pub mod messages;
pub mod posts;
pub mod social;
pub mod wellness;
