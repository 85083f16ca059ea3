pub mod auth;
pub mod logging;
pub mod server;
pub mod storage;
