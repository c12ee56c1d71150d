// Library exports for kozosseg-server
// Lets the integration tests drive the router and services directly

pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod mail;
pub mod password;
pub mod rate_limit;
pub mod realtime;
pub mod session;
pub mod state;
pub mod storage;
pub mod verification;
