//! Resume API: notification core and the live-update / activity-log services
//! it talks to.

pub mod activity;
pub mod config;
pub mod db;
pub mod errors;
pub mod live;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod state;
