pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduling;
pub mod store;
