// src/lib.rs
pub mod accounts;
pub mod action_config;
pub mod cache;
pub mod config;
pub mod db;
pub mod devices;
pub mod error;
pub mod models;
pub mod registry;
pub mod scenario;
pub mod scenarios;
pub mod selection;
pub mod store;
