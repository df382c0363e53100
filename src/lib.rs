//! Manage Apache, Nginx and Caddy virtual hosts on one Linux host.
//!
//! The core is the site model: [`server`] knows where each server keeps its
//! configs, [`vhost`] renders them, [`detect`] finds the owner of a domain
//! and [`site`] switches sites on and off. Everything else wraps shell
//! tools around that model through a [`shell::Executor`].

pub mod backup;
pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod detect;
pub mod domain;
pub mod error;
pub mod firewall;
pub mod inventory;
pub mod lock;
pub mod logger;
pub mod logs;
pub mod monitor;
pub mod remote;
pub mod security;
pub mod server;
pub mod shell;
pub mod site;
pub mod ssl;
pub mod system;
pub mod users;
pub mod vhost;
