//! Param Adventures Access Server
//!
//! Role-based access control for the Param Adventures trip platform:
//! users hold roles, roles grant permission keys, routes declare the keys they need.

pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod permissions;
