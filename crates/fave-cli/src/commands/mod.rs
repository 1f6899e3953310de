//! Command handlers

pub mod apply;
pub mod config;
pub mod favorite;
pub mod status;
