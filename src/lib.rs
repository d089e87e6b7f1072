//! docflux: an in-process markdown conversion queue with a bounded worker pool.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
