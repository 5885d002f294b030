//! Live departure boards for Taiwan Railway.
//!
//! Pulls timetables and the live board from the TDX API, reconciles them
//! into per-station departure lists that stay correct across midnight, and
//! relays the upstream endpoints through a shared cache.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod live;
pub mod provider;
pub mod relay;
pub mod tdx;
pub mod timetable;
