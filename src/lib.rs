// src/lib.rs

//! ghwatch: standing watch over GitHub search results

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;
pub mod storage;
pub mod utils;
