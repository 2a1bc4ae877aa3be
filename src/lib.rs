// src/lib.rs

//! Catalog Crawler Library
//!
//! Crawls a college program catalog and normalizes program and course
//! requirements into a canonical JSON model.

pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
