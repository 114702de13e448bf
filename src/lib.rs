//! wardrobe-ai
//!
//! The asynchronous AI job pipeline behind a virtual-wardrobe application:
//! durable jobs, a Gemini-backed generation adapter, an image pipeline
//! (download, composite, optimize, upload), per-job-type handlers, and a
//! client-side polling protocol with backoff and circuit breaking.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
