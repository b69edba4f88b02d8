//! Framecode Core Library
//!
//! Command line plumbing for framecode: configuration, logging, the batch
//! export worker and the synthetic recording demo.

pub mod batch;
pub mod colored_logger;
pub mod config;
pub mod demo;
pub mod info;
