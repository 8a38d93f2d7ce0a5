//! MemberLab Runner: pipeline configuration, the daily and monthly pipelines, reports and export.
//!
//! This crate builds on `memberlab-core` to provide:
//! - TOML pipeline configuration with validation
//! - Daily (ticker history) and monthly (snapshot table) pipelines
//! - Run report with failure notes and a BLAKE3 dataset hash
//! - CSV / Parquet / JSON output files

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;

pub use config::{ConfigError, IndexKind, PipelineConfig, ProviderKind};
pub use export::{write_outputs, ExportError};
pub use pipeline::{open_provider, run, run_daily, run_monthly, PipelineError, PipelineOutput};
pub use report::{dataset_hash, FailureNote, PipelineKind, RunReport};
