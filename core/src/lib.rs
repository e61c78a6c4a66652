pub mod config;
pub mod experiment;
pub mod metrics;
pub mod report;
pub mod rng;
pub mod visualization;

pub use config::{load_or_init, Validate};
pub use experiment::RunMode;
pub use metrics::{ChunkCounts, ConfusionMatrix, EpochMetrics, EvaluationMetrics};
pub use report::{
    ensure_report_file, markdown_table, update_sections, ReportSection, DEFAULT_REPORT_TEMPLATE,
};
pub use rng::{epoch_seed, seeded_rng};
pub use visualization::{
    encode_file_data_url, encode_luma_png_data_url, encode_rgb_png_data_url, normalize_to_unit,
};
