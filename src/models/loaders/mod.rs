pub mod toml_loader;

pub use toml_loader::{load_job_file, parse_job, CrowdJob};
