pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod content_hash;
pub(crate) mod error;
pub(crate) mod gate;
pub(crate) mod git;
pub(crate) mod image;
pub(crate) mod kernel;
pub(crate) mod pipeline;
pub(crate) mod plan;
pub(crate) mod process;
pub(crate) mod registry;
pub(crate) mod scheduler;
pub(crate) mod summary;
pub(crate) mod target;
pub(crate) mod temp_path;
pub(crate) mod time_ext;
pub(crate) mod version;

pub mod cli;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;
