//! CLI command implementations.

mod ask;
mod config;
mod convert;
mod describe;
mod doctor;
mod ingest;
mod list;
mod search;
mod serve;
mod upload;

pub use ask::run_ask;
pub use config::run_config;
pub use convert::run_convert;
pub use describe::run_describe;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;
pub use serve::run_serve;
pub use upload::run_upload;
