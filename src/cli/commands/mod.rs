//! CLI command implementations.

mod batch;
mod parse;
mod serve;
mod sitemap;
mod status;

pub use batch::{cmd_batch, run_batch};
pub use parse::{cmd_parse, cmd_parse_html};
pub use serve::cmd_serve;
pub use sitemap::cmd_sitemap;
pub use status::cmd_status;
