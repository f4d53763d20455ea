mod commands;
mod send;
mod serve;
mod utils;

pub use commands::{Cli, Commands};
pub use send::run_send;
pub use serve::run_serve;
pub use utils::init_logging;
