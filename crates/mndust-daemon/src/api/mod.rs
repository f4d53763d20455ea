pub mod handlers;
pub mod responses;
pub mod server;

pub use server::{ApiContext, ApiServer};
