pub mod handler;
pub mod types;

pub use handler::handle_query;
pub use types::{QueryRequest, QueryResponse};
