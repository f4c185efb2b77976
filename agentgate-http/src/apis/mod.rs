pub mod health;
pub mod query;
pub mod sessions;

pub use health::handle_health;
pub use query::handle_query;
pub use sessions::{
    handle_create_session, handle_delete_session, handle_get_session, handle_list_sessions,
    handle_session_query,
};

/// Streaming is the default for both query endpoints
pub(crate) fn default_stream() -> bool {
    true
}
