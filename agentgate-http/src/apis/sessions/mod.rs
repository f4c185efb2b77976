pub mod handler;
pub mod types;

pub use handler::{
    handle_create_session, handle_delete_session, handle_get_session, handle_list_sessions,
    handle_session_query,
};
pub use types::*;
