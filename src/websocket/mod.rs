pub mod handler;
pub mod msg_comment_handler;
pub mod msg_join_handler;
pub mod msg_marker_handler;
pub mod msg_presence_handler;
