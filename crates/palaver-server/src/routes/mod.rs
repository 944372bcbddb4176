//! Route handlers.

pub mod chat;
pub mod health;

pub use chat::{
    SubmitRequest, SubmitResponse, VoteRequest, delete_handler, list_handler, messages_handler,
    stream_handler, submit_handler, vote_handler,
};
pub use health::health_routes;
