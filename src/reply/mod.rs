//! Reply path: validate an inbound email, run the reply-generation
//! collaborator, and evaluate its answers.

pub mod adapter;
pub mod generator;
pub mod http;
pub mod types;

pub use adapter::ReplyAdapter;
pub use generator::{GeneratedReply, ReplyGenerator, UnavailableGenerator};
pub use http::HttpReplyGenerator;
pub use types::{EmailRequest, EmailResponse, ReplyMetadata};
