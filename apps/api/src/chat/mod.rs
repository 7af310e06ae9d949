// Conversations with the resume assistant. Chats belong to a user or to
// nobody (anonymous); messages carry a role (who said it) and a message
// type (plain text or pdf attachment). Replies come from the AI service,
// either in one shot or as an SSE relay.

pub mod handlers;
pub mod messages;
pub mod stream;
pub mod upload;
