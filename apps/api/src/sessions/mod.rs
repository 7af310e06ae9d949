// Anonymous sessions: a pre-signup foothold for the chat. A session holds
// the résumé data parsed from an anonymous upload; signing up transfers the
// session (and its chat, if one was linked) to the new account exactly once.
// Expired anonymous sessions are swept by a background task.

pub mod cleanup;
pub mod handlers;
