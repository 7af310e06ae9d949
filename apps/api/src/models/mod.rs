pub mod chat;
pub mod generated;
pub mod pagination;
pub mod resume;
pub mod session;
pub mod user;
