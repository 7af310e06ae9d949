// User accounts: profile CRUD plus the DISC-style personality profile
// derived from AI-generated scores.

pub mod handlers;
pub mod personality;
