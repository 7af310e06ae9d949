// Résumé domain: one résumé per user, section items in jsonb arrays.
// Completion scoring and the transactional item engine live here; handlers
// expose the REST surface under /api/v1/resume.

pub mod completion;
pub mod handlers;
pub mod items;
