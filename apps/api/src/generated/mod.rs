// Generated résumés: job-tailored snapshots of the base résumé. Creation
// freezes the owner's profile and section arrays into a jsonb `content`
// blob; later edits to the base résumé never touch a snapshot.

pub mod handlers;
