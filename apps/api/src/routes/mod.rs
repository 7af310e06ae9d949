pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::chat;
use crate::generated;
use crate::resume;
use crate::sessions;
use crate::state::AppState;
use crate::users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Users
        .route(
            "/api/v1/users",
            post(users::handlers::handle_create_user).get(users::handlers::handle_list_users),
        )
        .route(
            "/api/v1/users/me/personality-profile",
            get(users::personality::handle_get_personality_profile),
        )
        .route(
            "/api/v1/users/:id",
            get(users::handlers::handle_get_user)
                .patch(users::handlers::handle_update_user)
                .delete(users::handlers::handle_delete_user),
        )
        // Résumé
        .route(
            "/api/v1/resume",
            post(resume::handlers::handle_create_resume)
                .get(resume::handlers::handle_get_resume)
                .patch(resume::handlers::handle_update_resume),
        )
        .route(
            "/api/v1/resume/completion-details",
            get(resume::handlers::handle_completion_details),
        )
        .route(
            "/api/v1/resume/experiences",
            post(resume::handlers::handle_add_experience),
        )
        .route(
            "/api/v1/resume/experiences/:id",
            patch(resume::handlers::handle_update_experience)
                .delete(resume::handlers::handle_delete_experience),
        )
        .route(
            "/api/v1/resume/skills",
            post(resume::handlers::handle_add_skill),
        )
        .route(
            "/api/v1/resume/skills/:id",
            patch(resume::handlers::handle_update_skill)
                .delete(resume::handlers::handle_delete_skill),
        )
        .route(
            "/api/v1/resume/languages",
            post(resume::handlers::handle_add_language),
        )
        .route(
            "/api/v1/resume/languages/:id",
            patch(resume::handlers::handle_update_language)
                .delete(resume::handlers::handle_delete_language),
        )
        .route(
            "/api/v1/resume/educations",
            post(resume::handlers::handle_add_education),
        )
        .route(
            "/api/v1/resume/educations/:id",
            patch(resume::handlers::handle_update_education)
                .delete(resume::handlers::handle_delete_education),
        )
        .route(
            "/api/v1/resume/certifications",
            post(resume::handlers::handle_add_certification),
        )
        .route(
            "/api/v1/resume/certifications/:id",
            patch(resume::handlers::handle_update_certification)
                .delete(resume::handlers::handle_delete_certification),
        )
        // Chats
        .route(
            "/api/v1/chats",
            post(chat::handlers::handle_create_chat).get(chat::handlers::handle_list_chats),
        )
        .route(
            "/api/v1/chats/messages",
            post(chat::messages::handle_create_message_new),
        )
        .route(
            "/api/v1/chats/upload-resume",
            post(chat::upload::handle_upload_resume_new),
        )
        .route(
            "/api/v1/chats/:id",
            get(chat::handlers::handle_get_chat).delete(chat::handlers::handle_delete_chat),
        )
        .route(
            "/api/v1/chats/:id/title",
            patch(chat::handlers::handle_update_chat_title),
        )
        .route(
            "/api/v1/chats/:id/messages",
            post(chat::messages::handle_create_message).get(chat::handlers::handle_list_messages),
        )
        .route(
            "/api/v1/chats/:id/messages/stream",
            post(chat::stream::handle_stream_message),
        )
        .route(
            "/api/v1/chats/:id/messages/search",
            post(chat::handlers::handle_search_messages),
        )
        .route(
            "/api/v1/chats/:id/upload-resume",
            post(chat::upload::handle_upload_resume),
        )
        // Anonymous sessions
        .route(
            "/api/v1/sessions/anonymous",
            post(sessions::handlers::handle_create_session),
        )
        .route(
            "/api/v1/sessions/transfer",
            post(sessions::handlers::handle_transfer_session),
        )
        .route(
            "/api/v1/sessions/metrics/conversion",
            get(sessions::handlers::handle_conversion_metrics),
        )
        .route(
            "/api/v1/sessions/:session_id",
            get(sessions::handlers::handle_get_session),
        )
        // Generated résumés
        .route(
            "/api/v1/generated-resumes",
            post(generated::handlers::handle_create_generated)
                .get(generated::handlers::handle_list_generated),
        )
        .route(
            "/api/v1/generated-resumes/:id",
            get(generated::handlers::handle_get_generated)
                .patch(generated::handlers::handle_update_generated)
                .delete(generated::handlers::handle_delete_generated),
        )
        // AI
        .route(
            "/api/v1/ai/generate-personality",
            post(users::personality::handle_generate_personality),
        )
        .with_state(state)
}
