use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Applies the schema. Every statement is idempotent, so this is safe to run
/// on every startup.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        avatar_url TEXT,
        plan_type TEXT NOT NULL DEFAULT 'free',
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        phone TEXT,
        cpf TEXT,
        birth_date TEXT,
        has_disability BOOLEAN,
        race TEXT,
        sexual_orientation TEXT,
        gender TEXT,
        state TEXT,
        city TEXT,
        salary_expectation TEXT,
        has_cnh BOOLEAN,
        instagram TEXT,
        facebook TEXT,
        linkedin TEXT,
        portfolio TEXT,
        professional_summary TEXT,
        career_goals TEXT,
        personality_profile JSONB,
        personality_generated_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resumes (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        experiences JSONB NOT NULL DEFAULT '[]'::jsonb,
        skills JSONB NOT NULL DEFAULT '[]'::jsonb,
        languages JSONB NOT NULL DEFAULT '[]'::jsonb,
        educations JSONB NOT NULL DEFAULT '[]'::jsonb,
        certifications JSONB NOT NULL DEFAULT '[]'::jsonb,
        completion_score INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_resumes_user_active
        ON resumes (user_id) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chats (
        id UUID PRIMARY KEY,
        user_id UUID REFERENCES users(id),
        title TEXT NOT NULL DEFAULT 'New Conversation',
        message_count INTEGER NOT NULL DEFAULT 0,
        last_message_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        chat_id UUID NOT NULL REFERENCES chats(id),
        role TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'text',
        content TEXT NOT NULL,
        pdf_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_messages_chat_created
        ON messages (chat_id, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_sessions (
        id UUID PRIMARY KEY,
        session_id UUID NOT NULL UNIQUE,
        user_id UUID REFERENCES users(id),
        chat_id UUID REFERENCES chats(id),
        is_anonymous BOOLEAN NOT NULL DEFAULT TRUE,
        source TEXT NOT NULL DEFAULT 'web',
        resume_data JSONB,
        original_resume_data JSONB,
        expires_at TIMESTAMPTZ NOT NULL,
        converted_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chat_sessions_expires
        ON chat_sessions (expires_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS generated_resumes (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id),
        base_resume_id UUID NOT NULL REFERENCES resumes(id),
        title TEXT NOT NULL,
        job_description TEXT,
        content JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_published BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];
