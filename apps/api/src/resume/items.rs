// Array-item engine for the five résumé sections stored as jsonb columns.
// Every mutation is a read-modify-write splice inside a transaction: the
// résumé row is locked, the array is spliced, and the completion score is
// recomputed before commit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{
    Certification, Education, Experience, Language, ResumeRow, Skill,
};
use crate::models::user::UserRow;
use crate::resume::completion::completion_score;

/// The five jsonb array columns. `column()` is the whitelist that keeps
/// dynamic SQL safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Experiences,
    Skills,
    Languages,
    Educations,
    Certifications,
}

impl Section {
    pub fn column(self) -> &'static str {
        match self {
            Section::Experiences => "experiences",
            Section::Skills => "skills",
            Section::Languages => "languages",
            Section::Educations => "educations",
            Section::Certifications => "certifications",
        }
    }

    fn array_of(self, resume: &ResumeRow) -> Value {
        match self {
            Section::Experiences => resume.experiences.clone(),
            Section::Skills => resume.skills.clone(),
            Section::Languages => resume.languages.clone(),
            Section::Educations => resume.educations.clone(),
            Section::Certifications => resume.certifications.clone(),
        }
    }
}

// ─── wire DTOs ──────────────────────────────────────────────────────────────

/// Distinguishes "field absent" from "field set to null" in PATCH bodies.
/// Absent fields default to `None`; an explicit `null` becomes `Some(None)`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceInput {
    pub position: String,
    pub company: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperiencePatch {
    pub position: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<String>>,
    pub current: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub level: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInput {
    pub name: String,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagePatch {
    pub name: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationInput {
    pub degree: String,
    pub institution: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationPatch {
    pub degree: Option<String>,
    pub institution: Option<String>,
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<String>>,
    pub current: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationInput {
    pub name: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub completion_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub institution: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub completion_date: Option<Option<String>>,
}

// ─── date validation ────────────────────────────────────────────────────────

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_item_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|d| d.date_naive())
        })
}

struct Period {
    start: NaiveDate,
    /// Open periods (`current`) run until today.
    end: NaiveDate,
}

/// Shared date rules for experiences and educations: `current` and an end
/// date are mutually exclusive, one of them is required, the period must be
/// ordered and must not end in the future.
fn validate_period(
    start_date: &str,
    end_date: Option<&str>,
    current: bool,
    noun: &str,
) -> Result<Period, AppError> {
    if current && end_date.is_some() {
        return Err(AppError::Validation(format!(
            "An {noun} marked as current cannot have an end date"
        )));
    }
    if !current && end_date.is_none() {
        return Err(AppError::Validation(format!(
            "End date is required when the {noun} is not current"
        )));
    }

    let start = parse_item_date(start_date)
        .ok_or_else(|| AppError::Validation(format!("Invalid start date: {start_date}")))?;

    let today = Utc::now().date_naive();
    let end = match end_date {
        Some(raw) => {
            let end = parse_item_date(raw)
                .ok_or_else(|| AppError::Validation(format!("Invalid end date: {raw}")))?;
            if start >= end {
                return Err(AppError::Validation(
                    "Start date must be before end date".to_string(),
                ));
            }
            if end > today {
                return Err(AppError::Validation(
                    "End date cannot be in the future".to_string(),
                ));
            }
            end
        }
        None => today,
    };

    Ok(Period { start, end })
}

/// Rejects a period intersecting any other experience. The error names the
/// conflicting company.
fn validate_no_overlap(period: &Period, others: &[Experience]) -> Result<(), AppError> {
    for other in others {
        let Some(start) = parse_item_date(&other.start_date) else {
            continue;
        };
        let end = match (other.current, other.end_date.as_deref()) {
            (true, _) | (false, None) => Utc::now().date_naive(),
            (false, Some(raw)) => match parse_item_date(raw) {
                Some(d) => d,
                None => continue,
            },
        };

        if period.start <= end && start <= period.end {
            return Err(AppError::Validation(format!(
                "Period overlaps an existing experience at \"{}\"",
                other.company
            )));
        }
    }
    Ok(())
}

// ─── item builders ──────────────────────────────────────────────────────────

fn build_experience(input: ExperienceInput, others: &[Experience]) -> Result<Experience, AppError> {
    let period = validate_period(
        &input.start_date,
        input.end_date.as_deref(),
        input.current,
        "experience",
    )?;
    validate_no_overlap(&period, others)?;

    let now = Utc::now();
    Ok(Experience {
        id: Uuid::new_v4(),
        position: input.position,
        company: input.company,
        start_date: input.start_date,
        end_date: input.end_date,
        current: input.current,
        description: input.description,
        created_at: now,
        updated_at: now,
    })
}

fn patch_experience(
    mut item: Experience,
    patch: ExperiencePatch,
    others: &[Experience],
) -> Result<Experience, AppError> {
    if let Some(position) = patch.position {
        item.position = position;
    }
    if let Some(company) = patch.company {
        item.company = company;
    }
    if let Some(start_date) = patch.start_date {
        item.start_date = start_date;
    }
    if let Some(end_date) = patch.end_date {
        item.end_date = end_date;
    }
    if let Some(current) = patch.current {
        item.current = current;
    }
    if let Some(description) = patch.description {
        item.description = description;
    }

    let period = validate_period(
        &item.start_date,
        item.end_date.as_deref(),
        item.current,
        "experience",
    )?;
    validate_no_overlap(&period, others)?;

    item.updated_at = Utc::now();
    Ok(item)
}

fn build_education(input: EducationInput) -> Result<Education, AppError> {
    validate_period(
        &input.start_date,
        input.end_date.as_deref(),
        input.current,
        "education",
    )?;

    let now = Utc::now();
    Ok(Education {
        id: Uuid::new_v4(),
        degree: input.degree,
        institution: input.institution,
        start_date: input.start_date,
        end_date: input.end_date,
        current: input.current,
        created_at: now,
        updated_at: now,
    })
}

fn patch_education(mut item: Education, patch: EducationPatch) -> Result<Education, AppError> {
    if let Some(degree) = patch.degree {
        item.degree = degree;
    }
    if let Some(institution) = patch.institution {
        item.institution = institution;
    }
    if let Some(start_date) = patch.start_date {
        item.start_date = start_date;
    }
    if let Some(end_date) = patch.end_date {
        item.end_date = end_date;
    }
    if let Some(current) = patch.current {
        item.current = current;
    }

    validate_period(
        &item.start_date,
        item.end_date.as_deref(),
        item.current,
        "education",
    )?;

    item.updated_at = Utc::now();
    Ok(item)
}

fn build_skill(input: SkillInput) -> Skill {
    let now = Utc::now();
    Skill {
        id: Uuid::new_v4(),
        name: input.name,
        level: input.level,
        created_at: now,
        updated_at: now,
    }
}

fn patch_skill(mut item: Skill, patch: SkillPatch) -> Skill {
    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(level) = patch.level {
        item.level = level;
    }
    item.updated_at = Utc::now();
    item
}

fn build_language(input: LanguageInput) -> Language {
    let now = Utc::now();
    Language {
        id: Uuid::new_v4(),
        name: input.name,
        level: input.level,
        created_at: now,
        updated_at: now,
    }
}

fn patch_language(mut item: Language, patch: LanguagePatch) -> Language {
    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(level) = patch.level {
        item.level = level;
    }
    item.updated_at = Utc::now();
    item
}

fn build_certification(input: CertificationInput) -> Certification {
    let now = Utc::now();
    Certification {
        id: Uuid::new_v4(),
        name: input.name,
        institution: input.institution,
        completion_date: input.completion_date,
        created_at: now,
        updated_at: now,
    }
}

fn patch_certification(mut item: Certification, patch: CertificationPatch) -> Certification {
    if let Some(name) = patch.name {
        item.name = name;
    }
    if let Some(institution) = patch.institution {
        item.institution = institution;
    }
    if let Some(completion_date) = patch.completion_date {
        item.completion_date = completion_date;
    }
    item.updated_at = Utc::now();
    item
}

// ─── splice helpers ─────────────────────────────────────────────────────────

fn parse_items<T: serde::de::DeserializeOwned>(
    array: &Value,
    section: Section,
) -> Result<Vec<T>, AppError> {
    serde_json::from_value(array.clone()).map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "corrupt {} array on resume: {e}",
            section.column()
        ))
    })
}

fn to_array<T: Serialize>(items: &[T]) -> Result<Value, AppError> {
    serde_json::to_value(items).map_err(|e| AppError::Internal(e.into()))
}

fn splice_update<T, F>(mut items: Vec<T>, item_id: Uuid, not_found: &str, apply: F) -> Result<Vec<T>, AppError>
where
    F: FnOnce(T) -> Result<T, AppError>,
    T: HasId,
{
    let index = items
        .iter()
        .position(|i| i.id() == item_id)
        .ok_or_else(|| AppError::NotFound(not_found.to_string()))?;
    let existing = items.remove(index);
    let updated = apply(existing)?;
    items.insert(index, updated);
    Ok(items)
}

fn splice_delete<T: HasId>(items: Vec<T>, item_id: Uuid, not_found: &str) -> Result<Vec<T>, AppError> {
    let before = items.len();
    let filtered: Vec<T> = items.into_iter().filter(|i| i.id() != item_id).collect();
    if filtered.len() == before {
        return Err(AppError::NotFound(not_found.to_string()));
    }
    Ok(filtered)
}

trait HasId {
    fn id(&self) -> Uuid;
}

macro_rules! impl_has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn id(&self) -> Uuid {
                self.id
            }
        })*
    };
}

impl_has_id!(Experience, Skill, Language, Education, Certification);

// ─── transactional engine ───────────────────────────────────────────────────

/// Runs one section mutation inside a transaction: lock the résumé row,
/// splice the array, write it back, recompute the completion score.
/// Returns the fresh row.
async fn mutate_section<F>(
    pool: &PgPool,
    user_id: Uuid,
    section: Section,
    mutate: F,
) -> Result<ResumeRow, AppError>
where
    F: FnOnce(Value) -> Result<Value, AppError>,
{
    let mut tx = pool.begin().await?;

    let resume: Option<ResumeRow> = sqlx::query_as(
        "SELECT * FROM resumes WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let resume = resume.ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    let updated_array = mutate(section.array_of(&resume))?;

    let sql = format!(
        "UPDATE resumes SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        section.column()
    );
    let updated: ResumeRow = sqlx::query_as(&sql)
        .bind(&updated_array)
        .bind(resume.id)
        .fetch_one(&mut *tx)
        .await?;

    let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let updated = sync_completion_score(&mut tx, updated, &user).await?;

    tx.commit().await?;
    Ok(updated)
}

/// Writes the recomputed completion score only when it changed.
pub(crate) async fn sync_completion_score(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    resume: ResumeRow,
    user: &UserRow,
) -> Result<ResumeRow, AppError> {
    let score = completion_score(user, &resume);
    if score == resume.completion_score {
        return Ok(resume);
    }

    let updated: ResumeRow = sqlx::query_as(
        "UPDATE resumes SET completion_score = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(score)
    .bind(resume.id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(updated)
}

// ─── public operations ──────────────────────────────────────────────────────

pub async fn add_experience(
    pool: &PgPool,
    user_id: Uuid,
    input: ExperienceInput,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Experiences, move |array| {
        let mut items: Vec<Experience> = parse_items(&array, Section::Experiences)?;
        let item = build_experience(input, &items)?;
        items.push(item);
        to_array(&items)
    })
    .await
}

pub async fn update_experience(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    patch: ExperiencePatch,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Experiences, move |array| {
        let items: Vec<Experience> = parse_items(&array, Section::Experiences)?;
        let others: Vec<Experience> = items.iter().filter(|i| i.id != item_id).cloned().collect();
        let items = splice_update(items, item_id, "Experience not found", |item| {
            patch_experience(item, patch, &others)
        })?;
        to_array(&items)
    })
    .await
}

pub async fn delete_experience(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Experiences, move |array| {
        let items: Vec<Experience> = parse_items(&array, Section::Experiences)?;
        let items = splice_delete(items, item_id, "Experience not found")?;
        to_array(&items)
    })
    .await
}

pub async fn add_skill(pool: &PgPool, user_id: Uuid, input: SkillInput) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Skills, move |array| {
        let mut items: Vec<Skill> = parse_items(&array, Section::Skills)?;
        items.push(build_skill(input));
        to_array(&items)
    })
    .await
}

pub async fn update_skill(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    patch: SkillPatch,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Skills, move |array| {
        let items: Vec<Skill> = parse_items(&array, Section::Skills)?;
        let items = splice_update(items, item_id, "Skill not found", |item| {
            Ok(patch_skill(item, patch))
        })?;
        to_array(&items)
    })
    .await
}

pub async fn delete_skill(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Skills, move |array| {
        let items: Vec<Skill> = parse_items(&array, Section::Skills)?;
        let items = splice_delete(items, item_id, "Skill not found")?;
        to_array(&items)
    })
    .await
}

pub async fn add_language(
    pool: &PgPool,
    user_id: Uuid,
    input: LanguageInput,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Languages, move |array| {
        let mut items: Vec<Language> = parse_items(&array, Section::Languages)?;
        items.push(build_language(input));
        to_array(&items)
    })
    .await
}

pub async fn update_language(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    patch: LanguagePatch,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Languages, move |array| {
        let items: Vec<Language> = parse_items(&array, Section::Languages)?;
        let items = splice_update(items, item_id, "Language not found", |item| {
            Ok(patch_language(item, patch))
        })?;
        to_array(&items)
    })
    .await
}

pub async fn delete_language(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Languages, move |array| {
        let items: Vec<Language> = parse_items(&array, Section::Languages)?;
        let items = splice_delete(items, item_id, "Language not found")?;
        to_array(&items)
    })
    .await
}

pub async fn add_education(
    pool: &PgPool,
    user_id: Uuid,
    input: EducationInput,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Educations, move |array| {
        let mut items: Vec<Education> = parse_items(&array, Section::Educations)?;
        items.push(build_education(input)?);
        to_array(&items)
    })
    .await
}

pub async fn update_education(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    patch: EducationPatch,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Educations, move |array| {
        let items: Vec<Education> = parse_items(&array, Section::Educations)?;
        let items = splice_update(items, item_id, "Education not found", |item| {
            patch_education(item, patch)
        })?;
        to_array(&items)
    })
    .await
}

pub async fn delete_education(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Educations, move |array| {
        let items: Vec<Education> = parse_items(&array, Section::Educations)?;
        let items = splice_delete(items, item_id, "Education not found")?;
        to_array(&items)
    })
    .await
}

pub async fn add_certification(
    pool: &PgPool,
    user_id: Uuid,
    input: CertificationInput,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Certifications, move |array| {
        let mut items: Vec<Certification> = parse_items(&array, Section::Certifications)?;
        items.push(build_certification(input));
        to_array(&items)
    })
    .await
}

pub async fn update_certification(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    patch: CertificationPatch,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Certifications, move |array| {
        let items: Vec<Certification> = parse_items(&array, Section::Certifications)?;
        let items = splice_update(items, item_id, "Certification not found", |item| {
            Ok(patch_certification(item, patch))
        })?;
        to_array(&items)
    })
    .await
}

pub async fn delete_certification(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<ResumeRow, AppError> {
    mutate_section(pool, user_id, Section::Certifications, move |array| {
        let items: Vec<Certification> = parse_items(&array, Section::Certifications)?;
        let items = splice_delete(items, item_id, "Certification not found")?;
        to_array(&items)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_input(start: &str, end: Option<&str>, current: bool) -> ExperienceInput {
        ExperienceInput {
            position: "Engineer".to_string(),
            company: "Acme".to_string(),
            start_date: start.to_string(),
            end_date: end.map(str::to_string),
            current,
            description: None,
        }
    }

    fn make_experience(company: &str, start: &str, end: Option<&str>, current: bool) -> Experience {
        let now = Utc::now();
        Experience {
            id: Uuid::new_v4(),
            position: "Engineer".to_string(),
            company: company.to_string(),
            start_date: start.to_string(),
            end_date: end.map(str::to_string),
            current,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_item_date_plain() {
        assert_eq!(
            parse_item_date("2023-05-01"),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
    }

    #[test]
    fn test_parse_item_date_rfc3339() {
        assert_eq!(
            parse_item_date("2023-05-01T12:30:00Z"),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
    }

    #[test]
    fn test_parse_item_date_garbage() {
        assert_eq!(parse_item_date("yesterday"), None);
    }

    #[test]
    fn test_current_with_end_date_rejected() {
        let err = validate_period("2020-01-01", Some("2021-01-01"), true, "experience")
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_finished_without_end_date_rejected() {
        assert!(validate_period("2020-01-01", None, false, "experience").is_err());
    }

    #[test]
    fn test_start_after_end_rejected() {
        assert!(validate_period("2022-01-01", Some("2021-01-01"), false, "experience").is_err());
    }

    #[test]
    fn test_start_equal_end_rejected() {
        assert!(validate_period("2021-01-01", Some("2021-01-01"), false, "experience").is_err());
    }

    #[test]
    fn test_end_in_future_rejected() {
        let future = (Utc::now().date_naive() + chrono::Duration::days(30)).to_string();
        let err = validate_period("2020-01-01", Some(&future), false, "experience")
            .err()
            .unwrap();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("future")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_closed_period_accepted() {
        let period = validate_period("2020-01-01", Some("2021-06-30"), false, "experience").unwrap();
        assert_eq!(period.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
    }

    #[test]
    fn test_current_period_runs_until_today() {
        let period = validate_period("2020-01-01", None, true, "experience").unwrap();
        assert_eq!(period.end, Utc::now().date_naive());
    }

    #[test]
    fn test_overlap_inside_existing_range() {
        let others = vec![make_experience("Acme", "2020-01-01", Some("2021-01-01"), false)];
        let period = Period {
            start: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 9, 1).unwrap(),
        };
        let err = validate_no_overlap(&period, &others).err().unwrap();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("Acme")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_overlap_spanning_existing_range() {
        let others = vec![make_experience("Acme", "2020-03-01", Some("2020-06-01"), false)];
        let period = Period {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        };
        assert!(validate_no_overlap(&period, &others).is_err());
    }

    #[test]
    fn test_overlap_with_current_experience() {
        let others = vec![make_experience("Acme", "2023-01-01", None, true)];
        let period = Period {
            start: Utc::now().date_naive() - chrono::Duration::days(10),
            end: Utc::now().date_naive(),
        };
        assert!(validate_no_overlap(&period, &others).is_err());
    }

    #[test]
    fn test_disjoint_periods_pass() {
        let others = vec![make_experience("Acme", "2018-01-01", Some("2019-01-01"), false)];
        let period = Period {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        };
        assert!(validate_no_overlap(&period, &others).is_ok());
    }

    #[test]
    fn test_build_experience_assigns_id_and_timestamps() {
        let item = build_experience(exp_input("2020-01-01", Some("2021-01-01"), false), &[]).unwrap();
        assert!(!item.id.is_nil());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_build_experience_rejects_overlap_against_existing() {
        let existing = vec![make_experience("Acme", "2020-01-01", Some("2021-01-01"), false)];
        let result = build_experience(exp_input("2020-06-01", Some("2020-09-01"), false), &existing);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_experience_merges_fields() {
        let item = make_experience("Acme", "2020-01-01", Some("2021-01-01"), false);
        let id = item.id;
        let patch = ExperiencePatch {
            position: Some("Staff Engineer".to_string()),
            ..Default::default()
        };
        let updated = patch_experience(item, patch, &[]).unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.position, "Staff Engineer");
        assert_eq!(updated.company, "Acme");
    }

    #[test]
    fn test_patch_experience_can_clear_end_date() {
        let item = make_experience("Acme", "2020-01-01", Some("2021-01-01"), false);
        let patch: ExperiencePatch =
            serde_json::from_value(serde_json::json!({"current": true, "endDate": null})).unwrap();
        let updated = patch_experience(item, patch, &[]).unwrap();
        assert!(updated.current);
        assert!(updated.end_date.is_none());
    }

    #[test]
    fn test_patch_experience_validates_merged_state() {
        let item = make_experience("Acme", "2020-01-01", Some("2021-01-01"), false);
        // Setting current while an end date is still present must fail.
        let patch = ExperiencePatch {
            current: Some(true),
            ..Default::default()
        };
        assert!(patch_experience(item, patch, &[]).is_err());
    }

    #[test]
    fn test_double_option_distinguishes_absent_from_null() {
        let patch: SkillPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(patch.level.is_none());

        let patch: SkillPatch = serde_json::from_value(serde_json::json!({"level": null})).unwrap();
        assert_eq!(patch.level, Some(None));

        let patch: SkillPatch =
            serde_json::from_value(serde_json::json!({"level": "expert"})).unwrap();
        assert_eq!(patch.level, Some(Some("expert".to_string())));
    }

    #[test]
    fn test_splice_update_replaces_in_place() {
        let a = make_experience("A", "2018-01-01", Some("2019-01-01"), false);
        let b = make_experience("B", "2020-01-01", Some("2021-01-01"), false);
        let b_id = b.id;
        let items = splice_update(vec![a.clone(), b], b_id, "Experience not found", |mut item| {
            item.company = "B2".to_string();
            Ok(item)
        })
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].company, "A");
        assert_eq!(items[1].company, "B2");
    }

    #[test]
    fn test_splice_update_unknown_id_is_not_found() {
        let a = make_experience("A", "2018-01-01", Some("2019-01-01"), false);
        let err = splice_update(vec![a], Uuid::new_v4(), "Experience not found", Ok)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_splice_delete_removes_exactly_one() {
        let a = make_experience("A", "2018-01-01", Some("2019-01-01"), false);
        let b = make_experience("B", "2020-01-01", Some("2021-01-01"), false);
        let a_id = a.id;
        let items = splice_delete(vec![a, b], a_id, "Experience not found").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].company, "B");
    }

    #[test]
    fn test_splice_delete_unknown_id_is_not_found() {
        let a = make_experience("A", "2018-01-01", Some("2019-01-01"), false);
        assert!(splice_delete(vec![a], Uuid::new_v4(), "Experience not found").is_err());
    }

    #[test]
    fn test_patch_skill_clears_level_on_null() {
        let skill = build_skill(SkillInput {
            name: "Rust".to_string(),
            level: Some("advanced".to_string()),
        });
        let patch: SkillPatch = serde_json::from_value(serde_json::json!({"level": null})).unwrap();
        let updated = patch_skill(skill, patch);
        assert!(updated.level.is_none());
        assert_eq!(updated.name, "Rust");
    }

    #[test]
    fn test_items_round_trip_through_json_array() {
        let items = vec![
            build_skill(SkillInput {
                name: "Rust".to_string(),
                level: None,
            }),
            build_skill(SkillInput {
                name: "SQL".to_string(),
                level: Some("intermediate".to_string()),
            }),
        ];
        let array = to_array(&items).unwrap();
        let parsed: Vec<Skill> = parse_items(&array, Section::Skills).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].level.as_deref(), Some("intermediate"));
    }
}
