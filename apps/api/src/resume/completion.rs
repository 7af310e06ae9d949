use serde::Serialize;
use serde_json::Value;

use crate::models::resume::ResumeRow;
use crate::models::user::UserRow;

/// One entry of the completion checklist: a named field, its weight and the
/// predicate deciding whether it counts as filled.
struct CompletionField {
    name: &'static str,
    weight: u32,
    filled: fn(&UserRow, &ResumeRow) -> bool,
}

const COMPLETION_FIELDS: &[CompletionField] = &[
    CompletionField {
        name: "full_name",
        weight: 1,
        filled: |u, _| !u.full_name.trim().is_empty(),
    },
    CompletionField {
        name: "email",
        weight: 1,
        filled: |u, _| !u.email.trim().is_empty(),
    },
    CompletionField {
        name: "phone",
        weight: 1,
        filled: |u, _| text_filled(&u.phone),
    },
    CompletionField {
        name: "cpf",
        weight: 1,
        filled: |u, _| text_filled(&u.cpf),
    },
    CompletionField {
        name: "birth_date",
        weight: 1,
        filled: |u, _| text_filled(&u.birth_date),
    },
    CompletionField {
        name: "has_disability",
        weight: 1,
        filled: |u, _| u.has_disability.is_some(),
    },
    CompletionField {
        name: "race",
        weight: 1,
        filled: |u, _| text_filled(&u.race),
    },
    CompletionField {
        name: "sexual_orientation",
        weight: 1,
        filled: |u, _| text_filled(&u.sexual_orientation),
    },
    CompletionField {
        name: "gender",
        weight: 1,
        filled: |u, _| text_filled(&u.gender),
    },
    CompletionField {
        name: "city",
        weight: 1,
        filled: |u, _| text_filled(&u.city),
    },
    CompletionField {
        name: "state",
        weight: 1,
        filled: |u, _| text_filled(&u.state),
    },
    CompletionField {
        name: "linkedin",
        weight: 1,
        filled: |u, _| text_filled(&u.linkedin),
    },
    CompletionField {
        name: "professional_summary",
        weight: 1,
        filled: |u, _| text_filled(&u.professional_summary),
    },
    CompletionField {
        name: "career_goals",
        weight: 1,
        filled: |u, _| text_filled(&u.career_goals),
    },
    CompletionField {
        name: "experiences",
        weight: 2,
        filled: |_, r| array_filled(&r.experiences),
    },
    CompletionField {
        name: "skills",
        weight: 2,
        filled: |_, r| array_filled(&r.skills),
    },
    CompletionField {
        name: "languages",
        weight: 1,
        filled: |_, r| array_filled(&r.languages),
    },
    CompletionField {
        name: "educations",
        weight: 2,
        filled: |_, r| array_filled(&r.educations),
    },
    CompletionField {
        name: "certifications",
        weight: 1,
        filled: |_, r| array_filled(&r.certifications),
    },
];

fn text_filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn array_filled(value: &Value) -> bool {
    value.as_array().is_some_and(|a| !a.is_empty())
}

/// Weighted completion percentage, rounded to the nearest integer.
/// Monotonic: filling any field never lowers the score.
pub fn completion_score(user: &UserRow, resume: &ResumeRow) -> i32 {
    let total: u32 = COMPLETION_FIELDS.iter().map(|f| f.weight).sum();
    let achieved: u32 = COMPLETION_FIELDS
        .iter()
        .filter(|f| (f.filled)(user, resume))
        .map(|f| f.weight)
        .sum();

    ((achieved as f64 / total as f64) * 100.0).round() as i32
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDetail {
    pub name: &'static str,
    pub weight: u32,
    pub filled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionDetails {
    /// Number of checklist fields.
    pub total: usize,
    /// Number of fields currently filled. The percentage stays
    /// weight-based, so these two move independently.
    pub filled: usize,
    pub percentage: i32,
    pub fields: Vec<FieldDetail>,
}

/// Per-field breakdown backing `GET /api/v1/resume/completion-details`.
pub fn completion_details(user: &UserRow, resume: &ResumeRow) -> CompletionDetails {
    let fields: Vec<FieldDetail> = COMPLETION_FIELDS
        .iter()
        .map(|f| FieldDetail {
            name: f.name,
            weight: f.weight,
            filled: (f.filled)(user, resume),
        })
        .collect();

    let total_weight: u32 = fields.iter().map(|f| f.weight).sum();
    let achieved_weight: u32 = fields.iter().filter(|f| f.filled).map(|f| f.weight).sum();

    CompletionDetails {
        total: fields.len(),
        filled: fields.iter().filter(|f| f.filled).count(),
        percentage: ((achieved_weight as f64 / total_weight as f64) * 100.0).round() as i32,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn make_user() -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: String::new(),
            full_name: String::new(),
            avatar_url: None,
            plan_type: "free".to_string(),
            is_admin: false,
            phone: None,
            cpf: None,
            birth_date: None,
            has_disability: None,
            race: None,
            sexual_orientation: None,
            gender: None,
            state: None,
            city: None,
            salary_expectation: None,
            has_cnh: None,
            instagram: None,
            facebook: None,
            linkedin: None,
            portfolio: None,
            professional_summary: None,
            career_goals: None,
            personality_profile: None,
            personality_generated_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn make_resume(user_id: Uuid) -> ResumeRow {
        let now = Utc::now();
        ResumeRow {
            id: Uuid::new_v4(),
            user_id,
            experiences: json!([]),
            skills: json!([]),
            languages: json!([]),
            educations: json!([]),
            certifications: json!([]),
            completion_score: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn full_user() -> UserRow {
        let mut u = make_user();
        u.full_name = "Ada Lovelace".to_string();
        u.email = "ada@example.com".to_string();
        u.phone = Some("+55 11 99999-0000".to_string());
        u.cpf = Some("123.456.789-00".to_string());
        u.birth_date = Some("1990-12-10".to_string());
        u.has_disability = Some(false);
        u.race = Some("white".to_string());
        u.sexual_orientation = Some("heterosexual".to_string());
        u.gender = Some("female".to_string());
        u.city = Some("São Paulo".to_string());
        u.state = Some("SP".to_string());
        u.linkedin = Some("https://linkedin.com/in/ada".to_string());
        u.professional_summary = Some("Engineer".to_string());
        u.career_goals = Some("Build things".to_string());
        u
    }

    fn full_resume(user_id: Uuid) -> ResumeRow {
        let mut r = make_resume(user_id);
        r.experiences = json!([{"position": "Dev"}]);
        r.skills = json!([{"name": "Rust"}]);
        r.languages = json!([{"name": "English"}]);
        r.educations = json!([{"degree": "BSc"}]);
        r.certifications = json!([{"name": "Cert"}]);
        r
    }

    #[test]
    fn test_empty_profile_scores_zero() {
        let user = make_user();
        let resume = make_resume(user.id);
        assert_eq!(completion_score(&user, &resume), 0);
    }

    #[test]
    fn test_full_profile_scores_hundred() {
        let user = full_user();
        let resume = full_resume(user.id);
        assert_eq!(completion_score(&user, &resume), 100);
    }

    #[test]
    fn test_experiences_alone_weigh_two_of_twenty_two() {
        let user = make_user();
        let mut resume = make_resume(user.id);
        resume.experiences = json!([{"position": "Dev"}]);
        // round(2 / 22 * 100) = 9
        assert_eq!(completion_score(&user, &resume), 9);
    }

    #[test]
    fn test_has_disability_false_still_counts_as_filled() {
        let mut user = make_user();
        user.has_disability = Some(false);
        let resume = make_resume(user.id);
        assert_eq!(completion_score(&user, &resume), 5);
    }

    #[test]
    fn test_whitespace_only_text_does_not_count() {
        let mut user = make_user();
        user.phone = Some("   ".to_string());
        let resume = make_resume(user.id);
        assert_eq!(completion_score(&user, &resume), 0);
    }

    #[test]
    fn test_score_is_monotonic_in_filled_fields() {
        let mut user = make_user();
        let resume = make_resume(user.id);
        let mut previous = completion_score(&user, &resume);

        user.full_name = "Ada".to_string();
        let s = completion_score(&user, &resume);
        assert!(s >= previous);
        previous = s;

        user.email = "ada@example.com".to_string();
        let s = completion_score(&user, &resume);
        assert!(s >= previous);
        previous = s;

        user.linkedin = Some("https://linkedin.com/in/ada".to_string());
        let s = completion_score(&user, &resume);
        assert!(s >= previous);
    }

    #[test]
    fn test_details_match_score() {
        let user = full_user();
        let mut resume = make_resume(user.id);
        resume.skills = json!([{"name": "Rust"}]);

        let details = completion_details(&user, &resume);
        assert_eq!(details.total, 19);
        assert_eq!(details.percentage, completion_score(&user, &resume));
        assert_eq!(details.fields.len(), 19);

        let filled_count = details.fields.iter().filter(|f| f.filled).count();
        assert_eq!(details.filled, filled_count);
        // 14 profile fields + skills
        assert_eq!(details.filled, 15);
    }

    #[test]
    fn test_details_flag_unfilled_sections() {
        let user = full_user();
        let resume = make_resume(user.id);
        let details = completion_details(&user, &resume);

        let experiences = details
            .fields
            .iter()
            .find(|f| f.name == "experiences")
            .unwrap();
        assert!(!experiences.filled);
        assert_eq!(experiences.weight, 2);
    }
}
