use crate::error::ApiError;
use crate::store::Document;
use crate::types::require_text;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            "D" | "d" => Some(Self::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub answer: OptionLetter,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Question {
    const COLLECTION: &'static str = "questions";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Loose request shape; `validated` enforces four options and a letter answer.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub text: String,
    pub options: Vec<String>,
    pub answer: String,
}

pub struct ValidQuestion {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub answer: OptionLetter,
}

impl QuestionInput {
    pub fn validated(self) -> Result<ValidQuestion, ApiError> {
        let text = require_text(&self.text, "question text")?;
        let options: [String; OPTION_COUNT] = self
            .options
            .into_iter()
            .map(|option| option.trim().to_string())
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| ApiError::bad_request("options must contain exactly 4 entries"))?;
        if options.iter().any(|option| option.is_empty()) {
            return Err(ApiError::bad_request("options must not be blank"));
        }
        let answer = OptionLetter::parse(&self.answer)
            .ok_or_else(|| ApiError::bad_request("answer must be one of A, B, C, D"))?;
        Ok(ValidQuestion {
            text,
            options,
            answer,
        })
    }
}

impl Question {
    pub fn new(valid: ValidQuestion, created_by: Uuid, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: valid.text,
            options: valid.options,
            answer: valid.answer,
            created_by,
            created_at: now,
        }
    }

    pub fn replace(&mut self, valid: ValidQuestion) {
        self.text = valid.text;
        self.options = valid.options;
        self.answer = valid.answer;
    }
}

/// Question as shown to someone taking the quiz.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionView {
    pub id: Uuid,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<OptionLetter>,
}

impl QuizQuestionView {
    pub fn from_question(question: &Question, reveal_answer: bool) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.options.clone(),
            answer: reveal_answer.then_some(question.answer),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Uuid>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Quiz {
    const COLLECTION: &'static str = "quizzes";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<Uuid>>,
}

/// Drops repeated ids, keeping the first occurrence.
pub(crate) fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub question_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            question_count: quiz.questions.len(),
            created_at: quiz.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestionView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Answers are read loosely so one malformed entry cannot reject the whole
/// submission; grading skips or marks them wrong instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub selected_option: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionInput {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question: Uuid,
    pub selected_option: Option<OptionLetter>,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub student: Uuid,
    pub quiz: Uuid,
    pub answers: Vec<GradedAnswer>,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Submission {
    const COLLECTION: &'static str = "submissions";

    fn id(&self) -> Uuid {
        self.id
    }
}
