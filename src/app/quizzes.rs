use crate::error::ApiError;
use crate::scoring;
use crate::state;
use crate::store::Collections;
use crate::types::quiz::{
    Question, QuestionInput, Quiz, QuizInput, QuizPatch, QuizQuestionView, QuizSummary, QuizView,
    Submission, SubmissionInput, dedup_ids,
};
use crate::types::require_text;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::MessageResponse;
use super::extract::{AdminUser, ApiJson, ApiPath, CurrentUser};

pub(crate) async fn question_list(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Vec<Question>> {
    let mut questions: Vec<Question> = state
        .db
        .read(|c| c.questions.iter().cloned().collect())
        .await;
    questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(questions)
}

pub(crate) async fn question_detail(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Question>, ApiError> {
    state
        .db
        .read(|c| c.questions.get(id).cloned())
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Question"))
}

pub(crate) async fn question_create(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<QuestionInput>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let question = Question::new(input.validated()?, admin.id, OffsetDateTime::now_utc());
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            c.questions.insert(question.clone());
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub(crate) async fn question_update(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<QuestionInput>,
) -> Result<Json<Question>, ApiError> {
    let valid = input.validated()?;
    let question = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let question = c
                .questions
                .get_mut(id)
                .ok_or(ApiError::NotFound("Question"))?;
            question.replace(valid);
            Ok(question.clone())
        })
        .await?;
    Ok(Json(question))
}

pub(crate) async fn question_delete(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| {
            c.questions
                .remove(id)
                .ok_or(ApiError::NotFound("Question"))
        })
        .await?;
    Ok(Json(MessageResponse::new("Question removed")))
}

fn checked_questions(c: &Collections, ids: Vec<Uuid>) -> Result<Vec<Uuid>, ApiError> {
    let ids = dedup_ids(ids);
    if let Some(missing) = ids.iter().find(|id| !c.questions.contains(**id)) {
        return Err(ApiError::bad_request(format!(
            "question {missing} does not exist"
        )));
    }
    Ok(ids)
}

pub(crate) async fn quiz_list(
    State(state): State<state::AppState>,
    CurrentUser(_user): CurrentUser,
) -> Json<Vec<QuizSummary>> {
    let mut quizzes: Vec<QuizSummary> = state
        .db
        .read(|c| c.quizzes.iter().map(QuizSummary::from).collect())
        .await;
    quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(quizzes)
}

/// Questions deleted since the quiz was assembled are left out.
pub(crate) async fn quiz_detail(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let reveal = user.is_admin();
    state
        .db
        .read(|c| {
            let quiz = c.quizzes.get(id)?;
            let questions = quiz
                .questions
                .iter()
                .filter_map(|question_id| c.questions.get(*question_id))
                .map(|question| QuizQuestionView::from_question(question, reveal))
                .collect();
            Some(QuizView {
                id: quiz.id,
                title: quiz.title.clone(),
                description: quiz.description.clone(),
                questions,
                created_at: quiz.created_at,
            })
        })
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Quiz"))
}

pub(crate) async fn quiz_create(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<QuizInput>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    let title = require_text(&input.title, "title")?;
    let now = OffsetDateTime::now_utc();
    let quiz = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let quiz = Quiz {
                id: Uuid::new_v4(),
                title,
                description: input.description.trim().to_string(),
                questions: checked_questions(c, input.questions)?,
                created_by: admin.id,
                created_at: now,
            };
            c.quizzes.insert(quiz.clone());
            Ok(quiz)
        })
        .await?;
    tracing::info!(quiz = %quiz.id, questions = quiz.questions.len(), "created quiz");
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub(crate) async fn quiz_update(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<QuizPatch>,
) -> Result<Json<Quiz>, ApiError> {
    let quiz = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let questions = match patch.questions {
                Some(ids) => Some(checked_questions(c, ids)?),
                None => None,
            };
            let quiz = c.quizzes.get_mut(id).ok_or(ApiError::NotFound("Quiz"))?;
            if let Some(title) = patch.title {
                quiz.title = require_text(&title, "title")?;
            }
            if let Some(description) = patch.description {
                quiz.description = description.trim().to_string();
            }
            if let Some(questions) = questions {
                quiz.questions = questions;
            }
            Ok(quiz.clone())
        })
        .await?;
    Ok(Json(quiz))
}

pub(crate) async fn quiz_delete(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| c.quizzes.remove(id).ok_or(ApiError::NotFound("Quiz")))
        .await?;
    Ok(Json(MessageResponse::new("Quiz removed")))
}

pub(crate) async fn quiz_submit(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<SubmissionInput>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let now = OffsetDateTime::now_utc();
    let submission = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let quiz = c.quizzes.get(id).ok_or(ApiError::NotFound("Quiz"))?;
            let card = scoring::grade(quiz, &input.answers, |question_id| {
                c.questions.get(question_id).map(|question| question.answer)
            });
            let submission = Submission {
                id: Uuid::new_v4(),
                student: user.id,
                quiz: quiz.id,
                answers: card.answers,
                score: card.score,
                total: card.total,
                percentage: card.percentage,
                created_at: now,
            };
            c.submissions.insert(submission.clone());
            if let Some(student) = c.users.get_mut(user.id) {
                student.record_activity(now);
            }
            Ok(submission)
        })
        .await?;
    tracing::info!(
        quiz = %id,
        student = %user.id,
        score = submission.score,
        total = submission.total,
        "graded submission"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

pub(crate) async fn my_submissions(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Submission>> {
    let mut submissions: Vec<Submission> = state
        .db
        .read(|c| {
            c.submissions
                .iter()
                .filter(|submission| submission.student == user.id)
                .cloned()
                .collect()
        })
        .await;
    submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(submissions)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionQuery {
    quiz: Option<Uuid>,
}

pub(crate) async fn submission_list(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<SubmissionQuery>,
) -> Json<Vec<Submission>> {
    let mut submissions: Vec<Submission> = state
        .db
        .read(|c| {
            c.submissions
                .iter()
                .filter(|submission| query.quiz.is_none_or(|quiz| submission.quiz == quiz))
                .cloned()
                .collect()
        })
        .await;
    submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(submissions)
}
