use crate::types::quiz::{GradedAnswer, OptionLetter, Quiz, SubmittedAnswer};

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub answers: Vec<GradedAnswer>,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
}

pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total) * 100.0
}

/// Grades `answers` against `quiz`.
///
/// `correct_answer` resolves a question id to its stored letter. Answers whose
/// id does not parse, cannot be resolved, or is not part of the quiz are
/// skipped, and only the first answer per question counts. A blank or
/// unrecognised selection is graded as wrong. The total is the number of
/// questions in the quiz, so unanswered questions count as wrong.
pub fn grade<F>(quiz: &Quiz, answers: &[SubmittedAnswer], correct_answer: F) -> ScoreCard
where
    F: Fn(Uuid) -> Option<OptionLetter>,
{
    let mut graded: Vec<GradedAnswer> = Vec::with_capacity(answers.len());
    for answer in answers {
        let Ok(question) = Uuid::parse_str(answer.question.trim()) else {
            continue;
        };
        if !quiz.questions.contains(&question)
            || graded.iter().any(|seen| seen.question == question)
        {
            continue;
        }
        let Some(expected) = correct_answer(question) else {
            continue;
        };
        let selected_option = answer
            .selected_option
            .as_deref()
            .and_then(OptionLetter::parse);
        graded.push(GradedAnswer {
            question,
            selected_option,
            correct: selected_option == Some(expected),
        });
    }

    let score = graded.iter().filter(|answer| answer.correct).count() as u32;
    let total = quiz.questions.len() as u32;
    ScoreCard {
        answers: graded,
        score,
        total,
        percentage: percentage(score, total),
    }
}
