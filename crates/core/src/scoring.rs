use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Answer, OptionId, QuestionId, Survey};

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Correctness summary of one answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub score_pct: u32,
}

impl Score {
    /// Builds a score; `score_pct` rounds half up and is 0 for an empty survey.
    #[must_use]
    pub fn new(total: u32, correct: u32) -> Self {
        let correct = correct.min(total);
        Self {
            total,
            correct,
            wrong: total - correct,
            score_pct: percent(correct, total),
        }
    }
}

/// `round(part / whole * 100)` with halves rounded up; 0 when `whole` is 0.
#[must_use]
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part.min(whole));
    let whole = u64::from(whole);
    u32::try_from((200 * part + whole) / (2 * whole)).unwrap_or(100)
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Precomputed `question -> correct option` map for one survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey {
    correct: HashMap<QuestionId, OptionId>,
    total: u32,
}

impl AnswerKey {
    #[must_use]
    pub fn from_survey(survey: &Survey) -> Self {
        let correct = survey
            .questions
            .iter()
            .filter_map(|q| q.correct_option().map(|o| (q.id, o.id)))
            .collect();
        Self {
            correct,
            total: u32::try_from(survey.questions.len()).unwrap_or(u32::MAX),
        }
    }

    #[must_use]
    pub fn correct_option(&self, question_id: QuestionId) -> Option<OptionId> {
        self.correct.get(&question_id).copied()
    }

    /// Scores an answer set. Every question of the survey counts toward
    /// `total`, answered or not; for repeated questions the first answer is
    /// the one that counts.
    #[must_use]
    pub fn score(&self, answers: &[Answer]) -> Score {
        let mut chosen: HashMap<QuestionId, OptionId> = HashMap::with_capacity(answers.len());
        for a in answers {
            chosen.entry(a.question_id).or_insert(a.option_id);
        }
        let correct = self
            .correct
            .iter()
            .filter(|(q, o)| chosen.get(q) == Some(o))
            .count();
        Score::new(self.total, u32::try_from(correct).unwrap_or(u32::MAX))
    }
}

/// Scores `answers` against `survey`'s answer key.
#[must_use]
pub fn score(survey: &Survey, answers: &[Answer]) -> Score {
    AnswerKey::from_survey(survey).score(answers)
}

//
// ─── BREAKDOWN ─────────────────────────────────────────────────────────────────
//

/// Chosen versus correct option for one question, for the admin drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBreakdown {
    pub question_id: QuestionId,
    pub order: u32,
    pub text: String,
    pub chosen_option_id: Option<OptionId>,
    pub chosen_text: Option<String>,
    pub correct_option_id: Option<OptionId>,
    pub correct_text: Option<String>,
    pub is_correct: bool,
}

/// Per-question breakdown in survey order.
#[must_use]
pub fn breakdown(survey: &Survey, answers: &[Answer]) -> Vec<QuestionBreakdown> {
    survey
        .questions
        .iter()
        .map(|q| {
            let chosen = answers
                .iter()
                .find(|a| a.question_id == q.id)
                .map(|a| a.option_id);
            let correct = q.correct_option();
            QuestionBreakdown {
                question_id: q.id,
                order: q.order,
                text: q.text.clone(),
                chosen_option_id: chosen,
                chosen_text: chosen.and_then(|id| q.option(id)).map(|o| o.text.clone()),
                correct_option_id: correct.map(|o| o.id),
                correct_text: correct.map(|o| o.text.clone()),
                is_correct: chosen.is_some() && chosen == correct.map(|o| o.id),
            }
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, Question, SurveyId, SurveyKind};

    // Question n has options 10n+1 (correct) and 10n+2.
    fn survey(questions: u64) -> Survey {
        Survey {
            id: SurveyId::new(1),
            title: "Check".into(),
            kind: SurveyKind::FollowUp,
            is_active: true,
            questions: (1..=questions)
                .map(|n| Question {
                    id: QuestionId::new(n),
                    order: u32::try_from(n).unwrap(),
                    text: format!("q{n}"),
                    options: vec![
                        AnswerOption {
                            id: OptionId::new(10 * n + 1),
                            order: 1,
                            text: format!("right {n}"),
                            is_correct: true,
                        },
                        AnswerOption {
                            id: OptionId::new(10 * n + 2),
                            order: 2,
                            text: format!("wrong {n}"),
                            is_correct: false,
                        },
                    ],
                })
                .collect(),
        }
    }

    fn answer(q: u64, o: u64) -> Answer {
        Answer {
            question_id: QuestionId::new(q),
            option_id: OptionId::new(o),
        }
    }

    #[test]
    fn two_of_three_rounds_to_67() {
        let s = survey(3);
        let result = score(&s, &[answer(1, 11), answer(2, 22), answer(3, 31)]);
        assert_eq!(
            result,
            Score {
                total: 3,
                correct: 2,
                wrong: 1,
                score_pct: 67
            }
        );
    }

    #[test]
    fn empty_survey_scores_zero() {
        assert_eq!(score(&survey(0), &[]), Score::new(0, 0));
        assert_eq!(Score::new(0, 0).score_pct, 0);
    }

    #[test]
    fn unanswered_questions_count_as_wrong() {
        let result = score(&survey(4), &[answer(1, 11)]);
        assert_eq!(result.total, 4);
        assert_eq!(result.wrong, 3);
        assert_eq!(result.score_pct, 25);
    }

    #[test]
    fn first_answer_per_question_counts() {
        let result = score(&survey(1), &[answer(1, 12), answer(1, 11)]);
        assert_eq!(result.correct, 0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let s = survey(3);
        let answers = [answer(1, 11), answer(3, 32)];
        assert_eq!(score(&s, &answers), score(&s, &answers));
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn breakdown_reports_chosen_and_correct_text() {
        let rows = breakdown(&survey(2), &[answer(1, 12)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chosen_text.as_deref(), Some("wrong 1"));
        assert_eq!(rows[0].correct_text.as_deref(), Some("right 1"));
        assert!(!rows[0].is_correct);
        assert_eq!(rows[1].chosen_option_id, None);
        assert!(!rows[1].is_correct);
    }
}
