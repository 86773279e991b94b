//! Trivia questions, per-hero results and the output document.

use crate::models::{Result, TriviaError};
use serde::{Deserialize, Serialize};

/// Number of questions required per hero unless configured otherwise.
pub const DEFAULT_QUESTION_COUNT: usize = 15;

/// Number of answer options each question must carry.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// One generated multiple-choice question.
///
/// K_i: Four options, and the answer is one of them (checked when strict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl TriviaQuestion {
    /// Check option count and that the answer is one of the options verbatim.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "question {:?} has {} options, expected {OPTIONS_PER_QUESTION}",
                self.question,
                self.options.len()
            ));
        }
        if !self.options.iter().any(|o| o == &self.correct_answer) {
            return Err(format!(
                "question {:?}: answer {:?} is not one of its options",
                self.question, self.correct_answer
            ));
        }
        Ok(())
    }
}

/// Parse a service response into a validated question set.
///
/// Non-JSON text is a [`TriviaError::Parse`]; a well-formed array with the
/// wrong length (or, when `strict` is set, a malformed item) is a
/// [`TriviaError::Validation`].
pub fn parse_questions(raw: &str, expected: usize, strict: bool) -> Result<Vec<TriviaQuestion>> {
    let body = strip_code_fence(raw);

    let questions: Vec<TriviaQuestion> = serde_json::from_str(body)
        .map_err(|e| TriviaError::Parse(format!("response is not a JSON question array: {e}")))?;

    if questions.len() != expected {
        return Err(TriviaError::Validation(format!(
            "expected {expected} questions, got {}",
            questions.len()
        )));
    }

    if strict {
        for q in &questions {
            q.check().map_err(TriviaError::Validation)?;
        }
    }

    Ok(questions)
}

/// Remove surrounding whitespace and a Markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return trimmed,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

/// Questions generated for a single hero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroTrivia {
    pub hero_name: String,
    pub questions: Vec<TriviaQuestion>,
}

/// The persisted output artifact.
///
/// K_i: At most one entry per hero name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    #[serde(default)]
    pub trivia_questions: Vec<HeroTrivia>,
}

/// Whether [`OutputDocument::upsert`] added or replaced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

impl OutputDocument {
    /// Insert or replace the entry for `hero_name`.
    ///
    /// A replaced entry keeps its position in the document.
    pub fn upsert(&mut self, hero_name: &str, questions: Vec<TriviaQuestion>) -> Upsert {
        match self
            .trivia_questions
            .iter_mut()
            .find(|entry| entry.hero_name == hero_name)
        {
            Some(entry) => {
                entry.questions = questions;
                Upsert::Replaced
            }
            None => {
                self.trivia_questions.push(HeroTrivia {
                    hero_name: hero_name.to_string(),
                    questions,
                });
                Upsert::Inserted
            }
        }
    }

    /// Look up a hero's entry.
    pub fn get(&self, hero_name: &str) -> Option<&HeroTrivia> {
        self.trivia_questions
            .iter()
            .find(|entry| entry.hero_name == hero_name)
    }

    pub fn len(&self) -> usize {
        self.trivia_questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trivia_questions.is_empty()
    }
}

/// Statistics for a processor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Records in the input file
    pub total_records: usize,

    /// Index the run started from
    pub start_index: usize,

    /// Records completed in this run
    pub processed: usize,

    /// Records that were new to the output document
    pub inserted: usize,

    /// Records whose existing entry was replaced
    pub replaced: usize,

    /// Generation attempts made, including failed ones
    pub attempts: usize,

    /// Attempts that failed and were retried or exhausted
    pub failed_attempts: usize,

    /// Checkpoint value at the end of the run
    pub last_processed_index: i64,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Records per hour throughput
    pub throughput_per_hour: f64,
}

impl RunStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.throughput_per_hour = self.processed as f64 / self.runtime_secs * 3600.0;
        }
    }

    /// Records left after the checkpoint.
    pub fn remaining(&self) -> usize {
        let done = (self.last_processed_index + 1).max(0) as usize;
        self.total_records.saturating_sub(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{question, questions_json};

    #[test]
    fn test_parse_valid_response() {
        let qs = parse_questions(&questions_json(15), 15, true).unwrap();
        assert_eq!(qs.len(), 15);
        assert_eq!(qs[3].question, "Question 3?");
    }

    #[test]
    fn test_parse_fenced_response() {
        let raw = format!("```json\n{}\n```\n", questions_json(15));
        assert_eq!(parse_questions(&raw, 15, true).unwrap().len(), 15);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_questions("Here are your questions: [", 15, true).unwrap_err();
        assert!(matches!(err, TriviaError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        for count in [0, 14, 16] {
            let err = parse_questions(&questions_json(count), 15, true).unwrap_err();
            assert!(matches!(err, TriviaError::Validation(_)), "count {count}");
        }
    }

    #[test]
    fn test_strict_item_checks() {
        let mut qs: Vec<_> = (0..15).map(question).collect();
        qs[7].correct_answer = "Epsilon".to_string();
        let raw = serde_json::to_string(&qs).unwrap();

        assert!(matches!(
            parse_questions(&raw, 15, true),
            Err(TriviaError::Validation(_))
        ));
        assert!(parse_questions(&raw, 15, false).is_ok());

        let mut short = question(0);
        short.options.pop();
        assert!(short.check().is_err());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut doc = OutputDocument::default();
        assert_eq!(doc.upsert("Jane Doe", vec![question(1)]), Upsert::Inserted);
        assert_eq!(doc.upsert("John Roe", vec![question(2)]), Upsert::Inserted);
        assert_eq!(
            doc.upsert("Jane Doe", vec![question(3), question(4)]),
            Upsert::Replaced
        );

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.trivia_questions[0].hero_name, "Jane Doe");
        assert_eq!(doc.trivia_questions[0].questions.len(), 2);
        assert_eq!(doc.get("John Roe").unwrap().questions[0], question(2));
    }

    #[test]
    fn test_run_stats_remaining() {
        let mut stats = RunStats {
            total_records: 10,
            last_processed_index: -1,
            ..Default::default()
        };
        assert_eq!(stats.remaining(), 10);
        stats.last_processed_index = 3;
        assert_eq!(stats.remaining(), 6);
        stats.last_processed_index = 12;
        assert_eq!(stats.remaining(), 0);
    }
}
