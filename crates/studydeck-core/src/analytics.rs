//! Dashboard statistics derived from a user's session history.

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use studydeck_types::{QuizResult, SessionSummary, StudySession};

const TOP_SUBJECT_COUNT: usize = 5;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "in", "on", "of", "for", "with", "and", "chapter", "session",
];

/// Consecutive study days, counted back from the most recent one.
///
/// The streak is zero unless the most recent study day is `today` or the day
/// before it.
pub fn study_streak(sessions: &[StudySession], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = sessions.iter().map(|s| s.created_at.date_naive()).collect();
    let mut days = days.into_iter().rev();

    let Some(latest) = days.next() else {
        return 0;
    };
    let yesterday = today.checked_sub_days(Days::new(1));
    if latest != today && Some(latest) != yesterday {
        return 0;
    }

    let mut streak = 1;
    let mut expected = latest.checked_sub_days(Days::new(1));
    for day in days {
        if Some(day) != expected {
            break;
        }
        streak += 1;
        expected = day.checked_sub_days(Days::new(1));
    }
    streak
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectCount {
    pub subject: String,
    pub count: usize,
}

/// The most frequent words in session titles. Ties keep first-seen order.
pub fn top_subjects(sessions: &[StudySession]) -> Vec<SubjectCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for session in sessions {
        let title = session.title.to_lowercase();
        for word in WORD.find_iter(&title).map(|m| m.as_str()) {
            if STOP_WORDS.contains(&word) || word.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let count = counts.entry(word.to_string()).or_insert_with(|| {
                order.push(word.to_string());
                0
            });
            *count += 1;
        }
    }

    let mut subjects: Vec<SubjectCount> = order
        .into_iter()
        .map(|subject| SubjectCount {
            count: counts[&subject],
            subject,
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts
    subjects.sort_by(|a, b| b.count.cmp(&a.count));
    subjects.truncate(TOP_SUBJECT_COUNT);
    subjects
}

/// Aggregate quiz performance. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnalytics {
    pub total_quizzes: usize,
    pub average_percent: f64,
    pub best_percent: f64,
    /// 90% and above.
    pub excellent: usize,
    /// 70% up to 90%.
    pub good: usize,
    /// Below 70%.
    pub needs_improvement: usize,
    /// Per-attempt percentages, in the order given.
    pub scores: Vec<f64>,
}

impl QuizAnalytics {
    /// `None` when there are no results to aggregate.
    pub fn from_results(results: &[QuizResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }

        let ratios: Vec<f64> = results.iter().map(QuizResult::ratio).collect();
        let average = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let best = ratios.iter().copied().fold(f64::MIN, f64::max);

        Some(Self {
            total_quizzes: results.len(),
            average_percent: average * 100.0,
            best_percent: best * 100.0,
            excellent: ratios.iter().filter(|r| **r >= 0.9).count(),
            good: ratios.iter().filter(|r| (0.7..0.9).contains(*r)).count(),
            needs_improvement: ratios.iter().filter(|r| **r < 0.7).count(),
            scores: ratios.iter().map(|r| r * 100.0).collect(),
        })
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub study_streak: u32,
    pub top_subjects: Vec<SubjectCount>,
    pub quiz_analytics: Option<QuizAnalytics>,
    pub sessions: Vec<SessionSummary>,
}

impl Dashboard {
    pub fn build(sessions: &[StudySession], today: NaiveDate) -> Self {
        let results: Vec<QuizResult> = sessions
            .iter()
            .flat_map(|s| s.quiz_results.iter().cloned())
            .collect();

        Self {
            study_streak: study_streak(sessions, today),
            top_subjects: top_subjects(sessions),
            quiz_analytics: QuizAnalytics::from_results(&results),
            sessions: sessions.iter().map(SessionSummary::from).collect(),
        }
    }
}
