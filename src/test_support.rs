//! Fixtures shared by unit tests.

use crate::models::{HeroProfile, ProjectLink, TriviaQuestion};
use std::collections::BTreeMap;

pub(crate) fn question(n: usize) -> TriviaQuestion {
    TriviaQuestion {
        question: format!("Question {n}?"),
        options: vec![
            "Alpha".to_string(),
            "Beta".to_string(),
            "Gamma".to_string(),
            "Delta".to_string(),
        ],
        correct_answer: "Beta".to_string(),
    }
}

pub(crate) fn questions(count: usize) -> Vec<TriviaQuestion> {
    (0..count).map(question).collect()
}

pub(crate) fn questions_json(count: usize) -> String {
    serde_json::to_string(&questions(count)).unwrap()
}

pub(crate) fn hero(name: &str) -> HeroProfile {
    HeroProfile {
        name: name.to_string(),
        location: "Lisbon, Portugal".to_string(),
        employment: "Acme Cloud".to_string(),
        hero_since: "Hero since 2021".to_string(),
        full_description: format!("{name} runs a serverless meetup and writes about queues."),
        project_links: vec![
            ProjectLink {
                text: "Queue patterns".to_string(),
                url: Some("https://example.com/queues".to_string()),
            },
            ProjectLink {
                text: "Meetup".to_string(),
                url: None,
            },
        ],
        category: Some("Serverless Hero".to_string()),
        image_url: None,
        social_links: BTreeMap::new(),
    }
}
