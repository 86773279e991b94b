//! Prompt construction for trivia generation.

use crate::models::{GenerationConfig, HeroProfile, Result, TriviaError};
use regex::{Captures, Regex};

/// Built-in instruction block.
///
/// Placeholders: `{count}`, `{name}`, `{location}`, `{employment}`,
/// `{hero_since}`, `{projects}`, `{description}`, `{max_answer_words}`,
/// `{excluded}`.
pub const DEFAULT_TEMPLATE: &str = "\
Generate exactly {count} trivia questions about {name} based ONLY on the following information. \
Do not include any information not explicitly stated here:

Location: {location}
Employment: {employment}
Hero since: {hero_since}
Projects: {projects}
Description: {description}

For each question:
1. Provide four options with one correct answer.
2. Ensure all information comes directly from the provided data.
3. Avoid any potentially sensitive references.
4. Do not use {excluded} as options for employment.
5. Focus on creating interesting questions primarily from the description field.
6. Answers should be limited to {max_answer_words} words.
7. Answers MUST match one of the 4 options provided.

Format your response as a valid JSON array of objects. Each object must contain 'question', \
'options' (array), and 'correct_answer' keys. Ensure the JSON is properly formatted and complete.
";

/// Renders the generation request for one hero.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    placeholder: Regex,
    question_count: usize,
    max_answer_words: usize,
    excluded: String,
}

impl PromptBuilder {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let template = match &config.prompt_template {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| TriviaError::io("reading prompt template", e))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };

        let placeholder = Regex::new(r"\{([a-z_]+)\}")
            .map_err(|e| TriviaError::Internal(format!("placeholder pattern: {e}")))?;

        Ok(Self {
            template,
            placeholder,
            question_count: config.question_count,
            max_answer_words: config.max_answer_words,
            excluded: join_or(&config.excluded_options),
        })
    }

    /// Number of questions the prompt asks for.
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Render the prompt for `hero`.
    ///
    /// Placeholders are filled in one pass over the template, so braces
    /// inside hero data are copied through as written. Unknown placeholders
    /// are left untouched.
    pub fn build(&self, hero: &HeroProfile) -> String {
        self.placeholder
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "count" => self.question_count.to_string(),
                "max_answer_words" => self.max_answer_words.to_string(),
                "excluded" => self.excluded.clone(),
                "name" => hero.name.clone(),
                "location" => hero.location.clone(),
                "employment" => hero.employment.clone(),
                "hero_since" => hero.hero_since.clone(),
                "projects" => hero.project_titles(),
                "description" => hero.full_description.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// "A, B, or C" style list; "any third-party company" when empty.
fn join_or(items: &[String]) -> String {
    match items {
        [] => "any third-party company".to_string(),
        [one] => one.clone(),
        [one, two] => format!("{one} or {two}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}
