//! Hero profile records and the source reader.

use crate::models::{Result, TriviaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// A named link found in a hero's description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLink {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A social profile link, keyed by platform in [`HeroProfile::social_links`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub url: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// One input profile, as written by the crawler.
///
/// `name` is the record identity and is assumed unique within a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroProfile {
    pub name: String,
    pub location: String,
    pub employment: String,
    pub hero_since: String,
    pub full_description: String,
    pub project_links: Vec<ProjectLink>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub social_links: BTreeMap<String, SocialLink>,
}

impl HeroProfile {
    /// Project link texts joined for display in a prompt.
    pub fn project_titles(&self) -> String {
        self.project_links
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Load the ordered sequence of hero profiles from a JSON array file.
///
/// Any failure here is a [`TriviaError::Format`]: without records there is
/// nothing to process.
pub fn load_records(path: &Path) -> Result<Vec<HeroProfile>> {
    let file = File::open(path).map_err(|e| {
        TriviaError::Format(format!("cannot open input {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);

    let records: Vec<HeroProfile> = serde_json::from_reader(reader).map_err(|e| {
        TriviaError::Format(format!("invalid input {}: {e}", path.display()))
    })?;

    info!(count = records.len(), path = %path.display(), "Loaded hero profiles");
    Ok(records)
}
