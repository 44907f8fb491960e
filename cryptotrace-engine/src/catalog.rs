//! Static course catalog: chapters, badges, certificates and milestones
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::constants::MAX_SCORE;
use crate::model::ScoreKind;

/// Icon tag rendered next to a chapter. Unknown tags fall back to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChapterIcon {
    BookOpen,
    Blocks,
    Wallet,
    Route,
    Shuffle,
    Building,
    FileCode,
    Skull,
    Gavel,
    Search,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    Quiz,
    Simulation,
    Exercise,
}

impl RequirementKind {
    /// Score map consulted by this requirement, if it is score based.
    #[must_use]
    pub const fn score_kind(self) -> Option<ScoreKind> {
        match self {
            Self::Quiz => Some(ScoreKind::Quiz),
            Self::Simulation => Some(ScoreKind::Simulation),
            Self::Exercise => None,
        }
    }
}

/// One condition of a badge. `threshold` is ignored for exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementKind,
    pub module_id: String,
    #[serde(default)]
    pub threshold: u8,
}

impl Requirement {
    #[must_use]
    pub fn quiz(module_id: impl Into<String>, threshold: u8) -> Self {
        Self {
            kind: RequirementKind::Quiz,
            module_id: module_id.into(),
            threshold,
        }
    }

    #[must_use]
    pub fn simulation(module_id: impl Into<String>, threshold: u8) -> Self {
        Self {
            kind: RequirementKind::Simulation,
            module_id: module_id.into(),
            threshold,
        }
    }

    #[must_use]
    pub fn exercise(module_id: impl Into<String>) -> Self {
        Self {
            kind: RequirementKind::Exercise,
            module_id: module_id.into(),
            threshold: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: BadgeTier,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: ChapterIcon,
    #[serde(default)]
    pub badges: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequirements {
    #[serde(default)]
    pub min_badges: usize,
    #[serde(default)]
    pub required_badges: Vec<String>,
    #[serde(default)]
    pub min_total_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requirements: CertificateRequirements,
}

/// Milestone requirement groups. Absent groups are vacuously satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: MilestoneRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("duplicate chapter id `{0}`")]
    DuplicateChapter(String),
    #[error("duplicate badge id `{0}`")]
    DuplicateBadge(String),
    #[error("duplicate certificate id `{0}`")]
    DuplicateCertificate(String),
    #[error("badge `{0}` has no requirements")]
    EmptyBadge(String),
    #[error("badge `{badge}` requires threshold {threshold} on `{module}`, above 100")]
    ThresholdOutOfRange {
        badge: String,
        module: String,
        threshold: u8,
    },
    #[error("`{owner}` references unknown badge `{badge}`")]
    UnknownBadge { owner: String, badge: String },
}

/// The ordered course catalog. Chapter order drives navigation and the
/// completion denominator; badges are owned by their chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Catalog {
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Catalog {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            chapters: Vec::new(),
            certificates: Vec::new(),
            milestones: Vec::new(),
        }
    }

    /// Load a catalog from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check cross references and ranges the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut chapter_ids = HashSet::new();
        for chapter in &self.chapters {
            if !chapter_ids.insert(chapter.id.as_str()) {
                return Err(CatalogError::DuplicateChapter(chapter.id.clone()));
            }
        }

        let mut badge_ids = HashSet::new();
        for badge in self.badges() {
            if !badge_ids.insert(badge.id.as_str()) {
                return Err(CatalogError::DuplicateBadge(badge.id.clone()));
            }
            if badge.requirements.is_empty() {
                return Err(CatalogError::EmptyBadge(badge.id.clone()));
            }
            if let Some(req) = badge
                .requirements
                .iter()
                .find(|req| req.kind != RequirementKind::Exercise && req.threshold > MAX_SCORE)
            {
                return Err(CatalogError::ThresholdOutOfRange {
                    badge: badge.id.clone(),
                    module: req.module_id.clone(),
                    threshold: req.threshold,
                });
            }
        }

        let mut certificate_ids = HashSet::new();
        for certificate in &self.certificates {
            if !certificate_ids.insert(certificate.id.as_str()) {
                return Err(CatalogError::DuplicateCertificate(certificate.id.clone()));
            }
            if let Some(unknown) = certificate
                .requirements
                .required_badges
                .iter()
                .find(|id| !badge_ids.contains(id.as_str()))
            {
                return Err(CatalogError::UnknownBadge {
                    owner: certificate.id.clone(),
                    badge: unknown.clone(),
                });
            }
        }

        for milestone in &self.milestones {
            if let Some(unknown) = milestone
                .requirements
                .badges
                .iter()
                .flatten()
                .find(|id| !badge_ids.contains(id.as_str()))
            {
                return Err(CatalogError::UnknownBadge {
                    owner: milestone.id.clone(),
                    badge: unknown.clone(),
                });
            }
        }
        Ok(())
    }

    /// All badges in chapter order.
    pub fn badges(&self) -> impl Iterator<Item = &Badge> {
        self.chapters.iter().flat_map(|chapter| chapter.badges.iter())
    }

    #[must_use]
    pub fn chapter_ids(&self) -> Vec<&str> {
        self.chapters.iter().map(|c| c.id.as_str()).collect()
    }

    #[must_use]
    pub fn badge_ids(&self) -> Vec<&str> {
        self.badges().map(|b| b.id.as_str()).collect()
    }

    #[must_use]
    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn badge(&self, id: &str) -> Option<&Badge> {
        self.badges().find(|b| b.id == id)
    }

    #[must_use]
    pub fn certificate(&self, id: &str) -> Option<&Certificate> {
        self.certificates.iter().find(|c| c.id == id)
    }

    fn chapter_position(&self, id: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.id == id)
    }

    #[must_use]
    pub fn next_chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapter_position(id)
            .and_then(|idx| self.chapters.get(idx + 1))
    }

    #[must_use]
    pub fn previous_chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapter_position(id)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| self.chapters.get(idx))
    }

    /// Sum of points over the given earned badge ids. Ids missing from the
    /// catalog contribute nothing.
    #[must_use]
    pub fn total_points(&self, earned: &[String]) -> u32 {
        self.badges()
            .filter(|badge| earned.iter().any(|id| *id == badge.id))
            .map(|badge| badge.points)
            .sum()
    }
}
