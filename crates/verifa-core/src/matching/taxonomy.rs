//! Academic-field taxonomy and major compatibility scoring.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::fuzzy::{normalize, similarity};
use crate::config::MatchingConfig;

/// Score returned when two strings fall in the same group.
pub const GROUP_MATCH_SCORE: u8 = 80;

/// A named family of related labels.
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyGroup {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

impl TaxonomyGroup {
    /// Whether any keyword occurs as a whole word sequence in `text`.
    pub fn matches(&self, text: &str) -> bool {
        let padded = format!(" {} ", normalize(text));
        self.keywords
            .iter()
            .any(|k| padded.contains(&format!(" {} ", k)))
    }
}

/// Academic-field families used for major compatibility.
pub static MAJOR_GROUPS: &[TaxonomyGroup] = &[
    TaxonomyGroup {
        name: "economics",
        keywords: &[
            "akuntansi",
            "accounting",
            "ekonomi",
            "economics",
            "manajemen",
            "management",
            "keuangan",
            "finance",
            "perbankan",
            "bisnis",
            "business",
            "perpajakan",
        ],
    },
    TaxonomyGroup {
        name: "computing",
        keywords: &[
            "informatika",
            "teknik informatika",
            "ilmu komputer",
            "computer science",
            "sistem informasi",
            "information systems",
            "teknologi informasi",
            "information technology",
            "rekayasa perangkat lunak",
            "software engineering",
            "komputer",
        ],
    },
    TaxonomyGroup {
        name: "law",
        keywords: &["hukum", "ilmu hukum", "law", "syariah"],
    },
    TaxonomyGroup {
        name: "engineering",
        keywords: &[
            "teknik sipil",
            "civil engineering",
            "teknik mesin",
            "mechanical engineering",
            "teknik elektro",
            "electrical engineering",
            "teknik industri",
            "industrial engineering",
            "teknik kimia",
            "arsitektur",
            "architecture",
        ],
    },
    TaxonomyGroup {
        name: "education",
        keywords: &[
            "pendidikan",
            "education",
            "keguruan",
            "pgsd",
            "bimbingan konseling",
        ],
    },
    TaxonomyGroup {
        name: "health",
        keywords: &[
            "kedokteran",
            "medicine",
            "keperawatan",
            "nursing",
            "kebidanan",
            "midwifery",
            "farmasi",
            "pharmacy",
            "kesehatan masyarakat",
            "public health",
            "gizi",
            "nutrition",
        ],
    },
    TaxonomyGroup {
        name: "social_political",
        keywords: &[
            "ilmu politik",
            "political science",
            "administrasi publik",
            "administrasi negara",
            "public administration",
            "sosiologi",
            "sociology",
            "hubungan internasional",
            "international relations",
            "ilmu komunikasi",
            "communication",
            "psikologi",
            "psychology",
        ],
    },
    TaxonomyGroup {
        name: "agriculture",
        keywords: &[
            "pertanian",
            "agriculture",
            "agroteknologi",
            "agribisnis",
            "kehutanan",
            "forestry",
            "peternakan",
            "perikanan",
        ],
    },
    TaxonomyGroup {
        name: "mathematics",
        keywords: &[
            "matematika",
            "mathematics",
            "statistika",
            "statistics",
            "aktuaria",
            "actuarial science",
        ],
    },
];

/// Flat [`GROUP_MATCH_SCORE`] if some group covers both strings.
pub fn group_match(a: &str, b: &str, groups: &[TaxonomyGroup]) -> Option<u8> {
    groups
        .iter()
        .find(|g| g.matches(a) && g.matches(b))
        .map(|_| GROUP_MATCH_SCORE)
}

/// Name of the first group covering `text`.
pub fn group_of(text: &str, groups: &[TaxonomyGroup]) -> Option<&'static str> {
    groups.iter().find(|g| g.matches(text)).map(|g| g.name)
}

/// Outcome tier of a compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityTier {
    Pass,
    Review,
    Fail,
}

impl CompatibilityTier {
    pub fn from_score(score: u8, config: &MatchingConfig) -> Self {
        if score >= config.major_pass {
            Self::Pass
        } else if score >= config.major_review {
            Self::Review
        } else {
            Self::Fail
        }
    }
}

/// Best compatibility of an extracted major against the accepted majors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorCompatibility {
    pub score: u8,
    pub tier: CompatibilityTier,
    /// Accepted major that produced the score.
    pub matched: Option<String>,
    /// Whether the score came from the taxonomy rather than edit distance.
    pub via_group: bool,
}

/// Deterministic major compatibility: for each accepted major, take the
/// higher of string similarity and group match, then keep the best.
pub fn major_compatibility(
    extracted: &str,
    required: &[String],
    config: &MatchingConfig,
) -> MajorCompatibility {
    let mut best = MajorCompatibility {
        score: 0,
        tier: CompatibilityTier::Fail,
        matched: None,
        via_group: false,
    };

    for candidate in required {
        let direct = similarity(extracted, candidate);
        let grouped = group_match(extracted, candidate, MAJOR_GROUPS).unwrap_or(0);
        let score = direct.max(grouped);
        if score > best.score {
            best = MajorCompatibility {
                score,
                tier: CompatibilityTier::from_score(score, config),
                matched: Some(candidate.clone()),
                via_group: grouped > direct,
            };
        }
    }

    best
}
