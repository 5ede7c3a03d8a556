use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Corpus records
// =============================================================================

/// A corporation scraped from the ranking site, with its startup-partner
/// metadata and theme scores.
///
/// Only `id`, `name`, `description` and `startup_themes` feed the clustering
/// pipeline; everything else is carried through to the output artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporationRecord {
    /// Unique identifier assigned by the ranking site.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description. `null` in the source is read as empty.
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    /// Ordered (theme, score) pairs.
    #[serde(deserialize_with = "null_as_default")]
    pub startup_themes: Vec<ThemeScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_partners_count: Option<u64>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub startup_partners: Vec<StartupPartner>,
}

impl CorporationRecord {
    /// Minimal record with no metadata beyond what clustering needs.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        startup_themes: Vec<ThemeScore>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            startup_themes,
            logo_url: None,
            hq_city: None,
            hq_country: None,
            website_url: None,
            linkedin_url: None,
            twitter_url: None,
            startup_partners_count: None,
            startup_partners: Vec::new(),
        }
    }
}

/// A startup partner of a corporation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupPartner {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Theme classification as reported by the site; shape varies.
    #[serde(default)]
    pub theme_gd: Option<serde_json::Value>,
}

// =============================================================================
// Theme scores
// =============================================================================

/// One `(theme, score)` pair. Serialized as a two-element JSON array.
///
/// The upstream API reports scores as numeric strings; both strings and
/// integers are accepted on input, and negative or non-numeric scores are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(String, RawScore)", into = "(String, u32)")]
pub struct ThemeScore {
    pub theme: String,
    pub score: u32,
}

impl ThemeScore {
    pub fn new(theme: impl Into<String>, score: u32) -> Self {
        Self {
            theme: theme.into(),
            score,
        }
    }
}

/// Score as it appears on the wire, before validation.
#[doc(hidden)]
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScore {
    Int(i64),
    Text(String),
}

impl TryFrom<(String, RawScore)> for ThemeScore {
    type Error = String;

    fn try_from((theme, raw): (String, RawScore)) -> Result<Self, Self::Error> {
        let score = match raw {
            RawScore::Int(v) => u32::try_from(v)
                .map_err(|_| format!("theme '{}' has invalid score {}", theme, v))?,
            RawScore::Text(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("theme '{}' has invalid score '{}'", theme, s))?,
        };
        Ok(Self { theme, score })
    }
}

impl From<ThemeScore> for (String, u32) {
    fn from(t: ThemeScore) -> Self {
        (t.theme, t.score)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
