use serde::Deserialize;

use merits_core::{DimensionField, EngineError, MetricField, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine configuration: the alias table, the accepted date patterns and the
/// conflict-resolution policies. Deserializable from TOML so deployments can
/// adjust it per report type or locale without a rebuild.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub aliases: AliasTable,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub conflict: ConflictConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            date_formats: default_date_formats(),
            conflict: ConflictConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Ordered source-header variants per canonical field. Matching is
/// case-insensitive and ignores whitespace and underscores; earlier variants
/// outrank later ones. Unknown canonical fields in the TOML are rejected at
/// deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AliasTable {
    pub entity_id: Vec<String>,
    pub date: Vec<String>,
    pub impressions: Vec<String>,
    pub engagements: Vec<String>,
    pub clicks: Vec<String>,
    pub leads: Vec<String>,
    pub campaign: Vec<String>,
    pub content_type: Vec<String>,
    pub likes: Vec<String>,
    pub comments: Vec<String>,
    pub shares: Vec<String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            entity_id: list(&[
                "entity_id", "post url", "post link", "permalink", "content url", "post id",
                "url",
            ]),
            date: list(&[
                "date", "created date", "publish date", "post date", "created at",
                "published at",
            ]),
            impressions: list(&["impressions", "views"]),
            engagements: list(&["engagements", "total engagements"]),
            clicks: list(&["clicks", "link clicks"]),
            leads: list(&["leads", "lead count", "conversions"]),
            campaign: list(&["campaign", "campaign name"]),
            content_type: list(&["content_type", "content type", "post type", "media type"]),
            likes: list(&["likes", "reactions", "favorites"]),
            comments: list(&["comments", "replies"]),
            shares: list(&["shares", "reposts", "retweets"]),
        }
    }
}

impl AliasTable {
    pub fn metric_variants(&self, field: MetricField) -> &[String] {
        match field {
            MetricField::Impressions => &self.impressions,
            MetricField::Engagements => &self.engagements,
            MetricField::Clicks => &self.clicks,
            MetricField::Leads => &self.leads,
        }
    }

    pub fn dimension_variants(&self, field: DimensionField) -> &[String] {
        match field {
            DimensionField::Campaign => &self.campaign,
            DimensionField::ContentType => &self.content_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConflictConfig {
    pub numeric: NumericPolicy,
    pub dimension: DimensionPolicy,
}

/// How disagreeing metric values for the same key resolve. The default
/// treats exports as cumulative: a smaller value is a stale earlier export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumericPolicy {
    #[default]
    LargerWins,
    FirstWins,
    LastWins,
}

/// How disagreeing dimension values for the same key resolve. First-wins by
/// default; a dimension disagreement means the key was reused for logically
/// different content, which merging cannot silently fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DimensionPolicy {
    #[default]
    FirstWins,
    LastWins,
}

fn default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%b %d, %Y",
        "%d %b %Y",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| EngineError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.date_formats.is_empty() {
            return Err(EngineError::config("date_formats must not be empty"));
        }
        if self.aliases.entity_id.is_empty() {
            return Err(EngineError::config(
                "required field 'entity_id' has no aliases",
            ));
        }
        if self.aliases.date.is_empty() {
            return Err(EngineError::config("required field 'date' has no aliases"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
