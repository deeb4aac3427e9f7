use crate::error::{Error, Result};
use crate::filter::{KeywordScreen, TypeFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Entry types dropped by the type filter
pub const DEFAULT_EXCLUDED_TYPES: &[&str] = &["book", "proceedings"];

/// Terms marking relevance to Infrastructure as Code
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &[
    "infrastructure as code",
    "infrastructure-as-code",
    "iac",
    "configuration as code",
    "ansible",
    "terraform",
    "chef",
    "puppet",
    "pulumi",
    "docker",
    "dockerfile",
    "docker-compose",
    "docker compose",
    "kubernetes",
    "k8s",
    "cloudformation",
    "cloud formation",
    "packer",
    "container",
    "containerization",
    "compose file",
    "arm",
    "juju",
    "nomad",
    "tosca",
    "saltstack",
    "cfengine",
    "heat",
];

/// Terms marking a quality-assurance angle
pub const DEFAULT_QUALITY_TERMS: &[&str] = &[
    "quality",
    "bug",
    "defect",
    "fault",
    "smell",
    "code smell",
    "anti-pattern",
    "antipattern",
    "vulnerability",
    "vulnerabilit",
    "security",
    "misconfiguration",
    "mis-config",
    "misconfig",
    "analysis",
    "analyzing",
    "testing",
    "test",
    "validation",
    "validate",
    "practice",
    "practice(s)",
    "lint",
    "linter",
    "linting",
    "performance",
    "reliability",
    "maintainability",
];

/// Fields concatenated into the screened text
pub const DEFAULT_SEARCH_FIELDS: &[&str] = &["title", "abstract"];

/// How a term is located in the screened text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Term may appear anywhere, also inside longer words
    #[default]
    Substring,
    /// Term must be delimited by non-word characters
    Word,
}

impl FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(MatchMode::Substring),
            "word" => Ok(MatchMode::Word),
            other => Err(Error::Config(format!(
                "unknown match_mode '{}', expected 'substring' or 'word'",
                other
            ))),
        }
    }
}

/// Screening configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub excluded_types: Vec<String>,
    pub domain_terms: Vec<String>,
    pub quality_terms: Vec<String>,
    pub search_fields: Vec<String>,
    pub match_mode: MatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_types: to_strings(DEFAULT_EXCLUDED_TYPES),
            domain_terms: to_strings(DEFAULT_DOMAIN_TERMS),
            quality_terms: to_strings(DEFAULT_QUALITY_TERMS),
            search_fields: to_strings(DEFAULT_SEARCH_FIELDS),
            match_mode: MatchMode::Substring,
        }
    }
}

impl Config {
    /// Parse a TOML document. Keys left out keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !has_non_blank(&self.domain_terms) {
            return Err(Error::Config("domain_terms must not be empty".to_string()));
        }
        if !has_non_blank(&self.quality_terms) {
            return Err(Error::Config("quality_terms must not be empty".to_string()));
        }
        if !has_non_blank(&self.search_fields) {
            return Err(Error::Config("search_fields must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn type_filter(&self) -> TypeFilter {
        TypeFilter::new(&self.excluded_types)
    }

    pub fn keyword_screen(&self) -> Result<KeywordScreen> {
        KeywordScreen::new(
            &self.domain_terms,
            &self.quality_terms,
            &self.search_fields,
            self.match_mode,
        )
    }
}

/// Builder for creating configurations
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluded_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.excluded_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn domain_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.domain_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn quality_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.quality_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.config.match_mode = mode;
        self
    }

    /// Set match mode from string; unknown names are rejected
    pub fn match_mode_str(mut self, mode: &str) -> Result<Self> {
        self.config.match_mode = mode.parse()?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn has_non_blank(values: &[String]) -> bool {
    values.iter().any(|v| !v.trim().is_empty())
}
