//! Request payloads and parameters for the Dozuki API.
//!
//! # Design
//! Responses are returned as `serde_json::Value` because the API's shapes
//! vary per site and the client does no schema validation. Requests are
//! typed so that argument checks happen before a request is ever built.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Longest summary the API accepts, exclusive.
pub const MAX_SUMMARY_CHARS: usize = 255;

/// Most introduction lines the API accepts, exclusive.
pub const MAX_INTRODUCTION_LINES: usize = 50;

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 200;

/// Body of `POST user/token`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Request payload for creating a guide.
///
/// Only `category` and `guide_type` are required; unset optional fields are
/// left out of the JSON body so the server applies its own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGuide {
    pub category: String,
    #[serde(rename = "type")]
    pub guide_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(default = "default_public")]
    pub public: bool,
}

fn default_public() -> bool {
    true
}

impl NewGuide {
    pub fn new(category: impl Into<String>, guide_type: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            guide_type: guide_type.into(),
            subject: None,
            title: None,
            summary: None,
            introduction: None,
            conclusion: None,
            public: true,
        }
    }

    /// Check the fields the API would reject anyway.
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(ClientError::Validation("guide category must not be blank".to_string()));
        }
        if self.guide_type.trim().is_empty() {
            return Err(ClientError::Validation("guide type must not be blank".to_string()));
        }
        if let Some(summary) = &self.summary {
            if summary.chars().count() >= MAX_SUMMARY_CHARS {
                return Err(ClientError::Validation(format!(
                    "guide summary must be less than {MAX_SUMMARY_CHARS} characters"
                )));
            }
        }
        if let Some(introduction) = &self.introduction {
            if introduction.lines().count() >= MAX_INTRODUCTION_LINES {
                return Err(ClientError::Validation(format!(
                    "guide introduction must be less than {MAX_INTRODUCTION_LINES} lines"
                )));
            }
        }
        Ok(())
    }
}

/// Accepts loosely-typed guide bodies, such as JSON handed over the FFI.
///
/// `category` and `type` must be present and be strings.
impl TryFrom<Value> for NewGuide {
    type Error = ClientError;

    fn try_from(value: Value) -> Result<Self> {
        for field in ["category", "type"] {
            if !value.get(field).is_some_and(Value::is_string) {
                return Err(ClientError::Validation(format!(
                    "guide field '{field}' must be a string"
                )));
            }
        }
        serde_json::from_value(value).map_err(|e| ClientError::Validation(e.to_string()))
    }
}

/// Content types a search can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFilter {
    Guide,
    Teardown,
    Wiki,
    Category,
    Item,
    Info,
    Question,
    Product,
}

impl SearchFilter {
    pub const ALL: [SearchFilter; 8] = [
        SearchFilter::Guide,
        SearchFilter::Teardown,
        SearchFilter::Wiki,
        SearchFilter::Category,
        SearchFilter::Item,
        SearchFilter::Info,
        SearchFilter::Question,
        SearchFilter::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFilter::Guide => "guide",
            SearchFilter::Teardown => "teardown",
            SearchFilter::Wiki => "wiki",
            SearchFilter::Category => "category",
            SearchFilter::Item => "item",
            SearchFilter::Info => "info",
            SearchFilter::Question => "question",
            SearchFilter::Product => "product",
        }
    }

    /// Parse a comma-joined list such as `"guide,wiki"`. Blank entries are
    /// ignored; unknown names are rejected.
    pub fn parse_list(list: &str) -> Result<Vec<SearchFilter>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SearchFilter::from_str)
            .collect()
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchFilter {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        SearchFilter::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClientError::Validation(format!("unknown search filter '{s}'")))
    }
}

/// Paging and filtering for `search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Results to skip from the beginning.
    pub offset: u32,
    /// Maximum results in the response, `1..=200`.
    pub limit: u32,
    pub filters: Vec<SearchFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_SEARCH_LIMIT,
            filters: Vec::new(),
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
            return Err(ClientError::Validation(format!(
                "search limit must be between 1 and {MAX_SEARCH_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Query pairs in wire order; `filter` is only present when non-empty.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if !self.filters.is_empty() {
            let joined = self
                .filters
                .iter()
                .map(SearchFilter::as_str)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("filter", joined));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_guide_serializes_required_fields_only() {
        let guide = NewGuide::new("Examples", "repair");
        let body = serde_json::to_value(&guide).unwrap();
        assert_eq!(
            body,
            json!({"category": "Examples", "type": "repair", "public": true})
        );
    }

    #[test]
    fn new_guide_includes_optional_fields_when_set() {
        let guide = NewGuide {
            subject: Some("Battery".to_string()),
            public: false,
            ..NewGuide::new("Examples", "replacement")
        };
        let body = serde_json::to_value(&guide).unwrap();
        assert_eq!(body["subject"], "Battery");
        assert_eq!(body["public"], false);
        assert!(body.get("title").is_none());
    }

    #[test]
    fn validate_rejects_blank_category_and_type() {
        assert!(matches!(
            NewGuide::new(" ", "repair").validate(),
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            NewGuide::new("Examples", "").validate(),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn validate_enforces_summary_and_introduction_bounds() {
        let mut guide = NewGuide::new("Examples", "repair");
        guide.summary = Some("x".repeat(254));
        assert!(guide.validate().is_ok());
        guide.summary = Some("x".repeat(255));
        assert!(guide.validate().is_err());

        guide.summary = None;
        guide.introduction = Some("line\n".repeat(49));
        assert!(guide.validate().is_ok());
        guide.introduction = Some("line\n".repeat(50));
        assert!(guide.validate().is_err());
    }

    #[test]
    fn try_from_value_requires_string_category_and_type() {
        let err = NewGuide::try_from(json!({"category": 5, "type": "repair"})).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        let err = NewGuide::try_from(json!({"category": "Examples"})).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let guide =
            NewGuide::try_from(json!({"category": "Examples", "type": "repair", "title": "T"}))
                .unwrap();
        assert_eq!(guide.title.as_deref(), Some("T"));
        assert!(guide.public);
    }

    #[test]
    fn search_filter_parses_names() {
        assert_eq!("guide".parse::<SearchFilter>().unwrap(), SearchFilter::Guide);
        assert_eq!("WIKI".parse::<SearchFilter>().unwrap(), SearchFilter::Wiki);
        assert!("manual".parse::<SearchFilter>().is_err());
    }

    #[test]
    fn search_filter_parses_lists() {
        assert_eq!(
            SearchFilter::parse_list("guide, teardown,,product").unwrap(),
            vec![SearchFilter::Guide, SearchFilter::Teardown, SearchFilter::Product]
        );
        assert!(SearchFilter::parse_list("").unwrap().is_empty());
        assert!(SearchFilter::parse_list("guide,bogus").is_err());
    }

    #[test]
    fn search_options_defaults() {
        let opts = SearchOptions::default();
        assert_eq!(opts.offset, 0);
        assert_eq!(opts.limit, 20);
        assert!(opts.validate().is_ok());
        assert_eq!(
            opts.query_pairs(),
            vec![("offset", "0".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn search_options_limit_bounds() {
        let mut opts = SearchOptions::default();
        for limit in [1, 200] {
            opts.limit = limit;
            assert!(opts.validate().is_ok(), "{limit}");
        }
        for limit in [0, 201] {
            opts.limit = limit;
            assert!(matches!(opts.validate(), Err(ClientError::Validation(_))), "{limit}");
        }
    }

    #[test]
    fn search_options_join_filters() {
        let opts = SearchOptions {
            filters: vec![SearchFilter::Guide, SearchFilter::Question],
            ..SearchOptions::default()
        };
        assert_eq!(opts.query_pairs()[2], ("filter", "guide,question".to_string()));
    }
}
