/// Filter state submitted by the board UI and its wire form.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::TagId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    All,
    Today,
    Last7Days,
    Last30Days,
    ThisMonth,
    /// Uses `FilterState::custom_range`.
    Custom,
}

/// Inclusive on both ends; `to` covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Lead value buckets. Lower bound inclusive, upper bound exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRange {
    #[default]
    All,
    UpTo1k,
    From1kTo5k,
    From5kTo10k,
    Above10k,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        match self {
            ValueRange::All => true,
            ValueRange::UpTo1k => value < 1_000.0,
            ValueRange::From1kTo5k => (1_000.0..5_000.0).contains(&value),
            ValueRange::From5kTo10k => (5_000.0..10_000.0).contains(&value),
            ValueRange::Above10k => value >= 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    UpdatedDesc,
    UpdatedAsc,
    CreatedDesc,
    CreatedAsc,
    ValueDesc,
    ValueAsc,
    NameAsc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub period: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_range: Option<DateRange>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub value_range: ValueRange,
    /// `None`, empty and `"all"` all mean every platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
}

/// Which parts of a filter state are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterClass {
    pub has_search_term: bool,
    pub has_other_filters: bool,
    /// Sort key differs from its default and nothing else is active.
    pub sort_only: bool,
}

impl FilterClass {
    pub fn is_active(&self) -> bool {
        self.has_search_term || self.has_other_filters || self.sort_only
    }
}

impl FilterState {
    pub fn search_text(&self, min_search_length: usize) -> Option<&str> {
        let trimmed = self.search.trim();
        (trimmed.chars().count() >= min_search_length.max(1)).then_some(trimmed)
    }

    pub fn platform_filter(&self) -> Option<&str> {
        self.platform
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("all"))
    }

    /// Date window to apply, if any.
    pub fn date_window(&self, today: NaiveDate) -> Option<DateRange> {
        use chrono::{Datelike, Duration};
        let (from, to) = match self.period {
            Period::All => return None,
            Period::Today => (today, today),
            Period::Last7Days => (today - Duration::days(6), today),
            Period::Last30Days => (today - Duration::days(29), today),
            Period::ThisMonth => (today.with_day(1).unwrap_or(today), today),
            Period::Custom => {
                let range = self.custom_range?;
                if range.from <= range.to {
                    (range.from, range.to)
                } else {
                    (range.to, range.from)
                }
            }
        };
        Some(DateRange { from, to })
    }

    fn has_period(&self) -> bool {
        match self.period {
            Period::All => false,
            Period::Custom => self.custom_range.is_some(),
            _ => true,
        }
    }

    pub fn classify(&self, min_search_length: usize) -> FilterClass {
        let has_search_term = self.search_text(min_search_length).is_some();
        let has_other_filters = self.platform_filter().is_some()
            || self.value_range != ValueRange::All
            || !self.tags.is_empty()
            || self.has_period();
        let sort_only = !has_search_term && !has_other_filters && self.sort != SortKey::default();
        FilterClass {
            has_search_term,
            has_other_filters,
            sort_only,
        }
    }

    /// Equivalent filters share one canonical form: trimmed search, sorted
    /// unique tags, normalized "all" platform.
    pub fn canonical(&self) -> FilterState {
        let mut tags = self.tags.clone();
        tags.sort();
        tags.dedup();
        FilterState {
            search: self.search.trim().to_string(),
            period: self.period,
            custom_range: if self.period == Period::Custom {
                self.custom_range
            } else {
                None
            },
            tags,
            value_range: self.value_range,
            platform: self.platform_filter().map(str::to_ascii_lowercase),
            sort: self.sort,
        }
    }

    /// Cache key: SHA-256 of the canonical JSON form.
    pub fn cache_key(&self) -> String {
        use sha2::{Digest, Sha256};
        let json = serde_json::to_string(&self.canonical()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn to_request(&self, min_search_length: usize) -> SearchRequest {
        let canonical = self.canonical();
        let window = match canonical.period {
            Period::Custom => canonical.date_window(NaiveDate::MIN),
            _ => None,
        };
        SearchRequest {
            search: canonical.search_text(min_search_length).map(str::to_string),
            platform: canonical.platform.clone(),
            period: canonical.period,
            date_from: window.map(|w| w.from),
            date_to: window.map(|w| w.to),
            value_range: canonical.value_range,
            tag_ids: canonical.tags,
            sort: canonical.sort,
        }
    }
}

/// Body of the board search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub period: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    pub value_range: ValueRange,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    pub sort: SortKey,
}
