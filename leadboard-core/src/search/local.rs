use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

use super::filter::{FilterState, SortKey, ValueRange};
use crate::types::{Board, Column, Lead, TagId};

/// In-memory counterpart of the server's board search.
///
/// Compiled once per filter state, then applied to whatever board is current.
/// `apply` is a pure function of (board, compiled filter): it never touches
/// the network and has no failure mode.
#[derive(Debug, Clone)]
pub struct LocalFilter {
    text: Option<String>,
    /// Digits of a numeric-only search ("11 999-9", "+55 11").
    digits: Option<String>,
    platform: Option<String>,
    value_range: ValueRange,
    tags: Vec<TagId>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    sort: SortKey,
}

impl LocalFilter {
    pub fn compile(filter: &FilterState, min_search_length: usize, today: NaiveDate) -> Self {
        let raw = filter.search_text(min_search_length);
        let digits = raw
            .filter(|s| is_numeric_query(s))
            .map(digits_only)
            .filter(|d| !d.is_empty());
        let window = filter.date_window(today).map(|range| {
            let start = range.from.and_time(NaiveTime::MIN).and_utc();
            let end = range
                .to
                .and_hms_milli_opt(23, 59, 59, 999)
                .map(|dt| dt.and_utc())
                .unwrap_or(start);
            (start, end)
        });

        Self {
            text: raw.map(normalize_for_search),
            digits,
            platform: filter.platform_filter().map(normalize_for_search),
            value_range: filter.value_range,
            tags: filter.tags.clone(),
            window,
            sort: filter.sort,
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(text) = &self.text {
            if !self.matches_text(text, lead) {
                return false;
            }
        }
        if let Some(platform) = &self.platform {
            let lead_platform = lead.platform.as_deref().map(normalize_for_search);
            if lead_platform.as_deref() != Some(platform.as_str()) {
                return false;
            }
        }
        if !self.value_range.contains(lead.value) {
            return false;
        }
        if !self.tags.is_empty() && !lead.tags.iter().any(|t| self.tags.contains(&t.id)) {
            return false;
        }
        if let Some((start, end)) = self.window {
            if lead.created_at < start || lead.created_at > end {
                return false;
            }
        }
        true
    }

    fn matches_text(&self, text: &str, lead: &Lead) -> bool {
        let fields = [
            Some(lead.name.as_str()),
            lead.email.as_deref(),
            lead.phone.as_deref(),
            lead.campaign.as_deref(),
            lead.last_message.as_deref(),
        ];
        if fields
            .iter()
            .flatten()
            .any(|field| normalize_for_search(field).contains(text))
        {
            return true;
        }
        match (&self.digits, lead.phone.as_deref()) {
            (Some(digits), Some(phone)) => digits_only(phone).contains(digits.as_str()),
            _ => false,
        }
    }

    /// Filtered copy of the board. Every column is kept, possibly empty.
    /// Leads are reordered only for a non-default sort key.
    pub fn apply(&self, board: &Board) -> Board {
        let columns = board
            .columns
            .iter()
            .map(|column| {
                let mut leads: Vec<Lead> = column
                    .leads
                    .iter()
                    .filter(|lead| self.matches(lead))
                    .cloned()
                    .collect();
                if self.sort != SortKey::default() {
                    leads.sort_by(|a, b| compare_leads(self.sort, a, b));
                }
                Column {
                    leads,
                    ..column.clone()
                }
            })
            .collect();
        Board {
            columns,
            account: board.account.clone(),
        }
    }
}

fn compare_leads(sort: SortKey, a: &Lead, b: &Lead) -> Ordering {
    match sort {
        SortKey::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
        SortKey::UpdatedAsc => a.updated_at.cmp(&b.updated_at),
        SortKey::CreatedDesc => b.created_at.cmp(&a.created_at),
        SortKey::CreatedAsc => a.created_at.cmp(&b.created_at),
        SortKey::ValueDesc => b.value.total_cmp(&a.value),
        SortKey::ValueAsc => a.value.total_cmp(&b.value),
        SortKey::NameAsc => normalize_for_search(&a.name).cmp(&normalize_for_search(&b.name)),
    }
}

fn numeric_query_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s()+.\-]+$").expect("valid numeric query regex"))
}

fn is_numeric_query(value: &str) -> bool {
    numeric_query_regex().is_match(value) && value.chars().any(|c| c.is_ascii_digit())
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Lowercases, NFD-decomposes, and strips combining marks, so "joao"
/// matches "João".
pub fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}
