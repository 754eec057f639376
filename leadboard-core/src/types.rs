use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type LeadId = String;
pub type ColumnId = String;
pub type TagId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    /// Column the server last placed this lead in. The board's column
    /// sequences are authoritative during interaction; this field is kept in
    /// step by the store whenever a lead changes columns.
    #[serde(default)]
    pub column_id: ColumnId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Pipeline-stage order. Position is the index in this vector.
    #[serde(default)]
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountInfo>,
}

impl Board {
    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column_id)
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Find a lead: returns (column index, lead index).
    pub fn locate_lead(&self, lead_id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.leads
                .iter()
                .position(|l| l.id == lead_id)
                .map(|li| (ci, li))
        })
    }

    pub fn lead(&self, lead_id: &str) -> Option<&Lead> {
        self.locate_lead(lead_id)
            .map(|(ci, li)| &self.columns[ci].leads[li])
    }

    pub fn lead_count(&self) -> usize {
        self.columns.iter().map(|c| c.leads.len()).sum()
    }

    /// True when no column holds any lead.
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.leads.is_empty())
    }

    /// Detach a lead from whichever column owns it.
    pub fn remove_lead(&mut self, lead_id: &str) -> Option<(ColumnId, Lead)> {
        let (ci, li) = self.locate_lead(lead_id)?;
        let column = &mut self.columns[ci];
        Some((column.id.clone(), column.leads.remove(li)))
    }

    /// Insert a lead into a column. The index is clamped to the column
    /// length. Returns the index actually used, or `None` for an unknown
    /// column (the lead is dropped in that case, so callers check first).
    pub fn insert_lead(&mut self, column_id: &str, index: usize, mut lead: Lead) -> Option<usize> {
        let column = self.columns.iter_mut().find(|c| c.id == column_id)?;
        let index = index.min(column.leads.len());
        lead.column_id = column.id.clone();
        column.leads.insert(index, lead);
        Some(index)
    }

    /// Column ids mapped to their ordered lead ids. Handy for comparing
    /// arrangements regardless of lead attribute changes.
    pub fn arrangement(&self) -> Vec<(ColumnId, Vec<LeadId>)> {
        self.columns
            .iter()
            .map(|c| (c.id.clone(), c.leads.iter().map(|l| l.id.clone()).collect()))
            .collect()
    }
}

/// Per-lead task counters shown on cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub total_pending: u32,
    pub today: u32,
    pub overdue: u32,
    pub has_tasks: bool,
    pub has_overdue: bool,
    pub has_today: bool,
}

pub type ActivityCountsMap = HashMap<LeadId, ActivityCounts>;

/// Server reply to a move request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveResponse {
    /// The full board after the move; replaces the local board wholesale.
    Board { board: Board },
    /// The moved lead with the placement the server settled on.
    Lead { lead: Lead, position: usize },
}
