//! Persisted records and their status state machines.
//!
//! Image references live inside the terminal variants, so a record can never
//! claim to be finished without pointing at its image.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{GarmentCategory, RecordError, Result, new_record_id};

/// A masked garment cut-out filed in the wardrobe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WardrobeItem {
    pub id: String,
    pub category: GarmentCategory,
    /// PNG cut-out, relative to the file store root
    pub local_path: String,
    pub created_at: DateTime<Utc>,
}

impl WardrobeItem {
    pub fn new(category: GarmentCategory, local_path: impl Into<String>) -> Self {
        Self {
            id: new_record_id(),
            category,
            local_path: local_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// Status of a single try-on job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, IntoStaticStr)]
#[serde(tag = "status", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed {
        image_url: String,
        local_path: Option<String>,
    },
    Failed {
        reason: String,
    },
}

/// Result of a single try-on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: String,
    pub category: GarmentCategory,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl JobRecord {
    /// New record for a job the remote API has accepted
    pub fn pending(id: impl Into<String>, category: GarmentCategory) -> Self {
        Self {
            id: id.into(),
            category,
            created_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, JobStatus::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, JobStatus::Completed { .. })
    }

    /// Local file backing this record, if any
    pub fn local_path(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Completed { local_path, .. } => local_path.as_deref(),
            _ => None,
        }
    }

    /// Pending -> Completed
    pub fn complete(
        &mut self,
        image_url: impl Into<String>,
        local_path: Option<String>,
    ) -> Result<()> {
        self.ensure_pending("completed")?;
        self.status = JobStatus::Completed {
            image_url: image_url.into(),
            local_path,
        };
        Ok(())
    }

    /// Pending -> Failed
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_pending("failed")?;
        self.status = JobStatus::Failed {
            reason: reason.into(),
        };
        Ok(())
    }

    fn ensure_pending(&self, to: &'static str) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(RecordError::InvalidTransition {
                id: self.id.clone(),
                from: (&self.status).into(),
                to,
            })
        }
    }
}

/// Lifecycle of an outfit composite. Failed outfits are discarded, so there
/// is no failed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, IntoStaticStr)]
#[serde(tag = "state", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutfitState {
    Processing,
    Ready {
        image_url: String,
        local_path: String,
    },
}

/// A top + bottom composite rendered onto a base photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutfitRecord {
    pub id: String,
    pub top_item_id: String,
    pub bottom_item_id: String,
    #[serde(default)]
    pub accessories: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: OutfitState,
}

impl OutfitRecord {
    /// Optimistic placeholder created before any remote work starts
    pub fn processing(
        top_item_id: impl Into<String>,
        bottom_item_id: impl Into<String>,
        accessories: Vec<String>,
    ) -> Self {
        Self {
            id: new_record_id(),
            top_item_id: top_item_id.into(),
            bottom_item_id: bottom_item_id.into(),
            accessories,
            created_at: Utc::now(),
            state: OutfitState::Processing,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, OutfitState::Processing)
    }

    pub fn local_path(&self) -> Option<&str> {
        match &self.state {
            OutfitState::Ready { local_path, .. } => Some(local_path),
            OutfitState::Processing => None,
        }
    }

    /// Processing -> Ready
    pub fn finish(&mut self, image_url: impl Into<String>, local_path: impl Into<String>) -> Result<()> {
        if !self.is_processing() {
            return Err(RecordError::InvalidTransition {
                id: self.id.clone(),
                from: (&self.state).into(),
                to: "ready",
            });
        }
        self.state = OutfitState::Ready {
            image_url: image_url.into(),
            local_path: local_path.into(),
        };
        Ok(())
    }
}
