//! Legality table for lifecycle operations.
//!
//! ```text
//! UploadUrlGenerated -> Active -> { Archived, Broken }
//! Broken -> Archived          (cleanup)
//! Archived -> Active          (restore)
//! Archived -> (gone)          (permanent delete)
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::AppError;
use crate::models::AssetStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    Archive,
    MarkAsBroken,
    Restore,
    PermanentDelete,
    AddOwner,
    RemoveOwner,
    SetOwners,
    Activate,
}

impl LifecycleOp {
    pub const ALL: [LifecycleOp; 8] = [
        LifecycleOp::Archive,
        LifecycleOp::MarkAsBroken,
        LifecycleOp::Restore,
        LifecycleOp::PermanentDelete,
        LifecycleOp::AddOwner,
        LifecycleOp::RemoveOwner,
        LifecycleOp::SetOwners,
        LifecycleOp::Activate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Archive => "archive",
            LifecycleOp::MarkAsBroken => "mark_as_broken",
            LifecycleOp::Restore => "restore",
            LifecycleOp::PermanentDelete => "permanent_delete",
            LifecycleOp::AddOwner => "add_owner",
            LifecycleOp::RemoveOwner => "remove_owner",
            LifecycleOp::SetOwners => "set_owners",
            LifecycleOp::Activate => "activate",
        }
    }

    /// Statuses from which this operation is legal.
    pub fn allowed_from(&self) -> &'static [AssetStatus] {
        use AssetStatus::*;
        match self {
            LifecycleOp::Archive => &[UploadUrlGenerated, Active, Broken],
            LifecycleOp::MarkAsBroken => &[UploadUrlGenerated, Active],
            LifecycleOp::Restore => &[Archived],
            LifecycleOp::PermanentDelete => &[Archived],
            LifecycleOp::AddOwner | LifecycleOp::RemoveOwner | LifecycleOp::SetOwners => {
                &[UploadUrlGenerated, Active]
            }
            LifecycleOp::Activate => &[UploadUrlGenerated],
        }
    }

    pub fn is_legal_from(&self, status: AssetStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

impl Display for LifecycleOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// `Conflict` unless `op` is legal from `status`.
pub fn ensure_legal(op: LifecycleOp, status: AssetStatus) -> Result<(), AppError> {
    if op.is_legal_from(status) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "cannot {} an asset in status '{}'",
            op, status
        )))
    }
}
