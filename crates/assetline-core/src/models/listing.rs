use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::asset::{Asset, AssetStatus, ResourceType};
use super::metadata::AssetMetadata;
use crate::cursor::PageCursor;
use crate::error::AppError;
use crate::validation::ORDERABLE_ASSET_FIELDS;

/// Which slice of the asset table a listing is scoped to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetScope {
    /// Everything not soft-deleted
    #[default]
    Live,
    Archived,
    All,
}

impl FromStr for AssetScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(AssetScope::Live),
            "archived" => Ok(AssetScope::Archived),
            "all" => Ok(AssetScope::All),
            _ => Err(AppError::InvalidArgument(format!("Invalid scope: {}", s))),
        }
    }
}

/// Typed filter applied inside a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub statuses: Vec<AssetStatus>,
    pub resource_type: Option<ResourceType>,
    pub created_by: Option<String>,
}

impl AssetFilter {
    pub fn matches(&self, asset: &Asset) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&asset.status))
            && self
                .resource_type
                .is_none_or(|rt| rt == asset.resource_type)
            && self
                .created_by
                .as_deref()
                .is_none_or(|actor| actor == asset.created_by.actor_id)
    }
}

impl AssetScope {
    pub fn matches(&self, asset: &Asset) -> bool {
        match self {
            AssetScope::Live => asset.deleted_at.is_none(),
            AssetScope::Archived => asset.deleted_at.is_some(),
            AssetScope::All => true,
        }
    }
}

/// Field a listing is ordered by. Always paired with `id` as tiebreak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl OrderField {
    pub fn column(&self) -> &'static str {
        match self {
            OrderField::CreatedAt => ORDERABLE_ASSET_FIELDS[0],
            OrderField::UpdatedAt => ORDERABLE_ASSET_FIELDS[1],
        }
    }
}

impl Display for OrderField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.column())
    }
}

impl FromStr for OrderField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(OrderField::CreatedAt),
            "updated_at" => Ok(OrderField::UpdatedAt),
            _ => Err(AppError::InvalidArgument(format!(
                "Cannot order by '{}'; allowed: {}",
                s,
                ORDERABLE_ASSET_FIELDS.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort direction: {}",
                s
            ))),
        }
    }
}

/// Caller-facing list request; `page_token` is opaque.
#[derive(Debug, Clone, Default)]
pub struct ListAssetsRequest {
    pub scope: AssetScope,
    pub filter: AssetFilter,
    pub order_by: OrderField,
    pub direction: SortDirection,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

/// Store-level query: rows strictly after `after` in `(order_by, id)` order.
#[derive(Debug, Clone)]
pub struct AssetListQuery {
    pub scope: AssetScope,
    pub filter: AssetFilter,
    pub order_by: OrderField,
    pub direction: SortDirection,
    pub after: Option<PageCursor>,
    pub limit: u32,
}

/// One asset plus its metadata document, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetView {
    #[serde(flatten)]
    pub asset: Asset,
    pub metadata: Option<AssetMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetPage {
    pub assets: Vec<AssetView>,
    /// Empty when there are no further pages.
    pub next_page_token: String,
}
