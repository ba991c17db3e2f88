use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::AppError;

const MAX_OWNER_TYPE_LEN: usize = 64;
const MAX_OWNER_ID_LEN: usize = 255;

/// Discriminator routing reconciliation calls to the owning service
/// (e.g. `product`, `course`, `lesson`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerType(String);

impl OwnerType {
    pub fn new(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_OWNER_TYPE_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(AppError::InvalidArgument(format!(
                "Invalid owner type '{}': expected lowercase letters, digits or '_'",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for OwnerType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OwnerType::new(s)
    }
}

impl TryFrom<String> for OwnerType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OwnerType::new(value)
    }
}

impl From<OwnerType> for String {
    fn from(value: OwnerType) -> Self {
        value.0
    }
}

/// Reference to an entity owned by another service. Carries no behaviour of
/// its own: it is a join key plus the discriminator used for routing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub owner_id: String,
    pub owner_type: OwnerType,
}

impl Owner {
    pub fn new(owner_id: impl Into<String>, owner_type: OwnerType) -> Result<Self, AppError> {
        let owner_id = owner_id.into();
        if owner_id.trim().is_empty() || owner_id.len() > MAX_OWNER_ID_LEN {
            return Err(AppError::InvalidArgument(format!(
                "Owner id must be between 1 and {} characters",
                MAX_OWNER_ID_LEN
            )));
        }
        Ok(Self {
            owner_id,
            owner_type,
        })
    }

    /// Parse `type` and `id` strings coming from the transport layer.
    pub fn parse(owner_type: &str, owner_id: &str) -> Result<Self, AppError> {
        Owner::new(owner_id, OwnerType::new(owner_type)?)
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.owner_type, self.owner_id)
    }
}
