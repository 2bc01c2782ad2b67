use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{MoiraError, Result};

const PREFIX: &str = "FATE";

/// Namespace whose tables and operations belong to the system instance type.
pub const SYSTEM_NAMESPACE: &str = "system";

/// Which FATE instance a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FateInstanceType {
    /// Operations on system tables.
    Meta,
    /// Operations on user tables.
    User,
}

impl FateInstanceType {
    /// Picks the instance type from a namespace or qualified table name:
    /// anything in [`SYSTEM_NAMESPACE`] is `Meta`, everything else `User`.
    pub fn from_namespace_or_table_name(name: &str) -> Self {
        match name.split_once('.') {
            Some((ns, _)) if ns == SYSTEM_NAMESPACE => FateInstanceType::Meta,
            None if name == SYSTEM_NAMESPACE => FateInstanceType::Meta,
            _ => FateInstanceType::User,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FateInstanceType::Meta => "META",
            FateInstanceType::User => "USER",
        }
    }
}

impl FromStr for FateInstanceType {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "META" => Ok(FateInstanceType::Meta),
            "USER" => Ok(FateInstanceType::User),
            other => Err(MoiraError::InvalidId(format!("unknown instance type {other}"))),
        }
    }
}

impl fmt::Display for FateInstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one FATE transaction for its entire lifetime.
///
/// The canonical form is `FATE:<TYPE>:<uuid>`, which is also the row key of
/// the transaction's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FateId {
    instance_type: FateInstanceType,
    tx_uuid: Uuid,
}

impl FateId {
    pub fn from(instance_type: FateInstanceType, tx_uuid: Uuid) -> Self {
        Self {
            instance_type,
            tx_uuid,
        }
    }

    /// Creates a new id with a random UUID.
    pub fn random(instance_type: FateInstanceType) -> Self {
        Self::from(instance_type, Uuid::new_v4())
    }

    pub fn instance_type(&self) -> FateInstanceType {
        self.instance_type
    }

    pub fn tx_uuid(&self) -> Uuid {
        self.tx_uuid
    }

    /// The printable, parseable form of this id.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", PREFIX, self.instance_type, self.tx_uuid)
    }
}

impl FromStr for FateId {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(PREFIX), Some(ty), Some(uuid)) => {
                let tx_uuid = Uuid::parse_str(uuid)
                    .map_err(|e| MoiraError::InvalidId(format!("{s}: {e}")))?;
                Ok(FateId::from(ty.parse()?, tx_uuid))
            }
            _ => Err(MoiraError::InvalidId(format!("not a FATE id: {s}"))),
        }
    }
}
