use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle of one preparation line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InPreparation,
    Ready,
    Delivered,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Pending,
        ItemStatus::InPreparation,
        ItemStatus::Ready,
        ItemStatus::Delivered,
        ItemStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InPreparation => "in_preparation",
            ItemStatus::Ready => "ready",
            ItemStatus::Delivered => "delivered",
            ItemStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown item status '{}'", s))
    }
}

/// How the pharmacy obtains the medication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Acquisition {
    #[default]
    Stockable,
    LocalPurchase,
}

impl Acquisition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acquisition::Stockable => "stockable",
            Acquisition::LocalPurchase => "local_purchase",
        }
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Acquisition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stockable" => Ok(Acquisition::Stockable),
            "local_purchase" => Ok(Acquisition::LocalPurchase),
            other => Err(format!("unknown acquisition '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_matches_serde() {
        for status in ItemStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        assert!("done".parse::<ItemStatus>().is_err());
        assert!("bought".parse::<Acquisition>().is_err());
    }

    #[test]
    fn test_acquisition_default() {
        assert_eq!(Acquisition::default(), Acquisition::Stockable);
        assert_eq!("local_purchase".parse::<Acquisition>().unwrap(), Acquisition::LocalPurchase);
    }
}
