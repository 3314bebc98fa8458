//! Core data types for the campaign store
//!
//! - `Seller`: a salesperson from the roster
//! - `Campaign`: a time-boxed sales competition
//! - `Participant`: a seller entered into a campaign
//! - `Sale`: one recorded sale amount
//! - `SaleChange`: change notification emitted for the sales table

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A salesperson that can be entered into campaigns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seller {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// What a campaign ranks participants by
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Sale amounts in currency (R$)
    #[default]
    Monetary,
    /// Point or volume counts
    Points,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Monetary => "monetary",
            MetricType::Points => "points",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monetary" => Ok(MetricType::Monetary),
            "points" => Ok(MetricType::Points),
            other => Err(format!("unknown metric type: {}", other)),
        }
    }
}

/// Prizes for the first three places
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Prizes {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub second: Option<String>,
    #[serde(default)]
    pub third: Option<String>,
}

impl Prizes {
    /// Prize for a 1-based rank, if any
    pub fn for_rank(&self, rank: usize) -> Option<&str> {
        match rank {
            1 => self.first.as_deref(),
            2 => self.second.as_deref(),
            3 => self.third.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none() && self.third.is_none()
    }
}

/// A sales campaign. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub metric_type: MetricType,
    #[serde(default)]
    pub team_goal: Option<f64>,
    #[serde(default)]
    pub prizes: Prizes,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Campaign fields supplied by the builder
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewCampaign {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metric_type: MetricType,
    pub team_goal: Option<f64>,
    pub prizes: Prizes,
    pub created_by: Option<String>,
}

impl NewCampaign {
    /// Materialize into a campaign row with a fresh id
    pub fn into_campaign(self) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
            metric_type: self.metric_type,
            team_goal: self.team_goal,
            prizes: self.prizes,
            created_by: self.created_by,
            created_at: Utc::now(),
        }
    }
}

/// Participant link supplied by the builder
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NewParticipant {
    pub seller_id: Uuid,
    pub individual_goal: Option<f64>,
}

/// A participant of a campaign, joined with the seller's display fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub campaign_id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub individual_goal: Option<f64>,
}

/// One recorded sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub seller_id: Uuid,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// Sale fields supplied by an ingesting process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NewSale {
    pub campaign_id: Uuid,
    pub seller_id: Uuid,
    pub value: f64,
}

/// Kind of change applied to the sales table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Change notification for the sales table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleChange {
    pub kind: ChangeKind,
    pub sale_id: Uuid,
    pub campaign_id: Uuid,
    pub seller_id: Uuid,
}

impl SaleChange {
    pub fn new(kind: ChangeKind, sale: &Sale) -> Self {
        Self {
            kind,
            sale_id: sale.id,
            campaign_id: sale.campaign_id,
            seller_id: sale.seller_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_parse() {
        assert_eq!("monetary".parse::<MetricType>(), Ok(MetricType::Monetary));
        assert_eq!("POINTS".parse::<MetricType>(), Ok(MetricType::Points));
        assert!("volume".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_metric_type_serde() {
        let json = serde_json::to_string(&MetricType::Points).unwrap();
        assert_eq!(json, "\"points\"");
    }

    #[test]
    fn test_prize_for_rank() {
        let prizes = Prizes {
            first: Some("iPhone 15 Pro + Viagem".to_string()),
            second: None,
            third: Some("Apple Watch".to_string()),
        };
        assert_eq!(prizes.for_rank(1), Some("iPhone 15 Pro + Viagem"));
        assert_eq!(prizes.for_rank(2), None);
        assert_eq!(prizes.for_rank(3), Some("Apple Watch"));
        assert_eq!(prizes.for_rank(4), None);
        assert!(!prizes.is_empty());
        assert!(Prizes::default().is_empty());
    }
}
