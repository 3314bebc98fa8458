//! Ranking export
//!
//! Renders a computed ranking as CSV or JSON, for the export endpoint and
//! the `podium ranking` command.

use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::ranking::Ranking;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unknown export format '{0}' (expected csv or json)")]
    UnknownFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// One exported row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    rank: usize,
    seller_id: Uuid,
    name: &'a str,
    value: f64,
    sales: usize,
    goal: Option<f64>,
    goal_progress: Option<i64>,
}

fn rows(ranking: &Ranking) -> impl Iterator<Item = ExportRow<'_>> {
    ranking.entries.iter().map(|entry| ExportRow {
        rank: entry.rank,
        seller_id: entry.seller_id,
        name: &entry.name,
        value: entry.value,
        sales: entry.sales_count,
        goal: entry.goal,
        goal_progress: entry.goal_progress().map(|p| p.round() as i64),
    })
}

/// Render `ranking` in `format`
pub fn render(ranking: &Ranking, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(ranking),
        ExportFormat::Json => to_json(ranking),
    }
}

/// One header row plus one row per entry, in rank order
pub fn to_csv(ranking: &Ranking) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows(ranking) {
        writer.serialize(row)?;
    }
    // Header only for an empty ranking
    if ranking.entries.is_empty() {
        writer.write_record([
            "rank",
            "seller_id",
            "name",
            "value",
            "sales",
            "goal",
            "goal_progress",
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Encoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Encoding(e.to_string()))
}

/// Pretty JSON with the campaign summary and entries
pub fn to_json(ranking: &Ranking) -> Result<String, ExportError> {
    #[derive(Serialize)]
    struct Document<'a> {
        campaign_id: Uuid,
        campaign: &'a str,
        metric_type: &'a str,
        team_total: f64,
        team_goal: Option<f64>,
        entries: Vec<ExportRow<'a>>,
    }

    let document = Document {
        campaign_id: ranking.campaign.id,
        campaign: &ranking.campaign.name,
        metric_type: ranking.campaign.metric_type.as_str(),
        team_total: ranking.team_total,
        team_goal: ranking.campaign.team_goal,
        entries: rows(ranking).collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{RankedEntry, TieBreak};
    use crate::store::NewCampaign;

    fn sample() -> Ranking {
        let campaign = NewCampaign {
            name: "Outubro".to_string(),
            team_goal: Some(1_000_000.0),
            ..Default::default()
        }
        .into_campaign();
        Ranking::new(
            campaign,
            vec![
                RankedEntry::new(Uuid::new_v4(), "Ana Costa", 172_000.0, Some(150_000.0)),
                RankedEntry::new(Uuid::new_v4(), "Carlos Silva", 185_000.0, None),
            ],
            TieBreak::FetchOrder,
        )
    }

    #[test]
    fn test_csv() {
        let csv = to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "rank,seller_id,name,value,sales,goal,goal_progress");
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].contains("Carlos Silva,185000.0,0,,"));
        assert!(lines[2].ends_with("Ana Costa,172000.0,0,150000.0,115"));
    }

    #[test]
    fn test_csv_empty_ranking_has_header() {
        let campaign = NewCampaign::default().into_campaign();
        let ranking = Ranking::new(campaign, Vec::new(), TieBreak::FetchOrder);
        let csv = to_csv(&ranking).unwrap();
        assert_eq!(csv.trim(), "rank,seller_id,name,value,sales,goal,goal_progress");
    }

    #[test]
    fn test_json() {
        let json = to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["campaign"], "Outubro");
        assert_eq!(value["team_total"], 357_000.0);
        assert_eq!(value["entries"][0]["name"], "Carlos Silva");
        assert_eq!(value["entries"][1]["goal_progress"], 115);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
