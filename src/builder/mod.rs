//! Campaign Builder
//!
//! The admin form as an immutable [`CampaignDraft`] changed through
//! [`DraftEdit`]s, validated as a whole and written through the store.
//!
//! ```text
//! CampaignDraft ──apply(edit)──► CampaignDraft ──validate()──► CampaignPlan ──submit──► Campaign
//!                                                     └──► ValidationErrors (no writes)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{
    Campaign, CampaignStore, MetricType, NewCampaign, NewParticipant, Prizes, StoreError,
};

/// Prize placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Place {
    First,
    Second,
    Third,
}

/// The campaign form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignDraft {
    pub name: String,
    /// Selected sellers in selection order
    pub participants: Vec<Uuid>,
    pub metric_type: MetricType,
    pub goals_enabled: bool,
    /// Applied to every participant
    pub individual_goal: Option<f64>,
    pub team_goal: Option<f64>,
    pub prizes_enabled: bool,
    pub prizes: Prizes,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// One change to a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DraftEdit {
    SetName { name: String },
    /// Select the seller, or deselect if already selected
    ToggleParticipant { seller_id: Uuid },
    SetMetricType { metric_type: MetricType },
    SetGoalsEnabled { enabled: bool },
    SetIndividualGoal { goal: Option<f64> },
    SetTeamGoal { goal: Option<f64> },
    SetPrizesEnabled { enabled: bool },
    SetPrize { place: Place, prize: String },
    SetStartDate { date: Option<NaiveDate> },
    SetEndDate { date: Option<NaiveDate> },
    Reset,
}

impl CampaignDraft {
    /// Return the draft with `edit` applied
    pub fn apply(&self, edit: DraftEdit) -> CampaignDraft {
        let mut next = self.clone();
        match edit {
            DraftEdit::SetName { name } => next.name = name,
            DraftEdit::ToggleParticipant { seller_id } => {
                if next.participants.contains(&seller_id) {
                    next.participants.retain(|id| *id != seller_id);
                } else {
                    next.participants.push(seller_id);
                }
            }
            DraftEdit::SetMetricType { metric_type } => next.metric_type = metric_type,
            DraftEdit::SetGoalsEnabled { enabled } => next.goals_enabled = enabled,
            DraftEdit::SetIndividualGoal { goal } => next.individual_goal = goal,
            DraftEdit::SetTeamGoal { goal } => next.team_goal = goal,
            DraftEdit::SetPrizesEnabled { enabled } => next.prizes_enabled = enabled,
            DraftEdit::SetPrize { place, prize } => {
                let slot = match place {
                    Place::First => &mut next.prizes.first,
                    Place::Second => &mut next.prizes.second,
                    Place::Third => &mut next.prizes.third,
                };
                *slot = Some(prize);
            }
            DraftEdit::SetStartDate { date } => next.start_date = date,
            DraftEdit::SetEndDate { date } => next.end_date = date,
            DraftEdit::Reset => next = CampaignDraft::default(),
        }
        next
    }

    /// Check the whole draft, reporting every problem at once
    pub fn validate(&self) -> Result<CampaignPlan, ValidationErrors> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyName);
        }

        if self.participants.is_empty() {
            errors.push(ValidationError::NoParticipants);
        }

        let mut seen = HashSet::new();
        for id in &self.participants {
            if !seen.insert(*id) {
                errors.push(ValidationError::DuplicateParticipant(*id));
            }
        }

        let (individual_goal, team_goal) = if self.goals_enabled {
            (
                check_goal("individual_goal", self.individual_goal, &mut errors),
                check_goal("team_goal", self.team_goal, &mut errors),
            )
        } else {
            (None, None)
        };

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                errors.push(ValidationError::EndBeforeStart { start, end });
            }
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        let prizes = if self.prizes_enabled {
            Prizes {
                first: non_blank(&self.prizes.first),
                second: non_blank(&self.prizes.second),
                third: non_blank(&self.prizes.third),
            }
        } else {
            Prizes::default()
        };

        Ok(CampaignPlan {
            campaign: NewCampaign {
                name: name.to_string(),
                start_date: self.start_date,
                end_date: self.end_date,
                metric_type: self.metric_type,
                team_goal,
                prizes,
                created_by: None,
            },
            participants: self
                .participants
                .iter()
                .map(|seller_id| NewParticipant {
                    seller_id: *seller_id,
                    individual_goal,
                })
                .collect(),
        })
    }
}

fn check_goal(
    field: &'static str,
    goal: Option<f64>,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    match goal {
        Some(value) if !value.is_finite() || value <= 0.0 => {
            errors.push(ValidationError::InvalidGoal { field, value });
            None
        }
        other => other,
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A validated draft, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignPlan {
    pub campaign: NewCampaign,
    pub participants: Vec<NewParticipant>,
}

/// One problem with a draft
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Campaign name is required")]
    EmptyName,

    #[error("Select at least one participant")]
    NoParticipants,

    #[error("Participant selected more than once: {0}")]
    DuplicateParticipant(Uuid),

    #[error("Unknown seller: {0}")]
    UnknownSeller(Uuid),

    #[error("{field} must be a positive number, got {value}")]
    InvalidGoal { field: &'static str, value: f64 },

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl ValidationError {
    /// Draft field the problem belongs to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyName => "name",
            ValidationError::NoParticipants
            | ValidationError::DuplicateParticipant(_)
            | ValidationError::UnknownSeller(_) => "participants",
            ValidationError::InvalidGoal { field, .. } => *field,
            ValidationError::EndBeforeStart { .. } => "end_date",
        }
    }
}

/// Every problem found in a draft
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Builder submit errors
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Invalid campaign: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Address of the display screen for a campaign
pub fn display_path(campaign_id: Uuid) -> String {
    format!("/display/{}", campaign_id)
}

/// Validate `draft` and write it as a new campaign
///
/// Nothing is written when validation fails or a participant is not on
/// the roster.
pub async fn submit(
    store: &dyn CampaignStore,
    draft: &CampaignDraft,
    created_by: Option<String>,
) -> Result<Campaign, BuilderError> {
    let mut plan = draft.validate()?;

    let roster: HashSet<Uuid> = store.list_sellers().await?.into_iter().map(|s| s.id).collect();
    let unknown: Vec<ValidationError> = plan
        .participants
        .iter()
        .filter(|p| !roster.contains(&p.seller_id))
        .map(|p| ValidationError::UnknownSeller(p.seller_id))
        .collect();
    if !unknown.is_empty() {
        return Err(ValidationErrors(unknown).into());
    }

    plan.campaign.created_by = created_by;
    let campaign = store
        .create_campaign(plan.campaign, &plan.participants)
        .await?;

    tracing::info!(
        campaign_id = %campaign.id,
        name = %campaign.name,
        participants = plan.participants.len(),
        "Campaign created"
    );

    Ok(campaign)
}
