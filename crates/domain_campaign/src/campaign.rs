//! Campaigns
//!
//! A campaign is one billing period's invoicing run for a regie. Draft pools
//! preview its output; the accepted preview is promoted into a final pool
//! whose completion produces the real invoices and credits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CampaignId, RegieId};

/// How injected lines are folded into a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectedLinesMode {
    /// Ignore injected lines entirely
    #[default]
    No,
    /// Only injected lines dated inside the campaign period
    Period,
    /// All injected lines dated before the end of the period
    All,
}

/// One billing period for a regie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub regie_id: RegieId,
    pub label: String,
    pub date_start: NaiveDate,
    /// Exclusive end of the billed period
    pub date_end: NaiveDate,
    /// Date on which invoices become visible on the portal
    pub date_publication: NaiveDate,
    /// Deadline displayed to the payer; effective deadline when absent
    pub date_payment_deadline_displayed: Option<NaiveDate>,
    /// Date after which invoices are no longer payable online
    pub date_payment_deadline: NaiveDate,
    /// Date after which invoices are no longer payable at the counter
    pub date_due: NaiveDate,
    pub date_debit: NaiveDate,
    pub injected_lines: InjectedLinesMode,
    /// Adjustment campaigns re-bill differences against a previous run
    pub adjustment_campaign: bool,
    /// Set when a corrective campaign supersedes this one
    pub invalid: bool,
    pub finalized: bool,
    /// When the campaign was finalized; drives draft pool retention
    pub finalized_at: Option<DateTime<Utc>>,
    /// The campaign this one corrects; one level only
    pub primary_campaign_id: Option<CampaignId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Label used on generated invoices: the period with an inclusive end
    pub fn invoice_label(&self) -> String {
        let inclusive_end = self.date_end - chrono::Duration::days(1);
        format!(
            "Invoice from {} to {}",
            self.date_start.format("%d/%m/%Y"),
            inclusive_end.format("%d/%m/%Y")
        )
    }

    pub fn is_corrective(&self) -> bool {
        self.primary_campaign_id.is_some()
    }
}

/// Data for creating a campaign; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub regie_id: RegieId,
    pub label: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub date_publication: NaiveDate,
    pub date_payment_deadline_displayed: Option<NaiveDate>,
    pub date_payment_deadline: NaiveDate,
    pub date_due: NaiveDate,
    pub date_debit: NaiveDate,
    pub injected_lines: InjectedLinesMode,
    pub adjustment_campaign: bool,
    pub primary_campaign_id: Option<CampaignId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_invoice_label_uses_inclusive_end() {
        let now = Utc.with_ymd_and_hms(2022, 9, 1, 0, 0, 0).unwrap();
        let campaign = Campaign {
            id: CampaignId::new(1),
            regie_id: RegieId::new(1),
            label: "September".to_string(),
            date_start: NaiveDate::from_ymd_opt(2022, 9, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2022, 10, 1).unwrap(),
            date_publication: NaiveDate::from_ymd_opt(2022, 10, 1).unwrap(),
            date_payment_deadline_displayed: None,
            date_payment_deadline: NaiveDate::from_ymd_opt(2022, 10, 31).unwrap(),
            date_due: NaiveDate::from_ymd_opt(2022, 11, 30).unwrap(),
            date_debit: NaiveDate::from_ymd_opt(2022, 11, 15).unwrap(),
            injected_lines: InjectedLinesMode::No,
            adjustment_campaign: false,
            invalid: false,
            finalized: false,
            finalized_at: None,
            primary_campaign_id: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(campaign.invoice_label(), "Invoice from 01/09/2022 to 30/09/2022");
        assert!(!campaign.is_corrective());
    }
}
