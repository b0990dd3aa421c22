//! Test data builders
//!
//! Builder patterns for constructing domain input with sensible defaults;
//! tests specify only the fields they care about.

use chrono::NaiveDate;

use core_kernel::{CampaignId, RegieId};
use domain_campaign::{InjectedLinesMode, NewCampaign};
use domain_regie::NewRegie;

use crate::fixtures::TemporalFixtures;

/// Builder for regie creation data
pub struct RegieBuilder {
    new: NewRegie,
}

impl Default for RegieBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegieBuilder {
    pub fn new() -> Self {
        Self {
            new: NewRegie::with_label("Foo", "foo"),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>, slug: impl Into<String>) -> Self {
        self.new.label = label.into();
        self.new.slug = slug.into();
        self
    }

    pub fn with_campaigns(mut self) -> Self {
        self.new.with_campaigns = true;
        self
    }

    pub fn without_credit_assignment(mut self) -> Self {
        self.new.assign_credits_on_creation = false;
        self
    }

    pub fn with_counter_name(mut self, counter_name: impl Into<String>) -> Self {
        self.new.counter_name = Some(counter_name.into());
        self
    }

    pub fn with_payer_template(
        mut self,
        template: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.new.payer_external_id_template = template.into();
        self.new.payer_external_id_prefix = prefix.into();
        self
    }

    pub fn build(self) -> NewRegie {
        self.new
    }
}

/// Builder for campaign creation data
pub struct CampaignBuilder {
    new: NewCampaign,
}

impl CampaignBuilder {
    /// A September 2022 campaign for the given regie
    pub fn new(regie_id: RegieId) -> Self {
        Self {
            new: NewCampaign {
                regie_id,
                label: "September".to_string(),
                date_start: TemporalFixtures::period_start(),
                date_end: TemporalFixtures::period_end(),
                date_publication: TemporalFixtures::publication(),
                date_payment_deadline_displayed: None,
                date_payment_deadline: TemporalFixtures::payment_deadline(),
                date_due: TemporalFixtures::due(),
                date_debit: TemporalFixtures::debit(),
                injected_lines: InjectedLinesMode::No,
                adjustment_campaign: false,
                primary_campaign_id: None,
            },
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.new.label = label.into();
        self
    }

    pub fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.new.date_start = start;
        self.new.date_end = end;
        self
    }

    pub fn with_injected_lines(mut self, mode: InjectedLinesMode) -> Self {
        self.new.injected_lines = mode;
        self
    }

    pub fn adjustment(mut self) -> Self {
        self.new.adjustment_campaign = true;
        self
    }

    pub fn correcting(mut self, primary: CampaignId) -> Self {
        self.new.primary_campaign_id = Some(primary);
        self
    }

    pub fn build(self) -> NewCampaign {
        self.new
    }
}
