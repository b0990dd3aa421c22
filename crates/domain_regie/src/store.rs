//! Regie persistence port

use async_trait::async_trait;

use core_kernel::{RegieId, StoreError};

use crate::regie::{PaymentType, Regie};

/// Persistence port for regies and their payment types
#[async_trait]
pub trait RegieStore: Send + Sync {
    async fn insert_regie(&self, regie: NewRegie) -> Result<Regie, StoreError>;

    async fn update_regie(&self, regie: &Regie) -> Result<(), StoreError>;

    async fn regie(&self, id: RegieId) -> Result<Regie, StoreError>;

    async fn regie_by_slug(&self, slug: &str) -> Result<Regie, StoreError>;

    /// All regies ordered by label
    async fn list_regies(&self) -> Result<Vec<Regie>, StoreError>;

    /// Payment types of a regie ordered by label
    async fn payment_types(&self, regie_id: RegieId) -> Result<Vec<PaymentType>, StoreError>;

    /// Returns the payment type with this slug, creating it if missing
    async fn payment_type_get_or_create(
        &self,
        regie_id: RegieId,
        slug: &str,
        label: &str,
    ) -> Result<PaymentType, StoreError>;

    async fn update_payment_type(&self, payment_type: &PaymentType) -> Result<(), StoreError>;

    /// Deletes a regie; refused while documents still reference it
    async fn delete_regie(&self, id: RegieId) -> Result<(), StoreError>;
}

/// Data for creating a regie; the store assigns the row id and timestamps
#[derive(Debug, Clone)]
pub struct NewRegie {
    pub label: String,
    pub slug: String,
    pub description: Option<String>,
    pub with_campaigns: bool,
    pub assign_credits_on_creation: bool,
    pub counter_name: Option<String>,
    pub number_formats: Option<NumberFormats>,
    pub payer_external_id_prefix: String,
    pub payer_external_id_template: String,
}

impl NewRegie {
    pub fn with_label(label: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            slug: slug.into(),
            description: None,
            with_campaigns: false,
            assign_credits_on_creation: true,
            counter_name: None,
            number_formats: None,
            payer_external_id_prefix: String::new(),
            payer_external_id_template: String::new(),
        }
    }
}

/// Overrides for the six per-kind number format templates
#[derive(Debug, Clone)]
pub struct NumberFormats {
    pub invoice: String,
    pub collection: String,
    pub payment: String,
    pub docket: String,
    pub credit: String,
    pub refund: String,
}
