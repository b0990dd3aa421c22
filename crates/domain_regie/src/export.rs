//! Regie configuration export / import
//!
//! A regie's configuration (numbering templates, payer settings, payment
//! types) can be dumped to a JSON document and re-imported elsewhere;
//! import matches on slug and updates or creates.

use serde::{Deserialize, Serialize};

use core_kernel::StoreError;

use crate::regie::{PaymentType, Regie};
use crate::store::{NewRegie, NumberFormats, RegieStore};

/// JSON-exportable regie configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegieExport {
    pub label: String,
    pub slug: String,
    pub description: Option<String>,
    pub with_campaigns: bool,
    pub assign_credits_on_creation: bool,
    pub counter_name: String,
    pub invoice_number_format: String,
    pub collection_number_format: String,
    pub payment_number_format: String,
    pub docket_number_format: String,
    pub credit_number_format: String,
    pub refund_number_format: String,
    pub payer_external_id_prefix: String,
    pub payer_external_id_template: String,
    pub payment_types: Vec<PaymentTypeExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTypeExport {
    pub label: String,
    pub slug: String,
    pub disabled: bool,
}

/// Dumps a regie and its payment types
pub async fn export_regie(
    store: &dyn RegieStore,
    regie: &Regie,
) -> Result<RegieExport, StoreError> {
    let payment_types = store
        .payment_types(regie.id)
        .await?
        .into_iter()
        .map(|p| PaymentTypeExport {
            label: p.label,
            slug: p.slug,
            disabled: p.disabled,
        })
        .collect();

    Ok(RegieExport {
        label: regie.label.clone(),
        slug: regie.slug.clone(),
        description: regie.description.clone(),
        with_campaigns: regie.with_campaigns,
        assign_credits_on_creation: regie.assign_credits_on_creation,
        counter_name: regie.counter_name.clone(),
        invoice_number_format: regie.invoice_number_format.clone(),
        collection_number_format: regie.collection_number_format.clone(),
        payment_number_format: regie.payment_number_format.clone(),
        docket_number_format: regie.docket_number_format.clone(),
        credit_number_format: regie.credit_number_format.clone(),
        refund_number_format: regie.refund_number_format.clone(),
        payer_external_id_prefix: regie.payer_external_id_prefix.clone(),
        payer_external_id_template: regie.payer_external_id_template.clone(),
        payment_types,
    })
}

/// Imports a regie export, updating the regie with the same slug or creating
/// a new one. Returns the regie and whether it was created.
pub async fn import_regie(
    store: &dyn RegieStore,
    data: &RegieExport,
) -> Result<(bool, Regie), StoreError> {
    let (created, mut regie) = match store.regie_by_slug(&data.slug).await {
        Ok(regie) => (false, regie),
        Err(err) if err.is_not_found() => {
            let regie = store
                .insert_regie(NewRegie {
                    label: data.label.clone(),
                    slug: data.slug.clone(),
                    description: data.description.clone(),
                    with_campaigns: data.with_campaigns,
                    assign_credits_on_creation: data.assign_credits_on_creation,
                    counter_name: Some(data.counter_name.clone()),
                    number_formats: Some(NumberFormats {
                        invoice: data.invoice_number_format.clone(),
                        collection: data.collection_number_format.clone(),
                        payment: data.payment_number_format.clone(),
                        docket: data.docket_number_format.clone(),
                        credit: data.credit_number_format.clone(),
                        refund: data.refund_number_format.clone(),
                    }),
                    payer_external_id_prefix: data.payer_external_id_prefix.clone(),
                    payer_external_id_template: data.payer_external_id_template.clone(),
                })
                .await?;
            (true, regie)
        }
        Err(err) => return Err(err),
    };

    regie.label = data.label.clone();
    regie.description = data.description.clone();
    regie.with_campaigns = data.with_campaigns;
    regie.assign_credits_on_creation = data.assign_credits_on_creation;
    regie.counter_name = data.counter_name.clone();
    regie.invoice_number_format = data.invoice_number_format.clone();
    regie.collection_number_format = data.collection_number_format.clone();
    regie.payment_number_format = data.payment_number_format.clone();
    regie.docket_number_format = data.docket_number_format.clone();
    regie.credit_number_format = data.credit_number_format.clone();
    regie.refund_number_format = data.refund_number_format.clone();
    regie.payer_external_id_prefix = data.payer_external_id_prefix.clone();
    regie.payer_external_id_template = data.payer_external_id_template.clone();
    store.update_regie(&regie).await?;

    for payment_type in &data.payment_types {
        let mut existing: PaymentType = store
            .payment_type_get_or_create(regie.id, &payment_type.slug, &payment_type.label)
            .await?;
        existing.label = payment_type.label.clone();
        existing.disabled = payment_type.disabled;
        store.update_payment_type(&existing).await?;
    }

    Ok((created, regie))
}
