//! Regie and counter port implementations

use async_trait::async_trait;

use core_kernel::{PaymentTypeId, RegieId, StoreError};
use domain_regie::{
    CounterKind, CounterPort, NewRegie, PaymentType, Regie, RegieStore, DEFAULT_PAYMENT_TYPES,
};

use crate::memory::MemoryStore;

#[async_trait]
impl CounterPort for MemoryStore {
    async fn next_value(
        &self,
        regie_id: RegieId,
        name: &str,
        kind: CounterKind,
    ) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let value = tables
            .counters
            .entry((regie_id.value(), name.to_string(), kind))
            .or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl RegieStore for MemoryStore {
    async fn insert_regie(&self, new: NewRegie) -> Result<Regie, StoreError> {
        let mut tables = self.lock();
        if tables.regies.values().any(|r| r.slug == new.slug) {
            return Err(StoreError::conflict(format!(
                "regie slug '{}' already exists",
                new.slug
            )));
        }
        let id = tables.next_id("regies");
        let now = chrono::Utc::now();
        let mut regie = Regie::new(RegieId::new(id), new.label, new.slug, now);
        regie.description = new.description;
        regie.with_campaigns = new.with_campaigns;
        regie.assign_credits_on_creation = new.assign_credits_on_creation;
        if let Some(counter_name) = new.counter_name {
            regie.counter_name = counter_name;
        }
        if let Some(formats) = new.number_formats {
            regie.invoice_number_format = formats.invoice;
            regie.collection_number_format = formats.collection;
            regie.payment_number_format = formats.payment;
            regie.docket_number_format = formats.docket;
            regie.credit_number_format = formats.credit;
            regie.refund_number_format = formats.refund;
        }
        regie.payer_external_id_prefix = new.payer_external_id_prefix;
        regie.payer_external_id_template = new.payer_external_id_template;
        tables.regies.insert(id, regie.clone());

        // seed the standard payment types; explicit, not a framework hook
        for (slug, label) in DEFAULT_PAYMENT_TYPES {
            let type_id = tables.next_id("payment_types");
            tables.payment_types.insert(
                type_id,
                PaymentType::new(PaymentTypeId::new(type_id), regie.id, label, slug),
            );
        }

        Ok(regie)
    }

    async fn update_regie(&self, regie: &Regie) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = regie.id.value();
        if !tables.regies.contains_key(&id) {
            return Err(StoreError::not_found("Regie", regie.id));
        }
        tables.regies.insert(id, regie.clone());
        Ok(())
    }

    async fn regie(&self, id: RegieId) -> Result<Regie, StoreError> {
        self.lock()
            .regies
            .get(&id.value())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Regie", id))
    }

    async fn regie_by_slug(&self, slug: &str) -> Result<Regie, StoreError> {
        self.lock()
            .regies
            .values()
            .find(|r| r.slug == slug)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Regie", slug))
    }

    async fn list_regies(&self) -> Result<Vec<Regie>, StoreError> {
        let mut regies: Vec<Regie> = self.lock().regies.values().cloned().collect();
        regies.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(regies)
    }

    async fn payment_types(&self, regie_id: RegieId) -> Result<Vec<PaymentType>, StoreError> {
        let mut types: Vec<PaymentType> = self
            .lock()
            .payment_types
            .values()
            .filter(|p| p.regie_id == regie_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(types)
    }

    async fn payment_type_get_or_create(
        &self,
        regie_id: RegieId,
        slug: &str,
        label: &str,
    ) -> Result<PaymentType, StoreError> {
        let mut tables = self.lock();
        if let Some(existing) = tables
            .payment_types
            .values()
            .find(|p| p.regie_id == regie_id && p.slug == slug)
        {
            return Ok(existing.clone());
        }
        let id = tables.next_id("payment_types");
        let payment_type = PaymentType::new(PaymentTypeId::new(id), regie_id, label, slug);
        tables.payment_types.insert(id, payment_type.clone());
        Ok(payment_type)
    }

    async fn update_payment_type(&self, payment_type: &PaymentType) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = payment_type.id.value();
        if !tables.payment_types.contains_key(&id) {
            return Err(StoreError::not_found("PaymentType", payment_type.id));
        }
        tables.payment_types.insert(id, payment_type.clone());
        Ok(())
    }

    async fn delete_regie(&self, id: RegieId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let referenced = tables.invoices.values().any(|i| i.regie_id == id)
            || tables.credits.values().any(|c| c.regie_id == id)
            || tables.payments.values().any(|p| p.regie_id == id)
            || tables.campaigns.values().any(|c| c.regie_id == id);
        if referenced {
            return Err(StoreError::conflict(
                "regie still referenced by documents".to_string(),
            ));
        }
        if tables.regies.remove(&id.value()).is_none() {
            return Err(StoreError::not_found("Regie", id));
        }
        tables.payment_types.retain(|_, p| p.regie_id != id);
        Ok(())
    }
}
