//! Mock ports
//!
//! Scriptable implementations of the external collaborators: the callback
//! sink and the pricing engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use domain_callback::{CallbackFailure, CallbackSink, DeliveryTimeout};
use domain_campaign::{Campaign, Pool, PricingError, PricingPort};
use domain_ledger::{JournalLineData, UserSnapshot};

/// One delivery observed by the recording sink
#[derive(Debug, Clone)]
pub struct Delivery {
    pub url: String,
    pub notification_type: String,
    pub payload: serde_json::Value,
    pub timeout: DeliveryTimeout,
}

struct SinkState {
    deliveries: Vec<Delivery>,
    /// Remaining scripted failures; `None` means fail forever
    failures_left: Option<u32>,
    failure_reason: String,
}

impl Default for SinkState {
    fn default() -> Self {
        Self {
            deliveries: Vec::new(),
            failures_left: Some(0),
            failure_reason: String::new(),
        }
    }
}

/// Callback sink that records deliveries and can be scripted to fail
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` deliveries fail with the given description
    pub fn fail_next(&self, count: u32, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.failures_left = Some(count);
        state.failure_reason = reason.to_string();
    }

    /// Makes every delivery fail from now on
    pub fn fail_always(&self, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.failures_left = None;
        state.failure_reason = reason.to_string();
    }

    /// Restores successful delivery
    pub fn succeed(&self) {
        let mut state = self.state.lock().unwrap();
        state.failures_left = Some(0);
        state.failure_reason = String::new();
    }

    /// Every delivery attempted so far, including failed ones
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state.lock().unwrap().deliveries.clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.state.lock().unwrap().deliveries.len()
    }
}

#[async_trait]
impl CallbackSink for RecordingSink {
    async fn deliver(
        &self,
        url: &str,
        notification_type: &str,
        payload: &serde_json::Value,
        timeout: DeliveryTimeout,
    ) -> Result<(), CallbackFailure> {
        let mut state = self.state.lock().unwrap();
        state.deliveries.push(Delivery {
            url: url.to_string(),
            notification_type: notification_type.to_string(),
            payload: payload.clone(),
            timeout,
        });
        match &mut state.failures_left {
            None => Err(CallbackFailure(state.failure_reason.clone())),
            Some(0) => Ok(()),
            Some(left) => {
                *left -= 1;
                Err(CallbackFailure(state.failure_reason.clone()))
            }
        }
    }
}

#[derive(Default)]
struct PricingState {
    users: Vec<UserSnapshot>,
    lines: HashMap<String, Vec<JournalLineData>>,
    fail: Option<String>,
}

/// Pricing engine returning pre-configured output
#[derive(Default)]
pub struct StaticPricing {
    state: Mutex<PricingState>,
}

impl StaticPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_users(&self, users: Vec<UserSnapshot>) {
        self.state.lock().unwrap().users = users;
    }

    /// Configures the lines produced for one user
    pub fn set_lines(&self, user_external_id: &str, lines: Vec<JournalLineData>) {
        self.state
            .lock()
            .unwrap()
            .lines
            .insert(user_external_id.to_string(), lines);
    }

    /// Makes the next pricing call fail fatally
    pub fn fail_with(&self, message: &str) {
        self.state.lock().unwrap().fail = Some(message.to_string());
    }
}

#[async_trait]
impl PricingPort for StaticPricing {
    async fn users_for_period(
        &self,
        _campaign: &Campaign,
    ) -> Result<Vec<UserSnapshot>, PricingError> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail {
            return Err(PricingError(message.clone()));
        }
        Ok(state.users.clone())
    }

    async fn lines_for_user(
        &self,
        _campaign: &Campaign,
        _pool: &Pool,
        user: &UserSnapshot,
    ) -> Result<Vec<JournalLineData>, PricingError> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail {
            return Err(PricingError(message.clone()));
        }
        Ok(state
            .lines
            .get(&user.external_id)
            .cloned()
            .unwrap_or_default())
    }
}
