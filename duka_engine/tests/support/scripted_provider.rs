use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use duka_engine::{
    db_types::{Money, PaymentStatus},
    traits::{PaymentProvider, ProviderError, ProviderTransaction},
};

/// A payment provider that answers from a script instead of the network.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Default)]
struct ProviderState {
    next_ref: u64,
    offline: bool,
    statuses: HashMap<String, PaymentStatus>,
    cash_ins: Vec<(String, Money)>,
    cash_outs: Vec<(String, Money)>,
}

impl ScriptedProvider {
    /// The event feed for `reference` will report `status` from now on.
    pub fn report(&self, reference: &str, status: PaymentStatus) {
        self.state.lock().unwrap().statuses.insert(reference.to_string(), status);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn cash_ins(&self) -> Vec<(String, Money)> {
        self.state.lock().unwrap().cash_ins.clone()
    }

    pub fn cash_outs(&self) -> Vec<(String, Money)> {
        self.state.lock().unwrap().cash_outs.clone()
    }

    fn new_transaction(&self, phone: &str, amount: Money, cash_in: bool) -> Result<ProviderTransaction, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        state.next_ref += 1;
        let reference = format!("ref-{:04}", state.next_ref);
        if cash_in {
            state.cash_ins.push((phone.to_string(), amount));
        } else {
            state.cash_outs.push((phone.to_string(), amount));
        }
        Ok(ProviderTransaction { reference, status: PaymentStatus::Pending })
    }
}

impl PaymentProvider for ScriptedProvider {
    async fn cash_in(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError> {
        self.new_transaction(phone, amount, true)
    }

    async fn cash_out(&self, phone: &str, amount: Money) -> Result<ProviderTransaction, ProviderError> {
        self.new_transaction(phone, amount, false)
    }

    async fn latest_status(&self, reference: &str) -> Result<Option<PaymentStatus>, ProviderError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        Ok(state.statuses.get(reference).copied())
    }
}
