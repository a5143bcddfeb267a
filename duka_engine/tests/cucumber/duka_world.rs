use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use duka_engine::{
    events::EventProducers,
    order_objects::OrderCreated,
    payment_objects::PaymentInitiated,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
    StockLedgerApi,
};

use crate::support::{prepare_env::prepare_test_env, scripted_provider::ScriptedProvider};

#[derive(Default, Debug, World)]
pub struct DukaWorld {
    pub system: Option<DukaSystem>,
    pub merchants: HashMap<String, i64>,
    pub products: HashMap<String, i64>,
    pub last_order: Option<OrderCreated>,
    pub last_payment: Option<PaymentInitiated>,
    pub last_error: Option<String>,
}

pub struct DukaSystem {
    pub db: SqliteDatabase,
    pub provider: ScriptedProvider,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase, ScriptedProvider>,
    pub stock: StockLedgerApi<SqliteDatabase>,
}

impl Debug for DukaSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DukaSystem({:?})", self.db)
    }
}

impl DukaSystem {
    pub async fn new() -> Self {
        let db = prepare_test_env().await;
        let provider = ScriptedProvider::default();
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let payments = PaymentFlowApi::new(db.clone(), provider.clone(), EventProducers::default());
        let stock = StockLedgerApi::new(db.clone());
        Self { db, provider, orders, payments, stock }
    }
}

impl DukaWorld {
    pub fn system(&self) -> &DukaSystem {
        self.system.as_ref().expect("System not initialised. Start the scenario with 'Given a fresh install'")
    }

    pub fn merchant(&self, name: &str) -> i64 {
        *self.merchants.get(name).unwrap_or_else(|| panic!("Unknown merchant {name}"))
    }

    pub fn product(&self, name: &str) -> i64 {
        *self.products.get(name).unwrap_or_else(|| panic!("Unknown product {name}"))
    }

    pub fn order(&self) -> &OrderCreated {
        self.last_order.as_ref().expect("No order has been placed")
    }
}
