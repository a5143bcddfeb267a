use cucumber::given;
use duka_engine::db_types::{Money, NewProduct};

use crate::{
    cucumber::{duka_world::DukaSystem, DukaWorld},
    support::seed::{seed_merchant, seed_product},
};

#[given("a fresh install")]
async fn fresh_database(world: &mut DukaWorld) {
    world.system = Some(DukaSystem::new().await);
}

#[given(expr = "merchant '{word}' owned by '{word}'")]
async fn merchant(world: &mut DukaWorld, name: String, owner: String) {
    let org = seed_merchant(&world.system().db, &name, &owner, None).await;
    world.merchants.insert(name, org.id);
}

#[given(expr = "'{word}' sells '{word}' at {int} RWF with {int} in stock")]
async fn tracked_product(world: &mut DukaWorld, merchant: String, name: String, price: i64, stock: i64) {
    let product = NewProduct::new(world.merchant(&merchant), &name, Money::from(price)).with_inventory(stock);
    let product = seed_product(&world.system().db, product).await;
    world.products.insert(name, product.id);
}

#[given(expr = "'{word}' sells '{word}' at {int} RWF")]
async fn untracked_product(world: &mut DukaWorld, merchant: String, name: String, price: i64) {
    let product = NewProduct::new(world.merchant(&merchant), &name, Money::from(price));
    let product = seed_product(&world.system().db, product).await;
    world.products.insert(name, product.id);
}
