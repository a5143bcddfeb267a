//! # Duka server
//! This crate hosts the HTTP face of the Duka engine. It is responsible for:
//! * Taking orders from the customer app and handing merchants their single-use confirmation links.
//! * Starting mobile-money payments through Paypack, and settling them from polls and Paypack webhooks.
//! * Merchant tools: order status updates, the stock ledger, subscriptions and wallet withdrawals.
//! * Forwarding engine events to the realtime gateway, and running the subscription expiry job.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! See [routes](routes/index.html). All JSON errors have the shape `{"error": "<message>"}`.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod subscription_worker;
