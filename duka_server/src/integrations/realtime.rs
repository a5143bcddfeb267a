//! Forwards engine events to the realtime gateway that pushes them to merchant dashboards.
//!
//! Each event is POSTed as a [`RealtimeMessage`] (`{channel, event, data}`), where the channel is `org-{id}` for the
//! merchant concerned. Delivery is best-effort: failures are logged and the event is dropped.
use std::time::Duration;

use duka_engine::events::{EventHandlers, EventHooks, RealtimeEvent, RealtimeMessage};
use futures::future::BoxFuture;
use log::*;
use reqwest::Client;

use crate::errors::ServerError;

pub const REALTIME_EVENT_BUFFER_SIZE: usize = 50;

#[derive(Clone)]
pub struct RealtimePublisher {
    client: Client,
    url: Option<String>,
}

impl RealtimePublisher {
    pub fn new(url: Option<String>) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the realtime client. {e}")))?;
        Ok(Self { client, url })
    }

    pub fn publish<E: RealtimeEvent>(&self, event: E) -> BoxFuture<'static, ()> {
        let message = match RealtimeMessage::from_event(&event) {
            Ok(m) => m,
            Err(e) => {
                error!("📬️ Could not serialize the {} event. {e}", event.event_name());
                return no_op();
            },
        };
        let Some(url) = self.url.clone() else {
            info!("📬️ [{}] {} (no realtime gateway configured)", message.channel, message.event);
            return no_op();
        };
        let client = self.client.clone();
        Box::pin(async move {
            match client.post(&url).json(&message).send().await {
                Ok(res) if res.status().is_success() => {
                    debug!("📬️ [{}] {} delivered to the realtime gateway", message.channel, message.event)
                },
                Ok(res) => warn!(
                    "📬️ The realtime gateway refused [{}] {} with status {}",
                    message.channel,
                    message.event,
                    res.status()
                ),
                Err(e) => warn!("📬️ Could not reach the realtime gateway for [{}] {}. {e}", message.channel, message.event),
            }
        })
    }
}

/// Registers a realtime forwarder on every engine event.
pub fn create_realtime_event_handlers(publisher: RealtimePublisher) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let p = publisher.clone();
    hooks.on_new_order(move |ev| p.publish(ev));
    let p = publisher.clone();
    hooks.on_order_status_changed(move |ev| p.publish(ev));
    let p = publisher.clone();
    hooks.on_order_paid(move |ev| p.publish(ev));
    let p = publisher.clone();
    hooks.on_payment_settled(move |ev| p.publish(ev));
    hooks.on_subscription_activated(move |ev| publisher.publish(ev));
    EventHandlers::new(REALTIME_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
