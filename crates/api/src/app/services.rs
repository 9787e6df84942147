//! Engine wiring for the HTTP layer.

use std::sync::Arc;

use bazaar_events::{EventBus, EventEnvelope, InMemoryEventBus};
use bazaar_infra::{EngineConfig, InMemoryStore, OrderService, ServiceError, VariantSeed};
use bazaar_orders::DomainEvent;

pub type NotificationBus = InMemoryEventBus<EventEnvelope<DomainEvent>>;
pub type Engine = OrderService<InMemoryStore, Arc<NotificationBus>>;

pub struct AppServices {
    engine: Engine,
    bus: Arc<NotificationBus>,
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Run a blocking engine call off the async executor.
    pub async fn run<T, F>(self: &Arc<Self>, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Engine) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&services.engine))
            .await
            .map_err(|e| ServiceError::Fatal(format!("engine task failed: {e}")))?
    }
}

/// Build the engine and register the seed catalog.
///
/// Notifications go to a log sink thread; real delivery is an external
/// subscriber of the same bus.
pub fn build_services(config: EngineConfig, seed: Vec<VariantSeed>) -> Result<AppServices, ServiceError> {
    let bus: Arc<NotificationBus> = Arc::new(InMemoryEventBus::new());
    spawn_log_sink(&bus);

    let store = InMemoryStore::new(config.lock_timeout);
    let engine = OrderService::new(store, Arc::clone(&bus), config);

    let seeded = seed.len();
    for variant in seed {
        engine.register_variant(variant)?;
    }
    if seeded > 0 {
        tracing::info!(variants = seeded, "catalog seeded");
    }

    Ok(AppServices { engine, bus })
}

fn spawn_log_sink(bus: &Arc<NotificationBus>) {
    let sub = bus.subscribe();
    std::thread::spawn(move || {
        while let Ok(envelope) = sub.recv() {
            tracing::info!(
                event_type = envelope.event_type(),
                sequence = envelope.sequence_number(),
                aggregate_id = %envelope.aggregate_id(),
                "notification"
            );
        }
    });
}
