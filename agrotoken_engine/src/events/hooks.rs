use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderStateChangedEvent, PricesUpdatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_state_producers: Vec<EventProducer<OrderStateChangedEvent>>,
    pub price_producers: Vec<EventProducer<PricesUpdatedEvent>>,
}

pub struct EventHandlers {
    pub on_order_state_changed: Option<EventHandler<OrderStateChangedEvent>>,
    pub on_prices_updated: Option<EventHandler<PricesUpdatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_state_changed = hooks.on_order_state_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_prices_updated = hooks.on_prices_updated.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_state_changed, on_prices_updated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_state_changed {
            result.order_state_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_prices_updated {
            result.price_producers.push(handler.subscribe());
        }
        result
    }

    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_state_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_prices_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_state_changed: Option<Handler<OrderStateChangedEvent>>,
    pub on_prices_updated: Option<Handler<PricesUpdatedEvent>>,
}

impl EventHooks {
    pub fn on_order_state_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStateChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_state_changed = Some(Arc::new(f));
        self
    }

    pub fn on_prices_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PricesUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_prices_updated = Some(Arc::new(f));
        self
    }
}
