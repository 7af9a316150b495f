//! Order orchestration.
//!
//! Creating an order runs these steps:
//! 1. Reserve the caller's idempotency token
//! 2. Assign an order number (the partition routing key)
//! 3. Check stock and fetch pricing for every line item concurrently
//! 4. Persist header and line items in one partition transaction
//! 5. Publish a `created` change event
//!
//! Updates, cancellations, status changes and deletes reuse the stored order
//! number and partition, and publish their own change events.

pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod idempotency;
pub mod order_number;
pub mod publisher;
pub mod services;

pub use coordinator::{OrchestratorConfig, OrderOrchestrator};
pub use error::{CollaboratorError, IdempotencyError, OrderError, PublishError, Result};
pub use fanout::{Call, CallKind, FanOut};
pub use idempotency::{IdempotencyGuard, InMemoryIdempotencyGuard, RedisIdempotencyGuard};
pub use order_number::{OrderNumberGenerator, RandomOrderNumbers, SequentialOrderNumbers};
pub use publisher::{
    ChangeKind, EventPublisher, InMemoryEventPublisher, KafkaEventPublisher, PublishedEvent,
};
pub use services::{
    CallTracker, HttpInventoryService, HttpPricingService, InMemoryInventoryService,
    InMemoryPricingService, InventoryService, PricingService,
};
