// promptshelf state managers
// Managers own shared state: the entity store, the optimistic mutator, the subscription bus,
// the session gate and scheduled background tasks.

pub mod entity_store;
pub mod optimistic_mutator;
pub mod scheduled_task;
pub mod session_manager;
pub mod subscription_bus;
