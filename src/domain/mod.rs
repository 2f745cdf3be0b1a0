//! Marketplace domain: value objects, pricing, aggregates and their events
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
