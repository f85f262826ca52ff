//! Application layer orchestrating the canteen workflows.
//!
//! `CanteenService` is the entry point for point-of-sale and back-office
//! operations. Purchases go through a `PurchaseGateway`, either the local
//! wallet engine or the remote backend. Billing, outbox delivery and the
//! weekly summary run as separate batch jobs.

pub mod billing;
pub mod canteen;
pub mod gateway;
pub mod jobs;
pub mod notifications;
pub mod outbox;
pub mod replay;
