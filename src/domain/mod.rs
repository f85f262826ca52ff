//! Domain layer: value types, the wallet ledger rules and the ports through
//! which the application reaches every external collaborator.

pub mod alert;
pub mod ledger;
pub mod money;
pub mod outbox;
pub mod pix;
pub mod ports;
pub mod student;
pub mod wallet;
