//! Exchange escrow and settlement
//!
//! The lifecycle of one exchange, driven by the [`ExchangeService`] state
//! machine over the [`crate::ledger::LedgerStore`]:
//!
//! ```text
//! create (hold) ──► PENDING ──accept──► ACCEPTED
//! PENDING | ACCEPTED ──decline────► DECLINED   (refund)
//! PENDING | ACCEPTED ──confirm×2──► COMPLETED  (settle + bonus)
//! ```
//!
//! # Safety invariants
//!
//! 1. **Escrow once**: `price` is held at creation and leaves the hold
//!    exactly once, via refund (decline) or settle (completion)
//! 2. **Status is the guard**: terminal transitions check-and-set status
//!    under the exchange lock, co-transactional with the ledger mutation
//! 3. **Lock hierarchy**: exchange lock, then ledger row locks in
//!    ascending user-id order

pub mod completion;
pub mod error;
pub mod events;
pub mod models;
pub mod service;
pub mod status;


pub use error::ExchangeError;
pub use events::{EventQueue, EventSink, ExchangeEvent};
pub use models::{ExchangeId, ExchangeRequest, Party};
pub use service::ExchangeService;
pub use status::ExchangeStatus;
