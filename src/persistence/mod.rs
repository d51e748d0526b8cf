//! Durability mirror
//!
//! The in-memory ledger is authoritative; PostgreSQL trails the outbound
//! event stream. Every event carries the balances after its transition
//! committed, so the mirror writes absolute values and never re-derives
//! ledger state.
//!
//! ```text
//! ExchangeService → EventQueue → ExchangeMirror → users_tb / exchanges_tb
//! ```

pub mod mirror;
pub mod schema;

pub use mirror::ExchangeMirror;
pub use schema::ensure_schema;
