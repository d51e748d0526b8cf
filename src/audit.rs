//! Audit - balance-change audit log
//!
//! Records every ledger mutation for complete auditability.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::core_types::UserId;
use crate::exchange::ExchangeId;

/// Audit entry for a single balance change
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Exchange that caused the change; None for account provisioning
    pub exchange_id: Option<ExchangeId>,
    pub user_id: UserId,
    /// "deposit", "hold", "refund", "transfer_out", "transfer_in", "charge", "bonus"
    pub op: &'static str,
    /// Points moved by the operation
    pub amount: u64,
    pub available_after: u64,
    pub held_after: u64,
}

/// Writes audit entries to a CSV file
pub struct AuditWriter {
    file: File,
    entry_count: u64,
}

impl AuditWriter {
    /// Create a new audit writer at the given path
    pub fn new(path: &str) -> io::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        writeln!(file, "exchange_id,user_id,op,amount,available_after,held_after")?;

        Ok(AuditWriter {
            file,
            entry_count: 0,
        })
    }

    /// Write a single audit entry
    pub fn write_entry(&mut self, entry: &AuditEntry) -> io::Result<()> {
        let exchange_id = entry
            .exchange_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        writeln!(
            self.file,
            "{},{},{},{},{},{}",
            exchange_id,
            entry.user_id,
            entry.op,
            entry.amount,
            entry.available_after,
            entry.held_after
        )?;
        self.entry_count += 1;
        Ok(())
    }

    /// Get total number of entries written
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}
