//! Credential table and access log collaborator.
//!
//! The gate treats the store as a black box keyed by [`CredentialId`]: it asks
//! whether a credential is authorized, appends one log entry per presentation,
//! and forwards the bookkeeping commands received over the radio. Any error
//! returned here is a fatal fault for the node.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered, Vec};

use crate::credential::{CredentialId, MAX_UID_LEN};
use crate::gate::FaultKind;

/// Default number of credentials held by [`MemoryStore`].
pub const DEFAULT_TABLE_CAPACITY: usize = 32;
/// Default number of access log entries retained by [`MemoryStore`].
pub const DEFAULT_LOG_CAPACITY: usize = 64;

/// What the gate decided for a presented credential.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessDecision {
    /// Credential opened the gate.
    Granted,
    /// First of two presentations required in double-activation mode.
    FirstOfPair,
    /// Credential closed a gate that was already open.
    Closed,
    /// Credential is unknown or not authorized.
    Denied,
    /// Credential repeated the pending first presentation and did not count.
    Repeat,
    /// Server override (enabled/disabled) is active; credential had no effect.
    Overridden,
}

impl AccessDecision {
    pub const ALL: [AccessDecision; 6] = [
        AccessDecision::Granted,
        AccessDecision::FirstOfPair,
        AccessDecision::Closed,
        AccessDecision::Denied,
        AccessDecision::Repeat,
        AccessDecision::Overridden,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            AccessDecision::Granted => "granted",
            AccessDecision::FirstOfPair => "first-of-pair",
            AccessDecision::Closed => "closed",
            AccessDecision::Denied => "denied",
            AccessDecision::Repeat => "repeat",
            AccessDecision::Overridden => "overridden",
        }
    }

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            AccessDecision::Granted => 0,
            AccessDecision::FirstOfPair => 1,
            AccessDecision::Closed => 2,
            AccessDecision::Denied => 3,
            AccessDecision::Repeat => 4,
            AccessDecision::Overridden => 5,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One append-only access log record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessLogEntry<TInstant> {
    pub at: TInstant,
    pub credential: CredentialId,
    pub decision: AccessDecision,
}

impl<TInstant> AccessLogEntry<TInstant> {
    pub const fn new(at: TInstant, credential: CredentialId, decision: AccessDecision) -> Self {
        Self {
            at,
            credential,
            decision,
        }
    }
}

/// Failures reported by the store. All of them are fatal to the node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StoreError {
    /// Backing storage did not respond.
    Unavailable,
    /// Stored data failed its integrity check.
    Corrupt,
    /// No room left for another credential.
    TableFull,
}

impl StoreError {
    /// Classifies the error for the gate's fault taxonomy.
    #[must_use]
    pub const fn fault_kind(self) -> FaultKind {
        match self {
            StoreError::Unavailable => FaultKind::Store,
            StoreError::Corrupt | StoreError::TableFull => FaultKind::Memory,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable => f.write_str("store unavailable"),
            StoreError::Corrupt => f.write_str("store corrupt"),
            StoreError::TableFull => f.write_str("credential table full"),
        }
    }
}

/// Result of an `UpdateTable` payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TableUpdate {
    Added(CredentialId),
    AlreadyPresent(CredentialId),
    /// Payload did not describe a credential.
    Ignored,
}

/// Occupancy figures returned by `MemoryCheck`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryReport {
    pub credentials: usize,
    pub credential_capacity: usize,
    pub log_entries: usize,
    pub log_capacity: usize,
}

/// Outcome of a bookkeeping command, surfaced through telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StoreReport {
    LogDumped { entries: usize },
    Table(TableUpdate),
    Memory(MemoryReport),
    TableCleared,
    Healthy,
    LogErased,
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreReport::LogDumped { entries } => write!(f, "log dumped entries={entries}"),
            StoreReport::Table(TableUpdate::Added(id)) => write!(f, "table added {id}"),
            StoreReport::Table(TableUpdate::AlreadyPresent(id)) => {
                write!(f, "table already has {id}")
            }
            StoreReport::Table(TableUpdate::Ignored) => f.write_str("table update ignored"),
            StoreReport::Memory(report) => write!(
                f,
                "memory credentials={}/{} log={}/{}",
                report.credentials,
                report.credential_capacity,
                report.log_entries,
                report.log_capacity
            ),
            StoreReport::TableCleared => f.write_str("table cleared"),
            StoreReport::Healthy => f.write_str("store healthy"),
            StoreReport::LogErased => f.write_str("log erased"),
        }
    }
}

/// Credential database and access log.
pub trait AccessStore<TInstant> {
    /// Membership test for `credential`.
    fn is_authorized(&mut self, credential: &CredentialId) -> Result<bool, StoreError>;

    /// Appends one access log entry.
    fn append(&mut self, entry: AccessLogEntry<TInstant>) -> Result<(), StoreError>;

    /// Handles a `DumpLogging` request and returns the number of log entries
    /// available for dumping. Moving the entries off the node is up to the
    /// backing store.
    fn dump_log(&mut self) -> Result<usize, StoreError>;

    /// Applies a table-update payload received after the `UpdateTable` opcode.
    fn update_table(&mut self, payload: &[u8]) -> Result<TableUpdate, StoreError>;

    /// Reports table and log occupancy.
    fn memory_check(&mut self) -> Result<MemoryReport, StoreError>;

    /// Removes every credential from the table.
    fn clear_table(&mut self) -> Result<(), StoreError>;

    /// Health probe answered by the `Check` command.
    fn check(&mut self) -> Result<(), StoreError>;

    /// Drops every access log entry.
    fn erase_log(&mut self) -> Result<(), StoreError>;
}

/// Decodes an `UpdateTable` payload: a length byte followed by that many UID bytes.
#[must_use]
pub fn parse_table_payload(payload: &[u8]) -> Option<CredentialId> {
    let (&len, rest) = payload.split_first()?;
    let len = usize::from(len);
    if len == 0 || len > MAX_UID_LEN || len > rest.len() {
        return None;
    }
    CredentialId::new(&rest[..len])
}

/// RAM-backed store with a bounded credential table and a ring-buffer log.
pub struct MemoryStore<
    TInstant,
    const CARDS: usize = DEFAULT_TABLE_CAPACITY,
    const LOG: usize = DEFAULT_LOG_CAPACITY,
> where
    TInstant: Copy,
{
    table: Vec<CredentialId, CARDS>,
    log: HistoryBuf<AccessLogEntry<TInstant>, LOG>,
    dumps: usize,
}

impl<TInstant, const CARDS: usize, const LOG: usize> MemoryStore<TInstant, CARDS, LOG>
where
    TInstant: Copy,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: Vec::new(),
            log: HistoryBuf::new(),
            dumps: 0,
        }
    }

    /// Creates a store pre-loaded with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableFull`] when `credentials` exceeds `CARDS`.
    pub fn with_credentials(credentials: &[CredentialId]) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for credential in credentials {
            store.insert(*credential)?;
        }
        Ok(store)
    }

    /// Adds a credential, returning `false` when it was already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableFull`] when the table has no room left.
    pub fn insert(&mut self, credential: CredentialId) -> Result<bool, StoreError> {
        if self.contains(&credential) {
            return Ok(false);
        }
        self.table
            .push(credential)
            .map(|()| true)
            .map_err(|_| StoreError::TableFull)
    }

    #[must_use]
    pub fn contains(&self, credential: &CredentialId) -> bool {
        self.table.iter().any(|known| known == credential)
    }

    #[must_use]
    pub fn credentials(&self) -> &[CredentialId] {
        &self.table
    }

    /// Access log in chronological order.
    pub fn log(&self) -> OldestOrdered<'_, AccessLogEntry<TInstant>> {
        self.log.oldest_ordered()
    }

    #[must_use]
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Number of `DumpLogging` requests served.
    #[must_use]
    pub const fn dumps(&self) -> usize {
        self.dumps
    }
}

impl<TInstant, const CARDS: usize, const LOG: usize> Default for MemoryStore<TInstant, CARDS, LOG>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CARDS: usize, const LOG: usize> AccessStore<TInstant>
    for MemoryStore<TInstant, CARDS, LOG>
where
    TInstant: Copy,
{
    fn is_authorized(&mut self, credential: &CredentialId) -> Result<bool, StoreError> {
        Ok(self.contains(credential))
    }

    fn append(&mut self, entry: AccessLogEntry<TInstant>) -> Result<(), StoreError> {
        self.log.write(entry);
        Ok(())
    }

    /// Counts the request. The entries stay readable through [`MemoryStore::log`].
    fn dump_log(&mut self) -> Result<usize, StoreError> {
        self.dumps = self.dumps.saturating_add(1);
        Ok(self.log.len())
    }

    fn update_table(&mut self, payload: &[u8]) -> Result<TableUpdate, StoreError> {
        let Some(credential) = parse_table_payload(payload) else {
            return Ok(TableUpdate::Ignored);
        };

        if self.insert(credential)? {
            Ok(TableUpdate::Added(credential))
        } else {
            Ok(TableUpdate::AlreadyPresent(credential))
        }
    }

    fn memory_check(&mut self) -> Result<MemoryReport, StoreError> {
        Ok(MemoryReport {
            credentials: self.table.len(),
            credential_capacity: CARDS,
            log_entries: self.log.len(),
            log_capacity: LOG,
        })
    }

    fn clear_table(&mut self) -> Result<(), StoreError> {
        self.table.clear();
        Ok(())
    }

    fn check(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn erase_log(&mut self) -> Result<(), StoreError> {
        self.log.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Millis;

    fn card(uid: u32) -> CredentialId {
        CredentialId::from_u32(uid)
    }

    #[test]
    fn membership_follows_the_table() {
        let mut store: MemoryStore<Millis> =
            MemoryStore::with_credentials(&[card(1), card(2)]).expect("fits");

        assert_eq!(store.is_authorized(&card(1)), Ok(true));
        assert_eq!(store.is_authorized(&card(3)), Ok(false));

        store.clear_table().expect("clear");
        assert_eq!(store.is_authorized(&card(1)), Ok(false));
    }

    #[test]
    fn table_updates_parse_length_prefixed_uids() {
        let mut store: MemoryStore<Millis> = MemoryStore::new();
        let payload = [4, 0x04, 0xA1, 0xB2, 0xC3, 0, 0, 0, 0];

        assert_eq!(
            store.update_table(&payload),
            Ok(TableUpdate::Added(card(0x04A1_B2C3)))
        );
        assert_eq!(
            store.update_table(&payload),
            Ok(TableUpdate::AlreadyPresent(card(0x04A1_B2C3)))
        );
        assert_eq!(store.update_table(&[0; 9]), Ok(TableUpdate::Ignored));
        assert_eq!(store.update_table(&[9, 1, 2]), Ok(TableUpdate::Ignored));
        assert_eq!(store.credentials().len(), 1);
    }

    #[test]
    fn full_table_is_a_memory_fault() {
        let mut store: MemoryStore<Millis, 1, 4> = MemoryStore::new();
        store.insert(card(1)).expect("first fits");

        let error = store
            .update_table(&[4, 0, 0, 0, 2])
            .expect_err("second credential should not fit");
        assert_eq!(error, StoreError::TableFull);
        assert_eq!(error.fault_kind(), FaultKind::Memory);
    }

    #[test]
    fn log_keeps_the_most_recent_entries() {
        let mut store: MemoryStore<Millis, 4, 2> = MemoryStore::new();
        for at in 0..3 {
            store
                .append(AccessLogEntry::new(
                    Millis::from_millis(at),
                    card(7),
                    AccessDecision::Denied,
                ))
                .expect("append");
        }

        let times: heapless::Vec<u64, 2> = store.log().map(|entry| entry.at.as_millis()).collect();
        assert_eq!(times.as_slice(), &[1, 2]);
        assert_eq!(store.dump_log(), Ok(2));

        store.erase_log().expect("erase");
        assert_eq!(store.log_len(), 0);
        assert_eq!(
            store.memory_check().map(|report| report.log_entries),
            Ok(0)
        );
    }

    #[test]
    fn memory_check_reports_a_full_store_as_healthy() {
        let mut store: MemoryStore<Millis, 2, 2> =
            MemoryStore::with_credentials(&[card(1), card(2)]).expect("fits");
        for at in 0..5 {
            store
                .append(AccessLogEntry::new(
                    Millis::from_millis(at),
                    card(1),
                    AccessDecision::Granted,
                ))
                .expect("append");
        }

        assert_eq!(
            store.memory_check(),
            Ok(MemoryReport {
                credentials: 2,
                credential_capacity: 2,
                log_entries: 2,
                log_capacity: 2,
            })
        );
        assert_eq!(store.dump_log(), Ok(2));
        assert_eq!(store.dumps(), 1);
        assert_eq!(store.log_len(), 2);
    }
}
