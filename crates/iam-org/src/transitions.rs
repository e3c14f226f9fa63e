//! Status transition tables
//!
//! A [`TransitionTable`] is a map from a status to the set of statuses that
//! may follow it. The same engine serves both the membership domain, whose
//! table is fixed, and the organization domain, whose table is supplied by
//! configuration.
//!
//! Self-transitions are only legal when listed explicitly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use crate::status::Status;

/// A requested status change that the table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal {domain} status transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Domain of the table that rejected the change
    pub domain: String,
    /// Current status
    pub from: Status,
    /// Requested status
    pub to: Status,
}

/// Errors raised while building a table from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A status code could not be parsed
    #[error("unknown status in transition table: {0}")]
    UnknownStatus(String),

    /// An entry did not have the `FROM:TO,TO` shape
    #[error("malformed transition table entry: {0}")]
    Malformed(String),

    /// The deleted status was given a successor other than itself
    #[error("deleted status must be terminal, found DEL -> {0}")]
    NonTerminalDeleted(Status),
}

/// Data-driven finite state machine over [`Status`].
///
/// # Examples
///
/// ```
/// use iam_org::{Status, TransitionTable};
///
/// let table = TransitionTable::membership();
/// assert!(table.transition(Status::Active, Status::Active).is_ok());
/// assert!(table.transition(Status::Deleted, Status::Active).is_err());
///
/// let org = TransitionTable::parse("organization", "RGS:ACT;ACT:SSP,DEL;SSP:ACT;DEL:").unwrap();
/// assert!(org.transition(Status::Registered, Status::Registered).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    domain: String,
    allowed: HashMap<Status, HashSet<Status>>,
}

impl TransitionTable {
    /// Build a table from `(from, successors)` entries.
    ///
    /// Statuses that never appear as `from` have no legal successors.
    pub fn new<I, S>(domain: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (Status, S)>,
        S: IntoIterator<Item = Status>,
    {
        let mut allowed: HashMap<Status, HashSet<Status>> = HashMap::new();
        for (from, successors) in entries {
            allowed.entry(from).or_default().extend(successors);
        }
        Self {
            domain: domain.into(),
            allowed,
        }
    }

    /// The membership table.
    ///
    /// | from | allowed to |
    /// |---|---|
    /// | RGS | RGS, ACT, DEL |
    /// | ACT | ACT, RGS, SSP, DEL |
    /// | SSP | SSP, ACT, DEL |
    /// | DEL | DEL |
    /// | REQ | REQ, ACT, DEL |
    pub fn membership() -> Self {
        Self::with_default_shape("membership")
    }

    /// The organization table used when configuration supplies none.
    pub fn organization() -> Self {
        Self::with_default_shape("organization")
    }

    fn with_default_shape(domain: &str) -> Self {
        use Status::*;
        Self::new(
            domain,
            [
                (Registered, vec![Registered, Active, Deleted]),
                (Active, vec![Active, Registered, Suspended, Deleted]),
                (Suspended, vec![Suspended, Active, Deleted]),
                (Deleted, vec![Deleted]),
                (AccessRequested, vec![AccessRequested, Active, Deleted]),
            ],
        )
    }

    /// Build a validated table from a `status -> successors` map, as produced
    /// by deserializing `{"RGS": ["RGS", "ACT"], ...}`.
    pub fn from_map(
        domain: impl Into<String>,
        map: HashMap<Status, Vec<Status>>,
    ) -> Result<Self, TableError> {
        let table = Self::new(domain, map);
        table.validate()?;
        Ok(table)
    }

    /// Parse the compact text form `FROM:TO,TO;FROM:TO`.
    ///
    /// An entry with nothing after the colon declares a status with no
    /// successors.
    ///
    /// # Arguments
    ///
    /// * `domain` - Name used in error messages
    /// * `text` - Table text, e.g. `"RGS:RGS,ACT,DEL;DEL:DEL"`
    pub fn parse(domain: impl Into<String>, text: &str) -> Result<Self, TableError> {
        let mut entries = Vec::new();
        for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (from, to) = entry
                .split_once(':')
                .ok_or_else(|| TableError::Malformed(entry.to_string()))?;
            let from = parse_status(from)?;
            let successors = to
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_status)
                .collect::<Result<Vec<_>, _>>()?;
            entries.push((from, successors));
        }

        let table = Self::new(domain, entries);
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), TableError> {
        if let Some(next) = self
            .allowed
            .get(&Status::Deleted)
            .and_then(|succ| succ.iter().find(|s| !s.is_terminal()))
        {
            return Err(TableError::NonTerminalDeleted(*next));
        }
        Ok(())
    }

    /// Check that `from -> to` is a legal change.
    pub fn transition(&self, from: Status, to: Status) -> Result<(), IllegalTransition> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(IllegalTransition {
                domain: self.domain.clone(),
                from,
                to,
            })
        }
    }

    /// Whether `from -> to` is listed.
    pub fn can_transition(&self, from: Status, to: Status) -> bool {
        self.allowed
            .get(&from)
            .map(|succ| succ.contains(&to))
            .unwrap_or(false)
    }

    /// Successors of `from`, in code order.
    pub fn successors(&self, from: Status) -> Vec<Status> {
        let mut out: Vec<Status> = self
            .allowed
            .get(&from)
            .map(|succ| succ.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Name of the status domain this table governs.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Rename the domain reported in [`IllegalTransition`].
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Export as an ordered map suitable for serialization.
    pub fn to_map(&self) -> BTreeMap<Status, Vec<Status>> {
        Status::ALL
            .iter()
            .filter(|s| self.allowed.contains_key(*s))
            .map(|s| (*s, self.successors(*s)))
            .collect()
    }
}

fn parse_status(code: &str) -> Result<Status, TableError> {
    Status::parse(code).ok_or_else(|| TableError::UnknownStatus(code.trim().to_string()))
}

impl Serialize for TransitionTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// The serialized form is the bare transition map and carries no domain
/// name. Deserialized tables are labelled `"organization"`; relabel other
/// tables with [`TransitionTable::with_domain`].
impl<'de> Deserialize<'de> for TransitionTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = HashMap::<Status, Vec<Status>>::deserialize(deserializer)?;
        Self::from_map("organization", map).map_err(serde::de::Error::custom)
    }
}
