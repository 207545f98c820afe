//! Shared in-memory key space and the mutations applied to it.
//!
//! Every write is split into two steps: a *plan* step that validates the
//! request against the current state and yields the [`Mutation`] to apply
//! (or `None` for a no-op), and an *apply* step. The file backend journals
//! the mutation between the two, so a failed journal write never leaves the
//! in-memory state ahead of the log.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The content stored under one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Value(Vec<u8>),
    Set(BTreeSet<String>),
}

/// A resolved state change. This is also the journal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Mutation {
    Put {
        key: String,
        #[serde(with = "cbor_bytes")]
        value: Vec<u8>,
    },
    Delete {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRemove {
        key: String,
        member: String,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    slots: BTreeMap<String, Slot>,
}

impl Keyspace {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.slots.get(key) {
            None => Ok(None),
            Some(Slot::Value(value)) => Ok(Some(value.clone())),
            Some(Slot::Set(_)) => Err(StorageError::wrong_type(key)),
        }
    }

    pub(crate) fn members(&self, key: &str) -> StorageResult<Vec<String>> {
        match self.slots.get(key) {
            None => Ok(Vec::new()),
            Some(Slot::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Slot::Value(_)) => Err(StorageError::wrong_type(key)),
        }
    }

    pub(crate) fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        self.slots
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn plan_set(&self, key: &str, value: &[u8]) -> StorageResult<Mutation> {
        if let Some(Slot::Set(_)) = self.slots.get(key) {
            return Err(StorageError::wrong_type(key));
        }
        Ok(Mutation::Put {
            key: key.to_string(),
            value: value.to_vec(),
        })
    }

    pub(crate) fn plan_set_if_absent(&self, key: &str, value: &[u8]) -> Option<Mutation> {
        if self.slots.contains_key(key) {
            return None;
        }
        Some(Mutation::Put {
            key: key.to_string(),
            value: value.to_vec(),
        })
    }

    pub(crate) fn plan_compare_and_set(
        &self,
        key: &str,
        expected: &[u8],
        value: &[u8],
    ) -> StorageResult<Option<Mutation>> {
        match self.slots.get(key) {
            Some(Slot::Value(current)) if current.as_slice() == expected => {
                Ok(Some(Mutation::Put {
                    key: key.to_string(),
                    value: value.to_vec(),
                }))
            }
            Some(Slot::Set(_)) => Err(StorageError::wrong_type(key)),
            _ => Ok(None),
        }
    }

    pub(crate) fn plan_delete(&self, key: &str) -> Option<Mutation> {
        self.slots.contains_key(key).then(|| Mutation::Delete {
            key: key.to_string(),
        })
    }

    pub(crate) fn plan_set_add(&self, key: &str, member: &str) -> StorageResult<Option<Mutation>> {
        match self.slots.get(key) {
            Some(Slot::Value(_)) => Err(StorageError::wrong_type(key)),
            Some(Slot::Set(members)) if members.contains(member) => Ok(None),
            _ => Ok(Some(Mutation::SetAdd {
                key: key.to_string(),
                member: member.to_string(),
            })),
        }
    }

    pub(crate) fn plan_set_remove(
        &self,
        key: &str,
        member: &str,
    ) -> StorageResult<Option<Mutation>> {
        match self.slots.get(key) {
            Some(Slot::Value(_)) => Err(StorageError::wrong_type(key)),
            Some(Slot::Set(members)) if members.contains(member) => {
                Ok(Some(Mutation::SetRemove {
                    key: key.to_string(),
                    member: member.to_string(),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Plans an increment; returns the mutation together with the new value.
    pub(crate) fn plan_incr(&self, key: &str) -> StorageResult<(Mutation, i64)> {
        let current = match self.slots.get(key) {
            None => 0,
            Some(Slot::Set(_)) => return Err(StorageError::wrong_type(key)),
            Some(Slot::Value(bytes)) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.trim().parse::<i64>().ok())
                .ok_or_else(|| StorageError::NotAnInteger {
                    key: key.to_string(),
                })?,
        };
        let next = current.checked_add(1).ok_or_else(|| StorageError::NotAnInteger {
            key: key.to_string(),
        })?;
        let mutation = Mutation::Put {
            key: key.to_string(),
            value: next.to_string().into_bytes(),
        };
        Ok((mutation, next))
    }

    /// Applies a planned (or replayed) mutation.
    ///
    /// Replay may encounter a mutation whose preconditions no longer hold
    /// (e.g. a `SetAdd` onto a value key written later by hand); the later
    /// write wins, matching the order in the journal.
    pub(crate) fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Put { key, value } => {
                self.slots.insert(key, Slot::Value(value));
            }
            Mutation::Delete { key } => {
                self.slots.remove(&key);
            }
            Mutation::SetAdd { key, member } => {
                let slot = self
                    .slots
                    .entry(key)
                    .or_insert_with(|| Slot::Set(BTreeSet::new()));
                if let Slot::Value(_) = slot {
                    *slot = Slot::Set(BTreeSet::new());
                }
                if let Slot::Set(members) = slot {
                    members.insert(member);
                }
            }
            Mutation::SetRemove { key, member } => {
                let now_empty = match self.slots.get_mut(&key) {
                    Some(Slot::Set(members)) => {
                        members.remove(&member);
                        members.is_empty()
                    }
                    _ => false,
                };
                if now_empty {
                    self.slots.remove(&key);
                }
            }
        }
    }

    /// Returns the minimal list of mutations that rebuilds this key space.
    pub(crate) fn snapshot(&self) -> Vec<Mutation> {
        let mut mutations = Vec::with_capacity(self.slots.len());
        for (key, slot) in &self.slots {
            match slot {
                Slot::Value(value) => mutations.push(Mutation::Put {
                    key: key.clone(),
                    value: value.clone(),
                }),
                Slot::Set(members) => {
                    for member in members {
                        mutations.push(Mutation::SetAdd {
                            key: key.clone(),
                            member: member.clone(),
                        });
                    }
                }
            }
        }
        mutations
    }
}

/// Encodes `Vec<u8>` as a CBOR byte string instead of an integer array.
mod cbor_bytes {
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte string")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }
    }
}
