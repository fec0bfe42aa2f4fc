//! The command mapping table.
//!
//! Each [`MappingEntry`] binds a control command key to the device command
//! it translates into and the logic producing both frames. The table is kept
//! sorted by key. Lookups go through a direct index with one slot per 16-bit
//! key or through a binary search over the entries; both return the first
//! entry registered for a key. [`MappingTable::resolve`] additionally runs
//! the entries' matchers, so entries sharing a key stay reachable.

use core::convert::TryFrom;

use log::debug;
use snafu::{ensure, Snafu};

use crate::codec;
use crate::commands::{Responder, Translator, DEFAULT_COMMANDS};
use crate::types::{Access, CommandKey, CorrelationTag, DeviceCommand};

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Entry at `position` has a smaller key than its predecessor.
    #[snafu(display("Mapping table not sorted by key at entry {}", position))]
    Unsorted { position: usize },
    #[snafu(display("Mapping table too large: {} entries", count))]
    TooManyEntries { count: usize },
}

/// Position of an entry within its [`MappingTable`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash, Default)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Finer-grained predicate for entries sharing a command key.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Matcher {
    /// The request's access flag equals the given access.
    Access(Access),
    /// A set request carrying exactly this value byte.
    SetValue(u8),
}

impl Matcher {
    /// Check a verified control request against this matcher.
    pub fn accepts(&self, request: &[u8]) -> bool {
        let access = codec::control_payload_byte(request, 0).map(Access::try_from);
        match *self {
            Matcher::Access(expected) => access == Some(Ok(expected)),
            Matcher::SetValue(value) => {
                access == Some(Ok(Access::Set))
                    && codec::control_payload_byte(request, 1) == Some(value)
            }
        }
    }
}

/// One row of the mapping table.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct MappingEntry {
    pub key: CommandKey,
    pub tag: CorrelationTag,
    pub access: Access,
    pub device_cmd: DeviceCommand,
    pub translator: Translator,
    pub responder: Responder,
    pub matcher: Option<Matcher>,
    pub description: &'static str,
}

impl MappingEntry {
    pub const fn new(
        key: CommandKey,
        access: Access,
        device_cmd: DeviceCommand,
        translator: Translator,
        responder: Responder,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            tag: CorrelationTag::None,
            access,
            device_cmd,
            translator,
            responder,
            matcher: None,
            description,
        }
    }

    /// Set the correlation tag of the pending entries this mapping creates.
    pub const fn tagged(mut self, tag: CorrelationTag) -> Self {
        self.tag = tag;
        self
    }

    /// Only match requests accepted by `matcher`.
    pub const fn matching(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// True if this entry handles `request`, a verified control request.
    pub fn matches(&self, request: &[u8]) -> bool {
        codec::command_key(request) == Some(self.key)
            && self.matcher.map_or(true, |m| m.accepts(request))
    }
}

/// Slot value marking an unused key in the direct index.
const NO_ENTRY: u16 = u16::MAX;

#[derive(Debug, Clone)]
struct DirectIndex(Box<[u16]>);

impl DirectIndex {
    /// One slot per key, each pointing at the first entry registered for it.
    fn build(entries: &[MappingEntry]) -> Self {
        let mut slots = vec![NO_ENTRY; usize::from(u16::MAX) + 1].into_boxed_slice();
        for (pos, entry) in entries.iter().enumerate() {
            let slot = &mut slots[usize::from(*entry.key)];
            if *slot == NO_ENTRY {
                // table length is checked against NO_ENTRY before building
                *slot = pos as u16;
            }
        }
        Self(slots)
    }

    fn get(&self, key: CommandKey) -> Option<EntryId> {
        match self.0[usize::from(*key)] {
            NO_ENTRY => None,
            pos => Some(EntryId(usize::from(pos))),
        }
    }
}

/// Sorted command mapping table with its lookup index.
#[derive(Debug, Clone)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
    index: DirectIndex,
}

impl MappingTable {
    /// Build a table from entries sorted ascending by key.
    /// # Errors
    /// [`Error::Unsorted`] if the entries aren't sorted, [`Error::TooManyEntries`]
    /// if the table has more entries than the direct index can address.
    pub fn new(entries: impl Into<Vec<MappingEntry>>) -> Result<Self, Error> {
        let entries = entries.into();
        ensure!(
            entries.len() < usize::from(NO_ENTRY),
            TooManyEntriesSnafu {
                count: entries.len()
            }
        );
        if let Some(pos) = entries.windows(2).position(|w| w[0].key > w[1].key) {
            return UnsortedSnafu { position: pos + 1 }.fail();
        }
        Ok(Self::build(entries))
    }

    fn build(entries: Vec<MappingEntry>) -> Self {
        let index = DirectIndex::build(&entries);
        debug!("Mapping table built with {} entries", entries.len());
        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&MappingEntry> {
        self.entries.get(id.0)
    }

    /// First entry registered for `key`, from the direct index.
    pub fn find_by_key(&self, key: CommandKey) -> Option<EntryId> {
        self.index.get(key)
    }

    /// First entry registered for `key`, by binary search over the entries.
    pub fn search(&self, key: CommandKey) -> Option<EntryId> {
        let pos = self.entries.partition_point(|e| e.key < key);
        match self.entries.get(pos) {
            Some(entry) if entry.key == key => Some(EntryId(pos)),
            _ => None,
        }
    }

    /// All entries registered for `key`, in registration order.
    pub fn entries_for(&self, key: CommandKey) -> impl Iterator<Item = (EntryId, &MappingEntry)> {
        let start = self.search(key).map_or(self.entries.len(), EntryId::index);
        self.entries[start..]
            .iter()
            .take_while(move |e| e.key == key)
            .enumerate()
            .map(move |(offset, e)| (EntryId(start + offset), e))
    }

    /// Find the entry handling a verified control request: the first entry
    /// with the request's key whose matcher, if any, accepts it.
    pub fn resolve(&self, request: &[u8]) -> Option<EntryId> {
        let key = codec::command_key(request)?;
        self.entries_for(key)
            .find(|(_, e)| e.matcher.map_or(true, |m| m.accepts(request)))
            .map(|(id, _)| id)
    }
}

impl Default for MappingTable {
    /// The camera's built-in command catalogue.
    fn default() -> Self {
        Self::build(DEFAULT_COMMANDS.to_vec())
    }
}
