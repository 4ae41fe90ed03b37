// 👤 Participant Entity - Name-keyed identity + mutable settlement ledger
//
// "Participant name is IDENTITY": the case-folded, trimmed name is the key.
//
// Problem solved:
// - "Orzech", " orzech ", "ORZECH" → one participant
// - Every phase (hauls, events, recruitment, return pool) accumulates onto the
//   same record through one registry passed by &mut
// - Look-alike names ("merlin" / "merl1n") are NEVER merged here; see similarity.rs

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::Currency;

// ============================================================================
// IDENTITY
// ============================================================================

/// Normalized participant name, used as the registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Normalize a raw name: trim + case-fold
    pub fn from_name(raw: &str) -> Self {
        ParticipantId(normalize_name(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ============================================================================
// SHARE
// ============================================================================

/// Entitlement of one role on one haul
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
pub enum Share {
    /// 2 share points
    Full,

    /// 1 share point, written with the reduced-share suffix
    Half,
}

impl Share {
    pub fn points(&self) -> i64 {
        match self {
            Share::Full => 2,
            Share::Half => 1,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Share::Full)
    }
}

/// A participant reference together with its share on a haul
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
pub struct HaulParticipant {
    pub id: ParticipantId,
    pub share: Share,
}

impl HaulParticipant {
    pub fn new(id: ParticipantId, share: Share) -> Self {
        HaulParticipant { id, share }
    }

    pub fn full(name: &str) -> Self {
        HaulParticipant::new(ParticipantId::from_name(name), Share::Full)
    }

    pub fn half(name: &str) -> Self {
        HaulParticipant::new(ParticipantId::from_name(name), Share::Half)
    }
}

// ============================================================================
// ITEM LEDGER
// ============================================================================

/// Composite key of an item bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, Deserialize)]
pub struct LocationTab {
    pub location: String,
    pub tab: String,
}

impl LocationTab {
    pub fn new(location: &str, tab: &str) -> Self {
        LocationTab {
            location: location.to_string(),
            tab: tab.to_string(),
        }
    }

    /// "BEACH - 1"
    pub fn label(&self) -> String {
        format!("{} - {}", self.location, self.tab)
    }
}

/// After-tax item balances per (location, tab)
///
/// A flat ledger: crediting a bucket never creates or aliases sub-containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemLedger {
    buckets: BTreeMap<LocationTab, i64>,
}

impl ItemLedger {
    pub fn new() -> Self {
        ItemLedger::default()
    }

    /// Accumulate `amount` onto a bucket (created at 0 on first credit)
    pub fn credit(&mut self, bucket: &LocationTab, amount: i64) {
        *self.buckets.entry(bucket.clone()).or_insert(0) += amount;
    }

    pub fn get(&self, location: &str, tab: &str) -> i64 {
        self.buckets
            .get(&LocationTab::new(location, tab))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.buckets.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&LocationTab, i64)> {
        self.buckets.iter().map(|(k, v)| (k, *v))
    }
}

impl Serialize for ItemLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // JSON maps need string keys, so emit a list of bucket records
        #[derive(serde::Serialize)]
        struct Entry<'a> {
            location: &'a str,
            tab: &'a str,
            amount: i64,
        }

        serializer.collect_seq(self.buckets.iter().map(|(key, amount)| Entry {
            location: &key.location,
            tab: &key.tab,
            amount: *amount,
        }))
    }
}

// ============================================================================
// PARTICIPANT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,

    /// Accumulated return points (hauls, events, recruitment)
    pub return_points: f64,

    /// After-tax cash payouts
    pub cash_after_tax: i64,

    /// After-tax item payouts per (location, tab)
    pub items_after_tax: ItemLedger,

    /// Grants received from the pooled item returns
    pub returns_from_items: i64,

    /// Grants received from the pooled cash returns
    pub returns_from_cash: i64,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Participant {
            id,
            return_points: 0.0,
            cash_after_tax: 0,
            items_after_tax: ItemLedger::new(),
            returns_from_items: 0,
            returns_from_cash: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    /// Credit a haul payout: items into their bucket, cash flat
    pub fn credit_haul(&mut self, bucket: &LocationTab, items: i64, cash: i64) {
        self.items_after_tax.credit(bucket, items);
        self.cash_after_tax += cash;
    }

    pub fn add_return_points(&mut self, points: f64) {
        self.return_points += points;
    }

    pub fn credit_returns(&mut self, currency: Currency, amount: i64) {
        match currency {
            Currency::Items => self.returns_from_items += amount,
            Currency::Cash => self.returns_from_cash += amount,
        }
    }

    pub fn total_returns(&self) -> i64 {
        self.returns_from_items + self.returns_from_cash
    }

    /// True when the participant ended up with nothing at all
    pub fn is_empty(&self) -> bool {
        self.return_points == 0.0
            && self.cash_after_tax == 0
            && self.items_after_tax.is_empty()
            && self.total_returns() == 0
    }
}

impl Serialize for Participant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Participant", 6)?;
        state.serialize_field("name", self.id.as_str())?;
        state.serialize_field("return_points", &self.return_points)?;
        state.serialize_field("cash_after_tax", &self.cash_after_tax)?;
        state.serialize_field("items_after_tax", &self.items_after_tax)?;
        state.serialize_field("returns_from_items", &self.returns_from_items)?;
        state.serialize_field("returns_from_cash", &self.returns_from_cash)?;
        state.end()
    }
}

// ============================================================================
// PARTICIPANT REGISTRY
// ============================================================================

/// The shared settlement ledger: one record per normalized name
///
/// Insertion order is kept, so reports list participants in the order they
/// first appeared in the input.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
    index: HashMap<ParticipantId, usize>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        ParticipantRegistry::default()
    }

    /// Get-or-create by raw name; returns the normalized identity
    pub fn get_or_create(&mut self, raw_name: &str) -> ParticipantId {
        let id = ParticipantId::from_name(raw_name);
        self.participant_mut(&id);
        id
    }

    /// Mutable access; an unseen identity is created lazily
    pub fn participant_mut(&mut self, id: &ParticipantId) -> &mut Participant {
        let position = match self.index.get(id) {
            Some(position) => *position,
            None => {
                self.participants.push(Participant::new(id.clone()));
                let position = self.participants.len() - 1;
                self.index.insert(id.clone(), position);
                position
            }
        };
        &mut self.participants[position]
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.index.get(id).map(|position| &self.participants[*position])
    }

    /// Lookup by raw (un-normalized) name
    pub fn find_by_name(&self, raw_name: &str) -> Option<&Participant> {
        self.get(&ParticipantId::from_name(raw_name))
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.index.contains_key(id)
    }

    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter().map(|p| &p.id)
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn total_return_points(&self) -> f64 {
        self.participants.iter().map(|p| p.return_points).sum()
    }

    pub fn total_cash_after_tax(&self) -> i64 {
        self.participants.iter().map(|p| p.cash_after_tax).sum()
    }

    pub fn total_items_after_tax(&self) -> i64 {
        self.participants.iter().map(|p| p.items_after_tax.total()).sum()
    }

    pub fn total_returns(&self, currency: Currency) -> i64 {
        self.participants
            .iter()
            .map(|p| match currency {
                Currency::Items => p.returns_from_items,
                Currency::Cash => p.returns_from_cash,
            })
            .sum()
    }

    /// Every (location, tab) bucket anyone was paid into, sorted
    pub fn item_buckets(&self) -> Vec<LocationTab> {
        let mut buckets: Vec<LocationTab> = self
            .participants
            .iter()
            .flat_map(|p| p.items_after_tax.buckets().map(|(key, _)| key.clone()))
            .collect();
        buckets.sort();
        buckets.dedup();
        buckets
    }
}

impl Serialize for ParticipantRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.participants.iter())
    }
}

// ============================================================================
// TESTS
// ============================================================================
