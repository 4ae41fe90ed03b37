// Entity Models
// "Identity persists, values change": a participant is its normalized name,
// and every settlement phase accumulates values onto that one record.
//
// Each entity has:
// - Stable identity (normalized name) that NEVER changes
// - Mutable ledger values accumulated phase by phase
// - Registry for get-or-create lookups

pub mod participant;

pub use participant::{
    HaulParticipant, ItemLedger, LocationTab, Participant, ParticipantId, ParticipantRegistry,
    Share,
};
