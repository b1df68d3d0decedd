//! Persistence boundary for generated flashcard sets.
//!
//! The pipeline itself never stores anything. Once a caller has accepted a
//! [`crate::GenerationOutput`], [`save_flashcard_set`] maps it onto two
//! records: one set row, then one card row per flashcard with its zero-based
//! position. Storage backends implement [`FlashcardStore`]; [`MemoryStore`]
//! is the in-process implementation used by the CLI and tests.

use crate::error::FlashcardError;
use crate::output::FlashcardSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Backend-assigned identifier of a stored set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetId(pub String);

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set row, written before its cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSet {
    pub name: String,
    pub tags: Vec<String>,
    pub owner_id: String,
    pub favorite: bool,
}

/// A card row. `question`/`answer` hold the card's front/back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub set_id: SetId,
    pub question: String,
    pub answer: String,
    pub position: usize,
}

/// Storage for flashcard sets.
#[async_trait]
pub trait FlashcardStore: Send + Sync {
    /// Create the set row and return its id.
    async fn create_set(&self, set: NewSet) -> Result<SetId, FlashcardError>;

    /// Insert the set's cards in one batch.
    async fn insert_cards(&self, cards: Vec<CardRecord>) -> Result<(), FlashcardError>;
}

/// Store a flashcard set and its cards for `owner_id`.
///
/// Empty sets are rejected with [`FlashcardError::InvalidParameter`]; a set
/// with no cards is never written.
pub async fn save_flashcard_set(
    store: &dyn FlashcardStore,
    set: &FlashcardSet,
    owner_id: &str,
) -> Result<SetId, FlashcardError> {
    if set.is_empty() {
        return Err(FlashcardError::InvalidParameter {
            name: "cards",
            reason: "cannot save a set with no flashcards".into(),
        });
    }
    if owner_id.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "owner_id" });
    }

    let set_id = store
        .create_set(NewSet {
            name: set.name().to_string(),
            tags: set.tags().iter().cloned().collect(),
            owner_id: owner_id.to_string(),
            favorite: false,
        })
        .await?;

    let records: Vec<CardRecord> = set
        .cards()
        .iter()
        .enumerate()
        .map(|(position, card)| CardRecord {
            set_id: set_id.clone(),
            question: card.front.clone(),
            answer: card.back.clone(),
            position,
        })
        .collect();
    let count = records.len();
    store.insert_cards(records).await?;

    info!("Stored set {} with {} flashcards", set_id, count);
    Ok(set_id)
}

/// In-memory [`FlashcardStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    sets: Mutex<Vec<(SetId, NewSet)>>,
    cards: Mutex<Vec<CardRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored set rows, in creation order.
    pub fn sets(&self) -> Vec<(SetId, NewSet)> {
        self.sets.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Cards of one set, ordered by position.
    pub fn cards_for(&self, set_id: &SetId) -> Vec<CardRecord> {
        let mut cards: Vec<CardRecord> = self
            .cards
            .lock()
            .map(|c| c.iter().filter(|r| &r.set_id == set_id).cloned().collect())
            .unwrap_or_default();
        cards.sort_by_key(|r| r.position);
        cards
    }
}

fn poisoned<T>(_: T) -> FlashcardError {
    FlashcardError::StoreFailed {
        detail: "memory store lock poisoned".into(),
    }
}

#[async_trait]
impl FlashcardStore for MemoryStore {
    async fn create_set(&self, set: NewSet) -> Result<SetId, FlashcardError> {
        let id = SetId(format!("set-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        self.sets.lock().map_err(poisoned)?.push((id.clone(), set));
        Ok(id)
    }

    async fn insert_cards(&self, cards: Vec<CardRecord>) -> Result<(), FlashcardError> {
        let mut stored = self.cards.lock().map_err(poisoned)?;
        let known = self.sets.lock().map_err(poisoned)?;
        if let Some(orphan) = cards.iter().find(|c| !known.iter().any(|(id, _)| id == &c.set_id)) {
            return Err(FlashcardError::StoreFailed {
                detail: format!("unknown set id {}", orphan.set_id),
            });
        }
        stored.extend(cards);
        Ok(())
    }
}
