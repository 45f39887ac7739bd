//! Source entities to destination records
//!
//! The destination schema requires every declared field on every record, so
//! optional attributes are never omitted: absent values, blank strings and the
//! stale-data sentinel all become `""`.

use crate::model::Character;
use ldc_common::types::timestamp::destination_now;
use ldc_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Placeholder the source uses for unknown attribute values.
pub const STALE_SENTINEL: &str = "NaN";

/// Destination object family a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Character,
    Quote,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Character => write!(f, "character"),
            RecordKind::Quote => write!(f, "quote"),
        }
    }
}

/// A record in destination schema, ready to batch
pub trait DestinationRecord: Serialize + Send + Sync {
    const KIND: RecordKind;

    /// Identifier used in diagnostics (error sink samples)
    fn record_id(&self) -> &str;
}

/// Destination character record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub character_id: String,
    pub name: String,
    pub ingested_at: String,
    pub race: String,
    pub gender: String,
    pub birth: String,
    pub death: String,
    pub realm: String,
    pub wiki_url: String,
    pub height: String,
    pub hair: String,
    pub spouse: String,
}

impl DestinationRecord for CharacterRecord {
    const KIND: RecordKind = RecordKind::Character;

    fn record_id(&self) -> &str {
        &self.character_id
    }
}

/// Destination quote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub quote_id: String,
    pub character_id: String,
    pub dialog: String,
    pub movie: String,
    pub character_name: String,
    pub ingested_at: String,
}

impl DestinationRecord for QuoteRecord {
    const KIND: RecordKind = RecordKind::Quote;

    fn record_id(&self) -> &str {
        &self.quote_id
    }
}

/// Entity rejected during transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position in the input slice
    pub index: usize,
    pub reason: String,
}

/// Records that passed plus the entities that did not
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub records: Vec<CharacterRecord>,
    pub rejected: Vec<Rejection>,
}

/// Collapse `None`, the sentinel and blank strings to `""`; stringify the rest.
pub fn normalize_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if s == STALE_SENTINEL || s.trim().is_empty() => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The entity's id, unless it is missing or blank. Ingestion and deletion
/// both key on this, so a quote is only ingested under a key that can later
/// be deleted.
fn entity_id(entity: &Character) -> Option<&str> {
    entity.id.as_deref().filter(|id| !id.trim().is_empty())
}

/// Map one character; fails when the id or a non-empty name is missing.
pub fn transform_character(entity: &Character) -> Result<CharacterRecord> {
    transform_character_at(entity, &destination_now())
}

fn transform_character_at(entity: &Character, ingested_at: &str) -> Result<CharacterRecord> {
    let character_id = match entity_id(entity) {
        Some(id) => id.to_string(),
        None => return Err(SyncError::validation("character missing required '_id' field")),
    };

    let name = match entity.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(SyncError::validation(format!(
                "character {} missing required 'name' field",
                character_id
            )))
        },
    };

    Ok(CharacterRecord {
        character_id,
        name,
        ingested_at: ingested_at.to_string(),
        race: normalize_value(entity.race.as_ref()),
        gender: normalize_value(entity.gender.as_ref()),
        birth: normalize_value(entity.birth.as_ref()),
        death: normalize_value(entity.death.as_ref()),
        realm: normalize_value(entity.realm.as_ref()),
        wiki_url: normalize_value(entity.wiki_url.as_ref()),
        height: normalize_value(entity.height.as_ref()),
        hair: normalize_value(entity.hair.as_ref()),
        spouse: normalize_value(entity.spouse.as_ref()),
    })
}

/// Map every character, dropping the invalid ones without stopping.
pub fn transform_characters(entities: &[Character]) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    for (index, entity) in entities.iter().enumerate() {
        match transform_character(entity) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!(index, error = %e, "Skipping invalid character");
                outcome.rejected.push(Rejection {
                    index,
                    reason: e.to_string(),
                });
            },
        }
    }

    outcome
}

/// Deterministic quote key: `{characterId}_{quoteIndex}`
pub fn quote_key(character_id: &str, index: usize) -> String {
    format!("{}_{}", character_id, index)
}

/// One record per quote fragment with non-empty dialog. Characters without an
/// id contribute nothing. All records of one call share the same ingestion
/// timestamp.
pub fn extract_quotes(entities: &[Character]) -> Vec<QuoteRecord> {
    let ingested_at = destination_now();
    let mut quotes = Vec::new();

    for entity in entities {
        let Some(character_id) = entity_id(entity) else {
            if !entity.sample_quotes.is_empty() {
                debug!(
                    quotes = entity.sample_quotes.len(),
                    "Skipping quotes of character without id"
                );
            }
            continue;
        };
        let character_name = entity.name.as_deref().unwrap_or("Unknown");

        for (index, fragment) in entity.sample_quotes.iter().enumerate() {
            let dialog = match fragment.dialog.as_deref() {
                Some(dialog) if !dialog.is_empty() => dialog,
                _ => continue,
            };

            quotes.push(QuoteRecord {
                quote_id: quote_key(character_id, index),
                character_id: character_id.to_string(),
                dialog: dialog.to_string(),
                movie: fragment.movie.clone().unwrap_or_default(),
                character_name: character_name.to_string(),
                ingested_at: ingested_at.clone(),
            });
        }
    }

    quotes
}

/// Primary keys of every character carrying an id, in source order
pub fn character_deletion_ids(entities: &[Character]) -> Vec<String> {
    entities
        .iter()
        .filter_map(entity_id)
        .map(str::to_string)
        .collect()
}

/// Quote keys for every fragment index of every character carrying an id.
///
/// Fragments with empty dialog are included: the destination may still hold
/// a quote whose dialog was later blanked upstream.
pub fn quote_deletion_keys(entities: &[Character]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|c| entity_id(c).map(|id| (id, c.sample_quotes.len())))
        .flat_map(|(id, count)| (0..count).map(move |index| quote_key(id, index)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::QuoteFragment;
    use serde_json::json;
    use std::collections::HashSet;

    fn gandalf() -> Character {
        Character {
            race: Some(json!("Maiar")),
            gender: Some(json!("NaN")),
            birth: Some(json!("   ")),
            death: None,
            height: Some(json!(1.68)),
            spouse: Some(Value::Null),
            ..Character::new("5cd99d4bde30eff6ebccfea0", "Gandalf")
        }
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(None), "");
        assert_eq!(normalize_value(Some(&Value::Null)), "");
        assert_eq!(normalize_value(Some(&json!("NaN"))), "");
        assert_eq!(normalize_value(Some(&json!(" \t"))), "");
        assert_eq!(normalize_value(Some(&json!("Hobbit"))), "Hobbit");
        assert_eq!(normalize_value(Some(&json!(42))), "42");
        assert_eq!(normalize_value(Some(&json!(true))), "true");
    }

    #[test]
    fn test_transform_character_normalizes_every_field() {
        let record = transform_character(&gandalf()).unwrap();
        assert_eq!(record.character_id, "5cd99d4bde30eff6ebccfea0");
        assert_eq!(record.name, "Gandalf");
        assert_eq!(record.race, "Maiar");
        assert_eq!(record.gender, "");
        assert_eq!(record.birth, "");
        assert_eq!(record.death, "");
        assert_eq!(record.height, "1.68");
        assert_eq!(record.spouse, "");
        assert_eq!(record.ingested_at.len(), 24);
    }

    #[test]
    fn test_serialized_record_has_every_schema_field() {
        let character = Character::new("id-1", "Sam");
        let value = serde_json::to_value(transform_character(&character).unwrap()).unwrap();
        let object = value.as_object().unwrap();

        for field in [
            "characterId",
            "name",
            "ingestedAt",
            "race",
            "gender",
            "birth",
            "death",
            "realm",
            "wikiUrl",
            "height",
            "hair",
            "spouse",
        ] {
            assert!(object.contains_key(field), "missing {}", field);
        }
        assert_eq!(object.len(), 12);
        assert_eq!(object["realm"], json!(""));
    }

    #[test]
    fn test_rejects_only_invalid_entities() {
        let entities = vec![
            Character::new("a", "Frodo"),
            Character {
                id: None,
                ..Character::new("", "Ghost")
            },
            Character {
                name: Some(String::new()),
                ..Character::new("c", "")
            },
            Character {
                name: None,
                ..Character::new("d", "")
            },
            Character::new("e", "Sam"),
        ];

        let outcome = transform_characters(&entities);
        let ids: Vec<_> = outcome.records.iter().map(|r| r.character_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "e"]);
        let rejected: Vec<_> = outcome.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, vec![1, 2, 3]);
    }

    #[test]
    fn test_extract_quotes_skips_empty_dialog() {
        let mut frodo = Character::new("frodo", "Frodo").with_quote("I will take it.", "FotR");
        frodo.sample_quotes.push(QuoteFragment {
            dialog: Some(String::new()),
            movie: Some("FotR".to_string()),
        });
        frodo.sample_quotes.push(QuoteFragment {
            dialog: Some("Mr. Frodo!".to_string()),
            movie: None,
        });
        let sam = Character::new("sam", "Sam").with_quote("Po-tay-toes", "TTT");

        let quotes = extract_quotes(&[frodo, sam]);
        let keys: Vec<_> = quotes.iter().map(|q| q.quote_id.as_str()).collect();
        assert_eq!(keys, vec!["frodo_0", "frodo_2", "sam_0"]);
        assert_eq!(quotes[1].movie, "");
        assert_eq!(quotes[2].character_name, "Sam");
        assert!(quotes.iter().all(|q| q.ingested_at == quotes[0].ingested_at));
    }

    #[test]
    fn test_quote_keys_stable_and_unique() {
        let entities = vec![
            Character::new("a", "A").with_quote("one", "m").with_quote("two", "m"),
            Character::new("b", "B").with_quote("three", "m"),
        ];

        let first: Vec<_> = extract_quotes(&entities).into_iter().map(|q| q.quote_id).collect();
        let second: Vec<_> = extract_quotes(&entities).into_iter().map(|q| q.quote_id).collect();
        assert_eq!(first, second);

        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn test_deletion_keys() {
        let mut blank = Character::new("b", "B").with_quote("x", "m");
        blank.sample_quotes.push(QuoteFragment::default());
        let entities = vec![
            Character::new("a", "A").with_quote("one", "m"),
            blank,
            Character {
                id: None,
                ..Character::new("", "Nameless").with_quote("lost", "m")
            },
        ];

        assert_eq!(character_deletion_ids(&entities), vec!["a", "b"]);
        assert_eq!(quote_deletion_keys(&entities), vec!["a_0", "b_0", "b_1"]);
    }

    #[test]
    fn test_every_ingested_quote_has_a_deletion_key() {
        let entities = vec![
            Character::new("a", "A").with_quote("one", "m").with_quote("", "m"),
            Character {
                id: None,
                ..Character::new("", "Nameless").with_quote("lost", "m")
            },
            Character::new("  ", "Blank").with_quote("also lost", "m"),
            Character::new("b", "B").with_quote("two", "m"),
        ];

        let ingested: Vec<_> = extract_quotes(&entities).into_iter().map(|q| q.quote_id).collect();
        let deletable: HashSet<_> = quote_deletion_keys(&entities).into_iter().collect();

        assert_eq!(ingested, vec!["a_0", "b_0"]);
        for key in &ingested {
            assert!(deletable.contains(key), "{} is never deleted", key);
        }
        assert_eq!(character_deletion_ids(&entities), vec!["a", "b"]);
    }
}
