//! The two record kinds as both backends see them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use engram_core::errors::EngramError;
use engram_core::models::{AuthScope, Episode, InteractionNode, RecordKind};

pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: RecordKind;
    fn id(&self) -> &str;
    fn conversation_id(&self) -> &str;
    fn scope(&self) -> &AuthScope;
    fn created_at(&self) -> DateTime<Utc>;
    fn active(&self) -> bool;
    fn vector(&self) -> &[f32];
    fn set_vector(&mut self, v: Vec<f32>);
    fn not_found(id: &str) -> EngramError;
}

impl StoredRecord for InteractionNode {
    const KIND: RecordKind = RecordKind::Node;
    fn id(&self) -> &str {
        &self.id
    }
    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
    fn scope(&self) -> &AuthScope {
        &self.scope
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn active(&self) -> bool {
        self.active
    }
    fn vector(&self) -> &[f32] {
        &self.embedding
    }
    fn set_vector(&mut self, v: Vec<f32>) {
        self.embedding = v;
    }
    fn not_found(id: &str) -> EngramError {
        EngramError::NodeNotFound { id: id.to_string() }
    }
}

impl StoredRecord for Episode {
    const KIND: RecordKind = RecordKind::Episode;
    fn id(&self) -> &str {
        &self.id
    }
    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
    fn scope(&self) -> &AuthScope {
        &self.scope
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn active(&self) -> bool {
        self.active
    }
    fn vector(&self) -> &[f32] {
        &self.embedding
    }
    fn set_vector(&mut self, v: Vec<f32>) {
        self.embedding = v;
    }
    fn not_found(id: &str) -> EngramError {
        EngramError::EpisodeNotFound { id: id.to_string() }
    }
}
