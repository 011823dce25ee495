//! One record kind held by the file backend: the JSON-lines records, their
//! index-aligned vector array, and an id → position map.

use std::collections::HashMap;

use engram_core::errors::{ConsistencyError, EngramError, EngramResult, StorageError};

use super::io;
use super::layout::CorpusLayout;
use crate::codec;
use crate::record::StoredRecord;

pub struct RecordArea<T: StoredRecord> {
    /// Records with their vectors stripped.
    records: Vec<T>,
    positions: HashMap<String, usize>,
    vectors: Vec<Vec<f32>>,
}

impl<T: StoredRecord> RecordArea<T> {
    /// Load records and vectors from disk. Vector rows past the last record
    /// are the trace of an interrupted append and are cut off.
    pub fn load(layout: &CorpusLayout) -> EngramResult<(Self, Option<usize>)> {
        let records_path = layout.records(T::KIND);
        let records: Vec<T> = io::decode_lines(&records_path, &io::read_or_empty(&records_path)?)?;

        let vectors_path = layout.vectors(T::KIND);
        let bytes = io::read_or_empty(&vectors_path)?;
        let dims = codec::header_dims(&bytes);
        let mut vectors = codec::decode_array(T::KIND.as_str(), &bytes)?;
        if vectors.len() > records.len() {
            tracing::warn!(
                kind = T::KIND.as_str(),
                rows = vectors.len(),
                records = records.len(),
                "truncating orphan vector rows"
            );
            vectors.truncate(records.len());
            if let Some(d) = dims {
                io::write_atomic(&vectors_path, &codec::encode_array(d, &vectors))?;
            }
        }

        let mut positions = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if positions.insert(record.id().to_string(), i).is_some() {
                return Err(EngramError::StorageError(StorageError::DuplicateRecord {
                    id: record.id().to_string(),
                }));
            }
        }
        Ok((
            Self {
                records,
                positions,
                vectors,
            },
            dims,
        ))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Append records on disk then in memory: records first, vectors second,
    /// so a torn write leaves records without vectors, never the reverse.
    pub fn append(&mut self, layout: &CorpusLayout, dims: usize, batch: &[T]) -> EngramResult<()> {
        for record in batch {
            if self.contains(record.id()) {
                return Err(EngramError::StorageError(StorageError::DuplicateRecord {
                    id: record.id().to_string(),
                }));
            }
        }
        let stripped: Vec<T> = batch.iter().map(strip).collect();
        io::append_bytes(&layout.records(T::KIND), &io::encode_lines(&stripped)?)?;

        let vectors_path = layout.vectors(T::KIND);
        let mut bytes = Vec::new();
        let fresh = std::fs::metadata(&vectors_path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if fresh {
            bytes.extend(codec::encode_header(dims));
        }
        for record in batch {
            bytes.extend(codec::f32_vec_to_bytes(record.vector()));
        }
        io::append_bytes(&vectors_path, &bytes)?;

        for (record, stripped) in batch.iter().zip(stripped) {
            self.positions
                .insert(record.id().to_string(), self.records.len());
            self.records.push(stripped);
            self.vectors.push(record.vector().to_vec());
        }
        Ok(())
    }

    /// Replace existing records (vectors untouched) and rewrite the file.
    pub fn update(&mut self, layout: &CorpusLayout, batch: &[T]) -> EngramResult<()> {
        let mut next = self.records.clone();
        for record in batch {
            let pos = *self
                .positions
                .get(record.id())
                .ok_or_else(|| T::not_found(record.id()))?;
            next[pos] = strip(record);
        }
        io::write_atomic(&layout.records(T::KIND), &io::encode_lines(&next)?)?;
        self.records = next;
        Ok(())
    }

    /// Replace the whole vector array. Must stay aligned with the records.
    pub fn replace_vectors(
        &mut self,
        layout: &CorpusLayout,
        dims: usize,
        rows: &[Vec<f32>],
    ) -> EngramResult<()> {
        if rows.len() != self.records.len() {
            return Err(EngramError::ConsistencyError(
                ConsistencyError::IndexOutOfSync {
                    index: format!("vectors/{}", T::KIND.as_str()),
                    indexed: rows.len(),
                    corpus: self.records.len(),
                },
            ));
        }
        io::write_atomic(&layout.vectors(T::KIND), &codec::encode_array(dims, rows))?;
        self.vectors = rows.to_vec();
        Ok(())
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn get(&self, id: &str) -> EngramResult<Option<T>> {
        match self.positions.get(id) {
            Some(&pos) => self.attach(pos).map(Some),
            None => Ok(None),
        }
    }

    /// Records with vectors attached, in append order, keeping those that
    /// satisfy `keep`.
    pub fn load_where(&self, keep: impl Fn(&T) -> bool) -> EngramResult<Vec<T>> {
        let mut out = Vec::new();
        for (pos, record) in self.records.iter().enumerate() {
            if keep(record) {
                out.push(self.attach(pos)?);
            }
        }
        Ok(out)
    }

    fn attach(&self, pos: usize) -> EngramResult<T> {
        let row = self.vectors.get(pos).ok_or_else(|| {
            EngramError::ConsistencyError(ConsistencyError::VectorRowMissing {
                kind: T::KIND.as_str().to_string(),
                index: pos,
                rows: self.vectors.len(),
            })
        })?;
        let mut record = self.records[pos].clone();
        record.set_vector(row.clone());
        Ok(record)
    }
}

fn strip<T: StoredRecord>(record: &T) -> T {
    let mut out = record.clone();
    out.set_vector(Vec::new());
    out
}
