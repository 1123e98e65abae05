//! Re-baking jobs over an asset store.

use glam::DMat4;
use levelbake_codec::{
    ChunkStats, DEF_SIZE, DecodeError, InstanceKind, InstanceRecord, OcclusionSet, decode_sets,
    encode_sets, encode_table, remap_textures, transform_chunk,
};
use serde::{Deserialize, Serialize};

use crate::config::BakeConfig;
use crate::error::{Error, Result};
use crate::store::{AssetStore, ChunkKey};

/// One chunk to move and optionally retexture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkJob {
    pub chunk: ChunkKey,
    /// Column-major world transform applied to every coordinate.
    pub transform: DMat4,
    /// `(old, new)` texture indices, one per texture slot.
    #[serde(default)]
    pub remap: Option<Vec<(u32, u32)>>,
}

impl ChunkJob {
    pub fn new(chunk: ChunkKey, transform: DMat4) -> Self {
        Self {
            chunk,
            transform,
            remap: None,
        }
    }

    #[must_use]
    pub fn with_remap(mut self, pairs: Vec<(u32, u32)>) -> Self {
        self.remap = Some(pairs);
        self
    }
}

/// What happened to a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Coordinates and/or textures were rewritten.
    Baked(ChunkStats),
    /// Nothing to do; the store was not written.
    Skipped,
}

/// Totals for a batch of chunk jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakeReport {
    pub baked: usize,
    pub skipped: usize,
    pub vertices: usize,
    pub anchors: usize,
    /// Chunks whose job failed, with the error message.
    pub failed: Vec<(ChunkKey, String)>,
}

impl BakeReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold one job's result into the totals.
    pub fn record(&mut self, chunk: &ChunkKey, result: Result<ChunkOutcome>) {
        match result {
            Ok(ChunkOutcome::Baked(stats)) => {
                self.baked += 1;
                self.vertices += stats.vertices;
                self.anchors += stats.anchors;
            }
            Ok(ChunkOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                tracing::warn!(chunk = %chunk, error = %e, "Skipping chunk");
                self.failed.push((chunk.clone(), e.to_string()));
            }
        }
    }
}

/// Applies codec operations to assets held in a store.
#[derive(Debug)]
pub struct Baker<S> {
    store: S,
    config: BakeConfig,
}

impl<S: AssetStore> Baker<S> {
    pub fn new(store: S, config: BakeConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Move one chunk and apply its texture remap.
    ///
    /// Both assets are rewritten only after every step succeeded.
    #[tracing::instrument(skip_all, fields(chunk = %job.chunk))]
    pub fn bake_chunk(&self, job: &ChunkJob) -> Result<ChunkOutcome> {
        let moves = !(self.config.skip_identity && job.transform == DMat4::IDENTITY);
        if !moves && job.remap.is_none() {
            tracing::debug!("Identity transform, nothing to do");
            return Ok(ChunkOutcome::Skipped);
        }

        let def_key = job.chunk.def_key();
        let data_key = job.chunk.data_key();
        let def_bytes = self.store.get(&def_key)?;
        let mut def: [u8; DEF_SIZE] = def_bytes.as_slice().try_into().map_err(|_| {
            Error::codec(
                &def_key,
                DecodeError::MalformedRecord {
                    context: "chunk def",
                    reason: format!("expected {DEF_SIZE} bytes, found {}", def_bytes.len()),
                },
            )
        })?;
        let mut data = self.store.get(&data_key)?;

        let mut stats = ChunkStats::default();
        if moves {
            stats = transform_chunk(&mut def, &mut data, &job.transform)
                .map_err(|e| Error::codec(job.chunk.to_string(), e))?;
        }
        if let Some(pairs) = &job.remap {
            remap_textures(&def, &mut data, pairs)
                .map_err(|e| Error::codec(job.chunk.to_string(), e))?;
        }

        if moves {
            self.store.put(&def_key, &def)?;
        }
        if let Err(e) = self.store.put(&data_key, &data) {
            // Put the original def back so the pair stays consistent.
            if moves && let Err(restore) = self.store.put(&def_key, &def_bytes) {
                tracing::error!(error = %restore, "Failed to restore chunk def");
            }
            return Err(e);
        }
        tracing::debug!(
            vertices = stats.vertices,
            anchors = stats.anchors,
            displacement_streams = stats.displacement_streams,
            "Baked chunk"
        );
        Ok(ChunkOutcome::Baked(stats))
    }

    /// Run every job, collecting failures instead of stopping at the first.
    pub fn bake_chunks(&self, jobs: &[ChunkJob]) -> BakeReport {
        let mut report = BakeReport::default();
        for job in jobs {
            report.record(&job.chunk, self.bake_chunk(job));
        }
        tracing::info!(
            baked = report.baked,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Chunk batch complete"
        );
        report
    }

    /// Decode the instance table stored under `key`.
    ///
    /// Ambiguous decompositions are logged and resolved unless the config
    /// asks for strict decoding.
    pub fn decode_instances(&self, key: &str, kind: InstanceKind) -> Result<Vec<InstanceRecord>> {
        let table = self.store.get(key)?;
        let size = kind.record_size();
        if table.len() % size != 0 {
            return Err(Error::codec(
                key,
                DecodeError::MalformedRecord {
                    context: "instance table",
                    reason: format!("{} bytes is not a multiple of {size}", table.len()),
                },
            ));
        }

        let mut records = Vec::with_capacity(table.len() / size);
        for (index, bytes) in table.chunks_exact(size).enumerate() {
            let record = match InstanceRecord::decode_strict(kind, bytes) {
                Err(DecodeError::DecompositionAmbiguous { axes })
                    if !self.config.strict_decomposition =>
                {
                    tracing::warn!(key, index, ?axes, "Ambiguous decomposition, resolved by sign flip");
                    InstanceRecord::decode(kind, bytes)
                }
                other => other,
            };
            records.push(record.map_err(|e| Error::codec(key, e))?);
        }
        tracing::debug!(key, kind = kind.name(), count = records.len(), "Decoded instances");
        Ok(records)
    }

    /// Encode records of one kind and store them under `key`.
    pub fn encode_instances(&self, key: &str, records: &[InstanceRecord]) -> Result<()> {
        let table = encode_table(records).map_err(|e| Error::codec(key, e))?;
        self.store.put(key, &table)?;
        tracing::debug!(key, count = records.len(), "Encoded instances");
        Ok(())
    }

    pub fn decode_occlusion(&self, key: &str) -> Result<Vec<OcclusionSet>> {
        let stream = self.store.get(key)?;
        decode_sets(&stream).map_err(|e| Error::codec(key, e))
    }

    pub fn encode_occlusion(&self, key: &str, sets: &[OcclusionSet]) -> Result<()> {
        let stream = encode_sets(sets).map_err(|e| Error::codec(key, e))?;
        self.store.put(key, &stream)
    }
}
