//! Sample table resolution.
//!
//! The stbl child boxes describe samples indirectly:
//! - stts: run-length DTS deltas (decode durations)
//! - ctts: run-length composition offsets (B-frame reordering)
//! - stss: sync sample numbers (absent means every sample is sync)
//! - stsz: sample sizes, uniform or per-sample
//! - stsc: sample-to-chunk mapping
//! - stco/co64: absolute chunk offsets
//!
//! The builder flattens them into one entry per sample with an absolute file
//! offset, so extraction is a straight slice per sample.

use std::collections::HashSet;

/// One fully resolved sample.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleEntry {
    /// Absolute file offset of the sample payload.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: u32,
    /// Decode timestamp in the track timescale.
    pub dts: u64,
    /// Decode duration in the track timescale.
    pub duration: u32,
    /// Composition offset relative to DTS.
    pub cts_offset: i32,
    /// Whether this sample is a sync sample.
    pub is_sync: bool,
}

/// Accumulates raw table entries and resolves them into flat samples.
#[derive(Default)]
pub(crate) struct SampleTableBuilder {
    // (count, delta)
    stts_entries: Vec<(u32, u32)>,
    // (count, offset)
    ctts_entries: Vec<(u32, i32)>,
    // 1-based sample numbers; None means no stss box was present.
    sync_samples: Option<Vec<u32>>,
    // (first_chunk, samples_per_chunk)
    stsc_entries: Vec<(u32, u32)>,
    sample_count: u32,
    uniform_size: u32,
    sample_sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
}

impl SampleTableBuilder {
    pub fn set_stts(&mut self, entries: Vec<(u32, u32)>) {
        self.stts_entries = entries;
    }

    pub fn set_ctts(&mut self, entries: Vec<(u32, i32)>) {
        self.ctts_entries = entries;
    }

    pub fn set_sync_samples(&mut self, samples: Vec<u32>) {
        self.sync_samples = Some(samples);
    }

    pub fn set_stsc(&mut self, entries: Vec<(u32, u32)>) {
        self.stsc_entries = entries;
    }

    pub fn set_stsz(&mut self, uniform_size: u32, sample_count: u32, sizes: Vec<u32>) {
        self.uniform_size = uniform_size;
        self.sample_count = sample_count;
        self.sample_sizes = sizes;
    }

    pub fn set_chunk_offsets(&mut self, offsets: Vec<u64>) {
        self.chunk_offsets = offsets;
    }

    /// Resolve every table into one entry per sample, in decode order.
    pub fn build(self) -> Vec<SampleEntry> {
        let count = self.sample_count as usize;
        if count == 0 {
            return Vec::new();
        }

        let chunks = self.resolve_sample_chunks(count);
        let offsets = self.resolve_offsets(&chunks, count);
        let (dts_values, durations) = self.resolve_timing(count);
        let cts_offsets = self.resolve_cts_offsets(count);
        let sync_set: Option<HashSet<u32>> = self
            .sync_samples
            .as_ref()
            .map(|s| s.iter().copied().collect());

        (0..count)
            .map(|i| SampleEntry {
                offset: offsets[i],
                size: self.size_of(i),
                dts: dts_values[i],
                duration: durations[i],
                cts_offset: cts_offsets[i],
                is_sync: match &sync_set {
                    // stss numbers samples from 1.
                    Some(set) => set.contains(&(i as u32 + 1)),
                    None => true,
                },
            })
            .collect()
    }

    fn size_of(&self, i: usize) -> u32 {
        if self.uniform_size > 0 {
            self.uniform_size
        } else {
            self.sample_sizes.get(i).copied().unwrap_or(0)
        }
    }

    /// 0-based chunk index for each sample.
    fn resolve_sample_chunks(&self, count: usize) -> Vec<u32> {
        if self.stsc_entries.is_empty() {
            return vec![0; count];
        }

        let mut result = Vec::with_capacity(count);
        let num_chunks = self.chunk_offsets.len() as u32;

        for (i, &(first_chunk, samples_per_chunk)) in self.stsc_entries.iter().enumerate() {
            // Each entry applies up to (exclusive) the next entry's first chunk.
            let next_first = match self.stsc_entries.get(i + 1) {
                Some(&(chunk, _)) => chunk,
                None => num_chunks + 1,
            };
            for chunk in first_chunk..next_first {
                if chunk > num_chunks {
                    break;
                }
                for _ in 0..samples_per_chunk {
                    if result.len() >= count {
                        return result;
                    }
                    result.push(chunk - 1);
                }
            }
        }

        while result.len() < count {
            result.push(result.last().copied().unwrap_or(0));
        }
        result
    }

    /// Absolute file offset for each sample: chunk base plus the sizes of the
    /// samples before it in the same chunk.
    fn resolve_offsets(&self, chunks: &[u32], count: usize) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(count);
        let mut within_chunk = vec![0u64; self.chunk_offsets.len()];

        for i in 0..count {
            let chunk = chunks[i] as usize;
            let base = self.chunk_offsets.get(chunk).copied().unwrap_or(0);
            let consumed = within_chunk.get(chunk).copied().unwrap_or(0);
            offsets.push(base + consumed);
            if let Some(c) = within_chunk.get_mut(chunk) {
                *c += self.size_of(i) as u64;
            }
        }
        offsets
    }

    /// Expand stts runs into a DTS and duration per sample.
    fn resolve_timing(&self, count: usize) -> (Vec<u64>, Vec<u32>) {
        let mut dts_values = Vec::with_capacity(count);
        let mut durations = Vec::with_capacity(count);
        let mut dts = 0u64;

        'outer: for &(run, delta) in &self.stts_entries {
            for _ in 0..run {
                if dts_values.len() >= count {
                    break 'outer;
                }
                dts_values.push(dts);
                durations.push(delta);
                dts += delta as u64;
            }
        }

        // A short stts is padded by repeating the last delta.
        let last = durations.last().copied().unwrap_or(1);
        while dts_values.len() < count {
            dts_values.push(dts);
            durations.push(last);
            dts += last as u64;
        }
        (dts_values, durations)
    }

    fn resolve_cts_offsets(&self, count: usize) -> Vec<i32> {
        if self.ctts_entries.is_empty() {
            return vec![0; count];
        }

        let mut offsets = Vec::with_capacity(count);
        'outer: for &(run, offset) in &self.ctts_entries {
            for _ in 0..run {
                if offsets.len() >= count {
                    break 'outer;
                }
                offsets.push(offset);
            }
        }
        while offsets.len() < count {
            offsets.push(0);
        }
        offsets
    }
}
