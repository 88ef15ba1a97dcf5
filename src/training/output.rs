// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! JSON document written by sampling and profiling runs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::EntropyTrace;
use crate::music::{decode, Event, Note};

/// Notes of a generated or profiled piece with its entropy trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub notes: Vec<Note>,
    pub entropies: EntropyTrace,
}

impl GeneratedOutput {
    /// Decode events into notes and attach the trace
    pub fn from_events(events: &[Event], entropies: EntropyTrace) -> Self {
        Self {
            notes: decode(events),
            entropies,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize generated output")
    }

    /// Write to `path`, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write output file: {:?}", path))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read output file: {:?}", path.as_ref()))?;
        serde_json::from_str(&contents).context("Failed to parse generated output")
    }
}
