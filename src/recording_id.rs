/*
 * Meeting Pipeline Core - Recording Identifier Decoding
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * Recording services hand out time-ordered (version 7) UUIDs whose first
 * 48 bits encode the creation time in Unix milliseconds.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::types::{PipelineError, Result};

/// Opaque identifier of a downloaded recording.
///
/// Only time-ordered identifiers decode; anything else is rejected rather
/// than yielding a plausible-looking but wrong timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordingId(Uuid);

impl RecordingId {
    /// Parses a hex identifier. Case-insensitive; `-` separators optional.
    pub fn parse(raw: &str) -> Result<Self> {
        let hex: String = raw.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(PipelineError::InvalidIdentifierFormat(format!(
                "expected 32 hex digits, got {}",
                hex.len()
            )));
        }
        let uuid = Uuid::parse_str(&hex)
            .map_err(|e| PipelineError::InvalidIdentifierFormat(e.to_string()))?;
        Self::from_uuid(uuid)
    }

    /// Accepts a raw 128-bit identifier.
    pub fn from_bytes(bytes: [u8; 16]) -> Result<Self> {
        Self::from_uuid(Uuid::from_bytes(bytes))
    }

    fn from_uuid(uuid: Uuid) -> Result<Self> {
        let version = uuid.get_version_num();
        if version != 7 {
            return Err(PipelineError::InvalidIdentifierFormat(format!(
                "version {} identifier is not time-ordered",
                version
            )));
        }
        Ok(Self(uuid))
    }

    /// Milliseconds since the Unix epoch, read big-endian from the first
    /// 48 bits.
    pub fn timestamp_millis(&self) -> u64 {
        self.0.as_bytes()[..6]
            .iter()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
    }

    /// Creation time encoded in the identifier, millisecond precision.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        // 48-bit millisecond values are always representable
        DateTime::from_timestamp_millis(self.timestamp_millis() as i64)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for RecordingId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
