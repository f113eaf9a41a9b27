// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record codec for persisted actions.
//
// Binary format (all integers little-endian):
//   [1 byte:  version]              -- RECORD_VERSION
//   [4 bytes: crc32 checksum]       -- CRC32 of all bytes after this field
//   [4 bytes: session_id]
//   [8 bytes: action_id (u64)]
//   [8 bytes: global_id (u64)]
//   [8 bytes: attempted_at secs (i64)]
//   [4 bytes: attempted_at nanos (u32)]
//   [1 byte:  state]                -- 1=Init, 2=Done, 3=Error
//   [4+N:     actor_name]           -- u32 length prefix + UTF-8 bytes
//   [4+N:     feature_name]
//   [4+N:     trigger]
//   [4+N:     intent]
//   [1 byte:  has_structured_json]  -- 0 or 1, followed by [4+N] if 1
//   [4+N:     rpc_method]
//   [4+N:     rpc_params_json]      -- raw bytes
//   [4+N:     error_reason]

use chrono::{TimeZone, Utc};
use crc32fast::Hasher as Crc32Hasher;

use crate::action::{Action, ActionState, SessionId, SESSION_ID_LEN};
use crate::error::CodecError;

/// Current record format version.
pub const RECORD_VERSION: u8 = 1;

/// Size of the record header (version + crc32).
pub const HEADER_SIZE: usize = 1 + 4;

/// Size of the fixed fields at the start of the body.
pub const FIXED_FIELDS_SIZE: usize = SESSION_ID_LEN + 8 + 8 + 8 + 4 + 1;

const MAX_FIELD_SIZE: usize = u32::MAX as usize;

/// Serialize an action to its persisted byte form.
pub fn encode_action(action: &Action) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::with_capacity(
        FIXED_FIELDS_SIZE
            + 7 * 4
            + 1
            + action.actor_name.len()
            + action.feature_name.len()
            + action.trigger.len()
            + action.intent.len()
            + action.structured_json_data.as_ref().map_or(0, |s| s.len() + 4)
            + action.rpc_method.len()
            + action.rpc_params_json.len()
            + action.error_reason.len(),
    );

    body.extend_from_slice(action.session_id.as_bytes());
    body.extend_from_slice(&action.action_id.to_le_bytes());
    body.extend_from_slice(&action.global_id.to_le_bytes());
    body.extend_from_slice(&action.attempted_at.timestamp().to_le_bytes());
    body.extend_from_slice(&action.attempted_at.timestamp_subsec_nanos().to_le_bytes());
    body.push(action.state.to_byte());

    put_field(&mut body, action.actor_name.as_bytes())?;
    put_field(&mut body, action.feature_name.as_bytes())?;
    put_field(&mut body, action.trigger.as_bytes())?;
    put_field(&mut body, action.intent.as_bytes())?;
    match &action.structured_json_data {
        Some(data) => {
            body.push(1);
            put_field(&mut body, data.as_bytes())?;
        }
        None => body.push(0),
    }
    put_field(&mut body, action.rpc_method.as_bytes())?;
    put_field(&mut body, &action.rpc_params_json)?;
    put_field(&mut body, action.error_reason.as_bytes())?;

    let mut record = Vec::with_capacity(HEADER_SIZE + body.len());
    record.push(RECORD_VERSION);
    record.extend_from_slice(&compute_crc32(&body).to_le_bytes());
    record.extend_from_slice(&body);
    Ok(record)
}

/// Deserialize an action from its persisted byte form.
pub fn decode_action(record: &[u8]) -> Result<Action, CodecError> {
    if record.len() < HEADER_SIZE {
        return Err(CodecError::UnexpectedEof(record.len() as u64));
    }
    if record[0] != RECORD_VERSION {
        return Err(CodecError::UnsupportedVersion(record[0]));
    }

    let stored_crc = u32::from_le_bytes([record[1], record[2], record[3], record[4]]);
    let body = &record[HEADER_SIZE..];
    let computed_crc = compute_crc32(body);
    if stored_crc != computed_crc {
        return Err(CodecError::CrcMismatch {
            expected: stored_crc,
            actual: computed_crc,
        });
    }

    let mut reader = FieldReader::new(body, HEADER_SIZE);

    let session_id = SessionId::new(reader.array::<SESSION_ID_LEN>()?);
    let action_id = u64::from_le_bytes(reader.array()?);
    let global_id = u64::from_le_bytes(reader.array()?);
    let secs = i64::from_le_bytes(reader.array()?);
    let nanos = u32::from_le_bytes(reader.array()?);
    let attempted_at = Utc
        .timestamp_opt(secs, nanos)
        .single()
        .ok_or(CodecError::InvalidTimestamp { secs, nanos })?;
    let state = ActionState::from_byte(reader.byte()?)?;

    let actor_name = reader.string()?;
    let feature_name = reader.string()?;
    let trigger = reader.string()?;
    let intent = reader.string()?;
    let structured_json_data = match reader.byte()? {
        0 => None,
        _ => Some(reader.string()?),
    };
    let rpc_method = reader.string()?;
    let rpc_params_json = reader.field()?.to_vec();
    let error_reason = reader.string()?;

    reader.finish()?;

    Ok(Action {
        session_id,
        action_id,
        global_id,
        actor_name,
        feature_name,
        trigger,
        intent,
        structured_json_data,
        rpc_method,
        rpc_params_json,
        attempted_at,
        state,
        error_reason,
    })
}

/// Compute a CRC32 checksum over the given byte slice using the IEEE
/// polynomial.
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Append a u32 length prefix and the field bytes.
fn put_field(out: &mut Vec<u8>, field: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(field.len()).map_err(|_| CodecError::FieldTooLarge {
        size: field.len(),
        max: MAX_FIELD_SIZE,
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(field);
    Ok(())
}

/// Bounds-checked cursor over a record body.
struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
    /// Offset of `data` within the full record, for error positions.
    base: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            offset: 0,
            base,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof((self.base + self.offset) as u64))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn field(&mut self) -> Result<&'a [u8], CodecError> {
        let len = u32::from_le_bytes(self.array()?) as usize;
        self.take(len)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        Ok(String::from_utf8(self.field()?.to_vec())?)
    }

    fn finish(self) -> Result<(), CodecError> {
        match self.data.len() - self.offset {
            0 => Ok(()),
            trailing => Err(CodecError::TrailingBytes(trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_action() -> Action {
        Action {
            session_id: SessionId::new([1, 1, 1, 1]),
            action_id: 3,
            global_id: 17,
            actor_name: "Autopilot".to_string(),
            feature_name: "auto-fees".to_string(),
            trigger: "fee too low".to_string(),
            intent: "increase fee".to_string(),
            structured_json_data: Some("{\"something\":\"nothing\"}".to_string()),
            rpc_method: "UpdateChanPolicy".to_string(),
            rpc_params_json: b"new fee".to_vec(),
            attempted_at: Utc.timestamp_opt(32100, 123_456_789).unwrap(),
            state: ActionState::Error,
            error_reason: "fail whale".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let action = sample_action();
        let record = encode_action(&action).unwrap();
        assert_eq!(record[0], RECORD_VERSION);
        assert_eq!(decode_action(&record).unwrap(), action);
    }

    #[test]
    fn test_roundtrip_empty_fields() {
        let mut action = Action::new(SessionId::default(), "");
        action.attempted_at = Utc.timestamp_opt(0, 0).unwrap();
        let decoded = decode_action(&encode_action(&action).unwrap()).unwrap();
        assert_eq!(decoded, action);
        assert!(decoded.structured_json_data.is_none());
    }

    #[test]
    fn test_empty_structured_data_is_not_none() {
        let mut action = sample_action();
        action.structured_json_data = Some(String::new());
        let decoded = decode_action(&encode_action(&action).unwrap()).unwrap();
        assert_eq!(decoded.structured_json_data, Some(String::new()));
    }

    #[test]
    fn test_crc_mismatch_detection() {
        let mut record = encode_action(&sample_action()).unwrap();
        let last = record.len() - 1;
        record[last] ^= 0xFF;

        match decode_action(&record).unwrap_err() {
            CodecError::CrcMismatch { expected, actual } => assert_ne!(expected, actual),
            other => panic!("Expected CrcMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut record = encode_action(&sample_action()).unwrap();
        record[0] = 9;
        assert!(matches!(
            decode_action(&record),
            Err(CodecError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            decode_action(&[RECORD_VERSION, 0, 0]),
            Err(CodecError::UnexpectedEof(3))
        ));
    }

    #[test]
    fn test_truncated_body_with_valid_crc() {
        // Re-seal a truncated body so the CRC passes and the field reader
        // has to catch the short read.
        let record = encode_action(&sample_action()).unwrap();
        let body = &record[HEADER_SIZE..record.len() - 3];
        let mut resealed = vec![RECORD_VERSION];
        resealed.extend_from_slice(&compute_crc32(body).to_le_bytes());
        resealed.extend_from_slice(body);

        assert!(matches!(
            decode_action(&resealed),
            Err(CodecError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let record = encode_action(&sample_action()).unwrap();
        let mut body = record[HEADER_SIZE..].to_vec();
        body.extend_from_slice(&[0, 0]);
        let mut resealed = vec![RECORD_VERSION];
        resealed.extend_from_slice(&compute_crc32(&body).to_le_bytes());
        resealed.extend_from_slice(&body);

        assert!(matches!(
            decode_action(&resealed),
            Err(CodecError::TrailingBytes(2))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut action = sample_action();
        action.actor_name = "ab".to_string();
        let record = encode_action(&action).unwrap();

        // The actor name is the first variable field after the fixed ones.
        let mut body = record[HEADER_SIZE..].to_vec();
        body[FIXED_FIELDS_SIZE + 4] = 0xFF;
        let mut resealed = vec![RECORD_VERSION];
        resealed.extend_from_slice(&compute_crc32(&body).to_le_bytes());
        resealed.extend_from_slice(&body);

        assert!(matches!(
            decode_action(&resealed),
            Err(CodecError::InvalidUtf8(_))
        ));
    }
}
