// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Action data model.
//
// An `Action` is one intercepted RPC call (or the intent to make one) as seen
// by the firewall: who triggered it, what it was meant to achieve, which RPC
// was invoked and how it ended. Actions are grouped by client session and
// addressed by an `ActionLocator` (session id + session-scoped action id).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ActionStoreError, CodecError};

/// Length in bytes of a session identifier.
pub const SESSION_ID_LEN: usize = 4;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Fixed-size opaque identifier of a client session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Wrap raw session id bytes.
    pub const fn new(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw session id bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }

    /// Big-endian integer form, used as the ordered index key.
    pub(crate) fn index_key(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub(crate) fn from_index_key(key: u32) -> Self {
        Self(key.to_be_bytes())
    }
}

impl From<[u8; SESSION_ID_LEN]> for SessionId {
    fn from(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActionState
// ---------------------------------------------------------------------------

/// Lifecycle state of an action.
///
/// The byte values are part of the persisted record format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    /// The call was logged but its outcome is not yet known.
    #[default]
    Init = 1,
    /// The call completed.
    Done = 2,
    /// The call failed; the action carries an error reason.
    Error = 3,
}

impl ActionState {
    /// Decode a single byte into an `ActionState`.
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            1 => Ok(Self::Init),
            2 => Ok(Self::Done),
            3 => Ok(Self::Error),
            other => Err(CodecError::InvalidState(other)),
        }
    }

    /// Encode this state as a single byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionState::Init => "init",
            ActionState::Done => "done",
            ActionState::Error => "error",
        }
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionState {
    type Err = ActionStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "init" => Ok(ActionState::Init),
            "done" => Ok(ActionState::Done),
            "error" => Ok(ActionState::Error),
            other => Err(ActionStoreError::InvalidArgument(format!(
                "unknown action state: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionLocator
// ---------------------------------------------------------------------------

/// Addresses a single action: its session and session-scoped id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionLocator {
    /// Session the action belongs to.
    pub session_id: SessionId,
    /// Session-scoped action id (starts at 1).
    pub action_id: u64,
}

impl ActionLocator {
    pub fn new(session_id: SessionId, action_id: u64) -> Self {
        Self {
            session_id,
            action_id,
        }
    }

    /// Ordered key of this action in the per-session index.
    pub(crate) fn index_key(self) -> (u32, u64) {
        (self.session_id.index_key(), self.action_id)
    }

    pub(crate) fn from_index_key((session, action_id): (u32, u64)) -> Self {
        Self::new(SessionId::from_index_key(session), action_id)
    }
}

impl fmt::Display for ActionLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.action_id)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One recorded RPC call intercepted by the firewall.
///
/// `action_id` and `global_id` are zero until the store assigns them. Only
/// `state` and `error_reason` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Session that triggered the call.
    pub session_id: SessionId,
    /// Session-scoped id, assigned by the store.
    pub action_id: u64,
    /// Store-wide creation sequence, assigned by the store.
    pub global_id: u64,
    /// Name of the actor (e.g. an autopilot) that triggered the call.
    pub actor_name: String,
    /// Feature of the actor responsible for the call.
    pub feature_name: String,
    /// What caused the feature to act.
    pub trigger: String,
    /// What the call was meant to achieve.
    pub intent: String,
    /// Optional producer-defined structured payload.
    pub structured_json_data: Option<String>,
    /// Fully qualified name of the intercepted RPC.
    pub rpc_method: String,
    /// Producer-defined RPC parameters.
    pub rpc_params_json: Vec<u8>,
    /// When the call was attempted.
    pub attempted_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub state: ActionState,
    /// Why the call failed; empty unless `state` is `Error`.
    pub error_reason: String,
}

impl Action {
    /// A fresh `Init` action for `rpc_method`, attempted now.
    pub fn new(session_id: SessionId, rpc_method: impl Into<String>) -> Self {
        Self {
            session_id,
            action_id: 0,
            global_id: 0,
            actor_name: String::new(),
            feature_name: String::new(),
            trigger: String::new(),
            intent: String::new(),
            structured_json_data: None,
            rpc_method: rpc_method.into(),
            rpc_params_json: Vec::new(),
            attempted_at: Utc::now(),
            state: ActionState::Init,
            error_reason: String::new(),
        }
    }

    /// The locator addressing this action.
    pub fn locator(&self) -> ActionLocator {
        ActionLocator::new(self.session_id, self.action_id)
    }
}
