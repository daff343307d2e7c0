//! The vCon container and its child entities.
//!
//! Field names follow the IETF vCon JSON shape exactly; absence and `null`
//! are distinct, so every optional field uses `skip_serializing_if`. The
//! container version currently produced is "0.3.0".

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Body payload encoding for dialogs, analyses and attachments.
///
/// There is no default: an absent encoding means "unspecified" and is
/// preserved as such through storage round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Base64url,
    Json,
    None,
}

impl Encoding {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base64url => "base64url",
            Self::Json => "json",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base64url" => Ok(Self::Base64url),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown encoding: {s}")),
        }
    }
}

/// Kind of conversation segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DialogType {
    Recording,
    Text,
    Transfer,
    Incomplete,
}

impl DialogType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Text => "text",
            Self::Transfer => "transfer",
            Self::Incomplete => "incomplete",
        }
    }
}

impl std::str::FromStr for DialogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recording" => Ok(Self::Recording),
            "text" => Ok(Self::Text),
            "transfer" => Ok(Self::Transfer),
            "incomplete" => Ok(Self::Incomplete),
            _ => Err(format!("Unknown dialog type: {s}")),
        }
    }
}

/// Outcome of an incomplete dialog attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    NoAnswer,
    Congestion,
    Failed,
    Busy,
    HungUp,
    VoicemailNoMessage,
}

impl Disposition {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAnswer => "no-answer",
            Self::Congestion => "congestion",
            Self::Failed => "failed",
            Self::Busy => "busy",
            Self::HungUp => "hung-up",
            Self::VoicemailNoMessage => "voicemail-no-message",
        }
    }
}

impl std::str::FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no-answer" => Ok(Self::NoAnswer),
            "congestion" => Ok(Self::Congestion),
            "failed" => Ok(Self::Failed),
            "busy" => Ok(Self::Busy),
            "hung-up" => Ok(Self::HungUp),
            "voicemail-no-message" => Ok(Self::VoicemailNoMessage),
            _ => Err(format!("Unknown disposition: {s}")),
        }
    }
}

/// Party presence event captured during a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartyEvent {
    Join,
    Drop,
    Hold,
    Unhold,
    Mute,
    Unmute,
}

impl PartyEvent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Drop => "drop",
            Self::Hold => "hold",
            Self::Unhold => "unhold",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
        }
    }
}

impl std::str::FromStr for PartyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "join" => Ok(Self::Join),
            "drop" => Ok(Self::Drop),
            "hold" => Ok(Self::Hold),
            "unhold" => Ok(Self::Unhold),
            "mute" => Ok(Self::Mute),
            "unmute" => Ok(Self::Unmute),
            _ => Err(format!("Unknown party event: {s}")),
        }
    }
}

/// A conversation participant.
///
/// At least one addressing field (tel, sip, stir, mailto, name, did, uuid)
/// must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Party {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jcard: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civicaddress: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Party {
    /// Whether any addressing field is set.
    #[must_use]
    pub fn has_identifier(&self) -> bool {
        self.tel.is_some()
            || self.sip.is_some()
            || self.stir.is_some()
            || self.mailto.is_some()
            || self.name.is_some()
            || self.did.is_some()
            || self.uuid.is_some()
    }
}

/// A presence change of one party during a dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartyHistory {
    /// Index into the owning vCon's parties array.
    pub party: i32,
    pub time: DateTime<Utc>,
    pub event: PartyEvent,
}

/// A single conversation segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dialog {
    #[serde(rename = "type")]
    pub dialog_type: DialogType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Segment duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Indexes into the owning vCon's parties array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parties: Option<Vec<i32>>,
    /// Index of the party that originated the segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originator: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediatype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_history: Option<Vec<PartyHistory>>,
}

impl Dialog {
    /// Create a text dialog with the given body and no encoding.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            dialog_type: DialogType::Text,
            start_time: None,
            duration: None,
            parties: None,
            originator: None,
            mediatype: None,
            body: Some(body.into()),
            encoding: None,
            url: None,
            content_hash: None,
            disposition: None,
            session_id: None,
            application: None,
            message_id: None,
            party_history: None,
        }
    }
}

/// A derived artifact about one or more dialog segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Analysis {
    #[serde(rename = "type")]
    pub analysis_type: String,
    /// Indexes of the dialogs this analysis covers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog: Option<Vec<i32>>,
    /// Producing vendor; must be non-empty.
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Format identifier of the body. The field is `schema`, never
    /// `schema_version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Body text in any format (JSON, CSV, XML, plain).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// An auxiliary payload bound to a vCon.
///
/// Two attachment types are distinguished: `tags` carries the tag set and
/// `tenant` carries the tenant identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    /// Index of the related party, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<i32>,
    /// Index of the related dialog, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

/// A reference from this vCon to another vCon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    /// UUID of the referenced vCon.
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A Virtual Conversation container.
///
/// Child arrays are ordered; a child's position is its stable index within
/// the vCon and is what dialog/analysis/attachment references point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vcon {
    /// Container version string (current "0.3.0").
    #[serde(rename = "vcon")]
    pub version: String,
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_support: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appended: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<Group>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parties: Vec<Party>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dialog: Vec<Dialog>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<Analysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Vcon {
    /// Create an empty container with a fresh v4 UUID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_uuid(Uuid::new_v4())
    }

    /// Create an empty container with the given UUID.
    #[must_use]
    pub fn with_uuid(uuid: Uuid) -> Self {
        Self {
            version: crate::constants::VCON_VERSION.to_owned(),
            uuid,
            subject: None,
            created_at: None,
            updated_at: None,
            extensions: None,
            must_support: None,
            redacted: None,
            appended: None,
            group: None,
            parties: Vec::new(),
            dialog: Vec::new(),
            analysis: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// First attachment with the given distinguished type.
    #[must_use]
    pub fn attachment_of_type(&self, attachment_type: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.attachment_type.as_deref() == Some(attachment_type))
    }

    /// Index of the first attachment with the given distinguished type.
    #[must_use]
    pub fn attachment_index_of_type(&self, attachment_type: &str) -> Option<usize> {
        self.attachments
            .iter()
            .position(|a| a.attachment_type.as_deref() == Some(attachment_type))
    }
}

impl Default for Vcon {
    fn default() -> Self {
        Self::new()
    }
}
