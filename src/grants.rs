use serde::{Deserialize, Serialize};

/// The capability set carried as the video grant of an access token.
///
/// Unset fields are omitted on the wire. The token core only ever inspects
/// `room_join`; everything else is enforced by the service receiving the
/// token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    /// Permission to create rooms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_create: Option<bool>,

    /// Permission to list rooms and their participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_list: Option<bool>,

    /// Permission to join the room named in `room`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,

    /// Permission to moderate the room named in `room`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_admin: Option<bool>,

    /// Permission to record the room named in `room`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_record: Option<bool>,

    /// The room the join/admin/record permissions apply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    /// Permission to publish media tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,

    /// Permission to subscribe to other participants' tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,

    /// Permission to publish data messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_publish_data: Option<bool>,

    /// Hide this participant from others in the room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl VideoGrant {
    /// A grant that joins the given room.
    pub fn room_join(room: impl Into<String>) -> Self {
        Self { room_join: Some(true), room: Some(room.into()), ..Default::default() }
    }

    pub(crate) fn requests_room_join(&self) -> bool {
        self.room_join.unwrap_or(false)
    }
}

/// The claims granted to a participant, as carried inside a signed token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimGrants {
    /// The participant identity. Travels as the JWT subject rather than as a
    /// grant field, so it is never serialized from here.
    #[serde(skip)]
    pub identity: Option<String>,

    /// Display name for the participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Opaque metadata passed through to other participants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,

    /// Integrity marker for content associated with this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Notification target, advisory only.
    #[serde(rename = "webHookURL", default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// The capability set for this participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoGrant>,
}

impl ClaimGrants {
    pub(crate) fn requests_room_join(&self) -> bool {
        self.video.as_ref().is_some_and(VideoGrant::requests_room_join)
    }
}
