// Records shared by the store, the orchestration services and the HTTP layer.
// Field names serialize in camelCase, matching what the mobile client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A user's last reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters
    #[serde(default)]
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Postal address resolved from a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// A user profile as seen by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Push address for the user's device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    pub location: Option<Location>,
    pub address: Option<Address>,
    pub age: Option<u32>,
    #[serde(default)]
    pub is_profile_complete: bool,
    /// Ids of the users this user is matched with
    #[serde(default)]
    pub matches: BTreeSet<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub location_updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// A bare profile: no token, no location, incomplete.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fcm_token: None,
            location: None,
            address: None,
            age: None,
            is_profile_complete: false,
            matches: BTreeSet::new(),
            last_activity: None,
            created_at: Some(Utc::now()),
            location_updated_at: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.fcm_token = Some(token.into());
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(Location {
            latitude,
            longitude,
            accuracy: 0.0,
            timestamp: Utc::now(),
        });
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn complete(mut self) -> Self {
        self.is_profile_complete = true;
        self
    }
}

/// Lifecycle state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Unmatched,
    Blocked,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MatchStatus::Active),
            "unmatched" => Ok(MatchStatus::Unmatched),
            "blocked" => Ok(MatchStatus::Blocked),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

fn escape_id_part(id: &str) -> Cow<'_, str> {
    if id.contains(['%', '_']) {
        Cow::Owned(id.replace('%', "%25").replace('_', "%5F"))
    } else {
        Cow::Borrowed(id)
    }
}

/// A symmetric match between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    /// Both participants, sorted
    pub users: [String; 2],
    pub created_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// Order-independent identifier for the pair: `"{smaller}_{larger}"`.
    ///
    /// Inside each part `%` becomes `%25` and `_` becomes `%5F`, so the single
    /// `_` separator is unambiguous and distinct pairs never share an id.
    pub fn canonical_id(user_a: &str, user_b: &str) -> String {
        let (first, second) = Self::ordered(user_a, user_b);
        format!("{}_{}", escape_id_part(first), escape_id_part(second))
    }

    /// A fresh active match with no messages yet.
    pub fn new(user_a: &str, user_b: &str, created_at: DateTime<Utc>) -> Self {
        let (first, second) = Self::ordered(user_a, user_b);
        Self {
            id: Self::canonical_id(first, second),
            users: [first.to_string(), second.to_string()],
            created_at,
            status: MatchStatus::Active,
            last_message: None,
            last_message_time: None,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    fn ordered<'a>(user_a: &'a str, user_b: &'a str) -> (&'a str, &'a str) {
        if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        }
    }
}

/// Category of a notification; drives client-side routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    General,
    NewMatch,
    NewMessage,
    ProfileView,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::General => "general",
            NotificationType::NewMatch => "new_match",
            NotificationType::NewMessage => "new_message",
            NotificationType::ProfileView => "profile_view",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(NotificationType::General),
            "new_match" => Ok(NotificationType::NewMatch),
            "new_message" => Ok(NotificationType::NewMessage),
            "profile_view" => Ok(NotificationType::ProfileView),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

/// A logged notification, one per successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub related_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// A chat message inside a match. Written by the messaging path, only counted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
