use std::collections::HashMap;

use zbus::zvariant::{OwnedValue, Value};

use super::SourceChange;

const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "m4v", "mkv", "webm", "avi", "mov", "ogv", "flv", "wmv", "mpg",
];
const AUDIO_EXTENSIONS: [&str; 10] = [
    "mp3", "flac", "ogg", "oga", "opus", "wav", "m4a", "aac", "wma", "aiff",
];

/// The parts of an MPRIS metadata map the indicator cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    /// `xesam:artist`, joined with commas when it is a list
    pub artist: Option<String>,
    /// `xesam:title`
    pub title: Option<String>,
    /// `mpris:artUrl`
    pub art_url: Option<String>,
    /// `xesam:url`
    pub url: Option<String>,
}

impl TrackMetadata {
    /// Symbolic icon loosely describing the media type of the track.
    pub fn mimetype_icon(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();

        if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some("video-x-generic-symbolic".to_string())
        } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            Some("audio-x-generic-symbolic".to_string())
        } else {
            None
        }
    }

    /// Turn the metadata into a track change, falling back to the player
    /// identity for a missing artist.
    pub fn into_change(self, identity: &str) -> SourceChange {
        let mimetype_icon = self.mimetype_icon();
        SourceChange::Track {
            artist: self
                .artist
                .filter(|artist| !artist.is_empty())
                .unwrap_or_else(|| identity.to_string()),
            title: self.title.unwrap_or_default(),
            cover_uri: self.art_url.filter(|uri| !uri.is_empty()),
            mimetype_icon,
        }
    }
}

impl From<&HashMap<String, OwnedValue>> for TrackMetadata {
    fn from(metadata: &HashMap<String, OwnedValue>) -> Self {
        let text = |key: &str| metadata.get(key).and_then(|value| string_of(value));

        Self {
            artist: text("xesam:artist"),
            title: text("xesam:title"),
            art_url: text("mpris:artUrl"),
            url: text("xesam:url"),
        }
    }
}

fn string_of(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.to_string()),
        Value::Array(array) => {
            let parts: Vec<String> = array.iter().filter_map(string_of).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Value(inner) => string_of(inner),
        _ => None,
    }
}
