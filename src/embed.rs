//! Embedding surface.
//!
//! The widget is dropped into a host page as a script tag; its `data-*`
//! attributes carry the server origin, the assistant to talk to, and the
//! screen corner to dock in. Resolution happens once at load time and
//! produces the engine [`Config`].

use crate::config::{Config, DeviceProfile};
use std::collections::HashMap;
use std::str::FromStr;

pub const ATTR_SERVER: &str = "data-server";
pub const ATTR_ASSISTANT_ID: &str = "data-assistant-id";
pub const ATTR_POSITION: &str = "data-position";

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("Invalid screen position: {0}")]
    InvalidPosition(String),
}

/// Corner of the host page the widget docks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl FromStr for ScreenPosition {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bottom-right" => Ok(ScreenPosition::BottomRight),
            "bottom-left" => Ok(ScreenPosition::BottomLeft),
            "top-right" => Ok(ScreenPosition::TopRight),
            "top-left" => Ok(ScreenPosition::TopLeft),
            other => Err(EmbedError::InvalidPosition(other.to_string())),
        }
    }
}

/// Load-time widget settings resolved from script-tag attributes.
#[derive(Debug, Clone)]
pub struct WidgetEmbed {
    server_origin: String,
    assistant_id: String,
    position: ScreenPosition,
}

impl WidgetEmbed {
    /// Resolve attributes. The server origin and assistant id are
    /// required; the position defaults to the bottom right corner.
    pub fn resolve(attrs: &HashMap<String, String>) -> Result<Self, EmbedError> {
        let server_origin = attrs
            .get(ATTR_SERVER)
            .filter(|v| !v.is_empty())
            .ok_or(EmbedError::MissingAttr(ATTR_SERVER))?;
        let assistant_id = attrs
            .get(ATTR_ASSISTANT_ID)
            .filter(|v| !v.is_empty())
            .ok_or(EmbedError::MissingAttr(ATTR_ASSISTANT_ID))?;
        let position = match attrs.get(ATTR_POSITION) {
            Some(value) => value.parse()?,
            None => ScreenPosition::default(),
        };
        Ok(Self {
            server_origin: server_origin.clone(),
            assistant_id: assistant_id.clone(),
            position,
        })
    }

    pub fn server_origin(&self) -> &str {
        &self.server_origin
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn position(&self) -> ScreenPosition {
        self.position
    }

    /// Engine configuration for this embed.
    pub fn into_config(self, profile: DeviceProfile) -> Config {
        Config::builder(&self.assistant_id)
            .with_server_origin(&self.server_origin)
            .with_profile(profile)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_full_attribute_set() {
        let embed = WidgetEmbed::resolve(&attrs(&[
            (ATTR_SERVER, "wss://voice.example.com"),
            (ATTR_ASSISTANT_ID, "asst_A1"),
            (ATTR_POSITION, "top-left"),
        ]))
        .unwrap();
        assert_eq!(embed.server_origin(), "wss://voice.example.com");
        assert_eq!(embed.assistant_id(), "asst_A1");
        assert_eq!(embed.position(), ScreenPosition::TopLeft);
    }

    #[test]
    fn position_defaults_to_bottom_right() {
        let embed = WidgetEmbed::resolve(&attrs(&[
            (ATTR_SERVER, "wss://voice.example.com"),
            (ATTR_ASSISTANT_ID, "asst_A1"),
        ]))
        .unwrap();
        assert_eq!(embed.position(), ScreenPosition::BottomRight);
    }

    #[test]
    fn missing_assistant_is_an_error() {
        let err = WidgetEmbed::resolve(&attrs(&[(ATTR_SERVER, "wss://voice.example.com")]))
            .unwrap_err();
        assert!(matches!(err, EmbedError::MissingAttr(ATTR_ASSISTANT_ID)));
    }

    #[test]
    fn bad_position_is_an_error() {
        let err = WidgetEmbed::resolve(&attrs(&[
            (ATTR_SERVER, "wss://voice.example.com"),
            (ATTR_ASSISTANT_ID, "asst_A1"),
            (ATTR_POSITION, "center"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidPosition(_)));
    }
}
