//! JSON chat components. On the wire a component is a varint-prefixed
//! JSON string; in memory it is kept structured so the proxy can read
//! message text and build its own system messages.

use crate::protocol::{decoder, Decode, Decoder, Encode, Encoder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatComponent {
    Text(String),
    Array(Vec<ChatComponent>),
    Object(ChatObject),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ChatObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with: Vec<ChatComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ChatComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(rename = "clickEvent", skip_serializing_if = "Option::is_none")]
    pub click_event: Option<ChatEvent>,
    #[serde(rename = "hoverEvent", skip_serializing_if = "Option::is_none")]
    pub hover_event: Option<ChatEvent>,
    /// Keys this proxy does not interpret, kept so re-encoding loses nothing.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatEvent {
    pub action: String,
    pub value: Value,
}

impl ChatComponent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A translatable component, e.g. the outdated client/server
    /// disconnect reasons.
    pub fn translate(key: impl Into<String>, with: Vec<ChatComponent>) -> Self {
        Self::Object(ChatObject {
            translate: Some(key.into()),
            with,
            ..Default::default()
        })
    }

    /// A clickable line that runs `command` when selected.
    pub fn clickable(text: impl Into<String>, command: impl Into<String>) -> Self {
        Self::Object(ChatObject {
            text: Some(text.into()),
            click_event: Some(ChatEvent {
                action: "run_command".into(),
                value: Value::String(command.into()),
            }),
            ..Default::default()
        })
    }

    /// Flattens the component tree into its visible text, ignoring
    /// formatting. Translate keys appear literally with their arguments
    /// appended, which is enough for substring and regex matching.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            ChatComponent::Text(text) => out.push_str(text),
            ChatComponent::Array(items) => {
                for item in items {
                    item.collect_text(out);
                }
            }
            ChatComponent::Object(object) => {
                if let Some(text) = &object.text {
                    out.push_str(text);
                }
                if let Some(translate) = &object.translate {
                    out.push_str(translate);
                }
                for item in &object.with {
                    item.collect_text(out);
                }
                for item in &object.extra {
                    item.collect_text(out);
                }
            }
        }
    }
}

impl Decode for ChatComponent {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let json = decoder.read_string()?;
        Ok(serde_json::from_str(json)?)
    }
}

impl Encode for ChatComponent {
    fn encode(&self, encoder: &mut Encoder) {
        let json = serde_json::to_string(self).expect("chat component serializes");
        encoder.write_string(&json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_component() {
        let component: ChatComponent = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(component.to_plain_text(), "hello");
    }

    #[test]
    fn extra_chain_flattens() {
        let component: ChatComponent = serde_json::from_str(
            r#"{"text":"queue: ","extra":[{"text":"42","color":"gold"},"\nestimated time: 1h"]}"#,
        )
        .unwrap();
        assert_eq!(component.to_plain_text(), "queue: 42\nestimated time: 1h");
    }

    #[test]
    fn translate_round_trip() {
        let component = ChatComponent::translate(
            "multiplayer.disconnect.outdated_client",
            vec![ChatComponent::text("1.12.2")],
        );
        let json = serde_json::to_string(&component).unwrap();
        assert_eq!(
            json,
            r#"{"translate":"multiplayer.disconnect.outdated_client","with":["1.12.2"]}"#
        );
        assert_eq!(serde_json::from_str::<ChatComponent>(&json).unwrap(), component);
    }

    #[test]
    fn wire_round_trip() {
        let component = ChatComponent::clickable("[profile]", "/connect 0123");
        let mut buf = Vec::new();
        component.encode(&mut Encoder::new(&mut buf));
        assert_eq!(
            ChatComponent::decode(&mut Decoder::new(&buf)).unwrap(),
            component
        );
    }
}
