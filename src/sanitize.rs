//! Turns untrusted client JSON into bounded webhook messages.
//!
//! Limits match the downstream embed renderer. Only the fields built here are
//! ever forwarded; unknown client keys are dropped.
use crate::embed::{
    server_timestamp, truncate_chars, Embed, EmbedField, Thumbnail, WebhookMessage, MAX_COLOR,
    MAX_DESCRIPTION_CHARS, MAX_FIELDS, MAX_FIELD_NAME_CHARS, MAX_FIELD_VALUE_CHARS,
    MAX_TITLE_CHARS, MAX_URL_CHARS,
};
use crate::error::RelayError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const MAX_COMMENT_CHARS: usize = 500;
pub const MIN_COMMENT_CHARS: usize = 5;
pub const MAX_USERNAME_CHARS: usize = 100;
pub const REVIEW_COLOR: u32 = 0xF1_C4_0F;
pub const REVIEW_TITLE: &str = "Nouvel avis";
pub const REVIEW_BANNER: &str = "📝 **Un nouvel avis vient d'être déposé !**";
pub const STAR: &str = "⭐";

static USER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{15,20}$").expect("user id pattern is valid"));

/// Parses a request body, mapping any syntax error to `InvalidJson`.
pub fn parse_body(body: &[u8]) -> Result<Value, RelayError> {
    serde_json::from_slice(body).map_err(|_| RelayError::InvalidJson)
}

/// Sanitizes a connection notification: `{ "embeds": [...] }`.
pub fn sanitize_connection(body: &Value) -> Result<WebhookMessage, RelayError> {
    let embeds = body
        .get("embeds")
        .and_then(Value::as_array)
        .ok_or(RelayError::BadRequest("Missing or invalid embeds"))?;

    let timestamp = server_timestamp();
    let embeds = embeds
        .iter()
        .map(|raw| sanitize_embed(raw, &timestamp))
        .collect();

    Ok(WebhookMessage {
        content: None,
        embeds,
    })
}

fn sanitize_embed(raw: &Value, timestamp: &str) -> Embed {
    let fields = raw
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .take(MAX_FIELDS)
                .map(|f| EmbedField {
                    name: bounded_or_empty(f.get("name"), MAX_FIELD_NAME_CHARS),
                    value: bounded_or_empty(f.get("value"), MAX_FIELD_VALUE_CHARS),
                    inline: f.get("inline").map(is_truthy).unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default();

    Embed {
        title: bounded(raw.get("title"), MAX_TITLE_CHARS),
        description: bounded(raw.get("description"), MAX_DESCRIPTION_CHARS),
        color: color(raw.get("color")),
        thumbnail: bounded(
            raw.get("thumbnail").and_then(|t| t.get("url")),
            MAX_URL_CHARS,
        )
        .map(|url| Thumbnail { url }),
        fields,
        timestamp: timestamp.to_string(),
    }
}

/// Sanitizes a review submission into the fixed review notification.
pub fn sanitize_review(body: &Value) -> Result<WebhookMessage, RelayError> {
    let required = ["username", "userId", "rating", "comment"];
    if required
        .iter()
        .any(|key| !body.get(*key).map(is_truthy).unwrap_or(false))
    {
        return Err(RelayError::BadRequest("Missing required fields"));
    }

    let rating = body
        .get("rating")
        .and_then(parse_rating)
        .ok_or(RelayError::BadRequest("Rating must be between 1 and 5"))?;

    let comment = body
        .get("comment")
        .and_then(coerce_string)
        .map(|c| truncate_chars(&c, MAX_COMMENT_CHARS))
        .unwrap_or_default();
    let comment = comment.trim();
    if comment.chars().count() < MIN_COMMENT_CHARS {
        return Err(RelayError::BadRequest("Comment too short"));
    }

    let user_id = body
        .get("userId")
        .and_then(coerce_string)
        .filter(|id| USER_ID_RE.is_match(id))
        .ok_or(RelayError::BadRequest("Invalid user ID"))?;

    let username = bounded_or_empty(body.get("username"), MAX_USERNAME_CHARS);
    let thumbnail = bounded(body.get("avatarUrl"), MAX_URL_CHARS).map(|url| Thumbnail { url });

    let embed = Embed {
        title: Some(REVIEW_TITLE.to_string()),
        description: None,
        color: REVIEW_COLOR,
        thumbnail,
        fields: vec![
            EmbedField {
                name: "Utilisateur".to_string(),
                value: username,
                inline: true,
            },
            EmbedField {
                name: "ID".to_string(),
                value: user_id,
                inline: true,
            },
            EmbedField {
                name: "Note".to_string(),
                value: STAR.repeat(rating as usize),
                inline: true,
            },
            EmbedField {
                name: "Commentaire".to_string(),
                value: comment.to_string(),
                inline: false,
            },
        ],
        timestamp: server_timestamp(),
    };

    Ok(WebhookMessage {
        content: Some(REVIEW_BANNER.to_string()),
        embeds: vec![embed],
    })
}

fn parse_rating(value: &Value) -> Option<u8> {
    let rating = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (1..=5).contains(&rating).then_some(rating as u8)
}

fn color(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .filter(|c| *c <= MAX_COLOR as u64)
        .map(|c| c as u32)
        .unwrap_or(0)
}

/// JavaScript-style truthiness.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn bounded(value: Option<&Value>, max: usize) -> Option<String> {
    value
        .filter(|v| is_truthy(v))
        .and_then(coerce_string)
        .map(|s| truncate_chars(&s, max))
}

fn bounded_or_empty(value: Option<&Value>, max: usize) -> String {
    bounded(value, max).unwrap_or_default()
}
