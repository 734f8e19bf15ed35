//! Pulling a JSON object out of free-form model output.

use serde::de::DeserializeOwned;

/// Removes a code fence wrapping the whole text, with or without a `json` tag.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```").and_then(|t| t.strip_suffix("```")) else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

/// Everything from the first `{` to the last `}`.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses model output as `T`, tolerating a surrounding code fence or prose
/// around the object.
pub fn parse_json_response<T: DeserializeOwned>(response_text: &str) -> Option<T> {
    let json = strip_code_fence(response_text.trim());

    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Failed to parse JSON response: {err}; raw text: {response_text:?}");
            let extracted = embedded_object(json)?;
            serde_json::from_str(extracted)
                .map_err(|err| {
                    log::error!(
                        "Failed to parse extracted JSON object: {err}; extracted text: {extracted:?}"
                    )
                })
                .ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn plain_object() {
        let value: Value = parse_json_response(r#" {"a": 1} "#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn fenced_object() {
        let text = "```json\n{\"a\": 2}\n```";
        let value: Value = parse_json_response(text).unwrap();
        assert_eq!(value["a"], 2);

        let untagged = "```\n{\"a\": 3}\n```";
        let value: Value = parse_json_response(untagged).unwrap();
        assert_eq!(value["a"], 3);
    }

    #[test]
    fn object_among_prose() {
        let text = "Sure! Here is your question:\n{\"a\": {\"b\": 4}}\nGood luck.";
        let value: Value = parse_json_response(text).unwrap();
        assert_eq!(value["a"]["b"], 4);
    }

    #[test]
    fn garbage() {
        assert!(parse_json_response::<Value>("no json here").is_none());
        assert!(parse_json_response::<Value>("} backwards {").is_none());
        assert!(parse_json_response::<Value>("{ not: valid }").is_none());
    }
}
