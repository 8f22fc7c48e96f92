use std::borrow::Cow;

const REDACTED: &str = "REDACTED";

/// JSON string fields whose values must never reach a log line.
const SECRET_FIELDS: [&str; 4] = ["access_token", "token", "password", "new_password"];

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

fn redact_bearer_tokens(text: String) -> String {
    let marker = "bearer ";
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = find_ascii_case_insensitive(rest, marker) {
        out.push_str(&rest[..idx + marker.len()]);
        rest = &rest[idx + marker.len()..];

        let mut consumed = 0;
        for ch in rest.chars() {
            if ch.is_whitespace() || ch == '"' || ch == '\'' || ch == ',' || ch == ';' {
                break;
            }
            consumed += ch.len_utf8();
        }
        if consumed > 0 {
            out.push_str(REDACTED);
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

// Replaces the string value of `"field": "..."` pairs. Non-string values are left alone.
fn redact_json_field(text: String, field: &str) -> String {
    let needle = format!("\"{field}\"");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(idx) = rest.find(&needle) {
        let after_key = idx + needle.len();
        out.push_str(&rest[..after_key]);
        rest = &rest[after_key..];

        let trimmed = rest.trim_start();
        let Some(after_colon) = trimmed.strip_prefix(':') else {
            continue;
        };
        let value = after_colon.trim_start();
        if !value.starts_with('"') {
            continue;
        }

        let prefix_len = rest.len() - value.len();
        out.push_str(&rest[..prefix_len]);
        out.push('"');

        let mut escaped = false;
        let mut end = None;
        for (i, ch) in value[1..].char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '"' => {
                    end = Some(i + 1);
                    break;
                }
                _ => {}
            }
        }

        out.push_str(REDACTED);
        match end {
            Some(end) => {
                out.push('"');
                rest = &value[end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let mut value = redact_bearer_tokens(input.to_string());
    for field in SECRET_FIELDS {
        value = redact_json_field(value, field);
    }

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
