use chrono::{DateTime, Utc};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Short label for an avatar value, which is either a URL or inline base64 data
pub fn avatar_label(avatar: &str) -> String {
    let avatar = avatar.trim();
    if avatar.is_empty() {
        "-".to_string()
    } else if let Some(rest) = avatar.strip_prefix("data:") {
        // data:image/png;base64,....
        let mime = rest.split([';', ',']).next().unwrap_or("");
        if mime.is_empty() {
            "[inline]".to_string()
        } else {
            format!("[{}]", mime)
        }
    } else if let Ok(url) = reqwest::Url::parse(avatar) {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| url.host_str().map(str::to_string))
            .unwrap_or_else(|| avatar.to_string())
    } else {
        "[base64]".to_string()
    }
}

/// "Updated ... ago" style age of a timestamp
pub fn age_display(at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
