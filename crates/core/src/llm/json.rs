use crate::domain::idea::StockIdea;
use anyhow::Context;

/// Best-effort JSON recovery from model output: strips markdown fences, else
/// slices the outermost object or array (whichever opens first).
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let (start, end) = bracket_span(trimmed)?;
    Some(trimmed[start..=end].trim().to_string())
}

fn bracket_span(text: &str) -> Option<(usize, usize)> {
    let obj_start = text.find('{');
    let arr_start = text.find('[');
    let (start, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };
    let end = text.rfind(close)?;
    (end > start).then_some((start, end))
}

/// Parses a stock-ideas completion into the exact list the model emitted.
/// Any failure (malformed JSON, wrong shape) surfaces as an error mentioning
/// the parse failure; there is no retry or schema repair.
pub fn parse_ideas(text: &str) -> anyhow::Result<Vec<StockIdea>> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<Vec<StockIdea>>(&json_str)
        .with_context(|| format!("Failed to parse stock ideas response: {json_str}"))
}
