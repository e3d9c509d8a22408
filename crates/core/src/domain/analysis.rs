use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const COLOR_POSITIVE: &str = "#28a745";
pub const COLOR_NEUTRAL: &str = "#ffc107";
pub const COLOR_NEGATIVE: &str = "#dc3545";
pub const COLOR_DEFAULT: &str = "#6c757d";

/// Free-text analysis plus the advisory labels scraped out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub labels: LabelBadges,
}

impl AnalysisResult {
    pub fn from_text(text: String) -> Self {
        let labels = extract_labels(&text);
        Self { text, labels }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelBadges {
    pub sentiment: String,
    pub sentiment_color: &'static str,
    pub recommendation: String,
    pub recommendation_color: &'static str,
}

/// Best-effort label extraction from free-form model output. The model is
/// asked to state a sentiment and a recommendation but nothing enforces the
/// shape, so absence of a match is not an error: the field degrades to "N/A"
/// with the default badge color. Each keyword and its label must appear on
/// the same line; a label on a later line is not attributed to the keyword.
pub fn extract_labels(text: &str) -> LabelBadges {
    let sentiment = first_capture(sentiment_re(), text)
        .map(title_case)
        .unwrap_or_else(|| "N/A".to_string());
    let recommendation = first_capture(recommendation_re(), text)
        .map(title_case)
        .unwrap_or_else(|| "N/A".to_string());

    let sentiment_color = badge_color(&sentiment);
    let recommendation_color = badge_color(&recommendation);

    LabelBadges {
        sentiment,
        sentiment_color,
        recommendation,
        recommendation_color,
    }
}

pub fn badge_color(label: &str) -> &'static str {
    match label {
        "Positive" | "Buy" => COLOR_POSITIVE,
        "Neutral" | "Hold" => COLOR_NEUTRAL,
        "Negative" | "Sell" => COLOR_NEGATIVE,
        _ => COLOR_DEFAULT,
    }
}

fn sentiment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)sentiment.*?(positive|neutral|negative)").expect("sentiment pattern")
    })
}

fn recommendation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)recommend.*?(buy|hold|sell)").expect("recommendation pattern")
    })
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sentiment_and_recommendation() {
        let text = "Overall the sentiment is Positive given the steady climb.\n\
                    Recommendation: Buy.";
        let labels = extract_labels(text);
        assert_eq!(labels.sentiment, "Positive");
        assert_eq!(labels.sentiment_color, COLOR_POSITIVE);
        assert_eq!(labels.recommendation, "Buy");
        assert_eq!(labels.recommendation_color, COLOR_POSITIVE);
    }

    #[test]
    fn is_case_insensitive_and_title_cases_matches() {
        let text = "SENTIMENT leans NEGATIVE here; I would recommend you SELL.";
        let labels = extract_labels(text);
        assert_eq!(labels.sentiment, "Negative");
        assert_eq!(labels.sentiment_color, COLOR_NEGATIVE);
        assert_eq!(labels.recommendation, "Sell");
        assert_eq!(labels.recommendation_color, COLOR_NEGATIVE);
    }

    #[test]
    fn no_match_degrades_to_na_with_default_color() {
        let labels = extract_labels("no relevant words here");
        assert_eq!(labels.sentiment, "N/A");
        assert_eq!(labels.sentiment_color, COLOR_DEFAULT);
        assert_eq!(labels.recommendation, "N/A");
        assert_eq!(labels.recommendation_color, COLOR_DEFAULT);
    }

    #[test]
    fn labels_match_independently() {
        let labels = extract_labels("The sentiment is Neutral but no call to action.");
        assert_eq!(labels.sentiment, "Neutral");
        assert_eq!(labels.sentiment_color, COLOR_NEUTRAL);
        assert_eq!(labels.recommendation, "N/A");
        assert_eq!(labels.recommendation_color, COLOR_DEFAULT);
    }

    #[test]
    fn matches_do_not_cross_lines() {
        let text = "The sentiment remains unclear today.\n\
                    Separately, analysts feel positive about earnings.";
        let labels = extract_labels(text);
        assert_eq!(labels.sentiment, "N/A");
        assert_eq!(labels.sentiment_color, COLOR_DEFAULT);

        let text = "We recommend waiting for guidance.\nOthers would buy here.";
        let labels = extract_labels(text);
        assert_eq!(labels.recommendation, "N/A");
    }

    #[test]
    fn later_line_can_still_match_on_its_own() {
        let text = "Intro paragraph.\nSentiment: Positive.\nRecommendation: Hold.";
        let labels = extract_labels(text);
        assert_eq!(labels.sentiment, "Positive");
        assert_eq!(labels.recommendation, "Hold");
    }
}
