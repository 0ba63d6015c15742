//! Recommendation generation
//!
//! One score-banded headline first, then signal-specific tips in a fixed
//! order: sleep, typing latency, reaction time.

use crate::types::RawSignals;

const HIGH_FATIGUE_SCORE: f64 = 60.0;
const MODERATE_FATIGUE_SCORE: f64 = 30.0;

const MIN_SLEEP_HOURS: f64 = 7.0;
const MAX_TYPING_LATENCY_MS: f64 = 200.0;
const MAX_REACTION_TIME_MS: f64 = 400.0;

/// Maps a score and raw signals to advice strings
pub struct RecommendationGenerator;

impl RecommendationGenerator {
    pub fn recommend(score: f64, raw: &RawSignals) -> Vec<String> {
        let mut recommendations: Vec<&str> = Vec::new();

        if score >= HIGH_FATIGUE_SCORE {
            recommendations.push("High fatigue detected - consider taking a rest day");
            recommendations.push("Prioritize recovery and hydration");
        } else if score >= MODERATE_FATIGUE_SCORE {
            recommendations.push("Moderate fatigue - consider reducing workout intensity");
            recommendations.push("Ensure adequate sleep and nutrition");
        } else {
            recommendations.push("Low fatigue levels - you're well recovered");
        }

        if sleep_proxy(raw) < MIN_SLEEP_HOURS {
            recommendations.push("Aim for 7-9 hours of sleep for optimal recovery");
        }
        if raw.avg_latency > MAX_TYPING_LATENCY_MS {
            recommendations.push("Elevated typing latency detected - monitor your cognitive load");
        }
        if raw.reaction_time > MAX_REACTION_TIME_MS {
            recommendations.push("Slower reaction times observed - ensure adequate rest");
        }

        recommendations.into_iter().map(String::from).collect()
    }
}

/// Answered sleep hours, else the answers mean, else 0
fn sleep_proxy(raw: &RawSignals) -> f64 {
    raw.sleep_hours.or(raw.answers_mean).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rested() -> RawSignals {
        RawSignals {
            answers_mean: Some(8.0),
            answers_count: 3,
            sleep_hours: Some(8.0),
            avg_latency: 100.0,
            reaction_time: 250.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_headline_bands() {
        assert_eq!(RecommendationGenerator::recommend(75.0, &rested()).len(), 2);
        assert_eq!(
            RecommendationGenerator::recommend(60.0, &rested())[0],
            "High fatigue detected - consider taking a rest day"
        );
        assert_eq!(
            RecommendationGenerator::recommend(30.0, &rested())[0],
            "Moderate fatigue - consider reducing workout intensity"
        );
        assert_eq!(
            RecommendationGenerator::recommend(29.99, &rested()),
            vec!["Low fatigue levels - you're well recovered".to_string()]
        );
    }

    #[test]
    fn test_tips_follow_headline_in_fixed_order() {
        let raw = RawSignals {
            sleep_hours: Some(5.0),
            avg_latency: 250.0,
            reaction_time: 450.0,
            ..rested()
        };
        let recs = RecommendationGenerator::recommend(10.0, &raw);

        assert_eq!(
            recs,
            vec![
                "Low fatigue levels - you're well recovered".to_string(),
                "Aim for 7-9 hours of sleep for optimal recovery".to_string(),
                "Elevated typing latency detected - monitor your cognitive load".to_string(),
                "Slower reaction times observed - ensure adequate rest".to_string(),
            ]
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        let raw = RawSignals {
            sleep_hours: Some(7.0),
            avg_latency: 200.0,
            reaction_time: 400.0,
            ..rested()
        };
        assert_eq!(RecommendationGenerator::recommend(10.0, &raw).len(), 1);
    }

    #[test]
    fn test_sleep_proxy_fallbacks() {
        let by_mean = RawSignals {
            sleep_hours: None,
            answers_mean: Some(4.0),
            ..rested()
        };
        assert_eq!(sleep_proxy(&by_mean), 4.0);
        assert_eq!(sleep_proxy(&RawSignals::default()), 0.0);
    }
}
