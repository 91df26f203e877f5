//! Artifact extraction from free-form model output.
//!
//! Models are asked for JSON-only replies but routinely wrap the object in
//! prose or markdown fences. The extractor locates the first balanced
//! top-level `{…}` block, parses it, and maps it onto the round's typed
//! artifact. A `None` return is an extraction failure - the orchestrator
//! treats it as an agent failure for that round, never as a silent misshape.
//!
//! Required key per round: `position` (R1), `consensus_points` (R2),
//! `challenges` (R3), `recommendation` (R4). Missing arrays coerce to
//! empty; confidence values are clamped to [0, 1].

use crate::consult::artifact::{
    Challenge, ConsensusPoint, CrossExamArtifact, Dissent, IndependentArtifact, Rebuttal,
    Severity, SynthesisArtifact, Tension, VerdictArtifact, Viewpoint,
};
use serde_json::Value;

/// Locate and parse the first balanced top-level JSON object in `text`.
///
/// Scans with a depth counter, skipping over string literals and escapes,
/// so braces inside quoted values do not confuse the balance. Preamble and
/// postamble prose are tolerated.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..=i];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn f64_field(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn object_array<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter(|i| i.is_object()).collect())
        .unwrap_or_default()
}

/// Extract a Round 1 independent-position artifact.
///
/// Returns `None` when no JSON object is found or `position` is blank.
pub fn extract_independent(
    text: &str,
    agent_id: &str,
    created_at: &str,
) -> Option<IndependentArtifact> {
    let json = extract_json_object(text)?;

    let position = str_field(&json, "position");
    if position.trim().is_empty() {
        return None;
    }

    // A one-line excerpt of the surrounding prose, for human review
    let prose_excerpt = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('{') && !l.starts_with("```"))
        .unwrap_or("")
        .chars()
        .take(200)
        .collect();

    Some(IndependentArtifact {
        agent_id: agent_id.to_string(),
        round: 1,
        position,
        key_points: string_array(&json, "key_points"),
        rationale: str_field(&json, "rationale"),
        confidence: clamp01(f64_field(&json, "confidence")),
        prose_excerpt,
        created_at: created_at.to_string(),
    })
}

/// Extract the Round 2 synthesis artifact.
///
/// Returns `None` when `consensus_points` is missing or not an array.
pub fn extract_synthesis(text: &str) -> Option<SynthesisArtifact> {
    let json = extract_json_object(text)?;
    json.get("consensus_points")?.as_array()?;

    let consensus_points = object_array(&json, "consensus_points")
        .into_iter()
        .filter_map(|p| {
            let point = str_field(p, "point");
            if point.trim().is_empty() {
                return None;
            }
            Some(ConsensusPoint {
                point,
                supporting_agents: string_array(p, "supporting_agents"),
                confidence: clamp01(f64_field(p, "confidence")),
            })
        })
        .collect();

    let tensions = object_array(&json, "tensions")
        .into_iter()
        .filter_map(|t| {
            let topic = str_field(t, "topic");
            if topic.trim().is_empty() {
                return None;
            }
            let viewpoints = object_array(t, "viewpoints")
                .into_iter()
                .map(|v| Viewpoint {
                    agent_id: str_field(v, "agent_id"),
                    viewpoint: str_field(v, "viewpoint"),
                })
                .collect();
            Some(Tension { topic, viewpoints })
        })
        .collect();

    Some(SynthesisArtifact {
        round: 2,
        consensus_points,
        tensions,
        priority_order: string_array(&json, "priority_order"),
    })
}

/// Extract the Round 3 cross-examination artifact.
///
/// Returns `None` when `challenges` is missing or not an array.
pub fn extract_cross_exam(text: &str) -> Option<CrossExamArtifact> {
    let json = extract_json_object(text)?;
    json.get("challenges")?.as_array()?;

    let challenges = object_array(&json, "challenges")
        .into_iter()
        .filter_map(|c| {
            let challenge = str_field(c, "challenge");
            if challenge.trim().is_empty() {
                return None;
            }
            Some(Challenge {
                challenger: str_field(c, "challenger"),
                target: {
                    let t = str_field(c, "target");
                    if t.is_empty() { "Consensus".to_string() } else { t }
                },
                challenge,
                evidence: string_array(c, "evidence"),
            })
        })
        .collect();

    let rebuttals = object_array(&json, "rebuttals")
        .into_iter()
        .filter_map(|r| {
            let rebuttal = str_field(r, "rebuttal");
            if rebuttal.trim().is_empty() {
                return None;
            }
            Some(Rebuttal {
                agent: str_field(r, "agent"),
                rebuttal,
            })
        })
        .collect();

    Some(CrossExamArtifact {
        round: 3,
        challenges,
        rebuttals,
        unresolved: string_array(&json, "unresolved"),
    })
}

/// Extract the Round 4 verdict artifact.
///
/// Returns `None` when `recommendation` is missing or blank.
pub fn extract_verdict(text: &str) -> Option<VerdictArtifact> {
    let json = extract_json_object(text)?;

    let recommendation = str_field(&json, "recommendation");
    if recommendation.trim().is_empty() {
        return None;
    }

    let dissent = object_array(&json, "dissent")
        .into_iter()
        .filter_map(|d| {
            let concern = str_field(d, "concern");
            if concern.trim().is_empty() {
                return None;
            }
            Some(Dissent {
                agent: str_field(d, "agent"),
                concern,
                severity: str_field(d, "severity")
                    .parse()
                    .unwrap_or(Severity::Medium),
            })
        })
        .collect();

    Some(VerdictArtifact {
        round: 4,
        recommendation,
        confidence: clamp01(f64_field(&json, "confidence")),
        evidence: string_array(&json, "evidence"),
        dissent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_preamble_and_fences() {
        let text = r#"
Here is my position:

```json
{"position": "Use OAuth 2.0", "confidence": 0.9}
```

Let me know if you need more detail."#;
        let json = extract_json_object(text).unwrap();
        assert_eq!(json["position"], "Use OAuth 2.0");
    }

    #[test]
    fn test_extract_json_braces_inside_strings() {
        let text = r#"{"position": "use {braces} and \"quotes\"", "confidence": 1}"#;
        let json = extract_json_object(text).unwrap();
        assert_eq!(json["position"], "use {braces} and \"quotes\"");
    }

    #[test]
    fn test_extract_json_nested_objects() {
        let text = r#"noise {"a": {"b": {"c": 1}}, "d": 2} trailing {ignored"#;
        let json = extract_json_object(text).unwrap();
        assert_eq!(json["a"]["b"]["c"], 1);
    }

    #[test]
    fn test_extract_json_none_on_plain_text() {
        assert!(extract_json_object("no json here at all").is_none());
        assert!(extract_json_object("{truncated").is_none());
    }

    #[test]
    fn test_independent_happy_path() {
        let text = r#"{"position": "Use OAuth 2.0",
            "key_points": ["standard", "well-audited"],
            "rationale": "Mature ecosystem.",
            "confidence": 0.9}"#;
        let artifact =
            extract_independent(text, "SecExpert", "2026-08-01T00:00:00Z").unwrap();
        assert_eq!(artifact.agent_id, "SecExpert");
        assert_eq!(artifact.round, 1);
        assert_eq!(artifact.position, "Use OAuth 2.0");
        assert_eq!(artifact.key_points.len(), 2);
        assert_eq!(artifact.confidence, 0.9);
    }

    #[test]
    fn test_independent_confidence_clamped() {
        let text = r#"{"position": "x", "confidence": 7.5}"#;
        let artifact = extract_independent(text, "a", "t").unwrap();
        assert_eq!(artifact.confidence, 1.0);

        let text = r#"{"position": "x", "confidence": -2}"#;
        let artifact = extract_independent(text, "a", "t").unwrap();
        assert_eq!(artifact.confidence, 0.0);
    }

    #[test]
    fn test_independent_missing_position_fails() {
        assert!(extract_independent(r#"{"confidence": 0.9}"#, "a", "t").is_none());
        assert!(extract_independent(r#"{"position": "  "}"#, "a", "t").is_none());
        assert!(extract_independent("no json", "a", "t").is_none());
    }

    #[test]
    fn test_independent_missing_arrays_coerce_empty() {
        let artifact = extract_independent(r#"{"position": "x"}"#, "a", "t").unwrap();
        assert!(artifact.key_points.is_empty());
        assert_eq!(artifact.rationale, "");
        assert_eq!(artifact.confidence, 0.0);
    }

    #[test]
    fn test_synthesis_happy_path() {
        let text = r#"{
            "consensus_points": [
                {"point": "Use OAuth 2.0",
                 "supporting_agents": ["SecExpert", "Architect"],
                 "confidence": 0.95}
            ],
            "tensions": [
                {"topic": "Token lifetime",
                 "viewpoints": [
                     {"agent_id": "SecExpert", "viewpoint": "short"},
                     {"agent_id": "Pragmatist", "viewpoint": "long"}
                 ]}
            ],
            "priority_order": ["Token lifetime"]
        }"#;
        let artifact = extract_synthesis(text).unwrap();
        assert_eq!(artifact.consensus_points.len(), 1);
        assert_eq!(artifact.consensus_confidence(), 0.95);
        assert_eq!(artifact.tensions[0].viewpoints.len(), 2);
        assert_eq!(artifact.priority_order, vec!["Token lifetime"]);
    }

    #[test]
    fn test_synthesis_requires_consensus_points_key() {
        assert!(extract_synthesis(r#"{"tensions": []}"#).is_none());
        // Present-but-empty array is a valid (zero-consensus) synthesis
        let artifact = extract_synthesis(r#"{"consensus_points": []}"#).unwrap();
        assert!(artifact.consensus_points.is_empty());
    }

    #[test]
    fn test_cross_exam_happy_path() {
        let text = r#"{
            "challenges": [
                {"challenger": "SecExpert", "target": "Consensus",
                 "challenge": "Rotation cadence is unspecified",
                 "evidence": ["NIST 800-63"]}
            ],
            "rebuttals": [
                {"agent": "Architect", "rebuttal": "Covered by the KMS design"}
            ],
            "unresolved": ["Key escrow policy"]
        }"#;
        let artifact = extract_cross_exam(text).unwrap();
        assert_eq!(artifact.challenges.len(), 1);
        assert_eq!(artifact.challenges[0].target, "Consensus");
        assert_eq!(artifact.unresolved, vec!["Key escrow policy"]);
    }

    #[test]
    fn test_cross_exam_requires_challenges_key() {
        assert!(extract_cross_exam(r#"{"rebuttals": []}"#).is_none());
    }

    #[test]
    fn test_cross_exam_default_target_is_consensus() {
        let text = r#"{"challenges": [{"challenger": "a", "challenge": "why?"}]}"#;
        let artifact = extract_cross_exam(text).unwrap();
        assert_eq!(artifact.challenges[0].target, "Consensus");
    }

    #[test]
    fn test_verdict_happy_path() {
        let text = r#"{
            "_analysis": "weighing the positions...",
            "recommendation": "Use OAuth 2.0 with JWT",
            "confidence": 0.92,
            "evidence": ["standard"],
            "dissent": [
                {"agent": "Pragmatist", "concern": "migration cost", "severity": "low"}
            ]
        }"#;
        let artifact = extract_verdict(text).unwrap();
        assert_eq!(artifact.recommendation, "Use OAuth 2.0 with JWT");
        assert_eq!(artifact.confidence, 0.92);
        assert_eq!(artifact.dissent[0].severity, Severity::Low);
    }

    #[test]
    fn test_verdict_missing_recommendation_fails() {
        assert!(extract_verdict(r#"{"confidence": 0.9}"#).is_none());
        assert!(extract_verdict(r#"{"recommendation": ""}"#).is_none());
    }

    #[test]
    fn test_verdict_unknown_severity_defaults_medium() {
        let text = r#"{"recommendation": "r",
            "dissent": [{"agent": "a", "concern": "c", "severity": "catastrophic"}]}"#;
        let artifact = extract_verdict(text).unwrap();
        assert_eq!(artifact.dissent[0].severity, Severity::Medium);
    }
}
