use serde::Deserialize;

/// Envelope returned by the remote face verification endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub data: VerifyData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyData {
    #[serde(default)]
    pub verified: bool,
    /// "match" | "no_match"
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub liveness_score: f32,
    #[serde(default)]
    pub matches: Vec<MatchEntry>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchEntry {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Match,
    NoMatch,
}

#[derive(Debug, Clone)]
pub struct MatchedEmployee {
    pub id: String,
    pub name: String,
    pub confidence: f32,
}

/// The orchestrator-facing view of one verification response. Owned
/// transiently during result interpretation and discarded afterwards.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub verified: bool,
    pub status: MatchStatus,
    pub liveness_score: f32,
    pub matched: Option<MatchedEmployee>,
    pub message: Option<String>,
}

impl VerifyResponse {
    pub fn into_result(self) -> VerificationResult {
        let data = self.data;
        let status = if data.status == "match" {
            MatchStatus::Match
        } else {
            MatchStatus::NoMatch
        };
        let matched = data.matches.into_iter().next().map(|m| MatchedEmployee {
            id: m.user_id,
            name: m.user_name,
            confidence: m.confidence,
        });

        VerificationResult {
            verified: data.verified,
            status,
            liveness_score: data.liveness_score,
            matched,
            message: data.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_match_response() {
        let json = r#"{
            "code": 200,
            "data": {
                "verified": true,
                "status": "match",
                "liveness_score": 0.92,
                "matches": [
                    { "user_id": "e42", "user_name": "Dana Tran", "confidence": 0.97 }
                ]
            }
        }"#;

        let response: VerifyResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result();

        assert!(result.verified);
        assert_eq!(result.status, MatchStatus::Match);
        assert!((result.liveness_score - 0.92).abs() < 1e-6);
        let matched = result.matched.unwrap();
        assert_eq!(matched.id, "e42");
        assert_eq!(matched.name, "Dana Tran");
    }

    #[test]
    fn parses_no_match_response() {
        let json = r#"{
            "code": 200,
            "data": {
                "verified": false,
                "status": "no_match",
                "liveness_score": 0.4,
                "matches": [],
                "message": "Face not enrolled"
            }
        }"#;

        let response: VerifyResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result();

        assert!(!result.verified);
        assert_eq!(result.status, MatchStatus::NoMatch);
        assert!(result.matched.is_none());
        assert_eq!(result.message.as_deref(), Some("Face not enrolled"));
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let json = r#"{ "data": { "verified": false } }"#;
        let response: VerifyResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result();

        assert_eq!(result.status, MatchStatus::NoMatch);
        assert_eq!(result.liveness_score, 0.0);
        assert!(result.matched.is_none());
        assert!(result.message.is_none());
    }
}
