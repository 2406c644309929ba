//! Diagnostic context attached to reported events.

use problem_details::ProblemDocument;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key of the context block carrying the problem fields.
pub const PROBLEM_DETAILS_CONTEXT: &str = "problemDetails";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn is_zero(status: &u16) -> bool {
    *status == 0
}

/// Flattened projection of a problem document.
///
/// `title` is absent: it becomes the event message instead.
/// The problem type is keyed `problemType` because `type` is reserved inside
/// error-tracker context blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticContext {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub status: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub problem_type: String,
}

impl From<&ProblemDocument> for DiagnosticContext {
    fn from(problem: &ProblemDocument) -> Self {
        Self {
            detail: problem.detail.clone().unwrap_or_default(),
            status: problem.status.unwrap_or_default(),
            instance: problem.instance.clone().unwrap_or_default(),
            problem_type: problem.type_uri.clone().unwrap_or_default(),
        }
    }
}

impl DiagnosticContext {
    /// Context block as a JSON object, with the same omissions as `Serialize`.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.detail.is_empty() {
            map.insert("detail".to_owned(), Value::from(self.detail.as_str()));
        }
        if self.status != 0 {
            map.insert("status".to_owned(), Value::from(self.status));
        }
        if !self.instance.is_empty() {
            map.insert("instance".to_owned(), Value::from(self.instance.as_str()));
        }
        if !self.problem_type.is_empty() {
            map.insert(
                "problemType".to_owned(),
                Value::from(self.problem_type.as_str()),
            );
        }
        map
    }
}

/// Event message for a problem: its detail when non-empty, else its title.
#[must_use]
pub fn event_message(problem: &ProblemDocument) -> &str {
    problem
        .detail
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(&problem.title)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;

    #[test]
    fn title_and_status_only() {
        let problem =
            problem_details::decode(br#"{"title":"Internal Server Error","status":500}"#).unwrap();
        let context = DiagnosticContext::from(&problem);

        assert_eq!(
            context,
            DiagnosticContext {
                status: 500,
                ..Default::default()
            }
        );
        assert_eq!(serde_json::to_value(&context).unwrap(), json!({ "status": 500 }));
    }

    #[test]
    fn copies_every_field_but_title() {
        let problem = ProblemDocument::from_status(StatusCode::BAD_GATEWAY)
            .with_detail("upstream timed out")
            .with_instance("http://instance.example/");
        let context = DiagnosticContext::from(&problem);

        assert_eq!(
            serde_json::to_value(&context).unwrap(),
            json!({
                "detail": "upstream timed out",
                "status": 502,
                "instance": "http://instance.example/",
                "problemType": "about:blank",
            })
        );
    }

    #[test]
    fn empty_strings_are_omitted() {
        let mut problem = ProblemDocument::new("Oops").with_detail("");
        problem.instance = Some(String::new());
        let context = DiagnosticContext::from(&problem);

        assert!(context.to_map().is_empty());
        assert_eq!(serde_json::to_value(&context).unwrap(), json!({}));
    }

    #[test]
    fn to_map_matches_serialize() {
        let problem = ProblemDocument::from_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_detail("boom")
            .with_instance("/jobs/1");
        let context = DiagnosticContext::from(&problem);

        assert_eq!(
            Value::Object(context.to_map()),
            serde_json::to_value(&context).unwrap()
        );
    }

    #[test]
    fn message_prefers_detail() {
        let problem = ProblemDocument::new("Internal Server Error");
        assert_eq!(event_message(&problem), "Internal Server Error");

        let problem = problem.with_detail("some details");
        assert_eq!(event_message(&problem), "some details");

        let problem = ProblemDocument::new("Bad Request").with_detail("");
        assert_eq!(event_message(&problem), "Bad Request");
    }
}
