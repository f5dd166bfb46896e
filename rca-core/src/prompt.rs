//! Prompt rendering and reply parsing for the RCA analysis step.

use std::sync::OnceLock;

use regex::Regex;

use crate::llm::LlmError;
use crate::models::LogAnalysis;

const LOG_PLACEHOLDER: &str = "{log_text}";

pub const ANALYSIS_PROMPT: &str = r#"You are an expert Root Cause Analysis (RCA) analyst for technical systems.

Your task is to analyze log entries and identify errors and their solutions.

ANALYSIS STEPS:
1. Identify all error events in the log
2. For each error, determine the error type (ApplicationError, SystemError, ConfigError, TimeoutError, etc.)
3. Provide solutions with immediate_fix, permanent_fix, and preventive_measures

REQUIRED OUTPUT FORMAT - Return ONLY valid JSON:
{
  "errors": [
    {
      "timestamp": "timestamp or null",
      "error_message": "clear summary of error",
      "error_type": "ApplicationError|SystemError|ConfigError|TimeoutError|etc"
    }
  ],
  "possible_solutions": [
    {
      "error_message": "same as matching error_message above",
      "immediate_fix": {
        "summary": "short overview of immediate fix",
        "steps": ["Step 1 with explanation", "Step 2 with explanation"]
      },
      "permanent_fix": {
        "summary": "short overview of permanent fix",
        "steps": ["Code/config change with justification", "Testing or validation step"]
      },
      "preventive_measures": {
        "summary": "short overview of prevention",
        "steps": ["Monitoring or alerting setup", "Process improvement"]
      }
    }
  ]
}

RULES:
- Use only factual evidence from the logs
- If no errors are found, return empty arrays for errors and possible_solutions
- Output ONLY the JSON structure above, no additional text

Now analyze this log:

{log_text}

Remember to return ONLY valid JSON in the specified format above.
"#;

/// Substitute the submitted log into the analysis prompt verbatim.
pub fn render(log_text: &str) -> String {
    ANALYSIS_PROMPT.replacen(LOG_PLACEHOLDER, log_text, 1)
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)```").expect("fence regex is valid")
    })
}

/// Parse a model reply into a `LogAnalysis`.
///
/// Accepts bare JSON, JSON inside a Markdown code fence, or JSON surrounded by
/// prose. In the last case the first balanced top-level object is used.
pub fn parse_reply(reply: &str) -> Result<LogAnalysis, LlmError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let body = fence_regex()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    let candidate = first_json_object(body)
        .ok_or_else(|| LlmError::InvalidResponse("no JSON object found in reply".to_string()))?;

    serde_json::from_str(candidate).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

/// Slice of `text` covering the first balanced `{ ... }`, skipping braces inside strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "errors": [
            {"timestamp": "2025-10-12T08:01:02Z", "error_message": "Connection refused to db:5432", "error_type": "SystemError"}
        ],
        "possible_solutions": [
            {
                "error_message": "Connection refused to db:5432",
                "immediate_fix": {"summary": "Restart the database", "steps": ["systemctl restart postgresql"]},
                "permanent_fix": {"summary": "Add health checks", "steps": []},
                "preventive_measures": {"summary": "Alert on refused connections", "steps": []}
            }
        ]
    }"#;

    #[test]
    fn test_render_substitutes_log_verbatim() {
        let log = "2025-10-12 ERROR {weird} braces stay";
        let prompt = render(log);
        assert!(prompt.contains(log));
        assert!(!prompt.contains(LOG_PLACEHOLDER));
    }

    #[test]
    fn test_parse_bare_json() {
        let analysis = parse_reply(REPLY).unwrap();
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].error_type, "SystemError");
        assert_eq!(
            analysis.possible_solutions[0].immediate_fix.steps,
            vec!["systemctl restart postgresql"]
        );
    }

    #[test]
    fn test_fenced_reply_parses_like_bare_json() {
        let fenced = format!("Here is the analysis:\n```json\n{REPLY}\n```\nLet me know!");
        assert_eq!(parse_reply(&fenced).unwrap(), parse_reply(REPLY).unwrap());
    }

    #[test]
    fn test_prose_wrapped_reply_uses_first_object() {
        let wrapped = format!("Sure! {REPLY} Hope that helps {{not json}}");
        assert_eq!(parse_reply(&wrapped).unwrap(), parse_reply(REPLY).unwrap());
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let reply = r#"{"errors": [{"error_message": "unexpected '}' in \"cfg\"", "error_type": "ConfigError"}]}"#;
        let analysis = parse_reply(reply).unwrap();
        assert_eq!(analysis.errors[0].error_message, "unexpected '}' in \"cfg\"");
    }

    #[test]
    fn test_empty_arrays_mean_no_errors() {
        let analysis = parse_reply(r#"{"errors": [], "possible_solutions": []}"#).unwrap();
        assert!(analysis.is_clean());
    }

    #[test]
    fn test_non_json_reply_is_rejected() {
        assert!(matches!(
            parse_reply("I could not find any problems."),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(parse_reply("   "), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        assert!(matches!(
            parse_reply(r#"{"errors": "none"}"#),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
