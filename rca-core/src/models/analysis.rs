use serde::{Deserialize, Serialize};

/// Structured result of one LLM analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysis {
    #[serde(default)]
    pub errors: Vec<DetectedError>,
    #[serde(default)]
    pub possible_solutions: Vec<Solution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedError {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub error_message: String,
    #[serde(default = "unknown_error_type")]
    pub error_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Matches the `error_message` of the error this solution addresses
    pub error_message: String,
    #[serde(default)]
    pub immediate_fix: FixPlan,
    #[serde(default)]
    pub permanent_fix: FixPlan,
    #[serde(default)]
    pub preventive_measures: FixPlan,
    /// External links attached during enrichment
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

fn unknown_error_type() -> String {
    "UnknownError".to_string()
}

impl LogAnalysis {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line headline used for history listings.
    pub fn headline(&self) -> String {
        if self.is_clean() {
            return "No errors detected".to_string();
        }
        let first = &self.errors[0];
        let base = format!("{}: {}", first.error_type, first.error_message);
        match self.errors.len() {
            1 => base,
            n => format!("{} (+{} more)", base, n - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_default_to_empty() {
        let analysis: LogAnalysis = serde_json::from_str("{}").unwrap();
        assert!(analysis.is_clean());
        assert!(analysis.possible_solutions.is_empty());
        assert_eq!(analysis.headline(), "No errors detected");
    }

    #[test]
    fn test_solution_tolerates_missing_fix_sections() {
        let json = serde_json::json!({
            "errors": [{"timestamp": null, "error_message": "disk full"}],
            "possible_solutions": [{
                "error_message": "disk full",
                "immediate_fix": {"summary": "free space", "steps": ["rm /tmp/*.log"]}
            }]
        });
        let analysis: LogAnalysis = serde_json::from_value(json).unwrap();

        assert_eq!(analysis.errors[0].error_type, "UnknownError");
        assert_eq!(analysis.errors[0].timestamp, None);
        let solution = &analysis.possible_solutions[0];
        assert_eq!(solution.immediate_fix.steps, vec!["rm /tmp/*.log"]);
        assert!(solution.permanent_fix.summary.is_empty());
        assert!(solution.references.is_empty());
    }

    #[test]
    fn test_headline_counts_extra_errors() {
        let err = |msg: &str| DetectedError {
            timestamp: None,
            error_message: msg.to_string(),
            error_type: "SystemError".to_string(),
        };
        let analysis = LogAnalysis {
            errors: vec![err("oom killed"), err("restart loop"), err("probe failed")],
            possible_solutions: vec![],
        };
        assert_eq!(analysis.headline(), "SystemError: oom killed (+2 more)");

        let single = LogAnalysis {
            errors: vec![err("oom killed")],
            possible_solutions: vec![],
        };
        assert!(!single.is_clean());
        assert_eq!(single.headline(), "SystemError: oom killed");
    }
}
