use serde::{Deserialize, Serialize};

/// Counts of what a run created or confirmed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub resources: usize,
    pub actions: usize,
    pub roles: usize,
    pub resource_roles: usize,
    pub relations: usize,
    pub derived_roles: usize,
    pub url_mappings: usize,
}

/// Outcome of a processing run.
///
/// Non-empty `errors` means partial success: everything that could be
/// reconciled was, and each entry names what could not be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub summary: ProcessingSummary,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub execution_time_ms: u128,
}

impl ProcessingReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Generate a human-readable summary of the run
    pub fn summarize(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Resources: {}\n", self.summary.resources));
        summary.push_str(&format!("Actions: {}\n", self.summary.actions));
        summary.push_str(&format!("Roles: {}\n", self.summary.roles));
        summary.push_str(&format!("Resource roles: {}\n", self.summary.resource_roles));
        summary.push_str(&format!("Relations: {}\n", self.summary.relations));
        summary.push_str(&format!("Derived roles: {}\n", self.summary.derived_roles));
        summary.push_str(&format!("URL mappings: {}\n", self.summary.url_mappings));
        summary.push_str(&format!(
            "Errors: {}, warnings: {}\n",
            self.errors.len(),
            self.warnings.len()
        ));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let report = ProcessingReport {
            summary: ProcessingSummary {
                resources: 2,
                actions: 5,
                url_mappings: 5,
                ..ProcessingSummary::default()
            },
            errors: vec!["Failed to create action 'x'".to_string()],
            warnings: vec![],
            execution_time_ms: 12,
        };

        let text = report.summarize();
        assert!(text.contains("Resources: 2"));
        assert!(text.contains("URL mappings: 5"));
        assert!(text.contains("Errors: 1, warnings: 0"));
        assert!(!report.is_success());
    }
}
