//! Response aggregation

use std::collections::BTreeMap;

/// Merges agent contributions into one answer
pub trait ResponseAggregator: Send + Sync {
    fn synthesize(&self, contributions: &BTreeMap<String, String>, issues: &[String]) -> String;
}

/// One section per agent, with a review note when issues were found
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionAggregator;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

impl ResponseAggregator for SectionAggregator {
    fn synthesize(&self, contributions: &BTreeMap<String, String>, issues: &[String]) -> String {
        let mut response = if contributions.len() == 1 {
            contributions.values().next().cloned().unwrap_or_default()
        } else {
            contributions
                .iter()
                .map(|(agent, content)| format!("## {}\n\n{}", display_name(agent), content))
                .collect::<Vec<_>>()
                .join(SECTION_SEPARATOR)
        };

        if !issues.is_empty() {
            response.push_str(SECTION_SEPARATOR);
            response.push_str("**Note**: This response has been flagged for review.");
            response.push_str("\n\nIssues found:\n");
            let list: Vec<String> = issues.iter().map(|issue| format!("- {}", issue)).collect();
            response.push_str(&list.join("\n"));
        }

        response
    }
}

/// `technical_specialist` -> `Technical Specialist`
pub fn display_name(agent: &str) -> String {
    agent
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
