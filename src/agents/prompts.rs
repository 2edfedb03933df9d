//! Prompt text for the stage agents.

use std::fmt::Write;

use super::{GenerationRequest, ReviewInput};
use crate::workflow::Stage;

const ENGINEER: &str = "You are a senior technical requirements engineer with expertise \
in software development and product management.";

/// Review criteria shared by every stage.
pub const RUBRIC: &[&str] = &[
    "complete",
    "consistent",
    "feasible",
    "non-contradictory",
    "prioritized with a priority level which should aim for an MVP implementation",
    "of a reasonable size which reflects the scope of the initial idea",
];

pub fn generator_system(stage: Stage) -> String {
    let task = match stage {
        Stage::Features => "derive the minimum set of features needed from the user's idea",
        Stage::TechStack => {
            "derive the minimum set of technology stack items needed to implement the \
             user's idea effectively. Prioritize current, well-documented technologies"
        }
        Stage::Tasks => {
            "break the idea down into the implementation tasks needed to cover every \
             use-case with the given tech stack"
        }
    };

    format!(
        "{ENGINEER}\nYour task is to {task}.\n\n\
         Reply with a JSON object of the form {{\"items\": [\"...\"]}} listing the {kind}, \
         most important first.",
        kind = stage.kind()
    )
}

pub fn generator_user(request: &GenerationRequest<'_>) -> String {
    let kind = request.stage.kind();
    let mut prompt = format!("I have the following idea:\n{}\n", request.idea);

    for (stage, items) in &request.context {
        let heading = match stage {
            Stage::Features => "The idea includes the following use-cases:",
            Stage::TechStack => "The project should be implemented using the following tech stack:",
            Stage::Tasks => "The following tasks were already planned:",
        };
        let _ = write!(prompt, "\n{heading}\n{}\n", numbered(items));
    }

    if !request.items.is_empty() {
        let _ = write!(
            prompt,
            "\nBased on the idea, the following {kind} have been identified already:\n{}\n",
            numbered(request.items)
        );
    }

    if let Some(change) = request.change_request {
        let _ = write!(prompt, "\nI want additional changes:\n{change}\n");
    }

    let _ = write!(prompt, "\nPlease list the {kind} of that idea!");
    prompt
}

pub fn reviewer_system(stage: Stage) -> String {
    let kind = stage.kind();
    let mut prompt = format!(
        "{ENGINEER}\nYou have the task to review a set of {kind} which were derived from a \
         user's idea.\n\nWhilst reviewing, you may request changes. Make sure the {kind} are:\n"
    );
    for criterion in RUBRIC {
        let _ = writeln!(prompt, "- {criterion}");
    }
    prompt.push_str(
        "Be thorough, realistic, and specific in your review.\n\n\
         Reply with a JSON object {\"approved\": bool, \"changes\": string}. Set approved to \
         true only when no changes are needed; otherwise describe the required changes.",
    );
    prompt
}

pub fn reviewer_user(input: &ReviewInput<'_>) -> String {
    format!(
        "I have created the following list of {kind}:\n{items}\n\n\
         Derived from the following idea of a person:\n{idea}\n\n\
         Please review these {kind} and propose changes if they would make sense, \
         or approve them.",
        kind = input.stage.kind(),
        items = numbered(input.items),
        idea = input.idea,
    )
}

/// `1. a\n2. b` listing.
pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_prompt_includes_upstream_context() {
        let features = vec!["Share recipes".to_string()];
        let stack = vec!["Rust".to_string(), "Postgres".to_string()];
        let request = GenerationRequest {
            stage: Stage::Tasks,
            idea: "recipe sharing app",
            items: &[],
            change_request: Some("split the API task"),
            context: vec![
                (Stage::Features, features.as_slice()),
                (Stage::TechStack, stack.as_slice()),
            ],
        };

        let prompt = generator_user(&request);

        assert!(prompt.contains("recipe sharing app"));
        assert!(prompt.contains("1. Share recipes"));
        assert!(prompt.contains("2. Postgres"));
        assert!(prompt.contains("split the API task"));
        assert!(prompt.ends_with("Please list the tasks of that idea!"));
    }

    #[test]
    fn test_reviewer_prompt_lists_rubric() {
        let prompt = reviewer_system(Stage::TechStack);
        for criterion in RUBRIC {
            assert!(prompt.contains(criterion));
        }
        assert!(prompt.contains("tech stack items"));
    }

    #[test]
    fn test_numbered() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(numbered(&items), "1. a\n2. b");
    }
}
