//! Default prompt text shown to the model

use crate::capabilities::CapabilityMatch;
use crate::tools::ToolSummary;

/// Default instructions describing the action grammar
pub const CAPABILITY_INSTRUCTIONS: &str = r#"**Using Capabilities**
You can reach external capabilities that perform specific tasks. Use them whenever they are relevant.

1. First try to answer from the information already in the conversation.
2. Prefer using a capability over saying "I can't do this."
3. To find capabilities, request an index:
   - Write `request:capabilities|QUERY_TEXT`.
   - Replace `QUERY_TEXT` with a description of the capability you need.
4. To run a capability, write `use capability:NAME|ACTION|{"key": "value"}` with a JSON object of arguments.
5. To run one of your own tools, write `use tool:NAME|ACTION|{"key": "value"}`.
6. Only state a limitation when no capability exists for it.

**Rules**:
- Never assume a task is impossible before checking capabilities.
- Follow the formats above exactly; issue at most one command per message.
- Execute the proposed action in the same message that proposes it.
- If the task cannot be finished in one message, end the message with `[CAN I CONTINUE?]`.

**Example**:
User: "Fetch the latest README.md from the project repository."
Context: "No capability for reading repository files has been listed."
Response: "request:capabilities|Read a file from a git repository."
"#;

/// Render search hits as an advertisement block for the model
pub fn format_capabilities(matches: &[CapabilityMatch]) -> String {
    if matches.is_empty() {
        return "No matching capabilities found.".to_string();
    }

    let mut out = String::from("Available capabilities:\n");
    for hit in matches {
        out.push_str(&format!("- {}: {}\n", hit.name, hit.description));
        if !hit.instruction.is_empty() {
            out.push_str(&format!("  Usage: {}\n", hit.instruction));
        }
    }
    out
}

/// Render the agent's own tools
pub fn format_tools(tools: &[ToolSummary]) -> String {
    let mut out = String::from("Your tools:\n");
    for tool in tools {
        out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    out
}

/// Full system prompt: base instructions followed by the tool list, if any
pub fn system_prompt(base: &str, tools: &[ToolSummary]) -> String {
    if tools.is_empty() {
        base.to_string()
    } else {
        format!("{}\n{}", base.trim_end(), format_tools(tools))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_capabilities() {
        let block = format_capabilities(&[
            CapabilityMatch {
                name: "summarize".to_string(),
                description: "Summarize text".to_string(),
                instruction: "use capability:summarize|run|{\"text\": \"...\"}".to_string(),
                score: 0.9,
            },
            CapabilityMatch {
                name: "weather".to_string(),
                description: "Weather for a city".to_string(),
                instruction: String::new(),
                score: 0.1,
            },
        ]);

        assert!(block.starts_with("Available capabilities:"));
        assert!(block.contains("- summarize: Summarize text\n  Usage: use capability:summarize"));
        assert!(block.contains("- weather: Weather for a city\n"));
        assert!(!block.contains("Usage: \n"));
        assert_eq!(format_capabilities(&[]), "No matching capabilities found.");
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        assert_eq!(system_prompt("base", &[]), "base");

        let prompt = system_prompt(
            CAPABILITY_INSTRUCTIONS,
            &[ToolSummary {
                name: "search".to_string(),
                description: "Search the codebase".to_string(),
                tags: vec![],
            }],
        );
        assert!(prompt.contains("request:capabilities|QUERY_TEXT"));
        assert!(prompt.ends_with("- search: Search the codebase\n"));
    }
}
