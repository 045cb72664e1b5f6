//! Prompt construction for the error advisor.

/// Longest prompt handed to an advisor; longer prompts are cut.
pub const MAX_PROMPT_LEN: usize = 4096;

/// Describe a backend failure with the fixed advisor template.
pub fn failure_prompt(tool: &str, error: &str, task: &str) -> String {
    format!(
        "An Android device tool failed.\n\
         Tool: {tool}\n\
         Error: {error}\n\
         Task: {task}\n\
         Suggest concrete steps the technician can take to recover."
    )
}

/// Cut `prompt` to at most `max` bytes without splitting a character.
pub fn truncate_prompt(prompt: &str, max: usize) -> &str {
    if prompt.len() <= max {
        return prompt;
    }
    let mut end = max;
    while !prompt.is_char_boundary(end) {
        end -= 1;
    }
    &prompt[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_prompt_carries_all_fields() {
        let prompt = failure_prompt("adb", "model property empty", "quarry device ABC123");
        assert!(prompt.contains("Tool: adb\n"));
        assert!(prompt.contains("Error: model property empty\n"));
        assert!(prompt.contains("Task: quarry device ABC123\n"));
    }

    #[test]
    fn test_truncate_prompt() {
        assert_eq!(truncate_prompt("short", 10), "short");
        assert_eq!(truncate_prompt("abcdef", 3), "abc");
        // 'é' is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_prompt("aé", 2), "a");
    }
}
