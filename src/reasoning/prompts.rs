//! The three reasoning prompts used anywhere in the engine, centralized so
//! regressions are testable and no subsystem hand-builds a prompt inline.

const MAX_OUTPUT_PREVIEW: usize = 2000;

/// "Given prompt P and command C (with synopsis S), explain in one sentence
/// why C is relevant."
pub fn selection_rationale_prompt(prompt: &str, command_name: &str, synopsis: &str) -> String {
    format!(
        "A user described this problem: \"{prompt}\"\n\
         Candidate command: `{command_name}` — {synopsis}\n\
         In one sentence, explain why this command is relevant to the user's problem."
    )
}

/// "Given upstream command A and downstream command B connected by
/// {pipe|sequence}, explain what data flows and what B does with it."
pub fn edge_rationale_prompt(from: &str, to: &str, kind: &str) -> String {
    format!(
        "Upstream command `{from}` is connected to downstream command `{to}` by a {kind} edge.\n\
         In one sentence, explain what data flows between them (if any) and what `{to}` does with it."
    )
}

/// "Given command C and its output O (truncated), explain in one sentence
/// what this tells the user about their problem."
pub fn interpretation_prompt(command: &str, output: &str) -> String {
    let preview = truncate_chars(output, MAX_OUTPUT_PREVIEW);
    format!(
        "Command `{command}` produced this output:\n{preview}\n\
         In one sentence, explain what this tells the user about their problem."
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max).collect();
    truncated.push_str("...[truncated]");
    truncated
}
