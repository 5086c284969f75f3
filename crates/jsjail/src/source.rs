//! Clean-up of script text pasted from chat messages.

const FENCE: &str = "```";
const LANGUAGE_TAGS: [&str; 2] = ["javascript", "js"];

/// Strip a Markdown code fence around `input`, along with a `js` or
/// `javascript` language tag on the opening line.
///
/// Input that is not wrapped in a triple-backtick fence is returned with
/// surrounding whitespace trimmed and is otherwise untouched, so template
/// literals keep their backticks.
#[must_use]
pub fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(inner) = trimmed
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_suffix(FENCE))
    else {
        return trimmed;
    };

    for tag in LANGUAGE_TAGS {
        if let Some(rest) = inner.strip_prefix(tag)
            && rest.starts_with(['\n', '\r'])
        {
            return rest.trim();
        }
    }
    inner.trim()
}
