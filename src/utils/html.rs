// src/utils/html.rs

/// Sanitizes staff-authored exam text (titles, descriptions, prompts)
/// before it is stored and later rendered in the candidate's browser.
///
/// Safe formatting tags such as <b> or <p> survive; <script>, <iframe> and
/// event-handler attributes are stripped. The result is HTML, so plain-text
/// `&`, `<` and `>` come back escaped (`A & B` is stored as `A &amp; B`) and
/// clients must render these fields as HTML, not as text.
///
/// Answer options and answer keys are NOT passed through here, since grading
/// compares them byte for byte.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
