//! UI utilities for the client.

use std::io::Write;

/// Prompt shown by the line editor
pub fn prompt(member: &str) -> String {
    format!("{}> ", member)
}

/// Redisplay the prompt after printing room output
pub fn redisplay_prompt(member: &str) {
    print!("{}", prompt(member));
    std::io::stdout().flush().ok();
}

/// Print a block of room output followed by a fresh prompt
pub fn show(output: &str, member: &str) {
    print!("{}", output);
    redisplay_prompt(member);
}
