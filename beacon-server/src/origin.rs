//! Origin allow-list matching for the upgrade gate. Each configured
//! pattern is anchored, with `*` standing for any run of characters.

use regex::Regex;

pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let anchored = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
            Regex::new(&anchored).ok()
        })
        .collect()
}

pub fn is_allowed(origin: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|pattern| pattern.is_match(origin))
}
