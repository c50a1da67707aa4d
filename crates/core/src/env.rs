// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child environment assembly.
//!
//! The backend inherits either the whole supervisor environment or a
//! selective copy of named variables, with the effective `envs` entries
//! appended last so they win ties.

/// Assemble the environment for a backend child.
///
/// Entries without a `=` become variables with an empty value. The returned
/// list preserves order; consumers that apply entries sequentially get
/// last-wins semantics for duplicate names.
pub fn child_env(pass_all: bool, pass_envs: &[String], envs: &[String]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = if pass_all {
        std::env::vars().collect()
    } else {
        pass_envs
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
            .collect()
    };
    for entry in envs {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        merged.push((key.to_string(), value.to_string()));
    }
    merged
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
