//! Display anchors for deep links and "next unvoted" navigation

use std::collections::HashSet;

/// Lower-case `value` and collapse every run of characters outside `a-z0-9`
/// into a single `-`, trimming dashes at both ends
pub fn normalize_key(value: &str) -> String {
    let mut key = String::with_capacity(value.len());
    for c in value.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            key.push(c);
        } else if !key.is_empty() && !key.ends_with('-') {
            key.push('-');
        }
    }
    while key.ends_with('-') {
        key.pop();
    }
    key
}

/// Hands out unique anchors in encounter order
///
/// The first use of a base is returned as-is; repeats get `-2`, `-3`, ...
#[derive(Debug, Default)]
pub struct AnchorAllocator {
    used: HashSet<String>,
}

impl AnchorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let mut anchor = base.to_string();
        let mut suffix = 2;
        while self.used.contains(&anchor) {
            anchor = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        self.used.insert(anchor.clone());
        anchor
    }
}
