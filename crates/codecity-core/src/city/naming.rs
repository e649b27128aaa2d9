//! District names and colours, derived without any network call.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

pub const DISTRICT_COLORS: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8B500", "#00CED1", "#FF7F50", "#9ACD32", "#DA70D6",
];

/// Directory (or filename fragment) -> human label.
const KNOWN_PATTERNS: &[(&str, &str)] = &[
    ("api", "API Layer"),
    ("routes", "Routes"),
    ("controllers", "Controllers"),
    ("services", "Services"),
    ("service", "Services"),
    ("models", "Data Models"),
    ("model", "Data Models"),
    ("utils", "Utilities"),
    ("util", "Utilities"),
    ("helpers", "Helpers"),
    ("components", "Components"),
    ("views", "Views"),
    ("pages", "Pages"),
    ("auth", "Authentication"),
    ("config", "Configuration"),
    ("middleware", "Middleware"),
    ("db", "Database"),
    ("database", "Database"),
    ("data", "Data Layer"),
    ("core", "Core"),
    ("lib", "Library"),
    ("common", "Common"),
    ("shared", "Shared"),
    ("tests", "Tests"),
    ("test", "Tests"),
    ("src", "Source"),
    ("app", "Application"),
    ("ui", "User Interface"),
    ("store", "State Management"),
    ("hooks", "Hooks"),
    ("types", "Type Definitions"),
    ("interfaces", "Interfaces"),
    ("schemas", "Schemas"),
    ("migrations", "Migrations"),
    ("handlers", "Handlers"),
    ("providers", "Providers"),
    ("factories", "Factories"),
    ("repositories", "Repositories"),
    ("entities", "Entities"),
    ("domain", "Domain"),
    ("infrastructure", "Infrastructure"),
    ("parsing", "Parsing"),
    ("graph", "Graph Analysis"),
    ("ai", "AI Features"),
];

/// Segments too generic to name a district after.
const GENERIC_SEGMENTS: &[&str] = &["src", "app", "lib"];

const FILENAME_SCAN_LIMIT: usize = 5;

pub fn district_color(index: usize) -> &'static str {
    DISTRICT_COLORS[index % DISTRICT_COLORS.len()]
}

fn known_label(segment: &str) -> Option<&'static str> {
    KNOWN_PATTERNS
        .iter()
        .find(|(pattern, _)| *pattern == segment)
        .map(|(_, label)| *label)
}

fn title_case(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most frequent directory segment; ties go to the segment seen first.
fn dominant_segment(file_ids: &[&str]) -> Option<String> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for id in file_ids {
        let mut parts: Vec<&str> = id.split('/').collect();
        parts.pop();
        for part in parts {
            let lowered = part.to_lowercase();
            if lowered.is_empty() || GENERIC_SEGMENTS.contains(&lowered.as_str()) {
                continue;
            }
            *counts.entry(lowered).or_insert(0) += 1;
        }
    }
    let max = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(segment, _)| segment)
}

/// `Module <n>` with `n` in `1..=99`, stable for a given member set.
pub fn placeholder_name(file_ids: &[&str]) -> String {
    let mut sorted: Vec<&str> = file_ids.to_vec();
    sorted.sort_unstable();
    let digest = Sha256::digest(sorted.join("\n").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("Module {}", 1 + u64::from_be_bytes(prefix) % 99)
}

/// Heuristic district name from member paths and file names.
pub fn district_name(file_ids: &[&str], file_names: &[&str]) -> String {
    if let Some(segment) = dominant_segment(file_ids) {
        return known_label(&segment)
            .map(str::to_string)
            .unwrap_or_else(|| title_case(&segment));
    }

    for name in file_names.iter().take(FILENAME_SCAN_LIMIT) {
        let lowered = name.to_lowercase();
        if let Some((_, label)) = KNOWN_PATTERNS
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern))
        {
            return (*label).to_string();
        }
    }

    placeholder_name(file_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        assert_eq!(DISTRICT_COLORS.len(), 15);
        assert_eq!(district_color(0), "#FF6B6B");
        assert_eq!(district_color(15), "#FF6B6B");
        assert_eq!(district_color(16), "#4ECDC4");
    }

    #[test]
    fn test_known_directory_label() {
        let ids = ["src/services/user.py", "src/services/order.py", "src/models/user.py"];
        assert_eq!(district_name(&ids, &["user.py", "order.py", "user.py"]), "Services");
        let ids = ["backend/auth/login.py", "backend/auth/token.py", "auth/session.py"];
        assert_eq!(district_name(&ids, &[]), "Authentication");
    }

    #[test]
    fn test_unknown_directory_title_cased() {
        let ids = ["payment_gateway/stripe.go", "payment_gateway/paypal.go"];
        assert_eq!(district_name(&ids, &[]), "Payment Gateway");
        assert_eq!(district_name(&["order-book/x.ts"], &[]), "Order Book");
    }

    #[test]
    fn test_generic_segments_and_filename_scan() {
        // only generic segments, fall back to file names
        let ids = ["src/user_service.py", "app/main.py"];
        assert_eq!(district_name(&ids, &["user_service.py", "main.py"]), "Services");
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        let a = district_name(&["zzz.py", "qqq.py"], &["zzz.py", "qqq.py"]);
        let b = district_name(&["qqq.py", "zzz.py"], &["qqq.py", "zzz.py"]);
        assert_eq!(a, b);
        assert!(a.starts_with("Module "));
        let n: u64 = a["Module ".len()..].parse().unwrap();
        assert!((1..=99).contains(&n));
    }

    #[test]
    fn test_tie_goes_to_first_segment() {
        let ids = ["alpha/a.py", "beta/b.py"];
        assert_eq!(district_name(&ids, &[]), "Alpha");
    }
}
