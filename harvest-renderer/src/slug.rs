//! Title recovery from a document's URL slug.
//!
//! `getting-started-setting-up-appstream-2-0` → `Getting Started Setting Up AppStream 2.0`

const ACRONYMS: &[&str] = &["ai", "ml", "api", "aws", "iam", "ec2", "s3", "vpc", "euc", "vdi"];

const PRODUCT_NAMES: &[(&str, &str)] = &[
    ("appstream", "AppStream"),
    ("workspaces", "WorkSpaces"),
    ("daas", "DaaS"),
];

/// Build a display title from the last path segment of `locator`.
pub fn title_from_slug(locator: &str) -> String {
    let slug = locator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let mut words: Vec<String> = slug.split('-').map(str::to_string).collect();

    let mut title = Vec::with_capacity(words.len());
    for i in 0..words.len() {
        let word = words[i].clone();
        let lower = word.to_ascii_lowercase();
        if is_short_upper(&word) {
            title.push(word);
        } else if ACRONYMS.contains(&lower.as_str()) {
            title.push(word.to_ascii_uppercase());
        } else if let Some((_, name)) = PRODUCT_NAMES.iter().find(|(k, _)| *k == lower) {
            title.push((*name).to_string());
        } else if is_digits(&word) && words.get(i + 1).map(String::as_str) == Some("0") {
            title.push(format!("{word}.0"));
            words[i + 1].clear();
        } else if word.is_empty() {
            continue;
        } else {
            title.push(capitalize(&word));
        }
    }
    title.join(" ")
}

/// At least one cased character, none lowercase, four characters or fewer.
fn is_short_upper(word: &str) -> bool {
    word.chars().count() <= 4
        && word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase)
}

fn is_digits(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
