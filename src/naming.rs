//! URL slugs for posts and categories.
//!
//! Slugs are the output filename stems: `<blog>/<slug>.html` for posts and
//! `<blog>/category/<slug>.html` for categories. Titles are transliterated to
//! ASCII first, so accented and non-Latin titles still produce readable
//! slugs instead of empty ones:
//!
//! - `"Hello, World!"` → `hello-world`
//! - `"Café Olé"` → `cafe-ole`
//! - `"  Rust 2024: what's new?  "` → `rust-2024-what-s-new`

/// Convert a title into a lowercase ASCII slug.
///
/// Every character is transliterated with `deunicode`; ASCII letters,
/// digits and `_` are kept, and every other run of characters collapses into
/// a single `-`. Leading and trailing dashes never appear.
pub fn slugify(title: &str) -> String {
    let mut output = String::with_capacity(title.len());

    let mut need_dash = false;
    for ch in title.chars() {
        for b in deunicode::deunicode_char(ch).unwrap_or("-").bytes() {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => {
                    if need_dash {
                        output.push('-');
                        need_dash = false;
                    }
                    output.push(b.to_ascii_lowercase() as char);
                }
                _ => need_dash = !output.is_empty(),
            }
        }
    }

    output
}
