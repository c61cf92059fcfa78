use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex_syntax::hir::{Class, HirKind};

use crate::errors::RegexError;
use crate::ranges::{RangeSet, Rune};

const SURROGATE_LO: Rune = 0xD800;
const SURROGATE_HI: Rune = 0xDFFF;

// Process-wide registry of named classes, filled on first lookup.
static REGISTRY: Lazy<Mutex<HashMap<String, RangeSet>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Resolves a Unicode class name as used by `\p{Name}`: a two-letter general
/// category (`Lu`, `Nd`, ...), a script (`Greek`, `Canadian_Aboriginal`, ...)
/// or the pseudo-class `letter` covering `Lu Ll Lt Lm Lo`.
pub fn class_ranges(name: &str) -> Result<RangeSet, RegexError> {
    if let Some(set) = REGISTRY.lock().unwrap().get(name) {
        return Ok(set.clone());
    }
    let set = resolve(name)?;
    REGISTRY
        .lock()
        .unwrap()
        .insert(name.to_string(), set.clone());
    Ok(set)
}

fn resolve(name: &str) -> Result<RangeSet, RegexError> {
    let unknown = || RegexError::UnknownClass {
        name: name.to_string(),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(unknown());
    }
    // char-based tables cannot carry the surrogate category
    if name == "Cs" {
        return Ok(RangeSet::of(SURROGATE_LO, SURROGATE_HI));
    }
    let query = if name == "letter" { "L" } else { name };
    let hir = regex_syntax::Parser::new()
        .parse(&format!(r"\p{{{}}}", query))
        .map_err(|_| unknown())?;
    match hir.kind() {
        HirKind::Class(Class::Unicode(class)) => {
            let mut set = RangeSet::new();
            for range in class.ranges() {
                set.push(range.start() as Rune, range.end() as Rune);
            }
            set.normalize();
            Ok(set)
        }
        _ => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greek_script() {
        let set = class_ranges("Greek").unwrap();
        assert!(set.contains(0x3B1)); // α
        assert!(set.contains(0x3B2)); // β
        assert!(!set.contains(0x41)); // A
    }

    #[test]
    fn decimal_number_category() {
        let set = class_ranges("Nd").unwrap();
        assert!(set.contains('0' as Rune));
        assert!(set.contains('9' as Rune));
        assert!(!set.contains('a' as Rune));
    }

    #[test]
    fn letter_pseudo_class() {
        let set = class_ranges("letter").unwrap();
        assert!(set.contains('A' as Rune));
        assert!(set.contains('z' as Rune));
        assert!(set.contains(0x3BB)); // λ
        assert!(!set.contains('0' as Rune));
    }

    #[test]
    fn surrogate_category() {
        let set = class_ranges("Cs").unwrap();
        assert!(set.contains(0xD800));
        assert!(set.contains(0xDFFF));
        assert!(!set.contains(0xE000));
    }

    #[test]
    fn unknown_class_rejected() {
        assert_eq!(
            class_ranges("Nonexistent").unwrap_err(),
            RegexError::UnknownClass {
                name: "Nonexistent".to_string()
            }
        );
    }

    #[test]
    fn malformed_name_rejected() {
        assert!(class_ranges("Gr{eek").is_err());
        assert!(class_ranges("").is_err());
    }

    #[test]
    fn lookups_are_cached() {
        let first = class_ranges("Han").unwrap();
        let second = class_ranges("Han").unwrap();
        assert_eq!(first, second);
    }
}
