//! Display names for checked nodes

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Name given to nodes whose exit country could not be determined
pub const UNRECOGNIZED: &str = "unrecognized";

/// Maps a country name to the final display name of a node
pub trait Renamer: Send + Sync {
    fn rename(&self, name: &str) -> String;
}

/// English country names (as found in MMDB databases) to ISO alpha-2 codes
static COUNTRY_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Argentina", "AR"),
        ("Australia", "AU"),
        ("Austria", "AT"),
        ("Brazil", "BR"),
        ("Canada", "CA"),
        ("China", "CN"),
        ("Finland", "FI"),
        ("France", "FR"),
        ("Germany", "DE"),
        ("Hong Kong", "HK"),
        ("India", "IN"),
        ("Indonesia", "ID"),
        ("Ireland", "IE"),
        ("Israel", "IL"),
        ("Italy", "IT"),
        ("Japan", "JP"),
        ("Macao", "MO"),
        ("Malaysia", "MY"),
        ("Netherlands", "NL"),
        ("Philippines", "PH"),
        ("Poland", "PL"),
        ("Russia", "RU"),
        ("Singapore", "SG"),
        ("South Korea", "KR"),
        ("Spain", "ES"),
        ("Sweden", "SE"),
        ("Switzerland", "CH"),
        ("Taiwan", "TW"),
        ("Thailand", "TH"),
        ("Turkey", "TR"),
        ("Ukraine", "UA"),
        ("United Arab Emirates", "AE"),
        ("United Kingdom", "GB"),
        ("United States", "US"),
        ("Vietnam", "VN"),
    ])
});

/// Regional indicator flag for a two letter country code
fn flag_emoji(code: &str) -> Option<String> {
    if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    code.bytes()
        .map(|b| char::from_u32(0x1F1E6 + u32::from(b - b'A')))
        .collect()
}

/// Prefixes known country names with their flag; other names pass through.
#[derive(Debug, Clone, Default)]
pub struct FlagRenamer;

impl Renamer for FlagRenamer {
    fn rename(&self, name: &str) -> String {
        match COUNTRY_CODES.get(name).and_then(|code| flag_emoji(code)) {
            Some(flag) => format!("{} {}", flag, name),
            None => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_emoji() {
        assert_eq!(flag_emoji("JP").as_deref(), Some("\u{1F1EF}\u{1F1F5}"));
        assert_eq!(flag_emoji("jp"), None);
        assert_eq!(flag_emoji("USA"), None);
    }

    #[test]
    fn test_rename_known_country() {
        assert_eq!(FlagRenamer.rename("Japan"), "\u{1F1EF}\u{1F1F5} Japan");
        assert_eq!(
            FlagRenamer.rename("United States"),
            "\u{1F1FA}\u{1F1F8} United States"
        );
    }

    #[test]
    fn test_rename_unknown_passes_through() {
        assert_eq!(FlagRenamer.rename(UNRECOGNIZED), UNRECOGNIZED);
        assert_eq!(FlagRenamer.rename("Atlantis"), "Atlantis");
        assert_eq!(FlagRenamer.rename(""), "");
    }

    #[test]
    fn test_rename_is_deterministic() {
        for name in ["Japan", "Germany", UNRECOGNIZED, "", "hk-01"] {
            assert_eq!(FlagRenamer.rename(name), FlagRenamer.rename(name));
        }
    }

    #[test]
    fn test_every_code_has_a_flag() {
        for code in COUNTRY_CODES.values() {
            assert!(flag_emoji(code).is_some(), "no flag for {}", code);
        }
    }
}
