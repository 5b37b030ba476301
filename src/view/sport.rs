use serde::Serialize;

/// Icon family shown next to a sport in navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SportIcon {
    Football,
    Basketball,
    Tennis,
}

pub fn icon_for_sport(name: &str) -> SportIcon {
    let k = name.to_lowercase();
    if k.contains("foot") || k.contains("soccer") {
        SportIcon::Football
    } else if k.contains("basket") {
        SportIcon::Basketball
    } else if k.contains("tennis") {
        SportIcon::Tennis
    } else {
        SportIcon::Football
    }
}

/// Football/soccer under any of the names the feed uses for it.
pub fn is_primary_sport(name: &str) -> bool {
    let k = name.to_lowercase();
    ["football", "soccer", "fudbal", "futbol", "premier"]
        .iter()
        .any(|needle| k.contains(needle))
}

pub fn is_basketball(name: &str) -> bool {
    name.to_lowercase().contains("basket")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_sport_matches_local_names() {
        assert!(is_primary_sport("Football"));
        assert!(is_primary_sport("SOCCER"));
        assert!(is_primary_sport("Fudbal"));
        assert!(!is_primary_sport("Basketball"));
        assert!(!is_primary_sport("Tennis"));
    }

    #[test]
    fn icons_fall_back_to_football() {
        assert_eq!(icon_for_sport("Basketball"), SportIcon::Basketball);
        assert_eq!(icon_for_sport("Table Tennis"), SportIcon::Tennis);
        assert_eq!(icon_for_sport("Soccer"), SportIcon::Football);
        assert_eq!(icon_for_sport("Handball"), SportIcon::Football);
    }
}
