use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// A product with curated label nutrition.
#[derive(Debug)]
pub struct KnownItem {
    pub id: &'static str,
    pub calories: i64,
    pub protein_g: i64,
    patterns: Vec<Regex>,
}

impl KnownItem {
    fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

// (id, patterns, calories, protein grams). Order matters: first match wins.
const TABLE: &[(&str, &[&str], i64, i64)] = &[
    (
        "cafe_1919_personal_goat_cheese_sundried_tomato_pizza",
        &[
            r"\bgoat\s+cheese\b.*\bsun[- ]?dried\s+tomato\b.*\bpizza\b",
            r"\bsun[- ]?dried\s+tomato\b.*\bgoat\s+cheese\b.*\bpizza\b",
            r"\bcafe\s*1919\b.*\bpizza\b",
        ],
        600,
        20,
    ),
    (
        "built_protein_bar",
        &[r"\bbuilt\s+protein\s+bar\b", r"\bbuilt\s+bar\b", r"\bbuilt\s+puff\b"],
        140,
        17,
    ),
    (
        "fairlife_core_power_shake",
        &[r"\bcore\s*power\b", r"\bfair\s*life\b", r"\bfairlife\b"],
        230,
        42,
    ),
    (
        "quest_protein_bar",
        &[r"\bquest\s+bar\b", r"\bquest\s+protein\s+bar\b"],
        190,
        21,
    ),
    (
        "premier_protein_shake",
        &[r"\bpremier\s+protein\b", r"\bpremier\s+shake\b"],
        160,
        30,
    ),
    ("rxbar", &[r"\brx\s*bar\b", r"\brxbar\b"], 210, 12),
    (
        "chobani_plain_greek_yogurt_nonfat",
        &[r"\bchobani\b.*\bgreek\b", r"\bchobani\b.*\byogurt\b"],
        90,
        17,
    ),
    (
        "oikos_pro_greek_yogurt",
        &[r"\boikos\s+pro\b", r"\boikos\b.*\byogurt\b"],
        130,
        20,
    ),
    (
        "isopure_zero_carb_protein_shake",
        &[r"\bisopure\b"],
        160,
        40,
    ),
    (
        "muscle_milk_pro_series",
        &[r"\bmuscle\s+milk\b"],
        280,
        40,
    ),
    (
        "kodiak_cakes_protein_waffle",
        &[r"\bkodiak\b.*\bwaffle\b", r"\bkodiak\b.*\bpancake\b"],
        250,
        14,
    ),
];

static KNOWN_ITEMS: LazyLock<Vec<KnownItem>> = LazyLock::new(|| {
    TABLE
        .iter()
        .map(|(id, patterns, calories, protein_g)| KnownItem {
            id: *id,
            calories: *calories,
            protein_g: *protein_g,
            patterns: patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("valid known-item pattern")
                })
                .collect(),
        })
        .collect()
});

/// The full known-item table, in match order.
pub fn all() -> &'static [KnownItem] {
    &KNOWN_ITEMS
}

/// Match a single food item's name against the table.
///
/// Only the item's own name is considered, never the surrounding entry, so one recognized
/// product cannot leak its macros onto unrelated items.
pub fn match_name(name: &str) -> Option<&'static KnownItem> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    KNOWN_ITEMS.iter().find(|item| item.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_compiles() {
        assert_eq!(all().len(), 11);
        assert!(all().iter().all(|item| !item.patterns.is_empty()));
    }

    #[test]
    fn test_match_quest_bar() {
        let item = match_name("Quest bar").unwrap();
        assert_eq!(item.id, "quest_protein_bar");
        assert_eq!((item.calories, item.protein_g), (190, 21));
        assert!(match_name("QUEST Protein Bar (cookies & cream)").is_some());
    }

    #[test]
    fn test_no_match() {
        assert!(match_name("chicken breast").is_none());
        assert!(match_name("").is_none());
        assert!(match_name("conquest barbecue").is_none());
    }

    #[test]
    fn test_match_variants() {
        assert_eq!(match_name("Fairlife Core Power").unwrap().id, "fairlife_core_power_shake");
        assert_eq!(match_name("corepower elite").unwrap().id, "fairlife_core_power_shake");
        assert_eq!(match_name("RX Bar").unwrap().id, "rxbar");
        assert_eq!(
            match_name("Chobani plain nonfat greek yogurt").unwrap().id,
            "chobani_plain_greek_yogurt_nonfat"
        );
        assert_eq!(
            match_name("Kodiak cakes protein waffle, two of them").unwrap().id,
            "kodiak_cakes_protein_waffle"
        );
    }

    #[test]
    fn test_pizza_patterns_need_all_parts() {
        assert_eq!(
            match_name("Cafe 1919 goat cheese sun-dried tomato pizza").unwrap().id,
            "cafe_1919_personal_goat_cheese_sundried_tomato_pizza"
        );
        assert_eq!(
            match_name("sun dried tomato and goat cheese pizza").unwrap().id,
            "cafe_1919_personal_goat_cheese_sundried_tomato_pizza"
        );
        assert!(match_name("goat cheese salad").is_none());
    }

    #[test]
    fn test_first_entry_wins() {
        // Both a Built bar and a Quest bar pattern are present; the table order decides.
        assert_eq!(
            match_name("built bar and quest bar").unwrap().id,
            "built_protein_bar"
        );
    }
}
