//! The reconciliation engine: turns one journal entry into a validated [`Record`].
//!
//! One entry costs at most two generation rounds (the first pass and a single re-ask when the
//! food macros look copy-pasted). Each round walks the configured backends and decode modes
//! until one reply decodes into an object.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::info;

use crate::decode::decode;
use crate::draft::{Draft, DraftState};
use crate::error::{Error, Result};
use crate::generator::{DecodeMode, Generator, first_success};
use crate::known_items;
use crate::models::{
    Field, FoodItem, FoodSource, KNOWN_ITEM_CONFIDENCE_FLOOR, Record, Signal, SignalSource,
};
use crate::normalize::{Extraction, clean_signals, normalize};
use crate::prompts::{EXTRACTION_SYSTEM, UNIQUE_MACROS_RULE, extraction_user};
use crate::schema::validate_record;

/// Literal phrases that count as an explicit screen-time mention.
pub const SCREEN_TIME_PHRASES: &[&str] = &[
    "screen time",
    "screentime",
    "phone time",
    "time on my phone",
    "hours on my phone",
];

/// Generator calories within this distance of a known item's label are kept.
pub const OVERRIDE_CALORIE_TOLERANCE: i64 = 80;
/// Generator protein within this distance of a known item's label is kept.
pub const OVERRIDE_PROTEIN_TOLERANCE: i64 = 10;

/// Minimum number of fully-populated items before the degeneracy check applies.
pub const DEGENERATE_MIN_ITEMS: usize = 4;
/// How often one `(calories, protein)` pair must repeat to count as degenerate.
pub const DEGENERATE_REPEATS: usize = 4;

pub const OVERRIDE_SIGNAL_KEY: &str = "known_food_overrides";
pub const REASK_SIGNAL_KEY: &str = "sanity_rerun";
pub const TOTALS_SIGNAL_KEY: &str = "macro_totals_computed";

#[must_use]
pub fn mentions_screen_time(entry: &str) -> bool {
    let lower = entry.to_lowercase();
    SCREEN_TIME_PHRASES.iter().any(|p| lower.contains(p))
}

fn should_override(food: &FoodItem, item: &known_items::KnownItem) -> bool {
    match (food.calories, food.protein_g) {
        (Some(cal), Some(pro)) => {
            cal.abs_diff(item.calories) >= OVERRIDE_CALORIE_TOLERANCE.unsigned_abs()
                || pro.abs_diff(item.protein_g) >= OVERRIDE_PROTEIN_TOLERANCE.unsigned_abs()
        }
        _ => true,
    }
}

/// Replace macros of recognized products that the generator got badly wrong.
///
/// Returns one consolidated signal naming every overridden item, or `None` if nothing changed.
pub fn apply_known_items(foods: &mut [FoodItem]) -> Option<Signal> {
    let mut overridden = BTreeSet::new();
    for food in foods.iter_mut() {
        let Some(item) = known_items::match_name(&food.name) else {
            continue;
        };
        if !should_override(food, item) {
            continue;
        }
        food.calories = Some(item.calories);
        food.protein_g = Some(item.protein_g);
        food.confidence = food.confidence.max(KNOWN_ITEM_CONFIDENCE_FLOOR);
        food.source = FoodSource::KnownItem;
        food.matched_known = Some(item.id.to_string());
        overridden.insert(item.id);
    }
    if overridden.is_empty() {
        return None;
    }
    let ids: Vec<&str> = overridden.into_iter().collect();
    info!(items = %ids.join(", "), "overrode macros from known-item table");
    Some(Signal::new(
        OVERRIDE_SIGNAL_KEY,
        format!("Overrode macros for: {}", ids.join(", ")),
        SignalSource::Heuristic,
        0.95,
    ))
}

/// True when the generator appears to have copy-pasted one macro pair across distinct foods.
#[must_use]
pub fn is_degenerate(foods: &[FoodItem]) -> bool {
    let pairs: Vec<(i64, i64)> = foods.iter().filter_map(FoodItem::macros).collect();
    if pairs.len() < DEGENERATE_MIN_ITEMS {
        return false;
    }
    let mut counts: HashMap<(i64, i64), usize> = HashMap::new();
    for pair in pairs {
        *counts.entry(pair).or_default() += 1;
    }
    counts.values().any(|n| *n >= DEGENERATE_REPEATS)
}

/// Set `calories_est`/`protein_est` to the food sums. No-op on an empty food list, or when the
/// sums overflow (validation then reports the food list).
pub fn recompute_totals(record: &mut Record) -> Option<Signal> {
    if record.foods.is_empty() {
        return None;
    }
    let (cal, pro, counted) = record.food_totals()?;
    record.calories_est = Some(cal);
    record.protein_est = Some(pro);
    Some(Signal::new(
        TOTALS_SIGNAL_KEY,
        format!("Summed {counted} food items: {cal} cal, {pro}g protein."),
        SignalSource::Derived,
        0.95,
    ))
}

/// Copy first-pass scalars into a re-ask result wherever the re-ask left them absent.
fn backfill_scalars(second: &mut Record, first: &Record) {
    for field in Field::ALL.iter().filter(|f| !f.is_nutrition()) {
        if second.get(*field).is_none() {
            second.copy_field(*field, first);
        }
    }
}

pub struct Reconciler {
    backends: Vec<Box<dyn Generator>>,
}

impl Reconciler {
    /// Backends are tried in the given order.
    pub fn new(backends: Vec<Box<dyn Generator>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Box<dyn Generator>] {
        &self.backends
    }

    /// One generation round: first `(backend, mode)` whose reply decodes wins.
    fn generate(&self, entry: &str, date: NaiveDate, extra_rules: &str) -> Result<Extraction> {
        let user = extraction_user(entry, date, extra_rules);
        let raw = first_success(&self.backends, &DecodeMode::ORDER, |backend, mode| {
            let text = backend.generate(EXTRACTION_SYSTEM, &user, mode)?;
            decode(backend.name(), mode, &text)
        })?;
        Ok(normalize(&raw, date))
    }

    /// Generate with known-item overrides applied; the override signal joins the pass's signals.
    fn run_pass(&self, entry: &str, date: NaiveDate, extra_rules: &str) -> Result<Extraction> {
        let mut pass = self.generate(entry, date, extra_rules)?;
        if let Some(signal) = apply_known_items(&mut pass.record.foods) {
            pass.signals.push(signal.into());
        }
        Ok(pass)
    }

    /// Run the full pipeline for one entry and return a validated record.
    pub fn reconcile(&self, entry: &str, date: NaiveDate) -> Result<Record> {
        let mut pass = self.run_pass(entry, date, "")?;

        if is_degenerate(&pass.record.foods) {
            info!(%date, "uniform macros across foods, re-asking once");
            let first = pass;
            pass = self.run_pass(entry, date, UNIQUE_MACROS_RULE)?;
            backfill_scalars(&mut pass.record, &first.record);
            pass.signals.push(
                Signal::new(
                    REASK_SIGNAL_KEY,
                    "Re-asked the generator due to uniform macros across foods.".to_string(),
                    SignalSource::Derived,
                    0.9,
                )
                .into(),
            );
        }

        let Extraction {
            mut record,
            mut signals,
        } = pass;

        if let Some(signal) = recompute_totals(&mut record) {
            signals.push(signal.into());
        }

        record.signals = clean_signals(signals);

        if !mentions_screen_time(entry) {
            record.screen_time_hours = None;
        }

        validate_record(record)
    }

    /// Move a draft to `Extracted`, replacing whatever record it held.
    ///
    /// The draft is consumed, so a failed extraction leaves nothing to commit.
    pub fn extract(&self, draft: Draft) -> Result<Draft> {
        if draft.state() == DraftState::Committed {
            return Err(Error::InvalidState(
                "a committed draft cannot be re-extracted".to_string(),
            ));
        }
        let record = self.reconcile(draft.entry(), draft.date())?;
        Ok(draft.with_extraction(record))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::generator::mock::{MockGenerator, Shared};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn food(name: &str, cal: i64, pro: i64) -> FoodItem {
        FoodItem::estimated(name, Some(cal), Some(pro))
    }

    fn reconciler(mock: &Arc<MockGenerator>) -> Reconciler {
        Reconciler::new(vec![Box::new(Shared(Arc::clone(mock)))])
    }

    const QUEST_ENTRY: &str =
        "Ate a Quest bar and a chicken breast, slept 7.5 hours, woke at 7:45, mood 8";

    const QUEST_REPLY: &str = r#"{
        "date": "2024-01-15",
        "wake_time": "7:45",
        "sleep_hours": 7.5,
        "mood_1_10": 8,
        "screen_time_hours": 5,
        "foods": [
            {
                "name": "Quest bar", "quantity_text": "1 bar",
                "calories": 250, "protein_g": 20, "confidence": 0.8
            },
            {
                "name": "chicken breast", "quantity_text": "6 oz",
                "calories": 280, "protein_g": 52, "confidence": 0.75
            }
        ],
        "calories_est": 9999,
        "protein_est": 1,
        "signals": [{"key": "energy", "value": "high", "confidence": 0.6}]
    }"#;

    #[test]
    fn test_end_to_end_quest_bar() {
        let mock = Arc::new(MockGenerator::ok("gpt-4.1-mini", &[QUEST_REPLY]));
        let record = reconciler(&mock).reconcile(QUEST_ENTRY, date()).unwrap();

        assert_eq!(record.foods.len(), 2);
        let quest = &record.foods[0];
        assert_eq!(quest.name, "Quest bar");
        assert_eq!(quest.calories, Some(190));
        assert_eq!(quest.protein_g, Some(21));
        assert_eq!(quest.source, FoodSource::KnownItem);
        assert_eq!(quest.matched_known.as_deref(), Some("quest_protein_bar"));
        assert!(quest.confidence >= 0.95);

        let chicken = &record.foods[1];
        assert_eq!(chicken.calories, Some(280));
        assert_eq!(chicken.source, FoodSource::ModelEstimate);

        assert_eq!(record.calories_est, Some(470));
        assert_eq!(record.protein_est, Some(73));
        assert_eq!(record.sleep_hours, Some(7.5));
        assert_eq!(record.wake_time.as_deref(), Some("07:45"));
        assert_eq!(record.mood, Some(8.0));
        assert_eq!(record.screen_time_hours, None);
        assert_eq!(record.date, date());

        let keys: Vec<_> = record.signals.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["energy", OVERRIDE_SIGNAL_KEY, TOTALS_SIGNAL_KEY]);
        assert_eq!(
            record.signals[1].value,
            "Overrode macros for: quest_protein_bar"
        );
        assert_eq!(
            record.signals[2].value,
            "Summed 2 food items: 470 cal, 73g protein."
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_override_threshold() {
        // Within both tolerances: kept.
        let mut foods = vec![food("Quest bar", 190 + 79, 21 + 9)];
        assert!(apply_known_items(&mut foods).is_none());
        assert_eq!(foods[0].calories, Some(269));
        assert_eq!(foods[0].source, FoodSource::ModelEstimate);

        // Calories off by exactly the tolerance: overridden.
        let mut foods = vec![food("Quest bar", 190 - 80, 21)];
        assert!(apply_known_items(&mut foods).is_some());
        assert_eq!(foods[0].calories, Some(190));
        assert_eq!(foods[0].source, FoodSource::KnownItem);
        assert!(foods[0].confidence >= 0.95);

        // Protein off by the tolerance: overridden.
        let mut foods = vec![food("quest protein bar", 190, 31)];
        assert!(apply_known_items(&mut foods).is_some());
        assert_eq!(foods[0].protein_g, Some(21));
    }

    #[test]
    fn test_override_when_macros_missing() {
        let mut foods = vec![FoodItem::estimated("Isopure shake", Some(160), None)];
        let signal = apply_known_items(&mut foods).unwrap();
        assert_eq!(foods[0].protein_g, Some(40));
        assert_eq!(signal.source, SignalSource::Heuristic);
    }

    #[test]
    fn test_override_signal_is_sorted_and_deduplicated() {
        let mut foods = vec![
            food("RX bar", 0, 0),
            food("Quest bar", 0, 0),
            food("another quest bar", 0, 0),
            food("rice", 200, 4),
        ];
        let signal = apply_known_items(&mut foods).unwrap();
        assert_eq!(signal.value, "Overrode macros for: quest_protein_bar, rxbar");
        assert_eq!(foods[3].source, FoodSource::ModelEstimate);
    }

    #[test]
    fn test_high_confidence_kept_on_override() {
        let mut foods = vec![food("quest bar", 0, 0)];
        foods[0].confidence = 0.99;
        apply_known_items(&mut foods);
        assert_eq!(foods[0].confidence, 0.99);
    }

    #[test]
    fn test_degeneracy_detection() {
        let mut foods = vec![
            food("rice", 600, 20),
            food("salad", 600, 20),
            food("soup", 600, 20),
            food("bread", 600, 20),
            food("apple", 95, 0),
        ];
        assert!(is_degenerate(&foods));

        foods[3] = food("bread", 80, 3);
        assert!(!is_degenerate(&foods));

        let partial = vec![
            food("a", 600, 20),
            food("b", 600, 20),
            food("c", 600, 20),
            FoodItem::estimated("d", Some(600), None),
        ];
        assert!(!is_degenerate(&partial));
    }

    fn degenerate_reply(extra: &str) -> String {
        format!(
            r#"{{
                "sleep_hours": 7, "gym": true, "mood_1_10": 6 {extra},
                "foods": [
                    {{"name": "rice", "calories": 600, "protein_g": 20}},
                    {{"name": "salad", "calories": 600, "protein_g": 20}},
                    {{"name": "soup", "calories": 600, "protein_g": 20}},
                    {{"name": "bread", "calories": 600, "protein_g": 20}},
                    {{"name": "apple", "calories": 95, "protein_g": 0}}
                ]
            }}"#
        )
    }

    const REASK_REPLY: &str = r#"{
        "mood_1_10": 7,
        "foods": [
            {"name": "rice", "calories": 200, "protein_g": 4},
            {"name": "salad", "calories": 150, "protein_g": 3},
            {"name": "soup", "calories": 180, "protein_g": 9},
            {"name": "bread", "calories": 80, "protein_g": 3},
            {"name": "apple", "calories": 95, "protein_g": 0}
        ],
        "signals": [{"key": "second", "value": "pass"}]
    }"#;

    #[test]
    fn test_degenerate_output_triggers_one_reask() {
        let first = degenerate_reply(r#", "signals": [{"key": "first", "value": "pass"}]"#);
        let mock = Arc::new(MockGenerator::ok("m", &[&first, REASK_REPLY]));
        let record = reconciler(&mock)
            .reconcile("rice salad soup bread apple", date())
            .unwrap();

        assert_eq!(mock.call_count(), 2);
        let prompts = mock.prompts.lock().unwrap();
        assert!(!prompts[0].0.contains(UNIQUE_MACROS_RULE));
        assert!(prompts[1].0.contains(UNIQUE_MACROS_RULE));

        // Second pass values win; absent scalars come from the first pass.
        assert_eq!(record.mood, Some(7.0));
        assert_eq!(record.sleep_hours, Some(7.0));
        assert_eq!(record.gym, Some(true));
        assert_eq!(record.calories_est, Some(705));

        let keys: Vec<_> = record.signals.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["second", REASK_SIGNAL_KEY, TOTALS_SIGNAL_KEY]);
    }

    #[test]
    fn test_reask_is_bounded_even_if_still_degenerate() {
        let reply = degenerate_reply("");
        let mock = Arc::new(MockGenerator::ok("m", &[&reply, &reply, &reply]));
        let record = reconciler(&mock).reconcile("five foods", date()).unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(
            record
                .signals
                .iter()
                .filter(|s| s.key == REASK_SIGNAL_KEY)
                .count(),
            1
        );
    }

    #[test]
    fn test_three_shared_pairs_do_not_reask() {
        let reply = r#"{"foods": [
            {"name": "a", "calories": 300, "protein_g": 10},
            {"name": "b", "calories": 300, "protein_g": 10},
            {"name": "c", "calories": 300, "protein_g": 10},
            {"name": "d", "calories": 120, "protein_g": 5},
            {"name": "e", "calories": 90, "protein_g": 2}
        ]}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply]));
        reconciler(&mock).reconcile("abcde", date()).unwrap();
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_screen_time_guard() {
        let reply = r#"{"screen_time_hours": 6.5}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply, reply]));
        let r = reconciler(&mock);

        let record = r.reconcile("studied all day", date()).unwrap();
        assert_eq!(record.screen_time_hours, None);

        let record = r
            .reconcile("Screen Time was brutal today, 6.5h", date())
            .unwrap();
        assert_eq!(record.screen_time_hours, Some(6.5));
    }

    #[test]
    fn test_mentions_screen_time_phrases() {
        assert!(mentions_screen_time("way too much SCREENTIME"));
        assert!(mentions_screen_time("4 hours on my phone"));
        assert!(!mentions_screen_time("screen door was broken"));
    }

    #[test]
    fn test_empty_foods_keep_generator_totals() {
        let reply = r#"{"foods": [], "calories_est": 2100, "protein_est": 120}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply]));
        let record = reconciler(&mock).reconcile("ate stuff", date()).unwrap();
        assert_eq!(record.calories_est, Some(2100));
        assert_eq!(record.protein_est, Some(120));
        assert!(record.signals.is_empty());
    }

    #[test]
    fn test_totals_are_idempotent() {
        let mut record = Record::empty(date());
        record.foods = vec![
            food("eggs", 210, 18),
            FoodItem::estimated("coffee", Some(5), None),
            food("toast", 160, 6),
        ];
        recompute_totals(&mut record);
        let first = (record.calories_est, record.protein_est);
        recompute_totals(&mut record);
        assert_eq!((record.calories_est, record.protein_est), first);
        assert_eq!(first, (Some(370), Some(24)));
    }

    #[test]
    fn test_extreme_macros_are_overridden_without_overflow() {
        let mut foods = vec![food("Quest bar", i64::MIN, i64::MAX), food("RX bar", i64::MAX, 0)];
        assert!(apply_known_items(&mut foods).is_some());
        assert_eq!(foods[0].macros(), Some((190, 21)));
        assert_eq!(foods[1].source, FoodSource::KnownItem);
    }

    #[test]
    fn test_overflowing_totals_are_left_for_validation() {
        let mut record = Record::empty(date());
        record.foods = vec![food("stew", i64::MAX, 1), food("cake", 1, 1)];
        assert!(recompute_totals(&mut record).is_none());
        assert_eq!(record.calories_est, None);
        assert!(matches!(validate_record(record), Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn test_huge_calorie_reply_reconciles() {
        let reply = r#"{"foods": [
            {"name": "mystery stew", "calories": 1e19, "protein_g": 30},
            {"name": "birthday cake", "calories": 1e19, "protein_g": 5}
        ]}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply]));
        let record = reconciler(&mock).reconcile("big dinner", date()).unwrap();
        assert!(record.foods.iter().all(|f| f.calories.is_none()));
        assert_eq!(record.calories_est, Some(0));
        assert_eq!(record.protein_est, Some(0));
    }

    #[test]
    fn test_huge_negative_calories_on_known_item() {
        let reply = r#"{"foods": [{"name": "quest bar", "calories": -1e19, "protein_g": 1}]}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply]));
        let record = reconciler(&mock).reconcile("quest bar", date()).unwrap();
        assert_eq!(record.foods[0].macros(), Some((190, 21)));
        assert_eq!(record.calories_est, Some(190));
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let reply = r#"{"sleep_quality_1_10": 11}"#;
        let mock = Arc::new(MockGenerator::ok("m", &[reply]));
        let err = reconciler(&mock).reconcile("slept great", date()).unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
        assert_eq!(err.violations()[0].field, "sleep_quality");
    }

    #[test]
    fn test_falls_back_to_freeform_then_next_backend() {
        let a = Arc::new(MockGenerator::new(
            "a",
            vec![
                Ok("not json at all".to_string()),
                Err(MockGenerator::unavailable("a")),
            ],
        ));
        let chatty = "Sure! Here you go: {\"mood_1_10\": 9} hope that helps";
        let b = Arc::new(MockGenerator::ok("b", &[chatty, chatty]));
        let r = Reconciler::new(vec![
            Box::new(Shared(Arc::clone(&a))),
            Box::new(Shared(Arc::clone(&b))),
        ]);
        let record = r.reconcile("great day", date()).unwrap();
        assert_eq!(record.mood, Some(9.0));
        assert_eq!(a.call_count(), 2);
        assert_eq!(b.call_count(), 2);
        let b_prompts = b.prompts.lock().unwrap();
        assert_eq!(b_prompts[0].1, DecodeMode::Structured);
        assert_eq!(b_prompts[1].1, DecodeMode::Freeform);
    }

    #[test]
    fn test_all_attempts_fail() {
        let mock = Arc::new(MockGenerator::ok("m", &["nope", "still nope"]));
        let err = reconciler(&mock).reconcile("x", date()).unwrap_err();
        match err {
            Error::ExtractionFailed { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(
                    *last,
                    Error::DecodeFailed {
                        mode: DecodeMode::Freeform,
                        ..
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_moves_draft_forward() {
        let mock = Arc::new(MockGenerator::ok("m", &[QUEST_REPLY]));
        let draft = Draft::new(date(), QUEST_ENTRY);
        assert_eq!(draft.state(), DraftState::Drafted);
        let draft = reconciler(&mock).extract(draft).unwrap();
        assert_eq!(draft.state(), DraftState::Extracted);
        assert_eq!(draft.record().calories_est, Some(470));
    }
}
