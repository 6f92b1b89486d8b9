//! Prompt text sent to the generator.
//!
//! The nutrition anchors are guidance for the model only; nothing here is enforced in code.

use chrono::NaiveDate;

pub const EXTRACTION_SYSTEM: &str = "\
You are a precise nutritionist and health data extractor.
Extract structured health and habit tracking data from journal entries.
Return ONLY valid JSON (no markdown, no extra text).

NUTRITION ACCURACY: use USDA/standard nutrition data as your reference.
- Never assign identical calories AND protein to different, distinct food items.
- Each food item's macros must reflect its specific type and portion size.
- When a brand is mentioned, use that brand's nutrition label values.
- Be conservative but realistic; do not undercount by more than 10%.

signals must be a JSON array of objects with keys: key, value, unit, source, confidence (0..1).
";

const OUTPUT_CONTRACT: &str = r#"Return a single JSON object with these keys:

Top-level fields:
- date (YYYY-MM-DD) MUST equal the provided date
- wake_time (string HH:MM in 24h like "07:45" or "12:30", or null)
- sleep_hours (float or null)
- sleep_quality_1_10 (int 1-10 or null)
- gym (true/false or null)
- workout_type (string like: push/pull/legs/tennis/run/rest/other or null)
- workout_minutes (int or null)
- cardio_minutes (int or null)
- water_bottles (int or null)
- creatine (true/false or null)
- screen_time_hours (float or null)
  IMPORTANT: set null unless explicitly mentioned in the journal text
- study_hours (float or null)
- mood_1_10 (float 1.0-10.0 or null)
- weight (float in lbs, e.g., 165.4, or null)
- summary (short string or null)

Nutrition fields:
- foods: an array of food/drink items. Each item:
  - name (string)
  - quantity_text (string, e.g., "2 slices", "6 oz", "1 cup")
  - calories (int) for THIS specific portion
  - protein_g (int) for THIS specific portion
  - confidence (0..1)
- calories_est (int or null) (optional; recomputed from foods)
- protein_est (int or null) (optional; recomputed from foods)
- signals: list of objects like
  {"key":"...", "value":"...", "unit":"", "source":"journal", "confidence":0.0-1.0}
"#;

const NUTRITION_ANCHORS: &str = r#"NUTRITION REFERENCE VALUES (anchors for estimation):

Proteins:
  chicken breast 6oz ≈ 280cal/52g | chicken breast 4oz ≈ 190cal/35g
  egg large ≈ 70cal/6g | egg whites 3 ≈ 50cal/11g
  Greek yogurt 6oz ≈ 100cal/17g | cottage cheese 1/2cup ≈ 110cal/13g
  canned tuna 3oz ≈ 100cal/22g | salmon 6oz ≈ 350cal/34g
  ground beef 4oz 80/20 ≈ 290cal/20g | ground beef 4oz 93/7 ≈ 190cal/23g
  steak 6oz ≈ 350cal/44g | turkey breast 4oz ≈ 150cal/28g
  shrimp 4oz ≈ 120cal/23g | tofu firm 4oz ≈ 90cal/10g

Grains/Starches:
  cooked white rice 1cup ≈ 200cal/4g | cooked brown rice 1cup ≈ 215cal/5g
  cooked pasta 1cup ≈ 220cal/8g | bread slice ≈ 80cal/3g
  oats 1/2cup dry ≈ 150cal/5g | bagel plain ≈ 270cal/10g
  tortilla 10" flour ≈ 200cal/5g | sweet potato medium ≈ 115cal/2g
  white potato medium ≈ 160cal/4g

Dairy:
  whole milk 1cup ≈ 150cal/8g | 2% milk 1cup ≈ 125cal/8g
  cheddar cheese 1oz ≈ 110cal/7g | mozzarella 1oz ≈ 85cal/6g

Fats/Nuts:
  avocado 1/2 ≈ 120cal/2g | almonds 1oz ≈ 165cal/6g
  peanut butter 2tbsp ≈ 190cal/8g | olive oil 1tbsp ≈ 120cal/0g
  butter 1tbsp ≈ 100cal/0g

Vegetables:
  leafy greens 2cups ≈ 20cal/2g | broccoli 1cup ≈ 55cal/4g
  mixed veggies 1cup ≈ 50cal/3g

Fruits:
  banana medium ≈ 105cal/1g | apple medium ≈ 95cal/0g
  berries 1cup ≈ 65cal/1g | orange medium ≈ 65cal/1g

Beverages:
  orange juice 1cup ≈ 110cal/2g | sports drink 20oz ≈ 130cal/0g
  coffee black ≈ 5cal/0g

Restaurants (typical portions):
  burger + fries ≈ 950-1100cal/40-50g | pizza slice cheese ≈ 280cal/12g
  pizza slice with toppings ≈ 320-380cal/16-20g
  burrito (Chipotle-style) ≈ 750-900cal/40-55g
  pasta entree ≈ 650-950cal/25-35g | sushi roll ≈ 300-380cal/12-18g
  sandwich/sub 6" ≈ 400-550cal/25-35g | salad with protein ≈ 400-600cal/30-45g
  stir fry with rice ≈ 500-700cal/25-35g

PORTION ESTIMATION RULES:
- "a serving" = standard serving size per package or label
- "a handful" = ~1oz nuts / ~1cup leafy greens / ~0.5cup grains
- "some" or "a bit" = 1/4 to 1/3 of a typical serving
- "a lot" or "a ton" = 1.5-2x typical serving
- "half" = exactly 0.5x the reference value
- Restaurant portions ≈ 1.5x home cooking portions
- "X% of a bag/box" = multiply total package nutrition by X%

Rules:
- If food is mentioned, foods must include it with integer calories and protein (not null).
- Do NOT reuse the same (calories, protein) pair across multiple different food items.
- If unsure of exact portion, state it in quantity_text and estimate conservatively.
"#;

/// Extra instruction appended on the re-ask after degenerate macros.
pub const UNIQUE_MACROS_RULE: &str = "\
CRITICAL: Every food item must have UNIQUE (calories, protein) values. \
Different foods cannot share identical macros. Re-read each food item and assign accurate, \
distinct nutrition values based on type and portion.";

/// User message for one extraction call.
#[must_use]
pub fn extraction_user(entry: &str, date: NaiveDate, extra_rules: &str) -> String {
    format!(
        "<RAW_JOURNAL>\n{entry}\n</RAW_JOURNAL>\n\n\
         Journal entry date (local): {}\n\n\
         {OUTPUT_CONTRACT}\n{NUTRITION_ANCHORS}\n{extra_rules}\n",
        date.format("%Y-%m-%d")
    )
}

#[must_use]
pub fn ask_system(today: NaiveDate) -> String {
    format!(
        "You are a data analyst answering questions about someone's personal health journal. \
         Today is {}. Answer precisely and concisely. Give counts or numbers whenever possible. \
         If something isn't in the data, say so clearly. Do not make up information.",
        today.format("%B %d, %Y")
    )
}

#[must_use]
pub fn ask_user(metrics_csv: &str, foods_log: &str, question: &str) -> String {
    format!(
        "Here is my health data (CSV, most recent first):\n\n{metrics_csv}\n\n\
         Here is a log of every food I ate, by date:\n\n{foods_log}\n\n\
         My question: {}",
        question.trim()
    )
}

pub const REVIEW_SYSTEM: &str = "\
You are a personal health coach reviewing someone's week of journal data. \
Write a concise, encouraging and specific weekly review. \
Cover training consistency, nutrition highlights, sleep quality and mood/energy trends, \
then give 2-3 actionable suggestions for next week. \
Use markdown with headers. Keep it personal, not generic.";

#[must_use]
pub fn review_user(stats: &str) -> String {
    format!("Here is my week's data:\n\n{stats}\n\nWrite my weekly review.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_user_embeds_entry_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let msg = extraction_user("Ate a Quest bar", date, "");
        assert!(msg.starts_with("<RAW_JOURNAL>\nAte a Quest bar\n</RAW_JOURNAL>"));
        assert!(msg.contains("Journal entry date (local): 2024-01-15"));
        assert!(msg.contains("sleep_quality_1_10"));
        assert!(msg.contains("chicken breast 6oz"));
        assert!(!msg.contains("CRITICAL"));
    }

    #[test]
    fn test_extraction_user_appends_extra_rules() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let msg = extraction_user("x", date, UNIQUE_MACROS_RULE);
        assert!(msg.trim_end().ends_with(UNIQUE_MACROS_RULE));
    }

    #[test]
    fn test_ask_prompts() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(ask_system(today).contains("Today is March 05, 2024."));
        let user = ask_user("date,mood\n", "2024-03-04: eggs", "  how many eggs?  ");
        assert!(user.ends_with("My question: how many eggs?"));
    }
}
