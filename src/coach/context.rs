//! System prompt assembly from the user's profile and notes.

use std::fmt::Write as _;

use crate::model::{MeasurementUnit, UserNote, UserProfile};

/// Notes below this confidence are left out of the prompt.
pub const MIN_NOTE_CONFIDENCE: f64 = 0.5;
/// At most this many notes per category.
pub const NOTES_PER_CATEGORY: usize = 5;

/// Standing instructions appended after the user context.
pub const COACH_INSTRUCTIONS: &str = "\
ROLE: You are a supportive nutrition and fitness coach. Be warm and evidence-based. \
Keep answers under four sentences unless the user asks for detail.

ASSESSMENT:
- Work out what is still missing (age, height, weight, goals, conditions, diet and exercise patterns, limitations) and ask for it one question at a time.
- When height, weight, age and gender are known, estimate BMR and TDEE with Mifflin-St Jeor.

NUTRITION: give macro targets with concrete portion sizes and two or three alternative meals.
FITNESS: match workouts to equipment and experience, include recovery, adapt around injuries.
GOALS: split big goals into weekly steps and say briefly why each recommendation helps.";

const NOT_PROVIDED: &str = "Not provided";

/// Build the system prompt for a coach reply.
pub fn system_prompt(profile: Option<&UserProfile>, notes: &[UserNote]) -> String {
    let mut out = String::from("USER PROFILE INFORMATION:\n");

    if let Some(profile) = profile {
        write_profile(&mut out, profile);
    }
    write_notes(&mut out, notes);

    out.push_str("\n\n");
    out.push_str(COACH_INSTRUCTIONS);
    out
}

fn write_profile(out: &mut String, profile: &UserProfile) {
    let unit = profile.preferences.measurement_unit;
    let stats = &profile.physical_stats;

    let _ = writeln!(out, "- Name: {}", or_missing(Some(profile.name.as_str())));
    let _ = writeln!(out, "- Age: {}", or_missing(stats.age.filter(|a| *a > 0)));
    let _ = writeln!(out, "- Height: {}", measure(stats.height, unit.length()));
    let _ = writeln!(out, "- Weight: {}", measure(stats.weight, unit.mass()));
    let _ = writeln!(out, "- Gender: {}", or_missing(stats.gender.as_deref()));
    let _ = writeln!(
        out,
        "- Activity Level: {}",
        or_missing(stats.activity_level.as_deref())
    );

    write_health_metrics(out, profile, unit);

    let _ = writeln!(
        out,
        "\n- Fitness Goal: {}",
        or_missing(profile.fitness_goal.as_deref())
    );
    if profile.dietary_preferences.is_empty() {
        out.push_str("- Dietary Preferences: None specified\n");
    } else {
        let _ = writeln!(
            out,
            "- Dietary Preferences: {}",
            profile.dietary_preferences.join(", ")
        );
    }
}

fn write_health_metrics(out: &mut String, profile: &UserProfile, unit: MeasurementUnit) {
    let m = &profile.health_metrics;
    let lines: Vec<String> = [
        positive(m.bmr).map(|v| format!("- Basal Metabolic Rate (BMR): {v} calories/day")),
        positive(m.tdee)
            .map(|v| format!("- Total Daily Energy Expenditure (TDEE): {v} calories/day")),
        positive(m.bmi).map(|v| format!("- Body Mass Index (BMI): {v}")),
        positive(m.body_fat_percentage).map(|v| format!("- Estimated Body Fat: {v}%")),
        positive(m.lbm).map(|v| format!("- Lean Body Mass (LBM): {v} {}", unit.mass())),
    ]
    .into_iter()
    .flatten()
    .collect();

    if lines.is_empty() {
        return;
    }
    out.push_str("\nHEALTH METRICS:\n");
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

fn write_notes(out: &mut String, notes: &[UserNote]) {
    if notes.is_empty() {
        return;
    }

    // Categories keep the order in which they first appear.
    let mut groups: Vec<(&str, Vec<&UserNote>)> = Vec::new();
    for note in notes {
        match groups.iter_mut().find(|(c, _)| *c == note.category) {
            Some((_, group)) => group.push(note),
            None => groups.push((note.category.as_str(), vec![note])),
        }
    }

    out.push_str("\nUSER NOTES FROM PREVIOUS CONVERSATIONS:\n");
    for (category, mut group) in groups {
        group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let _ = writeln!(out, "\n{}:", title_case(category));
        for note in group
            .into_iter()
            .take(NOTES_PER_CATEGORY)
            .filter(|n| n.confidence >= MIN_NOTE_CONFIDENCE)
        {
            let _ = writeln!(out, "- {}: {}", note.key, note.value);
        }
    }
}

/// `dietary_preference` -> `Dietary Preference`.
pub fn title_case(category: &str) -> String {
    category
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn or_missing<T: std::fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(v) => {
            let s = v.to_string();
            if s.trim().is_empty() {
                NOT_PROVIDED.to_string()
            } else {
                s
            }
        }
        None => NOT_PROVIDED.to_string(),
    }
}

fn measure(value: Option<f64>, unit: &str) -> String {
    match positive(value) {
        Some(v) => format!("{v} {unit}"),
        None => NOT_PROVIDED.to_string(),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}
