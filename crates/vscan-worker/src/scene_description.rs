//! Human-readable scene descriptions built from detection counts.

use std::collections::BTreeMap;

use vscan_models::Detection;

/// Vehicle classes, in the order they are listed.
const VEHICLE_CLASSES: [&str; 5] = ["car", "truck", "bus", "motorcycle", "bicycle"];

/// More distinct "other" classes than this and they are left out entirely.
const MAX_OTHER_CLASSES: usize = 3;

/// More people than this makes a scene a busy area.
const BUSY_AREA_PEOPLE: usize = 2;

const NO_OBJECTS: &str = "Clear view with no detected objects";
const NO_CLAUSES: &str = "Scene with various objects detected";

/// Describe a frame from its detections.
///
/// Output depends only on the per-class counts, so detection order never
/// changes the text.
pub fn describe_scene(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return NO_OBJECTS.to_string();
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class_label()).or_default() += 1;
    }

    let people = counts.get("person").copied().unwrap_or(0);
    let vehicles: Vec<String> = VEHICLE_CLASSES
        .iter()
        .filter_map(|class| counts.get(class).map(|n| count_phrase(*n, class)))
        .collect();
    let others: Vec<String> = counts
        .iter()
        .filter(|(class, _)| **class != "person" && !VEHICLE_CLASSES.contains(*class))
        .map(|(class, n)| count_phrase(*n, class))
        .collect();

    let mut clauses = Vec::new();
    if people == 1 {
        clauses.push("1 person".to_string());
    } else if people > 1 {
        clauses.push(format!("{} people", people));
    }
    if !vehicles.is_empty() {
        clauses.push(join_with_and(&vehicles));
    }
    if !others.is_empty() && others.len() <= MAX_OTHER_CLASSES {
        clauses.push(others.join(", "));
    }

    if clauses.is_empty() {
        return NO_CLAUSES.to_string();
    }

    let prefix = match (people, vehicles.is_empty()) {
        (p, false) if p > 0 => "Street scene with ",
        (p, _) if p > BUSY_AREA_PEOPLE => "Busy area with ",
        (_, false) => "Traffic view showing ",
        _ => "View showing ",
    };

    format!("{}{}", prefix, clauses.join(", "))
}

fn count_phrase(count: usize, class: &str) -> String {
    if count == 1 {
        format!("1 {}", class)
    } else {
        format!("{} {}s", count, class)
    }
}

/// `a`, `a and b`, `a, b and c`
fn join_with_and(items: &[String]) -> String {
    match items.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}
