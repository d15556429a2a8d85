/// Demo population generator for RoomMatch Algo
///
/// Writes a JSON array of residents, labelled with a five-point lifestyle
/// rule, that the service can train on.
///
/// Run: cargo run --bin generate-residents -- <count> [path]

use std::fs;
use std::path::PathBuf;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

const DEFAULT_COUNT: usize = 200;
const DEFAULT_PATH: &str = "data/residents.json";

const NAMES: &[&str] = &[
    "Juan", "Ana", "Pedro", "Luisa", "Carlos", "Marta", "Felipe", "Sofia", "Andres", "Camila",
];
const GENDERS: &[&str] = &["male", "female", "other"];
const YES_NO: &[&str] = &["yes", "no"];
const PETS: &[&str] = &["has pets", "no pets"];
const TIDINESS: &[&str] = &["tidy", "messy"];
const CHRONOTYPES: &[&str] = &["early bird", "night owl"];
const EDUCATION: &[&str] = &["secondary", "university", "postgraduate"];
const MUSIC: &[&str] = &["rock", "pop", "salsa", "vallenato", "jazz"];
const WEEKEND_PLANS: &[&str] = &["cinema", "travel", "reading", "going out"];
const PERSONALITIES: &[&str] = &["extrovert", "introvert", "neutral"];

fn pick<R: Rng>(rng: &mut R, values: &[&'static str]) -> &'static str {
    values.choose(rng).copied().unwrap_or("unknown")
}

/// One point each for non-smoker, tidy, no pets, sporty and early riser;
/// compatible with three or more
fn demo_label(resident: &Value) -> u8 {
    let checks = [
        ("smoking", "no"),
        ("tidiness", "tidy"),
        ("pets", "no pets"),
        ("sport", "yes"),
        ("chronotype", "early bird"),
    ];
    let points = checks
        .iter()
        .filter(|(key, expected)| resident[*key] == *expected)
        .count();

    if points >= 3 { 1 } else { 0 }
}

fn demo_resident<R: Rng>(rng: &mut R, id: usize) -> Value {
    let mut resident = json!({
        "id": id,
        "name": pick(rng, NAMES),
        "age": rng.gen_range(18..=70),
        "gender": pick(rng, GENDERS),
        "smoking": pick(rng, YES_NO),
        "pets": pick(rng, PETS),
        "tidiness": pick(rng, TIDINESS),
        "sport": pick(rng, YES_NO),
        "chronotype": pick(rng, CHRONOTYPES),
        "education": pick(rng, EDUCATION),
        "music": pick(rng, MUSIC),
        "weekend_plan": pick(rng, WEEKEND_PLANS),
        "visits": pick(rng, YES_NO),
        "personality": pick(rng, PERSONALITIES),
        "instrument": pick(rng, YES_NO),
        "created_at": chrono::Utc::now().to_rfc3339(),
    });
    resident["compatible"] = json!(demo_label(&resident));
    resident
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let count = match args.next() {
        Some(raw) => raw.parse::<usize>()?,
        None => DEFAULT_COUNT,
    };
    let path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_PATH.to_string()));

    let mut rng = rand::thread_rng();
    let residents: Vec<Value> = (1..=count).map(|id| demo_resident(&mut rng, id)).collect();
    let compatible = residents.iter().filter(|r| r["compatible"] == 1).count();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(&residents)?)?;

    println!(
        "Wrote {} residents ({} compatible) to {}",
        count,
        compatible,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_demo_label_needs_three_points() {
        let three = json!({ "smoking": "no", "tidiness": "tidy", "pets": "no pets", "sport": "no" });
        let two = json!({ "smoking": "no", "tidiness": "messy", "pets": "no pets", "sport": "no" });
        assert_eq!(demo_label(&three), 1);
        assert_eq!(demo_label(&two), 0);
    }

    #[test]
    fn test_demo_resident_parses() {
        let mut rng = StdRng::seed_from_u64(7);
        let value = demo_resident(&mut rng, 12);
        let record = value.as_object().cloned().unwrap();

        let resident = roommatch_algo::Resident::from_record(&record).unwrap();
        assert_eq!(resident.id, 12);
        assert!(resident.compatible.is_some());
        assert!(resident.created_at.is_some());
    }
}
