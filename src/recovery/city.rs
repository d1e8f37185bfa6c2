//! Shared city-name normalization and extraction contract (spec §4.6).
//!
//! Used identically by recovery (to key the region table and deterministic
//! virtual ids) and the graph builder (to derive `GraphNode.cityName`).
//! Equivalence of extraction on both sides is a hard invariant (U7/U8).

/// lowercase + trim + collapse whitespace + fold ё -> е.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            'ё' => 'е',
            'Ё' => 'Е',
            other => other,
        })
        .collect();

    let lowered = folded.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut prev_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

const STATION_PREFIXES: &[&str] = &["аэропорт", "вокзал", "автовокзал", "автостанция", "остановка"];

/// Infers a stop's transport facility kind from its name, for data sources
/// that don't already tag `isAirport`/`isRailway`/ferry-terminal — the same
/// facility vocabulary `extract_city` already recognizes as a name prefix
/// (spec §4.6 step 4's airport/terminal/ferry transfer test).
pub fn infer_facility(stop_name: &str) -> (bool, bool, bool) {
    let lower = stop_name.to_lowercase();
    let is_airport = lower.contains("аэропорт");
    let is_railway = !is_airport && lower.contains("вокзал") && !lower.contains("автовокзал");
    let is_ferry_terminal = !is_airport
        && (lower.contains("пристань")
            || lower.contains("причал")
            || lower.contains("паром")
            || lower.contains("речной порт")
            || lower.contains("морской порт"));
    (is_airport, is_railway, is_ferry_terminal)
}

/// Canonical city-name extraction, spec §4.6.
///
/// Tries, in order: `г.<name>`; the last comma-separated segment; stripping
/// a known facility prefix and taking the final whitespace token; else the
/// whole name.
pub fn extract_city(stop_name: &str) -> String {
    let trimmed = stop_name.trim();

    if let Some(rest) = find_city_marker(trimmed) {
        return rest.trim().to_string();
    }

    if let Some(last_segment) = trimmed.rsplit(',').next() {
        if last_segment.trim() != trimmed && !last_segment.trim().is_empty() {
            return last_segment.trim().to_string();
        }
    }

    let normalized_lower = trimmed.to_lowercase();
    for prefix in STATION_PREFIXES {
        if normalized_lower.starts_with(prefix) {
            if let Some(last_token) = trimmed.split_whitespace().last() {
                return last_token.to_string();
            }
        }
    }

    trimmed.to_string()
}

/// Finds a `г.<name>` / `г. <name>` marker case-insensitively and returns
/// the remainder after it.
fn find_city_marker(s: &str) -> Option<&str> {
    let lower = s.to_lowercase();
    let marker_pos = lower.find("г.")?;
    let rest = &s[marker_pos + "г.".len()..];
    let rest = rest.trim_start();
    if rest.is_empty() {
        None
    } else {
        // Stop at a comma if present, so "г.Якутск, ул. Ленина" -> "Якутск".
        Some(rest.split(',').next().unwrap_or(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_yo_and_case() {
        assert_eq!(normalize("Олёкминск"), normalize("олекминск"));
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Якутск   City "), "якутск city");
    }

    #[test]
    fn extract_city_handles_marker() {
        assert_eq!(extract_city("г.Якутск"), "Якутск");
        assert_eq!(extract_city("г. Олёкминск, ул. Ленина"), "Олёкминск");
    }

    #[test]
    fn extract_city_handles_comma_segment() {
        assert_eq!(extract_city("Автовокзал, Мирный"), "Мирный");
    }

    #[test]
    fn extract_city_strips_facility_prefix() {
        assert_eq!(extract_city("Аэропорт Якутск"), "Якутск");
        assert_eq!(extract_city("Вокзал Нерюнгри"), "Нерюнгри");
    }

    #[test]
    fn extract_city_falls_back_to_whole_name() {
        assert_eq!(extract_city("Центральная площадь"), "Центральная площадь");
    }

    #[test]
    fn infer_facility_distinguishes_airport_railway_and_bus() {
        assert_eq!(infer_facility("Аэропорт Якутск"), (true, false, false));
        assert_eq!(infer_facility("Вокзал Нерюнгри"), (false, true, false));
        assert_eq!(infer_facility("Автовокзал Якутск"), (false, false, false));
        assert_eq!(infer_facility("Автостанция Олёкминск"), (false, false, false));
    }

    #[test]
    fn infer_facility_recognizes_ferry_markers() {
        assert_eq!(infer_facility("Речной порт Якутск"), (false, false, true));
        assert_eq!(infer_facility("Пристань Олёкминск"), (false, false, true));
    }
}
