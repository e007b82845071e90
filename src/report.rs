//! Plain-text run report: final equity and net PnL per path, grouped by profile

use std::fmt::Write;

use crate::types::SimulationResult;

/// Final numbers for one path
#[derive(Debug, Clone, PartialEq)]
pub struct PathSummary {
    pub label: String,
    pub profile_id: String,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub net_pnl: f64,
}

impl PathSummary {
    pub fn is_profitable(&self) -> bool {
        self.final_equity >= self.initial_equity
    }
}

impl From<&SimulationResult> for PathSummary {
    fn from(result: &SimulationResult) -> Self {
        Self {
            label: result.label.clone(),
            profile_id: result.profile_id.clone(),
            initial_equity: result.initial_equity(),
            final_equity: result.final_equity,
            net_pnl: result.net_pnl(),
        }
    }
}

pub fn summarize(results: &[SimulationResult]) -> Vec<PathSummary> {
    results.iter().map(PathSummary::from).collect()
}

/// Paths belonging to one profile
#[derive(Debug, Clone)]
pub struct ProfileGroup<'a> {
    pub profile_id: &'a str,
    pub results: Vec<&'a SimulationResult>,
}

/// Group results by profile id, profiles in first-seen order and paths in
/// accumulation order
pub fn group_by_profile(results: &[SimulationResult]) -> Vec<ProfileGroup<'_>> {
    let mut groups: Vec<ProfileGroup<'_>> = Vec::new();

    for result in results {
        match groups.iter().position(|g| g.profile_id == result.profile_id) {
            Some(index) => groups[index].results.push(result),
            None => groups.push(ProfileGroup {
                profile_id: &result.profile_id,
                results: vec![result],
            }),
        }
    }

    groups
}

/// Hue in degrees for the n-th profile, spread by the golden angle so
/// neighbouring profiles stay visually distinct
pub fn profile_hue(profile_index: usize) -> f64 {
    (profile_index as f64 * 137.508) % 360.0
}

/// Render the report printed after a run
pub fn render_table(results: &[SimulationResult]) -> String {
    let mut out = String::new();

    if results.is_empty() {
        out.push_str("No paths simulated\n");
        return out;
    }

    let width = results.iter().map(|r| r.label.chars().count()).max().unwrap_or(0).max(5);

    for (index, group) in group_by_profile(results).iter().enumerate() {
        let _ = writeln!(
            out,
            "\nProfile {} (hue {:.0}, {} paths)",
            group.profile_id,
            profile_hue(index),
            group.results.len()
        );
        let _ = writeln!(out, "{}", "-".repeat(width + 34));
        let _ = writeln!(out, "  {:width$} {:>15} {:>15}", "Path", "Final Equity", "PnL");

        for result in &group.results {
            let summary = PathSummary::from(*result);
            let marker = if summary.is_profitable() { "+" } else { "-" };
            let _ = writeln!(
                out,
                "{} {:width$} {:>15.2} {:>+15.2}",
                marker, summary.label, summary.final_equity, summary.net_pnl
            );
        }
    }

    let profitable = results.iter().filter(|r| r.net_pnl() >= 0.0).count();
    let _ = writeln!(
        out,
        "\n{} of {} paths finished at or above starting equity",
        profitable,
        results.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeRecord;

    fn result(label: &str, profile_id: &str, start: f64, end: f64) -> SimulationResult {
        SimulationResult {
            label: label.to_string(),
            profile_id: profile_id.to_string(),
            data: vec![
                TradeRecord { trade_number: 0, equity: start, pnl: 0.0 },
                TradeRecord { trade_number: 1, equity: end, pnl: end - start },
            ],
            final_equity: end,
        }
    }

    #[test]
    fn test_summary_net_pnl() {
        let summaries = summarize(&[result("A #1", "a", 1000.0, 1250.0), result("A #2", "a", 1000.0, 900.0)]);

        assert_eq!(summaries[0].net_pnl, 250.0);
        assert!(summaries[0].is_profitable());
        assert_eq!(summaries[1].net_pnl, -100.0);
        assert!(!summaries[1].is_profitable());
    }

    #[test]
    fn test_group_by_profile_keeps_first_seen_order() {
        let results = vec![
            result("B #1", "b", 0.0, 1.0),
            result("A #1", "a", 0.0, 1.0),
            result("B #2", "b", 0.0, 1.0),
        ];
        let groups = group_by_profile(&results);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].profile_id, "b");
        assert_eq!(groups[0].results.len(), 2);
        assert_eq!(groups[0].results[1].label, "B #2");
        assert_eq!(groups[1].profile_id, "a");
    }

    #[test]
    fn test_profile_hue() {
        assert_eq!(profile_hue(0), 0.0);
        assert!((profile_hue(1) - 137.508).abs() < 1e-9);
        assert!((profile_hue(3) - (412.524 - 360.0)).abs() < 1e-9);
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&[result("A #1", "a", 1000.0, 1250.0), result("A #2", "a", 1000.0, 900.0)]);

        assert!(table.contains("Profile a"));
        assert!(table.contains("1250.00"));
        assert!(table.contains("+250.00"));
        assert!(table.contains("-100.00"));
        assert!(table.contains("1 of 2 paths"));
    }

    #[test]
    fn test_label_column_sized_in_characters() {
        // 7 characters, 9 bytes
        let table = render_table(&[
            result("Zoëë #1", "z", 1000.0, 1100.0),
            result("Al #1", "z", 1000.0, 900.0),
        ]);

        let separator = table.lines().find(|l| !l.is_empty() && l.chars().all(|c| c == '-')).unwrap();
        assert_eq!(separator.len(), 7 + 34);

        let rows: Vec<&str> = table.lines().filter(|l| l.contains(" #")).collect();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.chars().count(), 7 + 34, "{row:?}");
        }
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_table(&[]), "No paths simulated\n");
    }
}
