// Prometheus text exposition of the games document: one gauge family per numeric field

use std::fmt::Write;

use crate::models::{GameState, GamesDocument};

type Field = (&'static str, &'static str, fn(&GameState) -> Option<f64>);

const FIELDS: &[Field] = &[
    ("player_count", "Players currently online.", |g| Some(g.player_count as f64)),
    ("expected_players", "Deviation-corrected player forecast.", |g| g.expected_players),
    ("deviation", "Relative gap between observed and historical players.", |g| g.deviation),
    ("vm_count", "VMs allocated to the title.", |g| Some(g.vm_count as f64)),
    ("hourly_cost", "Hourly cost of the allocated VMs.", |g| Some(g.hourly_cost)),
    ("daily_cost", "Daily cost of the allocated VMs.", |g| Some(g.daily_cost)),
];

fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn labels(g: &GameState) -> String {
    format!(
        "name=\"{}\",developer=\"{}\",scaling_strategy=\"{}\"",
        escape_label(&g.name),
        escape_label(&g.developer),
        g.scaling_strategy
    )
}

/// Fields a game does not carry (e.g. `expected_players` for non-predictive titles)
/// are left out of that game's samples.
pub fn render_prometheus(doc: &GamesDocument) -> String {
    let mut out = String::new();
    if doc.is_empty() {
        return out;
    }
    let labelled: Vec<(String, &GameState)> = doc.games.iter().map(|g| (labels(g), g)).collect();
    for (field, help, value) in FIELDS {
        let samples: Vec<(&str, f64)> = labelled
            .iter()
            .filter_map(|(l, g)| value(g).map(|v| (l.as_str(), v)))
            .collect();
        if samples.is_empty() {
            continue;
        }
        let _ = writeln!(out, "# HELP game_{} {}", field, help);
        let _ = writeln!(out, "# TYPE game_{} gauge", field);
        for (l, v) in samples {
            let _ = writeln!(out, "game_{}{{{}}} {}", field, l, v);
        }
    }
    out
}
