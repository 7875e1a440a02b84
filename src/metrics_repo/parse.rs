// Text exposition lines -> per-title player readings

use std::collections::HashSet;

use regex::Regex;

use crate::models::PlayerReading;

/// Line filter and label extraction for one `filter_field="filter_value"` pair,
/// compiled once per metrics source.
#[derive(Debug, Clone)]
pub struct ExpositionParser {
    filter_re: Regex,
    title_re: Regex,
    count_re: Regex,
}

impl ExpositionParser {
    pub fn new(filter_field: &str, filter_value: &str) -> anyhow::Result<Self> {
        // label names start the line or follow `{`, `,` or whitespace; `subtitle=` is not `title=`
        let filter_re = Regex::new(&format!(
            r#"(?:^|[{{,\s]){}="{}""#,
            regex::escape(filter_field),
            regex::escape(filter_value)
        ))?;
        let title_re = Regex::new(r#"(?:^|[{,\s])title="([^"]*)""#)?;
        let count_re = Regex::new(r"\s([0-9]+)\s*$")?;
        Ok(Self {
            filter_re,
            title_re,
            count_re,
        })
    }

    /// Keep matching lines that carry a `title` label and a trailing integer.
    /// Anything else is skipped. The first line for a title wins.
    pub fn parse(&self, text: &str) -> Vec<PlayerReading> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for line in text.lines() {
            if line.starts_with('#') || !self.filter_re.is_match(line) {
                continue;
            }
            let Some(title) = self.title_re.captures(line).map(|c| c[1].to_string()) else {
                continue;
            };
            // more digits than a u64 holds is a malformed line too
            let Some(count) = self
                .count_re
                .captures(line)
                .and_then(|c| c[1].parse::<u64>().ok())
            else {
                continue;
            };
            if title.is_empty() || !seen.insert(title.clone()) {
                continue;
            }
            out.push(PlayerReading::from_feed(title, count));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"# HELP steam_player_count Current players
# TYPE steam_player_count gauge
steam_player_count{appid="570",publisher="Valve",title="Dota 2"} 612345
steam_player_count{appid="730",publisher="Valve",title="Counter-Strike 2"} 0
steam_player_count{appid="1",publisher="Other",title="Elsewhere"} 99
steam_player_count{appid="440",publisher="Valve",title="Team Fortress 2"} 12.5
steam_player_count{appid="550",publisher="Valve"} 4000
steam_player_count{appid="570",publisher="Valve",title="Dota 2"} 1
garbage line publisher="Valve"
"#;

    fn parser() -> ExpositionParser {
        ExpositionParser::new("publisher", "Valve").unwrap()
    }

    #[test]
    fn keeps_only_matching_well_formed_lines() {
        let readings = parser().parse(FEED);
        assert_eq!(
            readings,
            vec![
                PlayerReading::from_feed("Dota 2", 612345),
                PlayerReading::from_feed("Counter-Strike 2", 0),
            ]
        );
        assert_eq!(readings[1].count, None);
    }

    #[test]
    fn title_label_must_be_a_whole_label_name() {
        let line = r#"m{subtitle="x",publisher="Valve",title="Real"} 5"#;
        let readings = parser().parse(line);
        assert_eq!(readings, vec![PlayerReading::from_feed("Real", 5)]);
    }

    #[test]
    fn filter_label_must_be_a_whole_label_name() {
        let line = r#"m{subpublisher="Valve",title="Nope"} 5"#;
        assert!(parser().parse(line).is_empty());
    }

    #[test]
    fn signed_or_oversized_counts_are_skipped() {
        let text = r#"m{publisher="Valve",title="Signed"} +5
m{publisher="Valve",title="Huge"} 99999999999999999999999
m{publisher="Valve",title="Max"} 18446744073709551615
"#;
        assert_eq!(parser().parse(text), vec![PlayerReading::from_feed("Max", u64::MAX)]);
    }

    #[test]
    fn filter_value_is_matched_literally() {
        let parser = ExpositionParser::new("publisher", "Valve.Corp").unwrap();
        let text = r#"m{publisher="ValveXCorp",title="A"} 1
m{publisher="Valve.Corp",title="B"} 2
"#;
        assert_eq!(parser.parse(text), vec![PlayerReading::from_feed("B", 2)]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(parser().parse("").is_empty());
    }
}
