use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};
use crate::scene::{spoken_chars, ScriptSection};
use crate::script::format::{format_area, format_date, format_percent, format_price};
use crate::script::{join_sections, ScriptGenerator, CANONICAL_SECTIONS};
use crate::sources::PropertyRecord;

/// Narration script: tagged sections plus the text read aloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub sections: Vec<ScriptSection>,
    pub full_text: String,
}

impl Script {
    pub fn from_sections(sections: Vec<ScriptSection>) -> Self {
        let full_text = join_sections(&sections);
        Self { sections, full_text }
    }

    /// Seconds of narration at `chars_per_minute`
    pub fn estimated_duration(&self, chars_per_minute: f64) -> f64 {
        spoken_chars(&self.full_text) as f64 / chars_per_minute * 60.0
    }
}

/// Fills fixed narration templates from property facts
#[derive(Debug, Clone)]
pub struct TemplateScriptWriter {
    channel_name: String,
}

impl TemplateScriptWriter {
    pub fn new<S: Into<String>>(channel_name: S) -> Self {
        Self {
            channel_name: channel_name.into(),
        }
    }

    fn intro(&self) -> String {
        format!("Hello, and welcome to {}.", self.channel_name)
    }

    fn case_overview(&self, p: &PropertyRecord) -> String {
        let land = format_area(p.land_area_sqm, p.land_area);
        let building = format_area(p.building_area_sqm, p.building_area);
        let areas = match (land.is_empty(), building.is_empty()) {
            (false, false) => format!(" with {} of land and {} of floor space", land, building),
            (false, true) => format!(" with {} of land", land),
            (true, false) => format!(" with {} of floor space", building),
            (true, true) => String::new(),
        };

        format!(
            "Today we look at case {} before the {}: a {} at {}{}.",
            p.case_number,
            p.court,
            p.asset_type_name,
            p.full_address(),
            areas
        )
    }

    fn price_info(&self, p: &PropertyRecord) -> String {
        format!(
            "The appraised value is {}. At the sale on {}, the minimum bid is {} of the appraisal, or {}.",
            format_price(p.appraisal_value),
            format_date(&p.auction_date),
            format_percent(p.minimum_bid_percent),
            format_price(p.minimum_bid)
        )
    }

    fn location_analysis(&self, p: &PropertyRecord) -> String {
        let place = [p.district.as_deref(), p.region.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let mut text = if place.is_empty() {
            "Let us look at the surroundings.".to_string()
        } else {
            format!("The property is located in {}.", place)
        };

        match (p.terrain.as_deref(), p.zoning.as_deref()) {
            (Some(terrain), Some(zoning)) => {
                text.push_str(&format!(" The area is {} land within a {}.", terrain, zoning))
            }
            (None, Some(zoning)) => text.push_str(&format!(" The area lies within a {}.", zoning)),
            (Some(terrain), None) => text.push_str(&format!(" The land is {}.", terrain)),
            (None, None) => {}
        }

        if let Some(road) = p.road_access.as_deref() {
            text.push_str(&format!(" It fronts {}, so vehicles can come and go.", road));
        }
        text
    }

    fn property_details(&self, p: &PropertyRecord) -> String {
        let mut text = format!("This is a {}", p.asset_type_name);
        if let Some(structure) = p.structure.as_deref() {
            text.push_str(&format!(" of {} construction", structure));
        }
        if let Some(roof) = p.roof_type.as_deref() {
            text.push_str(&format!(" with a {}", roof));
        }
        if let Some(floor) = p.floor.as_deref() {
            text.push_str(&format!(", {}", floor));
        }
        if let Some(year) = p.build_year {
            text.push_str(&format!(", built in {}", year));
        }
        text.push('.');
        if let Some(usage) = p.current_use.as_deref() {
            text.push_str(&format!(" It is currently in {} use.", usage));
        }
        text
    }

    fn legal_notes(&self, p: &PropertyRecord) -> String {
        let round = if p.auction_round > 1 {
            format!("a re-auction in round {}", p.auction_round)
        } else {
            "a new listing".to_string()
        };
        let deposit = (p.minimum_bid as f64 * p.bid_deposit_percent).round() as u64;

        let mut text = format!(
            "This case is {}, and the bid deposit is {} of the minimum bid, or {}. \
             There is {} occupant and {} lease.",
            round,
            format_percent(p.bid_deposit_percent),
            format_price(deposit),
            if p.has_occupant { "an" } else { "no" },
            if p.has_lease { "a" } else { "no" },
        );

        if p.has_lease {
            match (p.lease_deposit, p.monthly_rent) {
                (Some(dep), Some(rent)) if rent > 0 => text.push_str(&format!(
                    " The lease carries a deposit of {} and monthly rent of {}.",
                    format_price(dep),
                    format_price(rent)
                )),
                (Some(dep), _) => {
                    text.push_str(&format!(" The lease carries a deposit of {}.", format_price(dep)))
                }
                _ => {}
            }
        }

        if !p.rights_issues.is_empty() {
            let names: Vec<&str> = p
                .rights_issues
                .iter()
                .map(|r| if r.type_name.is_empty() { r.kind.as_str() } else { r.type_name.as_str() })
                .collect();
            text.push_str(&format!(" Registered rights to review: {}.", names.join(", ")));
        }

        text
    }

    fn closing(&self) -> String {
        format!(
            "Before bidding, please visit the site and confirm how you would use the property. \
             If you have questions during your review, contact {}. \
             Note that the sale may close, fail or be rescheduled on that date. Thank you.",
            self.channel_name
        )
    }
}

impl ScriptGenerator for TemplateScriptWriter {
    fn name(&self) -> &str {
        "template"
    }

    fn generate(&self, record: &PropertyRecord) -> Result<Script> {
        if record.case_number.trim().is_empty() {
            return Err(InputError::InvalidRecord {
                details: "case_number is empty".to_string(),
            }
            .into());
        }

        let texts = [
            self.intro(),
            self.case_overview(record),
            self.price_info(record),
            self.location_analysis(record),
            self.property_details(record),
            self.legal_notes(record),
            self.closing(),
        ];

        let sections = CANONICAL_SECTIONS
            .iter()
            .zip(texts)
            .map(|(tag, text)| ScriptSection::new(*tag, text))
            .collect();

        Ok(Script::from_sections(sections))
    }

    fn from_pages(&self, pages: &[String]) -> Result<String> {
        let paragraphs: Vec<String> = pages
            .iter()
            .flat_map(|page| page.split("\n\n").map(clean_paragraph).collect::<Vec<_>>())
            .filter(|p| !p.is_empty())
            .collect();

        if paragraphs.is_empty() {
            return Err(InputError::EmptyScript.into());
        }
        Ok(paragraphs.join("\n\n"))
    }
}

/// Plain narration text: markup and layout whitespace removed
pub fn clean_paragraph(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !is_rule(line) && !is_page_marker(line))
        .map(|line| {
            line.trim_start_matches(|c: char| c == '#' || c == '>' || c == '-' || c == '•')
                .replace("**", "")
                .replace("__", "")
                .replace('`', "")
                .replace('*', "")
        })
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-' || c == '=' || c == '_' || c == '*')
}

fn is_page_marker(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("[page") && lower.ends_with(']')
}
