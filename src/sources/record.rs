use serde::{Deserialize, Serialize};

/// Kind of property under auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Apt,
    Land,
    Commercial,
    House,
    Office,
    Factory,
    #[default]
    Other,
}

/// Auction risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    #[default]
    Caution,
    Danger,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Danger => "danger",
        }
    }
}

/// A right registered against the property (lease, mortgage, lien, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightIssue {
    #[serde(rename = "type", default = "default_right_type")]
    pub kind: String,

    #[serde(default)]
    pub type_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub risk_level: RiskLevel,

    /// Whether the right survives the sale and binds the buyer
    #[serde(default)]
    pub survives_auction: bool,

    #[serde(default)]
    pub amount: Option<u64>,

    #[serde(default)]
    pub priority: u32,

    #[serde(default)]
    pub registration_date: Option<String>,
}

fn default_right_type() -> String {
    "other".to_string()
}

/// Facts about one auction case
///
/// Areas come in pyeong (`land_area`, `building_area`) and/or square meters
/// (`*_sqm`); prices are whole won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub case_number: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub asset_type_name: String,

    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address_detail: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub district: Option<String>,

    #[serde(default)]
    pub land_area: Option<f64>,
    #[serde(default)]
    pub building_area: Option<f64>,
    #[serde(default)]
    pub land_area_sqm: Option<f64>,
    #[serde(default)]
    pub building_area_sqm: Option<f64>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub build_year: Option<u32>,
    #[serde(default)]
    pub structure: Option<String>,
    #[serde(default)]
    pub roof_type: Option<String>,
    #[serde(default)]
    pub current_use: Option<String>,

    #[serde(default)]
    pub appraisal_value: u64,
    #[serde(default)]
    pub minimum_bid: u64,
    /// Fraction of the appraisal, e.g. 0.64
    #[serde(default)]
    pub minimum_bid_percent: f64,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub auction_date: String,
    #[serde(default = "default_round")]
    pub auction_round: u32,
    #[serde(default = "default_deposit_percent")]
    pub bid_deposit_percent: f64,

    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub has_occupant: bool,
    #[serde(default)]
    pub has_lease: bool,
    #[serde(default)]
    pub rights_issues: Vec<RightIssue>,

    #[serde(default)]
    pub lease_deposit: Option<u64>,
    #[serde(default)]
    pub monthly_rent: Option<u64>,

    #[serde(default)]
    pub zoning: Option<String>,
    #[serde(default)]
    pub terrain: Option<String>,
    #[serde(default)]
    pub road_access: Option<String>,

    /// Local file names under `<input_dir>/images`, or remote URLs
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub map_image_url: Option<String>,
}

fn default_round() -> u32 {
    1
}

fn default_deposit_percent() -> f64 {
    0.1
}

impl PropertyRecord {
    /// Case number made safe for file names
    pub fn safe_case_number(&self) -> String {
        safe_case_number(&self.case_number)
    }

    pub fn full_address(&self) -> String {
        match &self.address_detail {
            Some(detail) if !detail.is_empty() => format!("{} {}", self.address, detail),
            _ => self.address.clone(),
        }
    }

    /// A filled-in example for operators writing their own JSON files
    pub fn template() -> Self {
        Self {
            case_number: "2024타경12345".to_string(),
            court: "Suwon District Court".to_string(),
            asset_type: AssetType::House,
            asset_type_name: "detached house".to_string(),
            address: "123-45 Maetan-dong, Yeongtong-gu, Suwon-si, Gyeonggi-do".to_string(),
            address_detail: Some("Maetan Village Block 1".to_string()),
            region: Some("Gyeonggi".to_string()),
            district: Some("Yeongtong-gu, Suwon-si".to_string()),
            land_area: Some(85.5),
            building_area: Some(132.0),
            land_area_sqm: Some(282.6),
            building_area_sqm: Some(436.4),
            floor: Some("two above-ground floors".to_string()),
            build_year: Some(2005),
            structure: Some("reinforced concrete".to_string()),
            roof_type: Some("slab roof".to_string()),
            current_use: Some("residential".to_string()),
            appraisal_value: 850_000_000,
            minimum_bid: 544_000_000,
            minimum_bid_percent: 0.64,
            auction_date: "2024-03-15".to_string(),
            auction_round: 2,
            bid_deposit_percent: 0.1,
            risk_level: RiskLevel::Caution,
            has_occupant: true,
            has_lease: true,
            rights_issues: vec![RightIssue {
                kind: "lease".to_string(),
                type_name: "leasehold".to_string(),
                description: "Residential lease with a 200 million won deposit".to_string(),
                risk_level: RiskLevel::Caution,
                survives_auction: false,
                amount: Some(200_000_000),
                priority: 2,
                registration_date: None,
            }],
            lease_deposit: Some(200_000_000),
            monthly_rent: Some(0),
            zoning: Some("Type 1 general residential zone".to_string()),
            terrain: Some("flat".to_string()),
            road_access: Some("an asphalt road about 6 m wide".to_string()),
            image_urls: Vec::new(),
            map_image_url: None,
        }
    }
}

pub fn safe_case_number(case_number: &str) -> String {
    case_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
