//! Filter vocabulary and the client-side predicates.

use serde_json::Value;

use super::data::Item;

pub const MIN_BATCH_SIZE: u32 = 12;
pub const MAX_BATCH_SIZE: u32 = 500;
pub const DEFAULT_BATCH_SIZE: u32 = 24;

/// Page sizes offered to the user
pub const BATCH_CHOICES: [u32; 4] = [24, 50, 100, 150];

pub fn clamp_batch_size(requested: i64) -> u32 {
    requested.clamp(MIN_BATCH_SIZE as i64, MAX_BATCH_SIZE as i64) as u32
}

/// Parse a user-entered batch size; anything unparseable falls back to the default
pub fn parse_batch_size(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(requested) => clamp_batch_size(requested),
        Err(_) => DEFAULT_BATCH_SIZE,
    }
}

/// Content rating ceiling sent to the list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NsfwLevel {
    #[default]
    None,
    Soft,
    Mature,
    X,
}

impl NsfwLevel {
    pub const ALL: [NsfwLevel; 4] = [NsfwLevel::None, NsfwLevel::Soft, NsfwLevel::Mature, NsfwLevel::X];

    pub fn as_str(self) -> &'static str {
        match self {
            NsfwLevel::None => "None",
            NsfwLevel::Soft => "Soft",
            NsfwLevel::Mature => "Mature",
            NsfwLevel::X => "X",
        }
    }

    /// Look up a value by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == name.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    MostReactions,
    MostComments,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [SortOrder::Newest, SortOrder::MostReactions, SortOrder::MostComments];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Newest => "Newest",
            SortOrder::MostReactions => "Most Reactions",
            SortOrder::MostComments => "Most Comments",
        }
    }

    /// Look up a value by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == name.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    AllTime,
    Year,
    Month,
    Week,
    Day,
}

impl Period {
    pub const ALL: [Period; 5] = [Period::AllTime, Period::Year, Period::Month, Period::Week, Period::Day];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::AllTime => "AllTime",
            Period::Year => "Year",
            Period::Month => "Month",
            Period::Week => "Week",
            Period::Day => "Day",
        }
    }

    /// Look up a value by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|value| value.as_str() == name.trim())
    }
}

/// Everything that shapes which items a reload produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub rating: NsfwLevel,
    pub sort: SortOrder,
    pub period: Period,
    pub username: String,
    /// Selected base models, in selection order
    pub base_models: Vec<String>,
    /// Tag id from [`TAG_GROUPS`]
    pub tag: Option<String>,
    pub batch_size: u32,
    /// Only video items when set, only non-video items otherwise
    pub videos_only: bool,
    /// Drop items without a positive prompt
    pub hide_no_prompt: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            rating: NsfwLevel::default(),
            sort: SortOrder::default(),
            period: Period::default(),
            username: String::new(),
            base_models: Vec::new(),
            tag: None,
            batch_size: DEFAULT_BATCH_SIZE,
            videos_only: false,
            hide_no_prompt: false,
        }
    }
}

impl Filters {
    pub fn effective_batch_size(&self) -> u32 {
        clamp_batch_size(self.batch_size as i64)
    }

    pub fn matches_media_mode(&self, item: &Item) -> bool {
        item.is_video() == self.videos_only
    }

    /// Media-kind predicate plus, when enabled, prompt presence
    pub fn admits(&self, item: &Item) -> bool {
        self.matches_media_mode(item) && (!self.hide_no_prompt || item.has_prompt())
    }

    pub fn retain(&self, items: &mut Vec<Item>) {
        items.retain(|item| self.admits(item));
    }
}

/// Accepts either an array of names or a comma-separated string.
/// Blank entries and repeats are dropped, order is kept.
pub fn normalize_base_models(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::String(name) => name.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(list) => list.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let mut models: Vec<String> = Vec::with_capacity(candidates.len());
    for name in candidates {
        let name = name.trim();
        if !name.is_empty() && !models.iter().any(|known| known == name) {
            models.push(name.to_string());
        }
    }
    models
}

pub const BASE_MODELS: &[&str] = &[
    "AuraFlow",
    "Chroma",
    "Flux.1 S",
    "Flux.1 D",
    "Flux.1 Krea",
    "Flux.1 Kontext",
    "Flux.2 D",
    "Flux.2 Klein 9B",
    "Flux.2 Klein 9B-base",
    "Flux.2 Klein 4B",
    "Flux.2 Klein 4B-base",
    "HiDream",
    "Hunyuan 1",
    "Hunyuan Video",
    "Illustrious",
    "Kolors",
    "LTXV",
    "LTXV2",
    "Lumina",
    "Mochi",
    "NoobAI",
    "Other",
    "PixArt a",
    "PixArt E",
    "Pony",
    "Pony V7",
    "Qwen",
    "SD 1.4",
    "SD 1.5",
    "SD 1.5 LCM",
    "SD 1.5 Hyper",
    "SD 2.0",
    "SD 2.1",
    "SDXL 1.0",
    "SDXL Lightning",
    "SDXL Hyper",
    "Wan Video 1.3B t2v",
    "Wan Video 14B t2v",
    "Wan Video 14B i2v 480p",
    "Wan Video 14B i2v 720p",
    "Wan Video 2.2 TI2V-5B",
    "Wan Video 2.2 I2V-A14B",
    "Wan Video 2.2 T2V-A14B",
    "Wan Video 2.5 T2V",
    "Wan Video 2.5 I2V",
    "ZImageTurbo",
    "ZImageBase",
];

/// Case-insensitive substring search over [`BASE_MODELS`]; a blank query matches all
pub fn search_base_models(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_lowercase();
    BASE_MODELS
        .iter()
        .copied()
        .filter(|model| query.is_empty() || model.to_lowercase().contains(&query))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub name: &'static str,
    pub id: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagGroup {
    pub label: &'static str,
    pub tags: &'static [Tag],
}

const fn tag(name: &'static str, id: &'static str) -> Tag {
    Tag { name, id }
}

pub const TAG_GROUPS: &[TagGroup] = &[
    TagGroup { label: "People", tags: &[tag("Woman", "5133"), tag("Man", "5232")] },
    TagGroup {
        label: "Animals & Creatures",
        tags: &[tag("Animal", "111768"), tag("Cat", "5132"), tag("Dog", "2539"), tag("Dragon", "5499")],
    },
    TagGroup {
        label: "Styles & Media",
        tags: &[
            tag("Photography", "5241"),
            tag("PhotoRealistic", "172"),
            tag("Modern art", "617"),
            tag("Anime", "4"),
            tag("Cartoon", "5186"),
            tag("Comics", "2397"),
        ],
    },
    TagGroup {
        label: "Environments & Places",
        tags: &[
            tag("Outdoors", "111763"),
            tag("Landscape", "8363"),
            tag("City", "55"),
            tag("Architecture", "414"),
            tag("Astronomy", "111767"),
        ],
    },
    TagGroup {
        label: "Clothing & Gear",
        tags: &[tag("Clothing", "5193"), tag("Latex Clothing", "111935"), tag("Armor", "5169"), tag("Costume", "2435")],
    },
    TagGroup {
        label: "Vehicles & Transport",
        tags: &[tag("Transportation", "111757"), tag("Car", "111805"), tag("Sports Car", "111833")],
    },
    TagGroup {
        label: "Genres & Characters",
        tags: &[
            tag("Game Character", "5211"),
            tag("Fantasy", "5207"),
            tag("Sci-Fi", "3060"),
            tag("Post Apocalyptic", "213"),
            tag("Robot", "6594"),
        ],
    },
    TagGroup { label: "Other", tags: &[tag("Food", "3915")] },
];

/// Look a tag up by id across all groups
pub fn find_tag(id: &str) -> Option<&'static Tag> {
    TAG_GROUPS.iter().flat_map(|group| group.tags.iter()).find(|tag| tag.id == id)
}
