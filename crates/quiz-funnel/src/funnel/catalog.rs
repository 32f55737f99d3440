use super::domain::OutcomeRecord;
use serde::Serialize;

pub const CARDS_PER_ROW: usize = 4;

/// Landing page card derived from an outcome record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterCard {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub bg_color: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&OutcomeRecord> for CharacterCard {
    fn from(record: &OutcomeRecord) -> Self {
        Self {
            id: record.id,
            kind: record.title.clone(),
            bg_color: record.post_color.clone(),
            description: record.short_description.clone(),
            image: Some(record.thumbnail_url.clone()).filter(|url| !url.is_empty()),
        }
    }
}

/// Cards sorted by id.
pub fn cards(records: &[OutcomeRecord]) -> Vec<CharacterCard> {
    let mut cards: Vec<CharacterCard> = records.iter().map(CharacterCard::from).collect();
    cards.sort_by_key(|card| card.id);
    cards
}

pub fn card_rows(cards: &[CharacterCard]) -> Vec<Vec<CharacterCard>> {
    cards.chunks(CARDS_PER_ROW).map(<[_]>::to_vec).collect()
}

/// Everything the landing page needs: the cards, their grid rows, and result images the
/// client should start fetching before the quiz ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Landing {
    pub cards: Vec<CharacterCard>,
    pub rows: Vec<Vec<CharacterCard>>,
    pub preload: Vec<String>,
}

impl Landing {
    pub fn build(records: &[OutcomeRecord]) -> Self {
        let cards = cards(records);
        Self {
            rows: card_rows(&cards),
            cards,
            preload: preload_images(records),
        }
    }
}

/// Redirect identifiers travel as URL path segments with `/` replaced by `-`.
pub fn outcome_slug(redirect: &str) -> String {
    redirect.replace('/', "-")
}

/// Inverse of [`outcome_slug`]. Titles that legitimately contain `-` cannot be recovered.
pub fn title_from_slug(slug: &str) -> String {
    slug.replace('-', "/")
}

/// Everything the result page needs for the matched outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub id: u32,
    pub title: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_script: Option<String>,
}

pub fn find_result(records: &[OutcomeRecord], slug: &str) -> Option<ResultView> {
    let title = title_from_slug(slug);
    let record = records.iter().find(|record| record.title == title)?;

    Some(ResultView {
        id: record.id,
        title: record.title.clone(),
        images: record
            .result_images()
            .into_iter()
            .map(str::to_string)
            .collect(),
        referrer_url: record.referrer_url.clone().filter(|url| !url.is_empty()),
        tracking_script: record.script_tag.as_deref().and_then(tracking_script),
    })
}

/// Accepts the markup only when its first element is a `<script>` tag.
pub fn tracking_script(markup: &str) -> Option<String> {
    let trimmed = markup.trim();
    let head = trimmed.get(..7)?;
    if !head.eq_ignore_ascii_case("<script") {
        return None;
    }
    match trimmed.as_bytes().get(7) {
        Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
            Some(trimmed.to_string())
        }
        _ => None,
    }
}

/// Result image URLs across all outcomes, for warming caches while the quiz runs.
pub fn preload_images(records: &[OutcomeRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.result_images())
        .map(str::to_string)
        .collect()
}
