//! Entities covering whole text zones, used to redact motivations.

use jurisnorm_core::zoning::{DISPUTE_SUMMARY_ZONE, MOTIVATION_ZONE, ZoneRange, ZoneValue};
use jurisnorm_core::{Category, Entity, NormalizationError, Result, Zoning};

pub const MOTIVATION_SOURCE: &str = "motivation";
pub const DISPUTE_SUMMARY_SOURCE: &str = "exposeDuLitige";

/// The trimmed text of `range` as a [`Category::Motivations`] entity.
///
/// Offsets are in chars. Returns `None` when the zone is blank.
pub fn zone_entity(range: ZoneRange, text: &str, source: &str) -> Option<Entity> {
    let zone: Vec<char> = text
        .chars()
        .skip(range.start)
        .take(range.end.saturating_sub(range.start))
        .collect();

    let leading = zone.iter().take_while(|c| c.is_whitespace()).count();
    let trimmed: String = zone[leading..].iter().collect::<String>().trim_end().to_string();
    if trimmed.is_empty() {
        return None;
    }

    let len = trimmed.chars().count();
    let start = range.start + leading;
    Some(Entity {
        entity_id: format!("motivations_{len}"),
        category: Category::Motivations,
        start,
        end: start + len,
        text: trimmed,
        score: 1.0,
        source: source.to_string(),
    })
}

fn single_range(zone: Option<&ZoneValue>, name: &str) -> Result<Option<ZoneRange>> {
    let Some(zone) = zone else {
        return Ok(None);
    };
    match zone.ranges() {
        [] => Ok(None),
        [range] => Ok(Some(*range)),
        ranges => Err(NormalizationError::not_supported(
            "originalTextZoning",
            format!("{} \"{name}\" zones, cannot merge them", ranges.len()),
        )),
    }
}

/// Entities for the motivation and dispute-summary zones of `text`.
pub fn motivation_entities(zoning: Option<&Zoning>, text: &str) -> Result<Vec<Entity>> {
    let zoning = zoning.ok_or_else(|| {
        NormalizationError::not_supported("originalTextZoning", "zoning is missing")
    })?;
    if zoning.zones.is_none() {
        return Err(NormalizationError::not_supported(
            "originalTextZoning",
            "zoning has no zones",
        ));
    }

    let motivation = single_range(zoning.zone(MOTIVATION_ZONE), MOTIVATION_ZONE)?;
    let disputes = zoning
        .zone(DISPUTE_SUMMARY_ZONE)
        .map_or(&[][..], ZoneValue::ranges);
    if motivation.is_none() && disputes.is_empty() {
        return Err(NormalizationError::not_supported(
            "originalTextZoning",
            "neither motivation nor dispute summary zone found",
        ));
    }

    let motivation = motivation.map(|range| (range, MOTIVATION_SOURCE));
    let disputes = disputes.iter().map(|range| (*range, DISPUTE_SUMMARY_SOURCE));
    Ok(motivation
        .into_iter()
        .chain(disputes)
        .filter_map(|(range, source)| zone_entity(range, text, source))
        .collect())
}
