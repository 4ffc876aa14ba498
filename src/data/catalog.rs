//! Provider indicator catalog.

use crate::domain::{Activity, Crop, Indicator};

const fn indicator(key: &'static str, id: &'static str, crop: Crop, activity: Activity) -> Indicator {
    Indicator { key, id, crop, activity }
}

/// Every (crop, activity) series the extractor knows about.
pub const INDICATORS: [Indicator; 9] = [
    indicator("cotton_planting", "705576963633053696", Crop::Cotton, Activity::Planting),
    indicator("cotton_harvest", "703492383711166464", Crop::Cotton, Activity::Harvest),
    indicator("cotton_commercialization", "703126874901708800", Crop::Cotton, Activity::Commercialization),
    indicator("corn_planting", "701211800784076800", Crop::Corn, Activity::Planting),
    indicator("corn_harvest", "708192508847325187", Crop::Corn, Activity::Harvest),
    indicator("corn_commercialization", "698758563422273536", Crop::Corn, Activity::Commercialization),
    indicator("soy_planting", "708192508889268224", Crop::Soy, Activity::Planting),
    indicator("soy_harvest", "708192508847325188", Crop::Soy, Activity::Harvest),
    indicator("soy_commercialization", "702389895595556864", Crop::Soy, Activity::Commercialization),
];

/// Provider state ids we can name.
const STATES: [(&str, &str); 1] = [("51", "Mato Grosso")];

/// State assumed when a record carries no state id.
pub const DEFAULT_STATE: &str = "Mato Grosso";

/// Indicators restricted to the given crops and activities, in catalog order.
pub fn select(crops: &[Crop], activities: &[Activity]) -> Vec<Indicator> {
    INDICATORS
        .iter()
        .filter(|i| crops.contains(&i.crop) && activities.contains(&i.activity))
        .copied()
        .collect()
}

pub fn state_name(state_id: &str) -> String {
    STATES
        .iter()
        .find(|(id, _)| *id == state_id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("State {state_id}"))
}
