//! Static catalog of every supported record type, grouped by category.
//!
//! The registry is the single source of truth for which types the
//! aggregators enumerate. A category result always carries one entry per
//! type listed here, whether or not the fetch succeeded.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const STEPS_TYPE_ID: &str = "Steps";
pub const HEART_RATE_TYPE_ID: &str = "HeartRate";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    Activity,
    #[serde(rename = "Body Measurement")]
    BodyMeasurement,
    #[serde(rename = "Cycle Tracking")]
    CycleTracking,
    Nutrition,
    Sleep,
    Vitals,
    Wellness,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Activity,
        Category::BodyMeasurement,
        Category::CycleTracking,
        Category::Nutrition,
        Category::Sleep,
        Category::Vitals,
        Category::Wellness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Activity => "Activity",
            Category::BodyMeasurement => "Body Measurement",
            Category::CycleTracking => "Cycle Tracking",
            Category::Nutrition => "Nutrition",
            Category::Sleep => "Sleep",
            Category::Vitals => "Vitals",
            Category::Wellness => "Wellness",
        }
    }

    /// Case-insensitive lookup by display name; `_` is accepted for spaces.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().replace('_', " ");
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(&wanted))
    }

    /// Lower-cased name with spaces replaced by underscores, e.g. `body_measurement`.
    pub fn file_stem(self) -> String {
        self.name().to_lowercase().replace(' ', "_")
    }

    pub fn record_types(self) -> &'static [RecordTypeConfig] {
        match self {
            Category::Activity => ACTIVITY,
            Category::BodyMeasurement => BODY_MEASUREMENT,
            Category::CycleTracking => CYCLE_TRACKING,
            Category::Nutrition => NUTRITION,
            Category::Sleep => SLEEP,
            Category::Vitals => VITALS,
            Category::Wellness => WELLNESS,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One supported record type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordTypeConfig {
    pub type_id: &'static str,
    pub category: Category,
    pub display_name: &'static str,
}

impl RecordTypeConfig {
    pub const fn new(type_id: &'static str, category: Category, display_name: &'static str) -> Self {
        Self {
            type_id,
            category,
            display_name,
        }
    }

    /// Capability id that gates reading this type.
    pub fn read_capability(&self) -> String {
        crate::permissions::read_capability(self.type_id)
    }
}

const fn activity(type_id: &'static str, display_name: &'static str) -> RecordTypeConfig {
    RecordTypeConfig::new(type_id, Category::Activity, display_name)
}

const fn body(type_id: &'static str, display_name: &'static str) -> RecordTypeConfig {
    RecordTypeConfig::new(type_id, Category::BodyMeasurement, display_name)
}

const fn cycle(type_id: &'static str, display_name: &'static str) -> RecordTypeConfig {
    RecordTypeConfig::new(type_id, Category::CycleTracking, display_name)
}

const fn vitals(type_id: &'static str, display_name: &'static str) -> RecordTypeConfig {
    RecordTypeConfig::new(type_id, Category::Vitals, display_name)
}

pub const ACTIVITY: &[RecordTypeConfig] = &[
    activity("ActiveCaloriesBurned", "Active Calories Burned"),
    activity("CyclingPedalingCadence", "Cycling Pedaling Cadence"),
    activity("Distance", "Distance"),
    activity("ElevationGained", "Elevation Gained"),
    activity("ExerciseSession", "Exercise Session"),
    activity("FloorsClimbed", "Floors Climbed"),
    activity("Power", "Power"),
    activity("Speed", "Speed"),
    activity(STEPS_TYPE_ID, "Steps"),
    activity("StepsCadence", "Steps Cadence"),
    activity("TotalCaloriesBurned", "Total Calories Burned"),
    activity("Vo2Max", "VO2 Max"),
    activity("WheelchairPushes", "Wheelchair Pushes"),
];

pub const BODY_MEASUREMENT: &[RecordTypeConfig] = &[
    body("BasalMetabolicRate", "Basal Metabolic Rate"),
    body("BodyFat", "Body Fat"),
    body("BodyWaterMass", "Body Water Mass"),
    body("BoneMass", "Bone Mass"),
    body("Height", "Height"),
    body("LeanBodyMass", "Lean Body Mass"),
    body("Weight", "Weight"),
];

pub const CYCLE_TRACKING: &[RecordTypeConfig] = &[
    cycle("CervicalMucus", "Cervical Mucus"),
    cycle("IntermenstrualBleeding", "Intermenstrual Bleeding"),
    cycle("MenstruationFlow", "Menstruation Flow"),
    cycle("MenstruationPeriod", "Menstruation Period"),
    cycle("OvulationTest", "Ovulation Test"),
    cycle("SexualActivity", "Sexual Activity"),
];

pub const NUTRITION: &[RecordTypeConfig] = &[
    RecordTypeConfig::new("Hydration", Category::Nutrition, "Hydration"),
    RecordTypeConfig::new("Nutrition", Category::Nutrition, "Nutrition"),
];

pub const SLEEP: &[RecordTypeConfig] = &[RecordTypeConfig::new(
    "SleepSession",
    Category::Sleep,
    "Sleep Session",
)];

pub const VITALS: &[RecordTypeConfig] = &[
    vitals("BasalBodyTemperature", "Basal Body Temperature"),
    vitals("BloodGlucose", "Blood Glucose"),
    vitals("BloodPressure", "Blood Pressure"),
    vitals("BodyTemperature", "Body Temperature"),
    vitals(HEART_RATE_TYPE_ID, "Heart Rate"),
    vitals("HeartRateVariabilityRmssd", "Heart Rate Variability"),
    vitals("OxygenSaturation", "Oxygen Saturation"),
    vitals("RespiratoryRate", "Respiratory Rate"),
    vitals("RestingHeartRate", "Resting Heart Rate"),
    vitals("SkinTemperature", "Skin Temperature"),
];

pub const WELLNESS: &[RecordTypeConfig] = &[RecordTypeConfig::new(
    "MindfulnessSession",
    Category::Wellness,
    "Mindfulness Session",
)];

static ALL_RECORD_TYPES: LazyLock<Vec<RecordTypeConfig>> = LazyLock::new(|| {
    Category::ALL
        .into_iter()
        .flat_map(|c| c.record_types().iter().copied())
        .collect()
});

static BY_CATEGORY: LazyLock<BTreeMap<Category, &'static [RecordTypeConfig]>> =
    LazyLock::new(|| {
        Category::ALL
            .into_iter()
            .map(|c| (c, c.record_types()))
            .collect()
    });

/// Every registered type, in category order.
pub fn all_record_types() -> &'static [RecordTypeConfig] {
    &ALL_RECORD_TYPES
}

pub fn records_by_category() -> &'static BTreeMap<Category, &'static [RecordTypeConfig]> {
    &BY_CATEGORY
}

pub fn records_for_category(category: Category) -> &'static [RecordTypeConfig] {
    records_by_category().get(&category).copied().unwrap_or(&[])
}

/// Lookup by category display name. Unknown names yield an empty slice.
pub fn records_for_category_name(name: &str) -> &'static [RecordTypeConfig] {
    Category::from_name(name)
        .map(records_for_category)
        .unwrap_or(&[])
}

pub fn find_by_type_id(type_id: &str) -> Option<&'static RecordTypeConfig> {
    ALL_RECORD_TYPES.iter().find(|c| c.type_id == type_id)
}

pub fn find_by_display_name(display_name: &str) -> Option<&'static RecordTypeConfig> {
    ALL_RECORD_TYPES
        .iter()
        .find(|c| c.display_name == display_name)
}
