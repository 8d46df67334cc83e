use serde::Deserialize;

use super::lenient::text;

/// Social and family history, submitted through the full history form.
///
/// Field names match the form inputs without their `form_` prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default, deserialize_with = "text")]
    pub tobacco: String,
    #[serde(default, deserialize_with = "text")]
    pub alcohol: String,
    #[serde(default, deserialize_with = "text")]
    pub exercise_patterns: String,
    #[serde(default, deserialize_with = "text")]
    pub recreational_drugs: String,
    #[serde(default, deserialize_with = "text")]
    pub coffee: String,
    #[serde(default, deserialize_with = "text")]
    pub counseling: String,
    #[serde(default, deserialize_with = "text")]
    pub hazardous_activities: String,
    #[serde(default, deserialize_with = "text")]
    pub additional_history: String,

    #[serde(default, deserialize_with = "text")]
    pub history_mother: String,
    #[serde(default, deserialize_with = "text")]
    pub history_father: String,
    #[serde(default, deserialize_with = "text")]
    pub history_siblings: String,
    #[serde(default, deserialize_with = "text")]
    pub history_spouse: String,
    #[serde(default, deserialize_with = "text")]
    pub history_offspring: String,

    #[serde(default, deserialize_with = "text")]
    pub relatives_cancer: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_diabetes: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_high_blood_pressure: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_heart_problems: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_stroke: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_epilepsy: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_mental_illness: String,
    #[serde(default, deserialize_with = "text")]
    pub relatives_suicide: String,
}

impl History {
    /// Every field paired with its key, in form order.
    pub fn fields(&self) -> [(&'static str, &str); 21] {
        [
            ("tobacco", self.tobacco.as_str()),
            ("alcohol", self.alcohol.as_str()),
            ("exercise_patterns", self.exercise_patterns.as_str()),
            ("recreational_drugs", self.recreational_drugs.as_str()),
            ("coffee", self.coffee.as_str()),
            ("counseling", self.counseling.as_str()),
            ("hazardous_activities", self.hazardous_activities.as_str()),
            ("additional_history", self.additional_history.as_str()),
            ("history_mother", self.history_mother.as_str()),
            ("history_father", self.history_father.as_str()),
            ("history_siblings", self.history_siblings.as_str()),
            ("history_spouse", self.history_spouse.as_str()),
            ("history_offspring", self.history_offspring.as_str()),
            ("relatives_cancer", self.relatives_cancer.as_str()),
            ("relatives_diabetes", self.relatives_diabetes.as_str()),
            ("relatives_high_blood_pressure", self.relatives_high_blood_pressure.as_str()),
            ("relatives_heart_problems", self.relatives_heart_problems.as_str()),
            ("relatives_stroke", self.relatives_stroke.as_str()),
            ("relatives_epilepsy", self.relatives_epilepsy.as_str()),
            ("relatives_mental_illness", self.relatives_mental_illness.as_str()),
            ("relatives_suicide", self.relatives_suicide.as_str()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.trim().is_empty())
    }
}
