use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level categories the classifier template asks the model to choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentCategory {
    CancelTrip,
    CancellationPolicy,
    FlightStatus,
    SeatAvailability,
    PetTravel,
    Unknown,
}

impl IntentCategory {
    pub const ALL: [Self; 6] = [
        Self::CancelTrip,
        Self::CancellationPolicy,
        Self::FlightStatus,
        Self::SeatAvailability,
        Self::PetTravel,
        Self::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CancelTrip => "Cancel Trip",
            Self::CancellationPolicy => "Cancellation Policy",
            Self::FlightStatus => "Flight Status",
            Self::SeatAvailability => "Seat Availability",
            Self::PetTravel => "Pet Travel",
            Self::Unknown => "Unknown",
        }
    }

    /// Maps a model-produced label onto a category. Matching ignores case and
    /// surrounding whitespace; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
            .unwrap_or(Self::Unknown)
    }
}

/// Confidence as reported by the model. Numeric scores are the expected shape;
/// anything else is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Score(f64),
    Raw(Value),
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Score(0.0)
    }
}

impl Confidence {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(score) => Some(*score),
            Self::Raw(_) => None,
        }
    }
}

/// One element of the classifier's `detected_intents` array, kept exactly
/// as the model produced it. Elements of any shape are accepted; the
/// accessors read the documented keys (`type`, `sub_intent`, `confidence`,
/// `justification`) only when they have the expected type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectedIntent(Value);

impl DetectedIntent {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.as_object()?.get(key)
    }

    pub fn intent_type(&self) -> Option<&str> {
        self.field("type").and_then(Value::as_str)
    }

    pub fn sub_intent(&self) -> Option<&str> {
        self.field("sub_intent").and_then(Value::as_str)
    }

    pub fn justification(&self) -> Option<&str> {
        self.field("justification").and_then(Value::as_str)
    }

    /// Missing confidence reads as a zero score.
    pub fn confidence(&self) -> Confidence {
        match self.field("confidence") {
            None => Confidence::default(),
            Some(value) => match value.as_f64() {
                Some(score) => Confidence::Score(score),
                None => Confidence::Raw(value.clone()),
            },
        }
    }

    /// `Unknown` unless `type` is a string naming a known category.
    pub fn category(&self) -> IntentCategory {
        self.intent_type().map_or(IntentCategory::Unknown, IntentCategory::from_label)
    }

    /// The `type` value as text: strings verbatim, other JSON values
    /// rendered, `Unknown` when absent or empty. Non-object entries render
    /// as themselves.
    pub fn type_label(&self) -> String {
        if self.0.is_object() {
            label_or_unknown(self.field("type"))
        } else {
            label_or_unknown(Some(&self.0))
        }
    }

    /// One-line description in the form shown to users, e.g.
    /// `Flight Status - Get flight status (confidence: 0.80)`. Entries that
    /// are not objects are shown as-is.
    pub fn summary(&self) -> String {
        if !self.0.is_object() {
            return self.type_label();
        }
        let intent_type = self.type_label();
        let sub_intent = label_or_unknown(self.field("sub_intent"));
        match self.confidence().score() {
            Some(score) => format!("{intent_type} - {sub_intent} (confidence: {score:.2})"),
            None => format!("{intent_type} - {sub_intent}"),
        }
    }
}

impl From<Value> for DetectedIntent {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

fn label_or_unknown(value: Option<&Value>) -> String {
    let label = match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if label.is_empty() {
        "Unknown".to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Confidence, DetectedIntent, IntentCategory};

    #[test]
    fn labels_round_trip_case_insensitively() {
        for category in IntentCategory::ALL {
            assert_eq!(IntentCategory::from_label(category.label()), category);
        }
        assert_eq!(IntentCategory::from_label("  flight status "), IntentCategory::FlightStatus);
        assert_eq!(IntentCategory::from_label("Lost Luggage"), IntentCategory::Unknown);
    }

    #[test]
    fn string_confidence_is_passed_through() {
        let intent = DetectedIntent::new(json!({
            "type": "Pet Travel",
            "sub_intent": "Get pet travel policy",
            "confidence": "high",
            "justification": "mentions pets"
        }));

        assert_eq!(intent.confidence(), Confidence::Raw(json!("high")));
        assert_eq!(intent.confidence().score(), None);
        assert_eq!(intent.category(), IntentCategory::PetTravel);
        assert_eq!(intent.justification(), Some("mentions pets"));
        assert_eq!(intent.summary(), "Pet Travel - Get pet travel policy");
    }

    #[test]
    fn missing_fields_default_and_extra_keys_survive() {
        let intent = DetectedIntent::new(json!({
            "type": "Flight Status",
            "confidence": 0.8,
            "flight_number": "AI101"
        }));

        assert_eq!(intent.sub_intent(), None);
        assert_eq!(intent.field("flight_number"), Some(&json!("AI101")));
        assert_eq!(intent.summary(), "Flight Status - Unknown (confidence: 0.80)");

        let serialized = serde_json::to_value(&intent).expect("intent should serialize");
        assert_eq!(
            serialized,
            json!({"type": "Flight Status", "confidence": 0.8, "flight_number": "AI101"})
        );
    }

    #[test]
    fn oddly_typed_entries_are_kept_verbatim() {
        let numeric = DetectedIntent::new(json!({"type": 7, "sub_intent": ["a", "b"]}));
        assert_eq!(numeric.intent_type(), None);
        assert_eq!(numeric.category(), IntentCategory::Unknown);
        assert_eq!(numeric.type_label(), "7");
        assert_eq!(numeric.summary(), r#"7 - ["a","b"] (confidence: 0.00)"#);

        let bare: DetectedIntent =
            serde_json::from_value(json!("Flight Status")).expect("any value is an intent");
        assert_eq!(bare.category(), IntentCategory::Unknown);
        assert_eq!(bare.confidence(), Confidence::Score(0.0));
        assert_eq!(bare.summary(), "Flight Status");
        assert_eq!(bare.into_raw(), json!("Flight Status"));
    }
}
