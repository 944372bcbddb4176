//! Per-conversation generation parameters.

use serde::{Deserialize, Serialize};

/// Model used when a conversation predates explicit parameters or the
/// caller supplied none.
pub const DEFAULT_MODEL: &str = "llama-3.1-70b-instruct";

/// Default maximum completion length in tokens.
pub const DEFAULT_OUTPUT_LENGTH: u32 = 512;

/// Generation parameters, stored per conversation.
///
/// Parameters supplied with one submitted turn replace the stored set
/// wholesale — there is no field-level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub output_length: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            output_length: DEFAULT_OUTPUT_LENGTH,
            temperature: 0.6,
            top_p: 0.95,
            repetition_penalty: 1.05,
        }
    }
}

impl GenerationParams {
    /// Baseline parameters with a different model.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_values() {
        let params = GenerationParams::default();
        assert_eq!(params.output_length, 512);
        assert_eq!(params.temperature, 0.6);
        assert_eq!(params.top_p, 0.95);
        assert_eq!(params.repetition_penalty, 1.05);
    }

    #[test]
    fn test_round_trip() {
        let params = GenerationParams::for_model("test-model");
        let json = serde_json::to_string(&params).unwrap();
        let restored: GenerationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, params);
    }
}
