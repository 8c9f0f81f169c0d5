//! Client model id -> backend model id resolution.

use iris_config::{ModelSettings, RoutingPolicy, RoutingSettings};

/// Claude model tier named in a client model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Haiku,
    Sonnet,
    Opus,
}

impl Tier {
    /// Case-sensitive substring match, checked haiku, sonnet, opus.
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        [
            ("haiku", Tier::Haiku),
            ("sonnet", Tier::Sonnet),
            ("opus", Tier::Opus),
        ]
        .into_iter()
        .find(|(needle, _)| model_id.contains(needle))
        .map(|(_, tier)| tier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub model: String,
    pub routing: Option<RoutingPolicy>,
}

/// Map a client model id onto the configured backend.
///
/// - `vendor/model` ids are passed through with the default routing.
/// - ids naming a tier use that tier's model and routing, each falling back
///   to the defaults when unset.
/// - anything else uses the default model and routing.
pub fn resolve_model(
    model_id: &str,
    models: &ModelSettings,
    routing: &RoutingSettings,
) -> ResolvedModel {
    if model_id.contains('/') {
        return ResolvedModel {
            model: model_id.to_string(),
            routing: routing.default.clone(),
        };
    }

    let Some(tier) = Tier::from_model_id(model_id) else {
        return ResolvedModel {
            model: models.default.clone(),
            routing: routing.default.clone(),
        };
    };

    let (model, policy) = match tier {
        Tier::Haiku => (&models.haiku, &routing.haiku),
        Tier::Sonnet => (&models.sonnet, &routing.sonnet),
        Tier::Opus => (&models.opus, &routing.opus),
    };

    ResolvedModel {
        model: model.clone().unwrap_or_else(|| models.default.clone()),
        routing: policy.clone().or_else(|| routing.default.clone()),
    }
}
