//! Parser for the routing agent's tagged replies

const TECH_TAG_PREFIX: &str = "[TECH_IDENTIFIED:";
const SCOPING_TAG: &str = "[SCOPING_QUESTION]";

const EMPTY_RESPONSE_EXPLANATION: &str = "Error: Empty response received.";
const SCOPING_FALLBACK: &str = "Please provide more details.";

/// Structured reading of one routing reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub identified: bool,
    pub technology: Option<String>,
    pub explanation: String,
    pub is_scoping_question: bool,
}

impl RoutingDecision {
    fn identified(technology: &str, explanation: &str) -> Self {
        let explanation = if explanation.is_empty() {
            format!("Identified technology: {technology}. Preparing detailed information...")
        } else {
            explanation.to_string()
        };
        Self {
            identified: true,
            technology: Some(technology.to_string()),
            explanation,
            is_scoping_question: false,
        }
    }

    fn scoping(question: &str) -> Self {
        let explanation = if question.is_empty() {
            SCOPING_FALLBACK
        } else {
            question
        };
        Self {
            identified: false,
            technology: None,
            explanation: explanation.to_string(),
            is_scoping_question: true,
        }
    }

    fn plain(text: &str) -> Self {
        Self {
            identified: false,
            technology: None,
            explanation: text.to_string(),
            is_scoping_question: false,
        }
    }

    /// The identified technology, only when identification succeeded
    pub fn technology(&self) -> Option<&str> {
        self.technology.as_deref().filter(|_| self.identified)
    }
}

/// The literal that marks the handoff message for `technology` in history
pub fn handoff_marker(technology: &str) -> String {
    format!("{TECH_TAG_PREFIX} {technology}]")
}

/// Parse a routing reply. Never fails: anything that is not a well-formed
/// tag degrades to a plain conversational reply carrying the original text.
pub fn parse_routing_response(text: &str) -> RoutingDecision {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return RoutingDecision::plain(EMPTY_RESPONSE_EXPLANATION);
    }

    if let Some(rest) = trimmed.strip_prefix(TECH_TAG_PREFIX) {
        if let Some((name, remainder)) = rest.split_once(']') {
            let name = name.trim();
            if !name.is_empty() {
                return RoutingDecision::identified(name, remainder.trim());
            }
        }
        tracing::warn!(response = %trimmed, "Malformed technology tag in routing reply");
        return RoutingDecision::plain(text);
    }

    if let Some(rest) = trimmed.strip_prefix(SCOPING_TAG) {
        return RoutingDecision::scoping(rest.trim());
    }

    RoutingDecision::plain(text)
}
