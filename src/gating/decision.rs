//! Purpose-decision maps derived from user actions.

use std::collections::BTreeMap;

use crate::config::RuntimeConfiguration;

/// A user action that produces a full decision map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentAction {
    AcceptAll,
    RejectAll,
    /// Toggles as read from the settings panel.
    Custom(BTreeMap<String, bool>),
}

impl ConsentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentAction::AcceptAll => "accept_all",
            ConsentAction::RejectAll => "reject_all",
            ConsentAction::Custom(_) => "custom",
        }
    }
}

/// Derive the decision map for every configured purpose.
///
/// Required purposes are always `true`. Custom keys the configuration does
/// not declare are dropped.
pub fn derive_decisions(
    config: &RuntimeConfiguration,
    action: &ConsentAction,
) -> BTreeMap<String, bool> {
    config
        .purposes
        .iter()
        .map(|purpose| {
            let granted = purpose.required
                || match action {
                    ConsentAction::AcceptAll => true,
                    ConsentAction::RejectAll => false,
                    ConsentAction::Custom(selection) => {
                        selection.get(&purpose.key).copied().unwrap_or(false)
                    }
                };
            (purpose.key.clone(), granted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::config_with;

    #[test]
    fn test_accept_all() {
        let config = config_with(&[("analytics", false), ("essential", true)]);
        let decisions = derive_decisions(&config, &ConsentAction::AcceptAll);
        assert_eq!(
            decisions,
            BTreeMap::from([
                ("analytics".to_string(), true),
                ("essential".to_string(), true)
            ])
        );
    }

    #[test]
    fn test_reject_all_keeps_required() {
        let config = config_with(&[("analytics", false), ("essential", true)]);
        let decisions = derive_decisions(&config, &ConsentAction::RejectAll);
        assert_eq!(
            decisions,
            BTreeMap::from([
                ("analytics".to_string(), false),
                ("essential".to_string(), true)
            ])
        );
    }

    #[test]
    fn test_custom_selection() {
        let config = config_with(&[
            ("analytics", false),
            ("marketing", false),
            ("essential", true),
        ]);
        let selection = BTreeMap::from([
            ("analytics".to_string(), true),
            ("essential".to_string(), false),
            ("ghost".to_string(), true),
        ]);
        let decisions = derive_decisions(&config, &ConsentAction::Custom(selection));
        assert_eq!(
            decisions,
            BTreeMap::from([
                ("analytics".to_string(), true),
                ("essential".to_string(), true),
                ("marketing".to_string(), false)
            ])
        );
    }
}
