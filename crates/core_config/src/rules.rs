//! Event communication rule matching.
//!
//! When a window content reports an object selection, the rules decide
//! which other window shall navigate to that object. The first active
//! rule whose criterion matches wins; a rule never routes a selection
//! back to the window it came from (no rule match means the selection
//! stays local, so self-routing is covered without a rule).

use tracing::error;

use crate::model::{
    CommunicationRule, ObjectFilterInstanceType, ObjectFilterType, ObjectNode,
};

/// Returns the target window's configuration id of the first matching
/// active rule, or `None` when no rule applies.
pub fn match_rules<'a>(
    rules: &'a [CommunicationRule],
    source_window_id: &str,
    node: &ObjectNode,
) -> Option<&'a str> {
    for rule in rules {
        if !rule.is_rule_active || rule.target_window_id == source_window_id {
            continue;
        }
        if let Some(source) = &rule.source_window_id {
            if source != source_window_id {
                continue;
            }
        }
        if criterion_matches(rule, node) {
            return Some(&rule.target_window_id);
        }
    }
    None
}

fn criterion_matches(rule: &CommunicationRule, node: &ObjectNode) -> bool {
    let criterion = &rule.filter_criteria;
    match criterion.filter_type {
        ObjectFilterType::ObjectDiscipline => {
            criterion.filter_value == node.attributes.discipline_id.to_string()
        }
        ObjectFilterType::ObjectFunction => {
            criterion.filter_value == node.attributes.function_name
        }
        ObjectFilterType::ObjectInstance => instance_matches(rule, node),
        ObjectFilterType::ObjectManagedType => {
            criterion.filter_value == node.attributes.managed_type_name
        }
        ObjectFilterType::ObjectModel => {
            criterion.filter_value == node.attributes.object_model_name
        }
        ObjectFilterType::ObjectType => {
            criterion.filter_value == node.attributes.type_id.to_string()
        }
    }
}

fn instance_matches(rule: &CommunicationRule, node: &ObjectNode) -> bool {
    let criterion = &rule.filter_criteria;
    match criterion.filter_instance_type {
        Some(ObjectFilterInstanceType::OnlyInstance) => is_instance(criterion.filter_value.as_str(), node),
        Some(ObjectFilterInstanceType::OnlyChildren) => is_direct_child(&criterion.filter_value, node),
        Some(ObjectFilterInstanceType::OnlyRecursiveChildren) => {
            is_recursive_child(&criterion.filter_value, node)
        }
        Some(ObjectFilterInstanceType::InstanceAndChildren) => {
            is_instance(criterion.filter_value.as_str(), node)
                || is_direct_child(&criterion.filter_value, node)
        }
        Some(ObjectFilterInstanceType::InstanceAndRecursiveChildren) => {
            is_instance(criterion.filter_value.as_str(), node)
                || is_recursive_child(&criterion.filter_value, node)
        }
        None => {
            error!(
                filter_value = %criterion.filter_value,
                "instance rule without instance type"
            );
            false
        }
    }
}

fn is_instance(filter_value: &str, node: &ObjectNode) -> bool {
    filter_value == node.designation
}

/// Exactly one hierarchy level below the filter value.
///
/// The remainder after the prefix must split on `'.'` into an empty
/// segment and exactly one name, so `"Sys1.A.B"` is a direct child of
/// `"Sys1.A"` while `"Sys1.AB"` and `"Sys1.A.B.C"` are not.
fn is_direct_child(filter_value: &str, node: &ObjectNode) -> bool {
    match node.designation.strip_prefix(filter_value) {
        Some(remaining) => {
            let segments: Vec<&str> = remaining.split('.').collect();
            segments.len() == 2 && segments[0].is_empty()
        }
        None => false,
    }
}

/// Any hierarchy level below the filter value.
fn is_recursive_child(filter_value: &str, node: &ObjectNode) -> bool {
    match node.designation.strip_prefix(filter_value) {
        Some(remaining) => {
            let segments: Vec<&str> = remaining.split('.').collect();
            segments.len() >= 2 && segments[0].is_empty()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterCriterion, ObjectAttributes};

    fn node(designation: &str) -> ObjectNode {
        ObjectNode {
            designation: designation.into(),
            attributes: ObjectAttributes {
                discipline_id: 42,
                function_name: "Ventilation".into(),
                managed_type_name: "Graphic".into(),
                object_model_name: "GMS_Pump".into(),
                type_id: 7,
            },
        }
    }

    fn instance_rule(value: &str, instance_type: ObjectFilterInstanceType) -> CommunicationRule {
        CommunicationRule {
            filter_criteria: FilterCriterion {
                filter_type: ObjectFilterType::ObjectInstance,
                filter_instance_type: Some(instance_type),
                filter_value: value.into(),
                filter_value_descriptor: value.into(),
            },
            source_window_id: None,
            target_window_id: "target".into(),
            is_rule_active: true,
        }
    }

    fn attribute_rule(filter_type: ObjectFilterType, value: &str) -> CommunicationRule {
        CommunicationRule {
            filter_criteria: FilterCriterion {
                filter_type,
                filter_instance_type: None,
                filter_value: value.into(),
                filter_value_descriptor: value.into(),
            },
            source_window_id: None,
            target_window_id: "target".into(),
            is_rule_active: true,
        }
    }

    #[test]
    fn attribute_criteria() {
        let n = node("Sys1.A");
        for (ty, hit, miss) in [
            (ObjectFilterType::ObjectDiscipline, "42", "43"),
            (ObjectFilterType::ObjectFunction, "Ventilation", "Heating"),
            (ObjectFilterType::ObjectManagedType, "Graphic", "Trend"),
            (ObjectFilterType::ObjectModel, "GMS_Pump", "GMS_Valve"),
            (ObjectFilterType::ObjectType, "7", "8"),
        ] {
            assert_eq!(
                match_rules(&[attribute_rule(ty, hit)], "src", &n),
                Some("target")
            );
            assert_eq!(match_rules(&[attribute_rule(ty, miss)], "src", &n), None);
        }
    }

    #[test]
    fn only_instance_scope() {
        let rule = [instance_rule("Sys1.A", ObjectFilterInstanceType::OnlyInstance)];
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B")), None);
    }

    #[test]
    fn only_children_scope() {
        let rule = [instance_rule("Sys1.A", ObjectFilterInstanceType::OnlyChildren)];
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A")), None);
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B.C")), None);
        // "Sys1.AB" shares the string prefix but is a sibling, not a child.
        assert_eq!(match_rules(&rule, "src", &node("Sys1.AB")), None);
    }

    #[test]
    fn only_recursive_children_scope() {
        let rule = [instance_rule(
            "Sys1.A",
            ObjectFilterInstanceType::OnlyRecursiveChildren,
        )];
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A")), None);
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B.C")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.AB")), None);
    }

    #[test]
    fn instance_and_children_scopes() {
        let rule = [instance_rule(
            "Sys1.A",
            ObjectFilterInstanceType::InstanceAndChildren,
        )];
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B")), Some("target"));
        assert_eq!(match_rules(&rule, "src", &node("Sys1.A.B.C")), None);

        let recursive = [instance_rule(
            "Sys1.A",
            ObjectFilterInstanceType::InstanceAndRecursiveChildren,
        )];
        assert_eq!(match_rules(&recursive, "src", &node("Sys1.A")), Some("target"));
        assert_eq!(
            match_rules(&recursive, "src", &node("Sys1.A.B.C")),
            Some("target")
        );
    }

    #[test]
    fn inactive_rules_and_self_targets_are_skipped() {
        let mut inactive = attribute_rule(ObjectFilterType::ObjectDiscipline, "42");
        inactive.is_rule_active = false;
        assert_eq!(match_rules(&[inactive], "src", &node("Sys1.A")), None);

        let self_target = attribute_rule(ObjectFilterType::ObjectDiscipline, "42");
        assert_eq!(match_rules(&[self_target], "target", &node("Sys1.A")), None);
    }

    #[test]
    fn source_constraint() {
        let mut rule = attribute_rule(ObjectFilterType::ObjectDiscipline, "42");
        rule.source_window_id = Some("only-this".into());
        assert_eq!(
            match_rules(std::slice::from_ref(&rule), "only-this", &node("Sys1.A")),
            Some("target")
        );
        assert_eq!(
            match_rules(std::slice::from_ref(&rule), "other", &node("Sys1.A")),
            None
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut first = attribute_rule(ObjectFilterType::ObjectDiscipline, "42");
        first.target_window_id = "first".into();
        let mut second = attribute_rule(ObjectFilterType::ObjectDiscipline, "42");
        second.target_window_id = "second".into();
        assert_eq!(
            match_rules(&[first, second], "src", &node("Sys1.A")),
            Some("first")
        );
    }
}
