//! Binds rule references to their definitions by name. There are no scopes, any rule can
//! reference any other rule regardless of definition order.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use cranelift_entity::PrimaryMap;

use crate::{
    error::{ErrorAccumulator, GrammarError},
    expr::Expr,
    grammar::{RuleDef, RuleHandle},
};

pub struct ResolveCx<'a> {
    pub err: &'a ErrorAccumulator,
    pub name_to_rule: HashMap<Arc<str>, RuleHandle>,
}

impl<'a> ResolveCx<'a> {
    pub fn new(rules: &PrimaryMap<RuleHandle, RuleDef>, err: &'a ErrorAccumulator) -> ResolveCx<'a> {
        let mut this = ResolveCx {
            err,
            name_to_rule: HashMap::new(),
        };
        this.populate(rules);
        this
    }

    fn populate(&mut self, rules: &PrimaryMap<RuleHandle, RuleDef>) {
        for (handle, rule) in rules.iter() {
            match self.name_to_rule.entry(rule.name.clone()) {
                // the first definition wins so that later references still resolve
                Entry::Occupied(_) => self
                    .err
                    .error(GrammarError::DuplicateRule(rule.name.to_string())),
                Entry::Vacant(v) => {
                    v.insert(handle);
                }
            }
        }
    }
}

pub fn resolve(rules: &mut PrimaryMap<RuleHandle, RuleDef>, cx: &ResolveCx) {
    resolve_identifiers(rules, cx);
    check_captures(rules, cx.err);
}

fn resolve_identifiers(rules: &mut PrimaryMap<RuleHandle, RuleDef>, cx: &ResolveCx) {
    for (_, rule) in rules.iter_mut() {
        let from = rule.name.clone();
        for expr in rule.exprs_mut() {
            expr.visit_mut(|expr| {
                if let Expr::Rule(reference) = expr {
                    match cx.name_to_rule.get(&reference.name) {
                        Some(&handle) => reference.handle = Some(handle),
                        None => cx.err.error(GrammarError::UnknownRule {
                            name: reference.name.to_string(),
                            from: from.to_string(),
                        }),
                    }
                }
            });
        }
    }
}

/// Every capture an action declares must be bound by a label in its own scope or in one of
/// the scopes enclosing it. Each rule body and operator starts from an empty scope.
fn check_captures(rules: &PrimaryMap<RuleHandle, RuleDef>, err: &ErrorAccumulator) {
    for (_, rule) in rules.iter() {
        for expr in rule.exprs() {
            check_action_scopes(expr, &expr.labels(), rule, err);
        }
    }
}

fn check_action_scopes(
    expr: &Expr,
    visible: &[Arc<str>],
    rule: &RuleDef,
    err: &ErrorAccumulator,
) {
    let Expr::Action(inner, action) = expr else {
        for child in expr.children() {
            check_action_scopes(child, visible, rule, err);
        }
        return;
    };

    let mut scope = visible.to_vec();
    for label in inner.labels() {
        if !scope.contains(&label) {
            scope.push(label);
        }
    }
    for name in action.names() {
        if !scope.contains(name) {
            err.error(GrammarError::UnknownCapture {
                rule: rule.name.to_string(),
                action: action.source().to_owned(),
                name: name.to_string(),
            });
        }
    }
    check_action_scopes(inner, &scope, rule, err);
}
