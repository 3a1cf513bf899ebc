//! Plan expansion: templates in, flat target list out.
//!
//! Expansion is a pure pass over the plan in declaration order. Every template
//! registers its expanded targets as a *group* under the template's name, so
//! later templates can map over it or combine it. Expanded names are derived
//! from the template name and the bound values (`model_16`, `eval_model_16`),
//! which makes them stable across runs.

use crate::error::PlanError;
use crate::placeholder::substitute;
use crate::target::{GroupMeta, Target};
use crate::transform::{Param, ParamValues, Transform};
use kiln_common::{is_ident_char, is_valid_target_name};
use std::collections::{BTreeMap, HashMap};

/// An ordered, declarative set of targets and templates.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    targets: Vec<Target>,
}

impl Plan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target or template.
    pub fn add(&mut self, target: Target) -> &mut Self {
        self.targets.push(target);
        self
    }

    /// Builder-style [`Plan::add`].
    pub fn with(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Declared targets and templates, in plan order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of declared entries (templates count once).
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if the plan declares nothing.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Expands every template into concrete targets.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] for malformed transforms, invalid names, or
    /// duplicate names after expansion.
    pub fn expand(&self) -> Result<ExpandedPlan, PlanError> {
        let mut out: Vec<Target> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

        for template in &self.targets {
            let produced = match &template.transform {
                None => {
                    out.push(template.clone());
                    continue;
                }
                Some(Transform::Map(params)) => {
                    let rows = zip_rows(template.name(), params, &groups, &out)?;
                    emit_rows(template, rows, &mut out)
                }
                Some(Transform::Cross(params)) => {
                    let rows = cross_rows(template.name(), params, &groups, &out)?;
                    emit_rows(template, rows, &mut out)
                }
                Some(Transform::Combine { group, by }) => {
                    emit_combine(template, group, by.as_deref(), &groups, &mut out)?
                }
            };
            if groups.insert(template.name.clone(), produced).is_some() {
                return Err(PlanError::DuplicateTarget(template.name.clone()));
            }
        }

        let mut index = HashMap::with_capacity(out.len());
        for (i, target) in out.iter().enumerate() {
            if !is_valid_target_name(&target.name) {
                return Err(PlanError::InvalidName(target.name.clone()));
            }
            if index.insert(target.name.clone(), i).is_some() {
                return Err(PlanError::DuplicateTarget(target.name.clone()));
            }
        }

        let groups = groups
            .into_iter()
            .map(|(name, members)| {
                let names = members.iter().map(|&i| out[i].name.clone()).collect();
                (name, names)
            })
            .collect();

        Ok(ExpandedPlan {
            targets: out,
            index,
            groups,
        })
    }
}

/// The flat result of [`Plan::expand`].
#[derive(Clone, Debug)]
pub struct ExpandedPlan {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
    groups: BTreeMap<String, Vec<String>>,
}

impl ExpandedPlan {
    /// Concrete targets in plan order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Looks up a target by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    /// Plan position of a target.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns `true` if a target with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Members of the group registered by template `name`.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// All groups, ordered by template name.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of concrete targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// One parameter bound to one value. `member` is the index of the upstream
/// target when the value came from a group.
#[derive(Clone, Debug)]
struct Binding {
    param: String,
    value: String,
    member: Option<usize>,
}

fn resolve(
    template: &str,
    param: &Param,
    groups: &HashMap<String, Vec<usize>>,
    out: &[Target],
) -> Result<Vec<Binding>, PlanError> {
    let bindings: Vec<Binding> = match &param.values {
        ParamValues::Literal(values) => values
            .iter()
            .map(|v| Binding {
                param: param.name.clone(),
                value: v.clone(),
                member: None,
            })
            .collect(),
        ParamValues::Group(group) => groups
            .get(group)
            .ok_or_else(|| PlanError::UnknownGroup {
                template: template.to_string(),
                group: group.clone(),
            })?
            .iter()
            .map(|&i| Binding {
                param: param.name.clone(),
                value: out[i].name.clone(),
                member: Some(i),
            })
            .collect(),
    };
    if bindings.is_empty() {
        return Err(PlanError::EmptyParameter {
            template: template.to_string(),
            param: param.name.clone(),
        });
    }
    Ok(bindings)
}

fn zip_rows(
    template: &str,
    params: &[Param],
    groups: &HashMap<String, Vec<usize>>,
    out: &[Target],
) -> Result<Vec<Vec<Binding>>, PlanError> {
    if params.is_empty() {
        return Err(PlanError::NoParameters {
            template: template.to_string(),
        });
    }
    let columns = params
        .iter()
        .map(|p| resolve(template, p, groups, out))
        .collect::<Result<Vec<_>, _>>()?;

    let len = columns[0].len();
    if columns.iter().any(|c| c.len() != len) {
        return Err(PlanError::MismatchedLengths {
            template: template.to_string(),
            lengths: params
                .iter()
                .zip(&columns)
                .map(|(p, c)| (p.name.clone(), c.len()))
                .collect(),
        });
    }

    Ok((0..len)
        .map(|row| columns.iter().map(|c| c[row].clone()).collect())
        .collect())
}

fn cross_rows(
    template: &str,
    params: &[Param],
    groups: &HashMap<String, Vec<usize>>,
    out: &[Target],
) -> Result<Vec<Vec<Binding>>, PlanError> {
    if params.is_empty() {
        return Err(PlanError::NoParameters {
            template: template.to_string(),
        });
    }
    let mut rows: Vec<Vec<Binding>> = vec![Vec::new()];
    for param in params {
        let column = resolve(template, param, groups, out)?;
        rows = rows
            .into_iter()
            .flat_map(|row| {
                column.iter().map(move |b| {
                    let mut next = row.clone();
                    next.push(b.clone());
                    next
                })
            })
            .collect();
    }
    Ok(rows)
}

fn emit_rows(template: &Target, rows: Vec<Vec<Binding>>, out: &mut Vec<Target>) -> Vec<usize> {
    let mut produced = Vec::with_capacity(rows.len());
    for row in rows {
        let mut params: Vec<(String, String)> = Vec::new();
        let mut deps = template.deps.clone();
        for binding in &row {
            if let Some(member) = binding.member {
                for (k, v) in &out[member].meta.params {
                    bind(&mut params, k, v);
                }
                if !deps.contains(&binding.value) {
                    deps.push(binding.value.clone());
                }
            }
        }
        for binding in &row {
            bind(&mut params, &binding.param, &binding.value);
        }

        let suffix: Vec<String> = row.iter().map(|b| sanitize(&b.value)).collect();
        let name = format!("{}_{}", template.name, suffix.join("_"));
        let text = substitute(template.text(), |placeholder| {
            row.iter()
                .find(|b| b.param == placeholder)
                .map(|b| match b.member {
                    Some(_) => format!("${{{}}}", b.value),
                    None => b.value.clone(),
                })
        });

        let mut target = template.clone();
        target.name = name;
        target.command = template.command.with_text(text);
        target.deps = deps;
        target.transform = None;
        target.meta = GroupMeta {
            template: Some(template.name.clone()),
            params,
            members: Vec::new(),
        };
        produced.push(out.len());
        out.push(target);
    }
    produced
}

fn emit_combine(
    template: &Target,
    group: &str,
    by: Option<&str>,
    groups: &HashMap<String, Vec<usize>>,
    out: &mut Vec<Target>,
) -> Result<Vec<usize>, PlanError> {
    let members = groups.get(group).ok_or_else(|| PlanError::UnknownGroup {
        template: template.name.clone(),
        group: group.to_string(),
    })?;

    // (bound value of `by`, member indices), in first-appearance order.
    let mut partitions: Vec<(Option<String>, Vec<usize>)> = Vec::new();
    match by {
        None => partitions.push((None, members.clone())),
        Some(param) => {
            for &i in members {
                let value = out[i].meta.param(param).ok_or_else(|| {
                    PlanError::UnknownByParam {
                        template: template.name.clone(),
                        group: group.to_string(),
                        param: param.to_string(),
                        member: out[i].name.clone(),
                    }
                })?;
                match partitions
                    .iter_mut()
                    .find(|(v, _)| v.as_deref() == Some(value))
                {
                    Some((_, part)) => part.push(i),
                    None => partitions.push((Some(value.to_string()), vec![i])),
                }
            }
        }
    }

    let mut produced = Vec::with_capacity(partitions.len());
    for (value, part) in partitions {
        let member_names: Vec<String> = part.iter().map(|&i| out[i].name.clone()).collect();
        let refs = member_names
            .iter()
            .map(|m| format!("${{{m}}}"))
            .collect::<Vec<_>>()
            .join(" ");
        let text = substitute(template.text(), |placeholder| {
            if placeholder == group {
                Some(refs.clone())
            } else if Some(placeholder) == by {
                value.clone()
            } else {
                None
            }
        });

        let mut deps = template.deps.clone();
        for m in &member_names {
            if !deps.contains(m) {
                deps.push(m.clone());
            }
        }

        let mut target = template.clone();
        target.command = template.command.with_text(text);
        target.deps = deps;
        target.transform = None;
        target.meta = match (by, value) {
            (Some(param), Some(value)) => {
                target.name = format!("{}_{}", template.name, sanitize(&value));
                GroupMeta {
                    template: Some(template.name.clone()),
                    params: vec![(param.to_string(), value)],
                    members: member_names,
                }
            }
            _ => GroupMeta {
                template: None,
                params: Vec::new(),
                members: member_names,
            },
        };
        produced.push(out.len());
        out.push(target);
    }
    Ok(produced)
}

fn bind(params: &mut Vec<(String, String)>, name: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == name) {
        Some((_, v)) => *v = value.to_string(),
        None => params.push((name.to_string(), value.to_string())),
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if is_ident_char(c) { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Value;

    fn t(name: &str, text: &str) -> Target {
        Target::new(name, text, |_| Ok(Value::text("")))
    }

    fn names(plan: &ExpandedPlan) -> Vec<&str> {
        plan.targets().iter().map(|t| t.name()).collect()
    }

    #[test]
    fn plain_targets_pass_through() {
        let plan = Plan::new().with(t("a", "one")).with(t("b", "two ${a}"));
        let expanded = plan.expand().unwrap();
        assert_eq!(names(&expanded), vec!["a", "b"]);
        assert_eq!(expanded.position("b"), Some(1));
        assert_eq!(expanded.get("b").unwrap().text(), "two ${a}");
    }

    #[test]
    fn map_zips_parameters() {
        let plan = Plan::new().with(
            t("model", "fit --units ${units} --act ${act} ${rec}").transform(Transform::Map(vec![
                Param::values("units", ["16", "32"]),
                Param::values("act", ["relu", "tanh"]),
            ])),
        );
        let expanded = plan.expand().unwrap();
        assert_eq!(names(&expanded), vec!["model_16_relu", "model_32_tanh"]);
        let first = expanded.get("model_16_relu").unwrap();
        assert_eq!(first.text(), "fit --units 16 --act relu ${rec}");
        assert_eq!(first.meta().param("act"), Some("relu"));
        assert_eq!(first.meta().template.as_deref(), Some("model"));
        assert_eq!(
            expanded.group("model").unwrap(),
            &["model_16_relu".to_string(), "model_32_tanh".to_string()]
        );
    }

    #[test]
    fn map_mismatched_lengths_is_fatal() {
        let plan = Plan::new().with(t("model", "fit").transform(Transform::Map(vec![
            Param::values("units", ["16", "32"]),
            Param::values("act", ["relu"]),
        ])));
        let err = plan.expand().unwrap_err();
        assert!(matches!(err, PlanError::MismatchedLengths { ref lengths, .. } if lengths.len() == 2));
    }

    #[test]
    fn empty_parameter_is_fatal() {
        let plan = Plan::new().with(
            t("model", "fit")
                .transform(Transform::Map(vec![Param::values("units", Vec::<String>::new())])),
        );
        assert!(matches!(
            plan.expand().unwrap_err(),
            PlanError::EmptyParameter { ref param, .. } if param == "units"
        ));

        let plan = Plan::new().with(t("model", "fit").transform(Transform::Cross(Vec::new())));
        assert!(matches!(plan.expand().unwrap_err(), PlanError::NoParameters { .. }));
    }

    #[test]
    fn repeated_template_name_is_fatal() {
        let plan = Plan::new()
            .with(t("model", "fit ${units}").transform(Transform::Map(vec![Param::values(
                "units",
                ["16", "32"],
            )])))
            .with(t("model", "fit ${units}").transform(Transform::Map(vec![Param::values(
                "units",
                ["64"],
            )])))
            .with(t("combined", "compare ${model}").transform(Transform::combine("model")));
        assert!(matches!(
            plan.expand().unwrap_err(),
            PlanError::DuplicateTarget(ref name) if name == "model"
        ));
    }

    #[test]
    fn cross_enumerates_first_parameter_slowest() {
        let plan = Plan::new().with(t("grid", "${a} ${b}").transform(Transform::Cross(vec![
            Param::values("a", ["1", "2"]),
            Param::values("b", ["x", "y", "z"]),
        ])));
        let expanded = plan.expand().unwrap();
        assert_eq!(
            names(&expanded),
            vec!["grid_1_x", "grid_1_y", "grid_1_z", "grid_2_x", "grid_2_y", "grid_2_z"]
        );
        assert_eq!(expanded.get("grid_2_y").unwrap().text(), "2 y");
    }

    #[test]
    fn map_over_group_inherits_bindings() {
        let plan = Plan::new()
            .with(t("model", "fit ${units}").transform(Transform::Map(vec![Param::values(
                "units",
                ["16", "32"],
            )])))
            .with(
                t("eval", "score ${model}")
                    .transform(Transform::Map(vec![Param::group("model")])),
            );
        let expanded = plan.expand().unwrap();
        assert_eq!(
            names(&expanded),
            vec!["model_16", "model_32", "eval_model_16", "eval_model_32"]
        );
        let eval = expanded.get("eval_model_32").unwrap();
        assert_eq!(eval.text(), "score ${model_32}");
        assert_eq!(eval.deps(), &["model_32".to_string()]);
        assert_eq!(eval.meta().param("units"), Some("32"));
        assert_eq!(eval.meta().param("model"), Some("model_32"));
    }

    #[test]
    fn combine_depends_on_all_members_in_order() {
        let plan = Plan::new()
            .with(t("model", "fit ${units}").transform(Transform::Map(vec![Param::values(
                "units",
                ["16", "32"],
            )])))
            .with(t("combined", "compare ${model}").transform(Transform::combine("model")));
        let expanded = plan.expand().unwrap();
        let combined = expanded.get("combined").unwrap();
        assert_eq!(combined.text(), "compare ${model_16} ${model_32}");
        assert_eq!(
            combined.meta().members,
            vec!["model_16".to_string(), "model_32".to_string()]
        );
        assert_eq!(combined.deps(), combined.meta().members.as_slice());
    }

    #[test]
    fn combine_by_partitions_in_first_appearance_order() {
        let plan = Plan::new()
            .with(t("fit", "${units} ${act}").transform(Transform::Cross(vec![
                Param::values("units", ["16", "32"]),
                Param::values("act", ["relu", "tanh"]),
            ])))
            .with(
                t("best", "pick ${fit} for ${act}")
                    .transform(Transform::combine_by("fit", "act")),
            );
        let expanded = plan.expand().unwrap();
        let relu = expanded.get("best_relu").unwrap();
        assert_eq!(
            relu.meta().members,
            vec!["fit_16_relu".to_string(), "fit_32_relu".to_string()]
        );
        assert_eq!(relu.text(), "pick ${fit_16_relu} ${fit_32_relu} for relu");
        assert_eq!(expanded.group("best").unwrap().len(), 2);
        assert_eq!(expanded.position("best_relu"), Some(4));
        assert_eq!(expanded.position("best_tanh"), Some(5));
    }

    #[test]
    fn unknown_group_and_by_param() {
        let plan = Plan::new().with(t("all", "x").transform(Transform::combine("nothing")));
        assert!(matches!(
            plan.expand().unwrap_err(),
            PlanError::UnknownGroup { ref group, .. } if group == "nothing"
        ));

        let plan = Plan::new()
            .with(t("m", "x").transform(Transform::Map(vec![Param::values("n", ["1"])])))
            .with(t("all", "x").transform(Transform::combine_by("m", "missing")));
        assert!(matches!(
            plan.expand().unwrap_err(),
            PlanError::UnknownByParam { ref member, .. } if member == "m_1"
        ));
    }

    #[test]
    fn duplicate_names_after_expansion() {
        let plan = Plan::new()
            .with(t("model_16", "manual"))
            .with(t("model", "fit").transform(Transform::Map(vec![Param::values(
                "units",
                ["16"],
            )])));
        assert_eq!(
            plan.expand().unwrap_err(),
            PlanError::DuplicateTarget("model_16".to_string())
        );
    }

    #[test]
    fn values_are_sanitized_into_names() {
        let plan = Plan::new().with(t("lr", "train ${rate}").transform(Transform::Map(vec![
            Param::values("rate", ["0.5", "1e-3"]),
        ])));
        let expanded = plan.expand().unwrap();
        assert_eq!(names(&expanded), vec!["lr_0.5", "lr_1e_3"]);
        assert_eq!(expanded.get("lr_1e_3").unwrap().text(), "train 1e-3");
    }

    #[test]
    fn invalid_names_rejected() {
        let plan = Plan::new().with(t("9lives", "x"));
        assert_eq!(
            plan.expand().unwrap_err(),
            PlanError::InvalidName("9lives".to_string())
        );
    }

    #[test]
    fn expansion_is_deterministic() {
        let build = || {
            Plan::new()
                .with(t("m", "${u}").transform(Transform::Map(vec![Param::values(
                    "u",
                    ["a", "b", "c"],
                )])))
                .with(t("all", "${m}").transform(Transform::combine("m")))
                .expand()
                .unwrap()
        };
        let a = build();
        let b = build();
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.get("all").unwrap().text(), b.get("all").unwrap().text());
    }
}
