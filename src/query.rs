use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{CATEGORY_MAP, Category};
use crate::error::CatalogueError;
use crate::graph::PlantStore;
use crate::schema::{KEY_FIELD, PlantField};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 200;
pub const NEGATION_MARKER: char = '!';

const TRUE_FLAG: &str = "True";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryField {
    ScientificName,
    Field(PlantField),
}

impl QueryField {
    pub fn name(&self) -> &'static str {
        match self {
            QueryField::ScientificName => KEY_FIELD,
            QueryField::Field(field) => field.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    NotIn,
    Contains,
    NotContains,
    IsTrue,
    // Anything but `"True"`, including a missing field.
    IsFalse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseValue {
    None,
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: QueryField,
    pub op: Operator,
    pub value: ClauseValue,
}

impl Clause {
    pub fn eq(field: QueryField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: Operator::Eq,
            value: ClauseValue::Text(value.into()),
        }
    }

    pub fn in_list(field: QueryField, values: Vec<String>) -> Self {
        Self {
            field,
            op: Operator::In,
            value: ClauseValue::List(values),
        }
    }

    pub fn not_in(field: QueryField, values: Vec<String>) -> Self {
        Self {
            field,
            op: Operator::NotIn,
            value: ClauseValue::List(values),
        }
    }

    pub fn contains(field: QueryField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: Operator::Contains,
            value: ClauseValue::Text(value.into()),
        }
    }

    pub fn not_contains(field: QueryField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: Operator::NotContains,
            value: ClauseValue::Text(value.into()),
        }
    }

    pub fn flag(field: PlantField, wanted: bool) -> Self {
        Self {
            field: QueryField::Field(field),
            op: if wanted { Operator::IsTrue } else { Operator::IsFalse },
            value: ClauseValue::None,
        }
    }

    pub fn matches(&self, props: &BTreeMap<String, String>) -> bool {
        let actual = props.get(self.field.name()).map(String::as_str);
        let text = match &self.value {
            ClauseValue::Text(text) => text.as_str(),
            _ => "",
        };
        let list = match &self.value {
            ClauseValue::List(list) => list.as_slice(),
            _ => &[],
        };
        let contains = || {
            actual
                .unwrap_or_default()
                .to_lowercase()
                .contains(&text.to_lowercase())
        };
        match self.op {
            Operator::Eq => actual == Some(text),
            Operator::In => actual.is_some_and(|value| list.iter().any(|item| item == value)),
            Operator::NotIn => {
                let value = actual.unwrap_or_default();
                !list.iter().any(|item| item == value)
            }
            Operator::Contains => contains(),
            Operator::NotContains => !contains(),
            Operator::IsTrue => actual == Some(TRUE_FLAG),
            Operator::IsFalse => actual != Some(TRUE_FLAG),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Clause(Clause),
    AnyOf(Vec<Clause>),
}

impl Condition {
    pub fn matches(&self, props: &BTreeMap<String, String>) -> bool {
        match self {
            Condition::Clause(clause) => clause.matches(props),
            Condition::AnyOf(clauses) => clauses.iter().any(|clause| clause.matches(props)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantQuery {
    pub filters: Vec<Condition>,
    pub skip: u64,
    pub limit: u64,
}

impl PlantQuery {
    pub fn matches(&self, props: &BTreeMap<String, String>) -> bool {
        self.filters.iter().all(|condition| condition.matches(props))
    }
}

impl Default for PlantQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlantFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub native_status: Vec<String>,
    pub duration: Vec<String>,
    pub wildlife: Option<bool>,
    pub pollinator: Option<bool>,
    pub wetland: Option<bool>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl PlantFilter {
    pub fn into_query(self) -> Result<PlantQuery, CatalogueError> {
        let mut conditions = Vec::new();

        if let Some(slug) = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty() && *slug != "all")
        {
            let category = Category::from_slug(slug)
                .ok_or_else(|| CatalogueError::InvalidFilter(format!("unknown category {slug:?}")))?;
            let habit = QueryField::Field(PlantField::GrowthHabitPrimary);
            let clause = if category == Category::Other {
                let mapped = CATEGORY_MAP.iter().map(|(habit, _)| habit.to_string()).collect();
                Clause::not_in(habit, mapped)
            } else {
                let habits = category.growth_habits().into_iter().map(str::to_string).collect();
                Clause::in_list(habit, habits)
            };
            conditions.push(Condition::Clause(clause));
        }

        if let Some(search) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            conditions.push(Condition::AnyOf(vec![
                Clause::contains(QueryField::ScientificName, search),
                Clause::contains(QueryField::Field(PlantField::CommonName), search),
            ]));
        }

        let status = QueryField::Field(PlantField::NativeStatus);
        let (include, exclude) = split_negated(&self.native_status);
        if !include.is_empty() {
            conditions.push(Condition::Clause(Clause::in_list(status, include)));
        }
        if !exclude.is_empty() {
            conditions.push(Condition::Clause(Clause::not_in(status, exclude)));
        }

        // durations are stored comma-joined, so they match by substring
        let duration = QueryField::Field(PlantField::Duration);
        let (include, exclude) = split_negated(&self.duration);
        if !include.is_empty() {
            conditions.push(Condition::AnyOf(
                include
                    .into_iter()
                    .map(|value| Clause::contains(duration, value))
                    .collect(),
            ));
        }
        for value in exclude {
            conditions.push(Condition::Clause(Clause::not_contains(duration, value)));
        }

        for (wanted, field) in [
            (self.wildlife, PlantField::HasWildlifeValue),
            (self.pollinator, PlantField::HasPollinatorValue),
            (self.wetland, PlantField::HasWetlandData),
        ] {
            if let Some(wanted) = wanted {
                conditions.push(Condition::Clause(Clause::flag(field, wanted)));
            }
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Ok(PlantQuery {
            filters: conditions,
            skip: self.skip,
            limit,
        })
    }
}

pub fn split_negated(values: &[String]) -> (Vec<String>, Vec<String>) {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for item in values.iter().flat_map(|value| value.split(',')) {
        let item = item.trim();
        match item.strip_prefix(NEGATION_MARKER) {
            Some(negated) if !negated.trim().is_empty() => exclude.push(negated.trim().to_string()),
            Some(_) => {}
            None if !item.is_empty() => include.push(item.to_string()),
            None => {}
        }
    }
    (include, exclude)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CypherFilter {
    pub where_clause: String,
    pub params: Vec<(String, ParamValue)>,
}

pub fn to_cypher(conditions: &[Condition], node: &str) -> CypherFilter {
    let mut params = Vec::new();
    let mut parts = Vec::new();
    for condition in conditions {
        match condition {
            Condition::Clause(clause) => parts.push(clause_cypher(clause, node, &mut params)),
            Condition::AnyOf(clauses) if !clauses.is_empty() => {
                let inner = clauses
                    .iter()
                    .map(|clause| clause_cypher(clause, node, &mut params))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                parts.push(format!("({inner})"));
            }
            Condition::AnyOf(_) => {}
        }
    }
    let where_clause = if parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", parts.join(" AND "))
    };
    CypherFilter {
        where_clause,
        params,
    }
}

fn clause_cypher(clause: &Clause, node: &str, params: &mut Vec<(String, ParamValue)>) -> String {
    let name = format!("p{}", params.len());
    let property = format!("{node}.{}", clause.field.name());
    let value = match (&clause.value, clause.op) {
        (_, Operator::IsTrue | Operator::IsFalse) => ParamValue::Text(TRUE_FLAG.to_string()),
        (ClauseValue::List(list), _) => ParamValue::List(list.clone()),
        (ClauseValue::Text(text), _) => ParamValue::Text(text.clone()),
        (ClauseValue::None, _) => ParamValue::Text(String::new()),
    };
    params.push((name.clone(), value));
    match clause.op {
        Operator::Eq | Operator::IsTrue => format!("{property} = ${name}"),
        Operator::In => format!("{property} IN ${name}"),
        Operator::NotIn => format!("NOT coalesce({property}, '') IN ${name}"),
        Operator::Contains => format!("toLower(coalesce({property}, '')) CONTAINS toLower(${name})"),
        Operator::NotContains => {
            format!("NOT toLower(coalesce({property}, '')) CONTAINS toLower(${name})")
        }
        Operator::IsFalse => format!("coalesce({property}, '') <> ${name}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub slug: String,
    pub count: u64,
    pub exemplar_image: Option<String>,
}

pub fn category_counts(habit_counts: &[(String, u64)]) -> Vec<CategoryCount> {
    let mut totals = BTreeMap::<Category, u64>::new();
    for (habit, count) in habit_counts.iter().filter(|(habit, _)| !habit.is_empty()) {
        *totals
            .entry(Category::from_growth_habit(Some(habit.as_str())))
            .or_default() += count;
    }
    let mut counts = totals
        .into_iter()
        .map(|(category, count)| CategoryCount {
            name: category.name().to_string(),
            slug: category.slug(),
            count,
            exemplar_image: None,
        })
        .collect::<Vec<_>>();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn categories<S: PlantStore>(store: &S) -> Result<Vec<CategoryCount>, CatalogueError> {
    let mut counts = category_counts(&store.habit_counts()?);
    for entry in &mut counts {
        let symbol = Category::from_slug(&entry.slug).and_then(|c| c.exemplar_symbol());
        if let Some(symbol) = symbol {
            entry.exemplar_image = store.exemplar_image(symbol)?;
        }
    }
    Ok(counts)
}
