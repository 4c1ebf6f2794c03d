//! Typed targeting rules
//!
//! A [`RuleSet`] arrives on the wire as a nested object mapping a customer
//! field to operator/threshold pairs:
//!
//! ```json
//! { "totalSpend": { "gt": 5000 }, "visits": { "lt": 3 } }
//! ```
//!
//! Every comparison is parsed into a [`Rule`], a closed variant over the
//! targetable fields carrying a threshold of that field's type. Unknown
//! fields, unknown operators and thresholds of the wrong type are rejected
//! here, so evaluating a constructed rule cannot fail.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::dates::parse_calendar_date;
use crate::CoreError;

/// Customer attribute a rule can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    TotalSpend,
    Visits,
    LastActiveDate,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::TotalSpend, Field::Visits, Field::LastActiveDate];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TotalSpend => "totalSpend",
            Field::Visits => "visits",
            Field::LastActiveDate => "lastActiveDate",
        }
    }

    /// Human-readable label used in rule descriptions
    pub fn label(&self) -> &'static str {
        match self {
            Field::TotalSpend => "Total Spend",
            Field::Visits => "Number of Visits",
            Field::LastActiveDate => "Last Active Date",
        }
    }
}

impl FromStr for Field {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CoreError::invalid_rule(format!("unknown field '{}'", s)))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Eq,
        Operator::Ne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "=",
            Operator::Ne => "!=",
        }
    }

    /// Apply the operator as `actual <op> threshold`
    pub fn holds<T: Ord>(&self, actual: &T, threshold: &T) -> bool {
        match self {
            Operator::Gt => actual > threshold,
            Operator::Gte => actual >= threshold,
            Operator::Lt => actual < threshold,
            Operator::Lte => actual <= threshold,
            Operator::Eq => actual == threshold,
            Operator::Ne => actual != threshold,
        }
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::invalid_rule(format!("unknown operator '{}'", s)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator paired with a typed threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison<T> {
    pub operator: Operator,
    pub threshold: T,
}

impl<T: Ord> Comparison<T> {
    pub fn new(operator: Operator, threshold: T) -> Self {
        Self { operator, threshold }
    }

    pub fn matches(&self, actual: &T) -> bool {
        self.operator.holds(actual, &self.threshold)
    }
}

/// A single comparison against one customer field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    TotalSpend(Comparison<Decimal>),
    Visits(Comparison<i64>),
    LastActiveDate(Comparison<NaiveDate>),
}

impl Rule {
    /// Build a rule from an untrusted JSON threshold, coercing it to the
    /// field's type
    pub fn new(field: Field, operator: Operator, threshold: &Value) -> Result<Self, CoreError> {
        let rule = match field {
            Field::TotalSpend => {
                Rule::TotalSpend(Comparison::new(operator, decimal_threshold(field, threshold)?))
            }
            Field::Visits => {
                Rule::Visits(Comparison::new(operator, integer_threshold(field, threshold)?))
            }
            Field::LastActiveDate => {
                Rule::LastActiveDate(Comparison::new(operator, date_threshold(field, threshold)?))
            }
        };
        Ok(rule)
    }

    pub fn field(&self) -> Field {
        match self {
            Rule::TotalSpend(_) => Field::TotalSpend,
            Rule::Visits(_) => Field::Visits,
            Rule::LastActiveDate(_) => Field::LastActiveDate,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Rule::TotalSpend(c) => c.operator,
            Rule::Visits(c) => c.operator,
            Rule::LastActiveDate(c) => c.operator,
        }
    }

    /// Threshold in its wire representation
    pub fn threshold_json(&self) -> Value {
        match self {
            Rule::TotalSpend(c) => decimal_to_json(c.threshold),
            Rule::Visits(c) => Value::from(c.threshold),
            Rule::LastActiveDate(c) => Value::String(c.threshold.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.field().label(), self.operator().symbol())?;
        match self {
            Rule::TotalSpend(c) => write!(f, "{}", c.threshold),
            Rule::Visits(c) => write!(f, "{}", c.threshold),
            Rule::LastActiveDate(c) => write!(f, "{}", c.threshold.format("%Y-%m-%d")),
        }
    }
}

fn decimal_to_json(value: Decimal) -> Value {
    if value.fract().is_zero() {
        if let Some(i) = value.to_i64() {
            return Value::from(i);
        }
    }
    value.to_f64().map(Value::from).unwrap_or(Value::Null)
}

fn decimal_threshold(field: Field, value: &Value) -> Result<Decimal, CoreError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(CoreError::invalid_rule(format!(
                "{} threshold must be a number, got {}",
                field, other
            )))
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(|d| d.normalize())
        .map_err(|_| {
            CoreError::invalid_rule(format!("{} threshold '{}' is not a number", field, text))
        })
}

fn integer_threshold(field: Field, value: &Value) -> Result<i64, CoreError> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    let decimal = decimal_threshold(field, value)?;
    if !decimal.fract().is_zero() {
        return Err(CoreError::invalid_rule(format!(
            "{} threshold must be a whole number, got {}",
            field, decimal
        )));
    }
    decimal.to_i64().ok_or_else(|| {
        CoreError::invalid_rule(format!("{} threshold {} is out of range", field, decimal))
    })
}

fn date_threshold(field: Field, value: &Value) -> Result<NaiveDate, CoreError> {
    let text = value.as_str().ok_or_else(|| {
        CoreError::invalid_rule(format!("{} threshold must be a date string, got {}", field, value))
    })?;
    parse_calendar_date(text).ok_or_else(|| {
        CoreError::invalid_rule(format!("{} threshold '{}' is not a valid date", field, text))
    })
}

/// A non-empty conjunction of rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Rules are kept in (field, operator) order; a pair may appear only once
    pub fn new(mut rules: Vec<Rule>) -> Result<Self, CoreError> {
        if rules.is_empty() {
            return Err(CoreError::invalid_rule("rule set is empty"));
        }
        rules.sort_by_key(|r| (r.field(), r.operator()));
        if let Some(pair) = rules
            .windows(2)
            .find(|w| w[0].field() == w[1].field() && w[0].operator() == w[1].operator())
        {
            return Err(CoreError::invalid_rule(format!(
                "duplicate operator '{}' for field '{}'",
                pair[0].operator(),
                pair[0].field()
            )));
        }
        Ok(Self { rules })
    }

    /// Validate an untrusted wire payload
    pub fn from_json(value: &Value) -> Result<Self, CoreError> {
        let fields = value
            .as_object()
            .ok_or_else(|| CoreError::invalid_rule("rules must be a JSON object"))?;

        let mut rules = Vec::new();
        for (field_name, operators) in fields {
            let field: Field = field_name.parse()?;
            let operators = operators.as_object().ok_or_else(|| {
                CoreError::invalid_rule(format!("rules for '{}' must be an object", field))
            })?;
            if operators.is_empty() {
                return Err(CoreError::invalid_rule(format!(
                    "no comparisons given for '{}'",
                    field
                )));
            }
            for (op_name, threshold) in operators {
                rules.push(Rule::new(field, op_name.parse()?, threshold)?);
            }
        }

        RuleSet::new(rules)
    }

    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for rule in &self.rules {
            let entry = fields
                .entry(rule.field().as_str())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(rule.operator().as_str().to_string(), rule.threshold_json());
            }
        }
        Value::Object(fields)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Label such as `Total Spend > 5000, Total Spend <= 9000 AND Number of Visits < 3`
    pub fn describe(&self) -> String {
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current: Option<Field> = None;
        for rule in &self.rules {
            if current != Some(rule.field()) {
                groups.push(Vec::new());
                current = Some(rule.field());
            }
            if let Some(group) = groups.last_mut() {
                group.push(rule.to_string());
            }
        }
        groups
            .into_iter()
            .map(|g| g.join(", "))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleSet::from_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn invalid_message(value: Value) -> String {
        match RuleSet::from_json(&value) {
            Err(CoreError::InvalidRule(msg)) => msg,
            other => panic!("expected InvalidRule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_rules() {
        let rules = RuleSet::from_json(&json!({
            "totalSpend": { "gt": 5000, "lte": 9000 },
            "visits": { "lt": 3 }
        }))
        .unwrap();

        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules.rules()[0],
            Rule::TotalSpend(Comparison::new(Operator::Gt, Decimal::from(5000)))
        );
        assert_eq!(rules.rules()[2], Rule::Visits(Comparison::new(Operator::Lt, 3)));
    }

    #[test]
    fn test_empty_rule_set_rejected() {
        assert!(invalid_message(json!({})).contains("empty"));
        assert!(RuleSet::new(vec![]).is_err());
    }

    #[rstest]
    #[case(json!({ "age": { "gt": 30 } }), "unknown field")]
    #[case(json!({ "visits": { "between": 3 } }), "unknown operator")]
    #[case(json!({ "visits": {} }), "no comparisons")]
    #[case(json!({ "visits": 3 }), "must be an object")]
    #[case(json!([{ "visits": { "gt": 1 } }]), "JSON object")]
    #[case(json!(null), "JSON object")]
    #[case(json!({ "totalSpend": { "gt": "lots" } }), "not a number")]
    #[case(json!({ "totalSpend": { "gt": true } }), "must be a number")]
    #[case(json!({ "visits": { "gt": 2.5 } }), "whole number")]
    #[case(json!({ "lastActiveDate": { "lt": 20240101 } }), "date string")]
    #[case(json!({ "lastActiveDate": { "lt": "last week" } }), "not a valid date")]
    fn test_invalid_rules(#[case] value: Value, #[case] fragment: &str) {
        let msg = invalid_message(value);
        assert!(msg.contains(fragment), "'{}' does not mention '{}'", msg, fragment);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let rules = RuleSet::from_json(&json!({
            "totalSpend": { "gte": "1500.50" },
            "visits": { "eq": "4" }
        }))
        .unwrap();
        assert_eq!(
            rules.rules()[0],
            Rule::TotalSpend(Comparison::new(Operator::Gte, Decimal::new(150050, 2)))
        );
        assert_eq!(rules.rules()[1], Rule::Visits(Comparison::new(Operator::Eq, 4)));
    }

    #[test]
    fn test_integral_float_visits_accepted() {
        let rules = RuleSet::from_json(&json!({ "visits": { "gte": 3.0 } })).unwrap();
        assert_eq!(rules.rules()[0], Rule::Visits(Comparison::new(Operator::Gte, 3)));
    }

    #[test]
    fn test_date_threshold_truncates_timestamp() {
        let rules =
            RuleSet::from_json(&json!({ "lastActiveDate": { "lt": "2024-03-10T18:45:00Z" } }))
                .unwrap();
        assert_eq!(
            rules.rules()[0],
            Rule::LastActiveDate(Comparison::new(
                Operator::Lt,
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
            ))
        );
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let rule = Rule::Visits(Comparison::new(Operator::Gt, 1));
        let err = RuleSet::new(vec![rule.clone(), rule]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_wire_shape_round_trip() {
        let wire = json!({
            "lastActiveDate": { "gte": "2024-01-01" },
            "totalSpend": { "gt": 5000 },
            "visits": { "lt": 3, "ne": 0 }
        });
        let rules: RuleSet = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&rules).unwrap(), wire);
    }

    #[test]
    fn test_fractional_spend_serializes_as_number() {
        let rules = RuleSet::from_json(&json!({ "totalSpend": { "gt": 99.5 } })).unwrap();
        assert_eq!(rules.to_json(), json!({ "totalSpend": { "gt": 99.5 } }));
    }

    #[test]
    fn test_deserialize_rejects_invalid() {
        let result: Result<RuleSet, _> = serde_json::from_value(json!({ "visits": { "gt": "x" } }));
        assert!(result.is_err());
    }

    #[test]
    fn test_describe() {
        let rules = RuleSet::from_json(&json!({
            "totalSpend": { "gt": 5000, "lte": 9000 },
            "visits": { "lt": 3 },
            "lastActiveDate": { "ne": "2024-02-29" }
        }))
        .unwrap();

        assert_eq!(
            rules.describe(),
            concat!(
                "Total Spend > 5000, Total Spend <= 9000 AND Number of Visits < 3",
                " AND Last Active Date != 2024-02-29"
            )
        );
    }

    #[rstest]
    #[case(Operator::Gt, 5, 4, true)]
    #[case(Operator::Gt, 4, 4, false)]
    #[case(Operator::Gte, 4, 4, true)]
    #[case(Operator::Gte, 3, 4, false)]
    #[case(Operator::Lt, 3, 4, true)]
    #[case(Operator::Lt, 4, 4, false)]
    #[case(Operator::Lte, 4, 4, true)]
    #[case(Operator::Lte, 5, 4, false)]
    #[case(Operator::Eq, 4, 4, true)]
    #[case(Operator::Eq, 5, 4, false)]
    #[case(Operator::Ne, 5, 4, true)]
    #[case(Operator::Ne, 4, 4, false)]
    fn test_operator_holds(
        #[case] op: Operator,
        #[case] actual: i64,
        #[case] threshold: i64,
        #[case] expected: bool,
    ) {
        assert_eq!(op.holds(&actual, &threshold), expected);
    }
}
