use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

/// Renders a JSON where-clause object into a parameterized SQL condition.
///
/// Placeholders are numbered from `starting_param_index + 1`, so the output
/// can be appended after other bound parameters (e.g. UPDATE SET values or a
/// tenant predicate) without renumbering.
pub struct FilterWhere {
    start: usize,
    param_values: Vec<Value>,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            start: starting_param_index,
            param_values: vec![],
            conditions: vec![],
        }
    }

    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() {
            return Ok(());
        }
        match where_data {
            Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(&mut self, where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        self.parse_where_data(where_data)?;

        let mut sql_conditions = vec![];
        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            if let Some(sql) = self.build_sql_condition(condition)? {
                sql_conditions.push(sql);
            }
        }
        let where_clause = sql_conditions.join(" AND ");
        Ok((where_clause, self.param_values.clone()))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let (sql, params) = Self::generate(v, self.next_index())?;
                    self.param_values.extend(params);
                    sql_parts.push(format!("({})", sql));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                let joined = sql_parts.join(joiner);
                // OR groups need their own parens so a sibling condition
                // joined with AND cannot rebind them
                let rendered = if op == "$or" && sql_parts.len() > 1 {
                    format!("({})", joined)
                } else {
                    joined
                };
                self.conditions.push(FilterWhereInfo {
                    column: rendered,
                    operator: FilterOp::Group,
                    data: Value::Null,
                });
                Ok(())
            }
            "$not" => {
                let (sql, params) = Self::generate(value, self.next_index())?;
                self.param_values.extend(params);
                self.conditions.push(FilterWhereInfo {
                    column: format!("NOT ({})", sql),
                    operator: FilterOp::Group,
                    data: Value::Null,
                });
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    // Next available placeholder offset, counting params consumed so far
    fn next_index(&self) -> usize {
        self.start + self.param_values.len()
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        Self::validate_column_name(field)?;
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                self.conditions.push(FilterWhereInfo {
                    column: field.to_string(),
                    operator,
                    data: op_val.clone(),
                });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            });
        }
        Ok(())
    }

    pub fn validate_column_name(column: &str) -> Result<(), FilterError> {
        if column.is_empty() {
            return Err(FilterError::InvalidColumn("Column name cannot be empty".to_string()));
        }
        let mut chars = column.chars();
        let first = chars.next().unwrap_or('_');
        if !(first.is_alphabetic() || first == '_')
            || !column.chars().all(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<Option<String>, FilterError> {
        // Logical groupings carry already-rendered SQL in the column field
        if matches!(condition.operator, FilterOp::Group) {
            return Ok(Some(condition.column.clone()));
        }

        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(Some(format!("{} IS NULL", quoted_column)))
                } else {
                    Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone()))))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(Some(format!("{} IS NOT NULL", quoted_column)))
                } else {
                    Ok(Some(format!("{} <> {}", quoted_column, self.param(condition.data.clone()))))
                }
            }
            FilterOp::Gt => Ok(Some(format!("{} > {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Gte => Ok(Some(format!("{} >= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lt => Ok(Some(format!("{} < {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Lte => Ok(Some(format!("{} <= {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::Like => Ok(Some(format!("{} LIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::ILike => Ok(Some(format!("{} ILIKE {}", quoted_column, self.param(condition.data.clone())))),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    if values.is_empty() {
                        return Ok(Some("1=0".to_string()));
                    }
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(Some(format!("{} IN ({})", quoted_column, params.join(", "))))
                } else {
                    Ok(Some(format!("{} = {}", quoted_column, self.param(condition.data.clone()))))
                }
            }
            FilterOp::Between => {
                if let Value::Array(values) = &condition.data {
                    if values.len() != 2 {
                        return Err(FilterError::InvalidOperatorData(
                            "$between requires exactly 2 values".to_string(),
                        ));
                    }
                    Ok(Some(format!(
                        "{} BETWEEN {} AND {}",
                        quoted_column,
                        self.param(values[0].clone()),
                        self.param(values[1].clone())
                    )))
                } else {
                    Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string()))
                }
            }
            _ => Ok(None),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.next_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality() {
        let (sql, params) = FilterWhere::generate(&json!({"name": "Jane"}), 0).unwrap();
        assert_eq!(sql, "\"name\" = $1");
        assert_eq!(params, vec![json!("Jane")]);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, params) = FilterWhere::generate(&json!({"status": "booked"}), 3).unwrap();
        assert_eq!(sql, "\"status\" = $4");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn null_renders_is_null() {
        let (sql, params) = FilterWhere::generate(&json!({"canceled_at": null}), 0).unwrap();
        assert_eq!(sql, "\"canceled_at\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn in_operator_expands() {
        let (sql, params) =
            FilterWhere::generate(&json!({"status": {"$in": ["booked", "done"]}}), 0).unwrap();
        assert_eq!(sql, "\"status\" IN ($1, $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn empty_in_never_matches() {
        let (sql, _) = FilterWhere::generate(&json!({"status": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn or_groups_subclauses() {
        let (sql, params) = FilterWhere::generate(
            &json!({"$or": [{"name": "Jane"}, {"name": "Janet"}]}),
            0,
        )
        .unwrap();
        assert_eq!(sql, "((\"name\" = $1) OR (\"name\" = $2))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn or_group_beside_field_condition_keeps_precedence() {
        let (sql, params) = FilterWhere::generate(
            &json!({"$or": [{"status": "open"}, {"status": "due"}], "archived": false}),
            0,
        )
        .unwrap();
        assert_eq!(
            sql,
            "((\"status\" = $1) OR (\"status\" = $2)) AND \"archived\" = $3"
        );
        assert_eq!(params, vec![json!("open"), json!("due"), json!(false)]);
    }

    #[test]
    fn rejects_hostile_column_names() {
        assert!(FilterWhere::generate(&json!({"name\"; DROP TABLE x;--": 1}), 0).is_err());
        assert!(FilterWhere::generate(&json!({"1name": 1}), 0).is_err());
    }

    #[test]
    fn rejects_unknown_operator() {
        assert!(FilterWhere::generate(&json!({"name": {"$regex": "x"}}), 0).is_err());
    }
}
