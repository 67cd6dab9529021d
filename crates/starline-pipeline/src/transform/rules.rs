//! The fixed mapping from source tables to warehouse tables

use super::dimensions::{dim_counterparty, dim_currency, dim_design, dim_location, dim_staff};
use super::facts::fact_sales_order;
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use std::collections::BTreeMap;

/// Named input tables for a shaping rule
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: BTreeMap<String, Table>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn with(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// The table `rule` needs, or [`PipelineError::MissingInput`]
    pub fn require(&self, rule: &'static str, name: &str) -> PipelineResult<&Table> {
        self.get(name).ok_or_else(|| PipelineError::MissingInput {
            rule,
            table: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapingRule {
    Counterparty,
    Location,
    Currency,
    Staff,
    Design,
    SalesOrder,
}

impl ShapingRule {
    pub const ALL: [ShapingRule; 6] = [
        ShapingRule::Counterparty,
        ShapingRule::Location,
        ShapingRule::Currency,
        ShapingRule::Staff,
        ShapingRule::Design,
        ShapingRule::SalesOrder,
    ];

    /// Rule for a source table; `None` means the table is not transformed
    pub fn for_source(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.source_table() == table)
    }

    pub fn source_table(self) -> &'static str {
        match self {
            ShapingRule::Counterparty => "counterparty",
            ShapingRule::Location => "address",
            ShapingRule::Currency => "currency",
            ShapingRule::Staff => "staff",
            ShapingRule::Design => "design",
            ShapingRule::SalesOrder => "sales_order",
        }
    }

    pub fn target_table(self) -> &'static str {
        match self {
            ShapingRule::Counterparty => "dim_counterparty",
            ShapingRule::Location => "dim_location",
            ShapingRule::Currency => "dim_currency",
            ShapingRule::Staff => "dim_staff",
            ShapingRule::Design => "dim_design",
            ShapingRule::SalesOrder => "fact_sales_order",
        }
    }

    /// Tables joined onto the source table
    pub fn reference_tables(self) -> &'static [&'static str] {
        match self {
            ShapingRule::Counterparty => &["address"],
            ShapingRule::Staff => &["department"],
            _ => &[],
        }
    }

    /// Source table followed by reference tables
    pub fn required_tables(self) -> Vec<&'static str> {
        std::iter::once(self.source_table())
            .chain(self.reference_tables().iter().copied())
            .collect()
    }

    /// Run the rule; fails naming the first required table not in `inputs`
    pub fn apply(self, inputs: &TableSet) -> PipelineResult<Table> {
        let rule = self.target_table();
        for table in self.required_tables() {
            inputs.require(rule, table)?;
        }

        let source = inputs.require(rule, self.source_table())?;
        match self {
            ShapingRule::Counterparty => dim_counterparty(source, inputs.require(rule, "address")?),
            ShapingRule::Location => dim_location(source),
            ShapingRule::Currency => dim_currency(source),
            ShapingRule::Staff => dim_staff(source, inputs.require(rule, "department")?),
            ShapingRule::Design => dim_design(source),
            ShapingRule::SalesOrder => fact_sales_order(source),
        }
    }
}
