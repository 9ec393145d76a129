//! Binary operation tables
//!
//! Questions about finite operations arrive as markdown tables:
//!
//! ```text
//! |*|a|b|
//! |---|---|---|
//! |a|a|b|
//! |b|b|a|
//! ```
//!
//! The header lists the set in order; each body row gives `x*a, x*b, ...`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, ParamKind, ToolDescriptor, ToolError, ToolPayload, ToolTrait};

/// Parsed operation table over a finite set
#[derive(Debug, Clone, PartialEq)]
pub struct CayleyTable {
    elements: Vec<String>,
    // products[i][j] = index of elements[i] * elements[j]
    products: Vec<Vec<usize>>,
}

fn cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':')))
}

fn invalid(msg: impl Into<String>) -> ToolError {
    ToolError::Parse(format!("operation table: {}", msg.into()))
}

impl CayleyTable {
    pub fn parse(markdown: &str) -> Result<Self, ToolError> {
        let mut rows = markdown
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(cells)
            .filter(|c| !is_separator(c));

        let header = rows.next().ok_or_else(|| invalid("table is empty"))?;
        let elements: Vec<String> = header.into_iter().skip(1).collect();
        if elements.is_empty() {
            return Err(invalid("header lists no elements"));
        }

        let mut index = HashMap::new();
        for (i, e) in elements.iter().enumerate() {
            if e.is_empty() {
                return Err(invalid("header has an empty element"));
            }
            if index.insert(e.clone(), i).is_some() {
                return Err(invalid(format!("element '{}' appears twice in header", e)));
            }
        }

        let n = elements.len();
        let mut products: Vec<Option<Vec<usize>>> = vec![None; n];
        for row in rows {
            if row.len() != n + 1 {
                return Err(invalid(format!(
                    "row '{}' has {} cells, expected {}",
                    row.first().map(String::as_str).unwrap_or(""),
                    row.len(),
                    n + 1
                )));
            }
            let label = &row[0];
            let &i = index
                .get(label)
                .ok_or_else(|| invalid(format!("row label '{}' is not in the header", label)))?;
            if products[i].is_some() {
                return Err(invalid(format!("row '{}' appears twice", label)));
            }
            let entries = row[1..]
                .iter()
                .map(|cell| {
                    index.get(cell).copied().ok_or_else(|| {
                        invalid(format!("product '{}' in row '{}' is not in the set", cell, label))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            products[i] = Some(entries);
        }

        let products = products
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.ok_or_else(|| invalid(format!("missing row for '{}'", elements[i]))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { elements, products })
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    fn op(&self, i: usize, j: usize) -> usize {
        self.products[i][j]
    }

    fn counterexample_indices(&self) -> Vec<(usize, usize)> {
        let n = self.elements.len();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.op(i, j) != self.op(j, i))
            .collect()
    }

    pub fn is_commutative(&self) -> bool {
        self.counterexample_indices().is_empty()
    }

    /// Pairs `(x, y)` with `x*y != y*x`, `x` before `y` in header order
    pub fn counterexample_pairs(&self) -> Vec<(String, String)> {
        self.counterexample_indices()
            .into_iter()
            .map(|(i, j)| (self.elements[i].clone(), self.elements[j].clone()))
            .collect()
    }

    /// Elements involved in any commutativity failure, sorted
    pub fn counterexample_elements(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .counterexample_indices()
            .into_iter()
            .flat_map(|(i, j)| [&self.elements[i], &self.elements[j]])
            .collect();
        set.into_iter().cloned().collect()
    }

    fn identity_index(&self) -> Option<usize> {
        let n = self.elements.len();
        (0..n).find(|&e| (0..n).all(|x| self.op(e, x) == x && self.op(x, e) == x))
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity_index().map(|i| self.elements[i].as_str())
    }

    /// Two-sided inverses of every element. Elements without one map to an
    /// empty list.
    pub fn inverses(&self) -> Result<BTreeMap<String, Vec<String>>, ToolError> {
        let e = self
            .identity_index()
            .ok_or_else(|| ToolError::Math("the operation has no identity element".to_string()))?;
        let n = self.elements.len();
        Ok((0..n)
            .map(|x| {
                let inverses = (0..n)
                    .filter(|&y| self.op(x, y) == e && self.op(y, x) == e)
                    .map(|y| self.elements[y].clone())
                    .collect();
                (self.elements[x].clone(), inverses)
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CayleyQuery {
    IsCommutative,
    CounterexamplePairs,
    CounterexampleElements,
    Identity,
    Inverses,
}

impl CayleyQuery {
    pub const ALL: [CayleyQuery; 5] = [
        CayleyQuery::IsCommutative,
        CayleyQuery::CounterexamplePairs,
        CayleyQuery::CounterexampleElements,
        CayleyQuery::Identity,
        CayleyQuery::Inverses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CayleyQuery::IsCommutative => "is_commutative",
            CayleyQuery::CounterexamplePairs => "commutativity_counterexample_pairs",
            CayleyQuery::CounterexampleElements => "commutativity_counterexample_elements",
            CayleyQuery::Identity => "find_identity_element",
            CayleyQuery::Inverses => "find_inverses",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CayleyQuery::IsCommutative => {
                "Check whether the operation given by a markdown table is commutative"
            }
            CayleyQuery::CounterexamplePairs => {
                "List the pairs (x, y) for which x*y != y*x in a markdown operation table"
            }
            CayleyQuery::CounterexampleElements => {
                "List, alphabetically, the elements involved in any case where x*y != y*x"
            }
            CayleyQuery::Identity => "Find the identity element of a markdown operation table, if any",
            CayleyQuery::Inverses => {
                "Find the inverses of every element of a markdown operation table with an identity"
            }
        }
    }

    fn answer(self, table: &CayleyTable) -> Result<Value, ToolError> {
        Ok(match self {
            CayleyQuery::IsCommutative => json!({"commutative": table.is_commutative()}),
            CayleyQuery::CounterexamplePairs => json!({"pairs": table.counterexample_pairs()}),
            CayleyQuery::CounterexampleElements => {
                json!({"elements": table.counterexample_elements()})
            }
            CayleyQuery::Identity => json!({"identity": table.identity()}),
            CayleyQuery::Inverses => json!({"inverses": table.inverses()?}),
        })
    }
}

#[derive(Deserialize)]
struct TableArgs {
    table: String,
}

pub struct CayleyTool {
    query: CayleyQuery,
}

impl CayleyTool {
    pub fn new(query: CayleyQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl ToolTrait for CayleyTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.query.name(), self.query.description()).param(
            "table",
            ParamKind::String,
            "Markdown table: header |*|a|b|...| then one row |x|x*a|x*b|...| per element",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let TableArgs { table } = parse_args(args)?;
        let table = CayleyTable::parse(&table)?;
        self.query.answer(&table).map(ToolPayload::Structured)
    }
}
