//! Clauses, CNF formulas and the clause families of the station packing encoding

use super::VariableNumbering;
use crate::station::{Channel, ConstraintManager, StationId, StationPackingInstance};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use thiserror::Error;

/// Represents a SAT clause (disjunction of literals)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub literals: Vec<i32>, // Positive for variable, negative for negation
}

impl Clause {
    /// Create a new clause from literals
    pub fn new(literals: Vec<i32>) -> Self {
        Self { literals }
    }

    /// Create a unit clause (single literal)
    pub fn unit(literal: i32) -> Self {
        Self {
            literals: vec![literal],
        }
    }

    /// Create a binary clause (two literals)
    pub fn binary(lit1: i32, lit2: i32) -> Self {
        Self {
            literals: vec![lit1, lit2],
        }
    }

    /// Check if clause is empty (unsatisfiable)
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Check if clause is unit
    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }

    /// Whether `model` (indexed by variable, index 0 unused) satisfies this clause
    pub fn is_satisfied_by(&self, model: &[bool]) -> bool {
        self.literals.iter().any(|&lit| {
            let value = model.get(lit.unsigned_abs() as usize).copied().unwrap_or(false);
            if lit > 0 {
                value
            } else {
                !value
            }
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DimacsError {
    #[error("missing 'p cnf' header")]
    MissingHeader,
    #[error("malformed header '{0}'")]
    BadHeader(String),
    #[error("invalid literal '{0}'")]
    BadLiteral(String),
    #[error("literal {literal} exceeds the declared {num_variables} variables")]
    VariableOutOfRange { literal: i32, num_variables: usize },
    #[error("header declares {declared} clauses but {found} were read")]
    ClauseCount { declared: usize, found: usize },
}

/// A CNF formula with its declared variable count
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf {
    num_variables: usize,
    clauses: Vec<Clause>,
}

impl Cnf {
    pub fn new(num_variables: usize, clauses: Vec<Clause>) -> Self {
        Self {
            num_variables,
            clauses,
        }
    }

    /// The fixed formula `x ∧ ¬x` returned for instances that cannot be packed
    pub fn trivially_unsat() -> Self {
        Self::new(1, vec![Clause::unit(1), Clause::unit(-1)])
    }

    pub fn is_trivially_unsat(&self) -> bool {
        *self == Self::trivially_unsat()
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Whether `model` (index 0 unused) satisfies every clause
    pub fn is_satisfied_by(&self, model: &[bool]) -> bool {
        self.clauses.iter().all(|clause| clause.is_satisfied_by(model))
    }

    /// Render in DIMACS format, with each entry of `comments` on its own `c` line
    pub fn to_dimacs(&self, comments: &[String]) -> String {
        let mut output = String::new();
        for comment in comments {
            let _ = writeln!(output, "c {}", comment);
        }
        let _ = writeln!(output, "p cnf {} {}", self.num_variables, self.clauses.len());
        for clause in &self.clauses {
            let _ = writeln!(output, "{} 0", clause.literals.iter().join(" "));
        }
        output
    }

    /// Parse DIMACS text. Clauses may span lines; each ends at a `0`.
    pub fn from_dimacs(content: &str) -> Result<Self, DimacsError> {
        let mut header: Option<(usize, usize)> = None;
        let mut clauses = Vec::new();
        let mut current = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') || line.starts_with('%') {
                continue;
            }

            if line.starts_with('p') {
                let parts: Vec<_> = line.split_whitespace().collect();
                let parsed = match parts.as_slice() {
                    ["p", "cnf", vars, count] => vars.parse().ok().zip(count.parse().ok()),
                    _ => None,
                };
                header = Some(parsed.ok_or_else(|| DimacsError::BadHeader(line.to_string()))?);
                continue;
            }

            let (num_variables, _) = header.ok_or(DimacsError::MissingHeader)?;
            for token in line.split_whitespace() {
                let literal: i32 = token
                    .parse()
                    .map_err(|_| DimacsError::BadLiteral(token.to_string()))?;
                if literal == 0 {
                    clauses.push(Clause::new(std::mem::take(&mut current)));
                } else if literal.unsigned_abs() as usize > num_variables {
                    return Err(DimacsError::VariableOutOfRange {
                        literal,
                        num_variables,
                    });
                } else {
                    current.push(literal);
                }
            }
        }

        let (num_variables, declared) = header.ok_or(DimacsError::MissingHeader)?;
        if !current.is_empty() {
            clauses.push(Clause::new(current));
        }
        if clauses.len() != declared {
            return Err(DimacsError::ClauseCount {
                declared,
                found: clauses.len(),
            });
        }

        Ok(Self::new(num_variables, clauses))
    }
}

/// Generates the clause families of one station
pub struct ConstraintGenerator<'a> {
    numbering: &'a VariableNumbering,
    constraints: &'a ConstraintManager,
}

impl<'a> ConstraintGenerator<'a> {
    pub fn new(numbering: &'a VariableNumbering, constraints: &'a ConstraintManager) -> Self {
        Self {
            numbering,
            constraints,
        }
    }

    /// Pairwise `¬x(s,c1) ∨ ¬x(s,c2)` over every pair of instance channels
    pub fn at_most_one_channel(&self, station_rank: usize) -> Vec<Clause> {
        (0..self.numbering.num_channels())
            .tuple_combinations()
            .map(|(c1, c2)| {
                Clause::binary(
                    -self.numbering.get_variable(station_rank, c1),
                    -self.numbering.get_variable(station_rank, c2),
                )
            })
            .collect()
    }

    /// `x(s,c1) ∨ ... ∨ x(s,cn)` over the station's domain
    pub fn at_least_one_channel(&self, station: StationId, domain: &BTreeSet<Channel>) -> Clause {
        Clause::new(
            domain
                .iter()
                .filter_map(|&channel| self.numbering.variable(station, channel))
                .collect(),
        )
    }

    /// Co-channel exclusion against every lower-ranked interfering station, on every
    /// channel both stations could take. Each unordered pair is emitted once.
    pub fn co_channel(&self, station: StationId, instance: &StationPackingInstance) -> Vec<Clause> {
        let mut clauses = Vec::new();
        let (Some(rank), Some(domain)) =
            (self.numbering.station_rank(station), instance.domain(station))
        else {
            return clauses;
        };

        for &other in self.constraints.co_interfering_stations(station) {
            let Some(other_rank) = self.numbering.station_rank(other) else {
                continue;
            };
            if other_rank >= rank {
                continue;
            }
            let Some(other_domain) = instance.domain(other) else {
                continue;
            };

            for &channel in domain.intersection(other_domain) {
                if let (Some(a), Some(b)) = (
                    self.numbering.variable(station, channel),
                    self.numbering.variable(other, channel),
                ) {
                    clauses.push(Clause::binary(-a, -b));
                }
            }
        }

        clauses
    }

    /// `¬x(s,c) ∨ ¬x(t,c+1)` for every ADJ+1-interfering station `t`
    pub fn adjacent_channel(
        &self,
        station: StationId,
        instance: &StationPackingInstance,
    ) -> Vec<Clause> {
        let mut clauses = Vec::new();
        let Some(domain) = instance.domain(station) else {
            return clauses;
        };

        for &other in self.constraints.adj_plus_interfering_stations(station) {
            let Some(other_domain) = instance.domain(other) else {
                continue;
            };

            for &channel in domain {
                if !other_domain.contains(&(channel + 1)) {
                    continue;
                }
                if let (Some(a), Some(b)) = (
                    self.numbering.variable(station, channel),
                    self.numbering.variable(other, channel + 1),
                ) {
                    clauses.push(Clause::binary(-a, -b));
                }
            }
        }

        clauses
    }
}
