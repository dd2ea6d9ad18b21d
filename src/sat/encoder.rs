//! SAT encoder and decoder for station packing instances

use super::constraints::{Cnf, ConstraintGenerator};
use super::VariableNumbering;
use crate::station::{Assignment, Channel, ConstraintManager, StationId, StationPackingInstance};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a literal assignment could not be turned back into a channel assignment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("assignment holds {found} literals but encoding the instance requires {expected}")]
    LiteralCount { found: usize, expected: usize },
    #[error("variable {0} assigned multiple truth values")]
    DuplicateVariable(i32),
    #[error("literal {0} is not a variable of the encoding")]
    InvalidLiteral(i32),
    #[error("station {0} not assigned to a channel")]
    Unassigned(StationId),
    #[error("station {station} assigned to multiple channels ({first} and {second})")]
    MultipleChannels {
        station: StationId,
        first: Channel,
        second: Channel,
    },
    #[error("station {station} assigned channel {channel}, which is not in its domain")]
    OutOfDomain { station: StationId, channel: Channel },
    #[error("no 'v' assignment section in solver output")]
    MissingAssignment,
    #[error("no terminating 0 in solver output")]
    MissingTerminator,
    #[error("unexpected token '{0}' in assignment section")]
    BadToken(String),
}

/// Translates station packing instances to CNF and satisfying literals back to assignments
#[derive(Debug, Clone, Copy)]
pub struct SatEncoder<'a> {
    constraints: &'a ConstraintManager,
}

impl<'a> SatEncoder<'a> {
    pub fn new(constraints: &'a ConstraintManager) -> Self {
        Self { constraints }
    }

    /// Encode `instance`. An instance with an empty station domain short-circuits to
    /// [`Cnf::trivially_unsat`].
    pub fn encode(&self, instance: &StationPackingInstance) -> Cnf {
        let numbering = VariableNumbering::new(instance);
        let generator = ConstraintGenerator::new(&numbering, self.constraints);
        let mut clauses = Vec::new();

        for (rank, (&station, domain)) in instance.domains().iter().enumerate() {
            if domain.is_empty() {
                debug!("Station {} has an empty domain, instance is trivially UNSAT.", station);
                return Cnf::trivially_unsat();
            }

            clauses.extend(generator.at_most_one_channel(rank));
            clauses.push(generator.at_least_one_channel(station, domain));
            clauses.extend(generator.co_channel(station, instance));
            clauses.extend(generator.adjacent_channel(station, instance));
        }

        debug!(
            "Encoded {} into {} variables and {} clauses.",
            instance,
            numbering.variable_count(),
            clauses.len()
        );

        Cnf::new(numbering.variable_count(), clauses)
    }

    /// Comment lines identifying the instance, for DIMACS output
    pub fn comments(instance: &StationPackingInstance) -> Vec<String> {
        vec![
            "FCC Station Packing Instance".to_string(),
            format!("Stations: {}", instance.stations().join(" ")),
            format!("Channels: {}", instance.all_channels().iter().join(" ")),
        ]
    }

    /// Decode a flat list of signed literals into a channel assignment.
    ///
    /// Every variable of the encoding must appear exactly once, and every station must
    /// end up on exactly one channel of its domain.
    pub fn decode(
        instance: &StationPackingInstance,
        literals: &[i32],
    ) -> Result<Assignment, DecodeError> {
        let numbering = VariableNumbering::new(instance);
        let expected = numbering.variable_count();
        if literals.len() != expected {
            return Err(DecodeError::LiteralCount {
                found: literals.len(),
                expected,
            });
        }

        let mut values = BTreeMap::new();
        for &literal in literals {
            let magnitude = literal.unsigned_abs() as usize;
            if magnitude == 0 || magnitude > expected {
                return Err(DecodeError::InvalidLiteral(literal));
            }
            let variable = magnitude as i32;
            if values.insert(variable, literal > 0).is_some() {
                return Err(DecodeError::DuplicateVariable(variable));
            }
        }

        let mut assignment = Assignment::new();
        for (&station, domain) in instance.domains() {
            let mut assigned: Option<Channel> = None;
            for &channel in numbering.channels() {
                let Some(variable) = numbering.variable(station, channel) else {
                    continue;
                };
                if !values.get(&variable).copied().unwrap_or(false) {
                    continue;
                }
                if let Some(first) = assigned {
                    return Err(DecodeError::MultipleChannels {
                        station,
                        first,
                        second: channel,
                    });
                }
                assigned = Some(channel);
            }

            let channel = assigned.ok_or(DecodeError::Unassigned(station))?;
            if !domain.contains(&channel) {
                return Err(DecodeError::OutOfDomain { station, channel });
            }
            assignment.entry(channel).or_default().insert(station);
        }

        Ok(assignment)
    }

    /// Extract the literals of a solver's `v ... 0` assignment section
    pub fn parse_solver_output(output: &str) -> Result<Vec<i32>, DecodeError> {
        let mut tokens = output.split_whitespace().skip_while(|token| *token != "v");
        if tokens.next().is_none() {
            return Err(DecodeError::MissingAssignment);
        }

        let mut literals = Vec::new();
        for token in tokens {
            if token == "v" {
                continue;
            }
            match token.parse::<i32>() {
                Ok(0) => return Ok(literals),
                Ok(literal) => literals.push(literal),
                Err(_) if token.contains("CPU") => break,
                Err(_) => return Err(DecodeError::BadToken(token.to_string())),
            }
        }

        Err(DecodeError::MissingTerminator)
    }
}

/// Statistics about the SAT encoding
#[derive(Debug, Clone)]
pub struct EncodingStatistics {
    pub stations: usize,
    pub channels: usize,
    pub total_variables: usize,
    pub total_clauses: usize,
    pub trivially_unsat: bool,
}

impl EncodingStatistics {
    pub fn new(instance: &StationPackingInstance, cnf: &Cnf) -> Self {
        Self {
            stations: instance.num_stations(),
            channels: instance.all_channels().len(),
            total_variables: cnf.num_variables(),
            total_clauses: cnf.num_clauses(),
            trivially_unsat: cnf.is_trivially_unsat(),
        }
    }
}

impl std::fmt::Display for EncodingStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Encoding Statistics:")?;
        writeln!(f, "  Stations: {}", self.stations)?;
        writeln!(f, "  Channels: {}", self.channels)?;
        writeln!(f, "  Total variables: {}", self.total_variables)?;
        writeln!(f, "  Total clauses: {}", self.total_clauses)?;
        if self.trivially_unsat {
            writeln!(f, "  Trivially UNSAT (empty domain)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::station_channels;
    use std::collections::BTreeSet;

    fn domain(channels: &[Channel]) -> BTreeSet<Channel> {
        channels.iter().copied().collect()
    }

    fn two_station_instance(d1: &[Channel], d2: &[Channel]) -> StationPackingInstance {
        StationPackingInstance::with_domains(BTreeMap::from([
            (StationId(1), domain(d1)),
            (StationId(2), domain(d2)),
        ]))
    }

    fn co_constraints() -> ConstraintManager {
        let mut constraints = ConstraintManager::new();
        constraints.add_co_interference(StationId(1), StationId(2));
        constraints
    }

    /// Every literal set over `num_variables`, as solver output would list it
    fn all_models(num_variables: usize) -> impl Iterator<Item = Vec<i32>> {
        (0u32..(1 << num_variables)).map(move |bits| {
            (1..=num_variables as i32)
                .map(|var| if bits & (1 << (var - 1)) != 0 { var } else { -var })
                .collect()
        })
    }

    fn model_of(literals: &[i32]) -> Vec<bool> {
        let mut model = vec![false; literals.len() + 1];
        for &lit in literals {
            model[lit.unsigned_abs() as usize] = lit > 0;
        }
        model
    }

    #[test]
    fn test_empty_domain_is_trivially_unsat() {
        let constraints = co_constraints();
        let encoder = SatEncoder::new(&constraints);

        let cnf = encoder.encode(&two_station_instance(&[1, 2], &[]));
        assert!(cnf.is_trivially_unsat());
        assert_eq!(cnf.num_variables(), 1);
        assert_eq!(cnf.num_clauses(), 2);
    }

    #[test]
    fn test_declared_counts() {
        let constraints = co_constraints();
        let encoder = SatEncoder::new(&constraints);
        let instance = two_station_instance(&[1, 2], &[2, 3]);

        let cnf = encoder.encode(&instance);
        assert_eq!(cnf.num_variables(), 6);
        // 3 + 3 at-most-one, 2 at-least-one, 1 co-channel on the shared channel 2
        assert_eq!(cnf.num_clauses(), 9);
        let text = cnf.to_dimacs(&[]);
        assert!(text.starts_with("p cnf 6 9\n"));
    }

    #[test]
    fn test_co_channel_pair_emitted_once() {
        let constraints = co_constraints();
        let encoder = SatEncoder::new(&constraints);
        let cnf = encoder.encode(&two_station_instance(&[1, 2, 3], &[1, 2, 3]));

        let numbering = VariableNumbering::new(&two_station_instance(&[1, 2, 3], &[1, 2, 3]));
        let a = numbering.variable(StationId(1), 2).unwrap();
        let b = numbering.variable(StationId(2), 2).unwrap();
        let co_clauses = cnf
            .clauses()
            .iter()
            .filter(|clause| {
                let mut lits = clause.literals.clone();
                lits.sort();
                lits == vec![-b, -a]
            })
            .count();
        assert_eq!(co_clauses, 1);
    }

    #[test]
    fn test_adjacent_channel_is_directional() {
        let mut constraints = ConstraintManager::new();
        constraints.add_adj_plus_interference(StationId(1), StationId(2));
        let encoder = SatEncoder::new(&constraints);
        let instance = two_station_instance(&[1, 2], &[1, 2]);
        let cnf = encoder.encode(&instance);

        for literals in all_models(cnf.num_variables()) {
            if !cnf.is_satisfied_by(&model_of(&literals)) {
                continue;
            }
            let channels = station_channels(&SatEncoder::decode(&instance, &literals).unwrap());
            assert!(
                !(channels[&StationId(1)] == 1 && channels[&StationId(2)] == 2),
                "station 2 sits right above station 1"
            );
        }

        // Station 2 on 1 and station 1 on 2 is still allowed
        let numbering = VariableNumbering::new(&instance);
        let allowed = [
            -numbering.variable(StationId(1), 1).unwrap(),
            numbering.variable(StationId(1), 2).unwrap(),
            numbering.variable(StationId(2), 1).unwrap(),
            -numbering.variable(StationId(2), 2).unwrap(),
        ];
        assert!(cnf.is_satisfied_by(&model_of(&allowed)));
    }

    #[test]
    fn test_round_trip_over_all_models() {
        let mut constraints = co_constraints();
        constraints.add_adj_plus_interference(StationId(2), StationId(1));
        let encoder = SatEncoder::new(&constraints);
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        let cnf = encoder.encode(&instance);

        let mut satisfying = 0;
        for literals in all_models(cnf.num_variables()) {
            if !cnf.is_satisfied_by(&model_of(&literals)) {
                continue;
            }
            satisfying += 1;
            let assignment = SatEncoder::decode(&instance, &literals).unwrap();
            let channels = station_channels(&assignment);

            assert_eq!(channels.len(), 2);
            for (station, channel) in &channels {
                assert!(instance.domain(*station).unwrap().contains(channel));
            }
            assert_ne!(channels[&StationId(1)], channels[&StationId(2)]);
            assert!(constraints.is_satisfying_assignment(&assignment));
        }
        // (1,2), (1,3) and (2,3); co-channel rules out (2,2)
        assert_eq!(satisfying, 3);
    }

    #[test]
    fn test_decode_rejects_wrong_literal_count() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        let result = SatEncoder::decode(&instance, &[1, -2, -3]);
        assert_eq!(
            result,
            Err(DecodeError::LiteralCount {
                found: 3,
                expected: 6
            })
        );
    }

    #[test]
    fn test_decode_rejects_two_channels() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        // station 1 on channels 1 and 2, station 2 on channel 3
        let result = SatEncoder::decode(&instance, &[1, 2, -3, -4, -5, 6]);
        assert!(matches!(
            result,
            Err(DecodeError::MultipleChannels {
                station: StationId(1),
                ..
            })
        ));
    }

    #[test]
    fn test_decode_rejects_no_channel() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        let result = SatEncoder::decode(&instance, &[1, -2, -3, -4, -5, -6]);
        assert_eq!(result, Err(DecodeError::Unassigned(StationId(2))));
    }

    #[test]
    fn test_decode_rejects_out_of_domain() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        // station 1 on channel 3
        let result = SatEncoder::decode(&instance, &[-1, -2, 3, -4, 5, -6]);
        assert_eq!(
            result,
            Err(DecodeError::OutOfDomain {
                station: StationId(1),
                channel: 3
            })
        );
    }

    #[test]
    fn test_decode_rejects_duplicates() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        let result = SatEncoder::decode(&instance, &[1, -1, -3, -4, 5, -6]);
        assert_eq!(result, Err(DecodeError::DuplicateVariable(1)));
    }

    #[test]
    fn test_decode_rejects_out_of_range_literals() {
        let instance = two_station_instance(&[1, 2], &[2, 3]);
        let literals = SatEncoder::parse_solver_output("v -2147483648 0\n").unwrap();
        assert_eq!(literals, vec![i32::MIN]);

        let mut model = vec![-1, -2, -3, -4, -5];
        model.extend(literals);
        assert_eq!(
            SatEncoder::decode(&instance, &model),
            Err(DecodeError::InvalidLiteral(i32::MIN))
        );
        assert_eq!(
            SatEncoder::decode(&instance, &[-1, -2, -3, -4, -5, 7]),
            Err(DecodeError::InvalidLiteral(7))
        );
    }

    #[test]
    fn test_parse_solver_output() {
        let output = "c comment\ns SATISFIABLE\n v 1 -2 -3\n v -4 5 -6 0\nc CPU time 0.01\n";
        assert_eq!(
            SatEncoder::parse_solver_output(output).unwrap(),
            vec![1, -2, -3, -4, 5, -6]
        );

        assert_eq!(
            SatEncoder::parse_solver_output("s UNSATISFIABLE\n"),
            Err(DecodeError::MissingAssignment)
        );
        assert_eq!(
            SatEncoder::parse_solver_output("v 1 2\nCPU 0.1"),
            Err(DecodeError::MissingTerminator)
        );
    }

    #[test]
    fn test_comments_identify_instance() {
        let comments = SatEncoder::comments(&two_station_instance(&[1, 2], &[2, 3]));
        assert_eq!(comments[1], "Stations: 1 2");
        assert_eq!(comments[2], "Channels: 1 2 3");
    }
}
