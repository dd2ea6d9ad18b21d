//! Batch conversion of question files into CNF files

use crate::sat::{CnfLookup, EncodingStatistics, LookupError, SatEncoder};
use crate::station::{DataError, DatasetBundle, DatasetLoader, Question};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("dataset {key} could not be loaded: {message}")]
    Dataset { key: String, message: String },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// What happened to one question file
#[derive(Debug)]
pub struct Extraction {
    pub question: PathBuf,
    pub outcome: Result<PathBuf, ExtractError>,
    /// Size of the encoding, when the question got that far
    pub statistics: Option<EncodingStatistics>,
}

pub struct CnfExtractor {
    loader: Box<dyn DatasetLoader>,
    lookup: CnfLookup,
}

impl CnfExtractor {
    pub fn new(loader: Box<dyn DatasetLoader>, lookup: CnfLookup) -> Self {
        Self { loader, lookup }
    }

    /// Encode every question and store its CNF. Datasets are loaded once per key;
    /// encoding runs in parallel.
    pub fn extract(&self, questions: &[PathBuf]) -> Vec<Extraction> {
        let parsed: Vec<(PathBuf, Result<Question, DataError>)> = questions
            .par_iter()
            .map(|path| (path.clone(), Question::from_file(path)))
            .collect();

        let mut datasets: HashMap<String, Result<DatasetBundle, String>> = HashMap::new();
        for question in parsed.iter().filter_map(|(_, q)| q.as_ref().ok()) {
            let key = &question.station_config;
            if !datasets.contains_key(key) {
                let bundle = self.loader.load(key).map_err(|e| e.to_string());
                if let Err(message) = &bundle {
                    warn!("Could not load dataset {}: {}", key, message);
                }
                datasets.insert(key.clone(), bundle);
            }
        }

        let extractions: Vec<Extraction> = parsed
            .into_par_iter()
            .map(|(path, question)| {
                let outcome = question
                    .map_err(ExtractError::from)
                    .and_then(|question| self.extract_one(&question, &datasets));
                match outcome {
                    Ok((cnf, statistics)) => Extraction {
                        question: path,
                        outcome: Ok(cnf),
                        statistics: Some(statistics),
                    },
                    Err(error) => Extraction {
                        question: path,
                        outcome: Err(error),
                        statistics: None,
                    },
                }
            })
            .collect();

        let saved = extractions.iter().filter(|e| e.outcome.is_ok()).count();
        info!(
            "Extracted {} of {} questions to {}.",
            saved,
            extractions.len(),
            self.lookup.directory().display()
        );
        extractions
    }

    fn extract_one(
        &self,
        question: &Question,
        datasets: &HashMap<String, Result<DatasetBundle, String>>,
    ) -> Result<(PathBuf, EncodingStatistics), ExtractError> {
        let dataset = match datasets.get(&question.station_config) {
            Some(Ok(dataset)) => dataset,
            Some(Err(message)) => {
                return Err(ExtractError::Dataset {
                    key: question.station_config.clone(),
                    message: message.clone(),
                })
            }
            None => {
                return Err(ExtractError::Dataset {
                    key: question.station_config.clone(),
                    message: "not loaded".to_string(),
                })
            }
        };

        let instance = question.to_instance(&dataset.stations)?;
        let cnf = SatEncoder::new(&dataset.constraints).encode(&instance);
        let statistics = EncodingStatistics::new(&instance, &cnf);
        debug!("Encoded {} into {} clauses.", instance, statistics.total_clauses);

        let path = self
            .lookup
            .save(&instance, &cnf, &SatEncoder::comments(&instance))?;
        Ok((path, statistics))
    }
}

/// Question files directly inside `directory`, or `directory` itself when it is a file
pub fn question_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    if directory.is_file() {
        return Ok(vec![directory.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
