mod worker;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::io::{BufRead, Read, Write};
use std::path::Path;

pub use worker::{ActionRecord, RunOutput, RunRecord, StatusValue, WorkerResult};

/// The parameters a run was invoked with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunParameters {
    /// The number of runs that were scheduled
    pub total_runs: usize,
    /// The highest concurrency target of the profile
    pub concurrency: usize,
    /// The concurrency profile as `(seconds, target)` control points
    pub profile: Vec<(f64, f64)>,
    /// Flow weights, if flows were drawn at random
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_weights: Option<Vec<f64>>,
    /// Flow pattern, if flows were assigned from a fixed sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_pattern: Option<Vec<usize>>,
    /// The seed of the shared random generator
    pub seed: u64,
    /// The worker program followed by its arguments
    pub worker: Vec<String>,
}

impl RunParameters {
    /// Compute a fingerprint for these parameters
    ///
    /// Runs with the same fingerprint were started with the same configuration and can be
    /// compared with each other. The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.total_runs.to_le_bytes());
        Digest::update(&mut hasher, self.concurrency.to_le_bytes());
        for (time_s, target) in &self.profile {
            Digest::update(&mut hasher, time_s.to_le_bytes());
            Digest::update(&mut hasher, target.to_le_bytes());
        }
        if let Some(weights) = &self.flow_weights {
            Digest::update(&mut hasher, b"weights");
            weights
                .iter()
                .for_each(|w| Digest::update(&mut hasher, w.to_le_bytes()));
        }
        if let Some(pattern) = &self.flow_pattern {
            Digest::update(&mut hasher, b"pattern");
            Digest::update(&mut hasher, pattern.iter().join(",").as_bytes());
        }
        Digest::update(&mut hasher, self.seed.to_le_bytes());
        Digest::update(&mut hasher, self.worker.iter().join(" ").as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Count, range, mean and percentiles of a set of durations, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistogramSummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// How many times a status was seen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusCount {
    pub status: StatusValue,
    pub count: u64,
}

/// Summary of either the successful or the failed runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketSummary {
    pub durations: HistogramSummary,
    pub results: Vec<StatusCount>,
}

/// Summary of one named action across all runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSummary {
    pub name: String,
    /// Number of times the action was reported, successful or not
    pub count: usize,
    pub success: HistogramSummary,
    pub error: HistogramSummary,
    pub results: Vec<StatusCount>,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// How long it took for every run to finish, in milliseconds
    ///
    /// Not set until the pool has finished.
    pub elapsed_ms: Option<u64>,
    pub parameters: RunParameters,
    /// Fingerprint of [Summary::parameters], see [RunParameters::fingerprint]
    pub fingerprint: String,
    pub success: BucketSummary,
    pub error: BucketSummary,
    /// Per action breakdown, in the order the actions were first seen
    pub actions: Vec<ActionSummary>,
    /// The version of Stampede that produced this summary
    pub stampede_version: String,
}

impl Summary {
    pub fn total_runs(&self) -> usize {
        self.success.durations.count + self.error.durations.count
    }
}

/// Append a run record to a file
///
/// The record is serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_record(record: &RunRecord, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    serde_json::to_writer(&mut file, record)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Load run records from a file written by [append_run_record]
pub fn load_run_records(path: &Path) -> anyhow::Result<Vec<RunRecord>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Serialize the summary to a writer
pub fn store_summary<W: Write>(summary: &Summary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

/// Load a summary from a reader
pub fn load_summary<R: Read>(reader: R) -> anyhow::Result<Summary> {
    let reader = std::io::BufReader::new(reader);
    let summary: Summary = serde_json::from_reader(reader)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parameters() -> RunParameters {
        RunParameters {
            total_runs: 10,
            concurrency: 3,
            profile: vec![(0.0, 0.0), (5.0, 3.0)],
            flow_weights: None,
            flow_pattern: Some(vec![0, 1]),
            seed: 7,
            worker: vec!["node".to_string(), "user.js".to_string()],
        }
    }

    #[test]
    fn fingerprint_tracks_configuration() {
        let base = parameters();
        assert_eq!(base.fingerprint(), parameters().fingerprint());

        let mut other_seed = parameters();
        other_seed.seed = 8;
        assert_ne!(base.fingerprint(), other_seed.fingerprint());

        let mut other_flows = parameters();
        other_flows.flow_pattern = Some(vec![1, 0]);
        assert_ne!(base.fingerprint(), other_flows.fingerprint());
    }

    #[test]
    fn run_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let parsed = RunRecord {
            run_index: 1,
            flow: 0,
            success: true,
            duration_ms: 12.0,
            exit_code: Some(0),
            output: RunOutput::Parsed(WorkerResult {
                status: Some(StatusValue::code(200)),
                actions: vec![ActionRecord::new("home", 4.0, StatusValue::token("ok"))],
                log: None,
            }),
            stderr: String::new(),
        };
        let invalid = RunRecord {
            run_index: 2,
            flow: 1,
            success: false,
            duration_ms: 3.0,
            exit_code: Some(1),
            output: RunOutput::Invalid {
                raw: "not json".to_string(),
                error: "expected ident".to_string(),
            },
            stderr: "boom".to_string(),
        };

        append_run_record(&parsed, &path).unwrap();
        append_run_record(&invalid, &path).unwrap();

        assert_eq!(load_run_records(&path).unwrap(), vec![parsed, invalid]);
    }

    #[test]
    fn summary_is_stored_as_json() {
        let summary = Summary {
            run_id: "abc".to_string(),
            started_at: 1_700_000_000,
            elapsed_ms: Some(1500),
            parameters: parameters(),
            fingerprint: parameters().fingerprint(),
            success: BucketSummary::default(),
            error: BucketSummary {
                durations: HistogramSummary {
                    count: 1,
                    min: Some(2.0),
                    max: Some(2.0),
                    mean: Some(2.0),
                    p50: Some(2.0),
                    p75: Some(2.0),
                    p90: Some(2.0),
                    p95: Some(2.0),
                    p99: Some(2.0),
                },
                results: vec![StatusCount {
                    status: StatusValue::token("error"),
                    count: 1,
                }],
            },
            actions: vec![],
            stampede_version: "0.1.0".to_string(),
        };

        let mut out = Vec::new();
        store_summary(&summary, &mut out).unwrap();
        assert_eq!(load_summary(out.as_slice()).unwrap(), summary);
        assert_eq!(summary.total_runs(), 1);
    }

    #[test]
    fn measured_durations_survive_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let durations = [
            1.7843799999999999,
            499.57406144760205,
            0.1 + 0.2,
            1234.5678901234567,
            f64::MIN_POSITIVE,
        ];
        let records = durations
            .iter()
            .enumerate()
            .map(|(i, duration_ms)| RunRecord {
                run_index: i + 1,
                flow: 0,
                success: true,
                duration_ms: *duration_ms,
                exit_code: Some(0),
                output: RunOutput::Parsed(WorkerResult {
                    status: Some(StatusValue::code(200)),
                    actions: vec![ActionRecord::new(
                        "step",
                        *duration_ms / 3.0,
                        StatusValue::code(200),
                    )],
                    log: None,
                }),
                stderr: String::new(),
            })
            .collect::<Vec<_>>();

        for record in &records {
            append_run_record(record, &path).unwrap();
        }
        let loaded = load_run_records(&path).unwrap();
        for (record, loaded) in records.iter().zip(&loaded) {
            assert_eq!(record.duration_ms.to_bits(), loaded.duration_ms.to_bits());
        }
        assert_eq!(loaded, records);

        let summary = Summary {
            run_id: "abc".to_string(),
            started_at: 1_700_000_000,
            elapsed_ms: Some(1500),
            parameters: parameters(),
            fingerprint: parameters().fingerprint(),
            success: BucketSummary {
                durations: HistogramSummary {
                    count: durations.len(),
                    min: Some(durations[4]),
                    max: Some(durations[3]),
                    mean: Some(durations.iter().sum::<f64>() / durations.len() as f64),
                    p50: Some(durations[0]),
                    p75: Some(durations[1]),
                    p90: Some(durations[3]),
                    p95: Some(durations[3]),
                    p99: Some(durations[3]),
                },
                results: vec![],
            },
            error: BucketSummary::default(),
            actions: vec![],
            stampede_version: "0.1.0".to_string(),
        };

        let mut out = Vec::new();
        store_summary(&summary, &mut out).unwrap();
        assert_eq!(load_summary(out.as_slice()).unwrap(), summary);
    }
}
